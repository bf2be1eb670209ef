use scraper::{ElementRef, Html, Selector};

use mscr::scrape::{first_tab, navigate_to, outer_html, puppeteer, wait_for};

pub const CHART_URL: &str = "https://www.imdb.com/chart/moviemeter/?ref_=nv_mv_mpm";

const CHART_LIST: &str = "ul.ipc-metadata-list";
const TITLES: &str = "li.ipc-metadata-list-summary-item h3.ipc-title__text";
const YEARS: &str =
    "li.ipc-metadata-list-summary-item div.cli-title-metadata span.cli-title-metadata-item:nth-child(1)";
const DURATIONS: &str =
    "li.ipc-metadata-list-summary-item div.cli-title-metadata span.cli-title-metadata-item:nth-child(2)";
const GROUPS: &str =
    "li.ipc-metadata-list-summary-item div.cli-title-metadata span.cli-title-metadata-item:nth-child(3)";
const RATINGS: &str = "li.ipc-metadata-list-summary-item span.ratingGroup--imdb-rating";

/// The five field collections, each from its own selector query. Lengths
/// are not reconciled here; that is the extractor's job.
pub struct ChartFields {
    pub titles: Vec<String>,
    pub years: Vec<String>,
    pub ratings: Vec<String>,
    pub durations: Vec<String>,
    pub groups: Vec<String>,
}

/// Element text with one line per text node, so a rating and its
/// vote-count suffix keep their line structure.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn collect_fields(html: &str) -> ChartFields {
    let fragment = Html::parse_fragment(html);
    let texts = |selector: &str| {
        let sel = Selector::parse(selector).unwrap();
        fragment.select(&sel).map(element_text).collect::<Vec<_>>()
    };

    ChartFields {
        titles: texts(TITLES),
        years: texts(YEARS),
        ratings: texts(RATINGS),
        durations: texts(DURATIONS),
        groups: texts(GROUPS),
    }
}

pub async fn fetch_chart() -> anyhow::Result<ChartFields> {
    let browser = puppeteer(true)?;
    let tab = first_tab(&browser)?;

    navigate_to(&tab, CHART_URL.into()).await?;
    wait_for(&tab, CHART_LIST.into()).await?;
    let html = outer_html(&tab, CHART_LIST.into()).await?;
    tracing::info!(target: "moviemeter", "chart fetched: {} bytes", html.len());

    Ok(collect_fields(&html))
}

#[cfg(test)]
mod tests {
    use super::collect_fields;
    use mscr::extract;

    const CHART: &str = r#"
<ul class="ipc-metadata-list">
  <li class="ipc-metadata-list-summary-item">
    <div class="ipc-title"><h3 class="ipc-title__text">Movie 1</h3></div>
    <div class="cli-title-metadata">
      <span class="cli-title-metadata-item">2020</span>
      <span class="cli-title-metadata-item">2h 0m</span>
      <span class="cli-title-metadata-item">Action</span>
    </div>
    <span class="ipc-rating-star ratingGroup--imdb-rating">8.5 <span class="ipc-rating-star--voteCount">(210K)</span></span>
  </li>
  <li class="ipc-metadata-list-summary-item">
    <div class="ipc-title"><h3 class="ipc-title__text">Movie 2</h3></div>
    <div class="cli-title-metadata">
      <span class="cli-title-metadata-item">2021</span>
      <span class="cli-title-metadata-item">2h 30m</span>
      <span class="cli-title-metadata-item">Drama</span>
    </div>
    <span class="ipc-rating-star ratingGroup--imdb-rating">7.4 <span class="ipc-rating-star--voteCount">(98K)</span></span>
  </li>
  <li class="ipc-metadata-list-summary-item">
    <div class="ipc-title"><h3 class="ipc-title__text">Movie 3</h3></div>
    <div class="cli-title-metadata">
      <span class="cli-title-metadata-item">2022</span>
      <span class="cli-title-metadata-item">1h 30m</span>
      <span class="cli-title-metadata-item">Comedy</span>
    </div>
    <span class="ipc-rating-star ratingGroup--imdb-rating">9.0 <span class="ipc-rating-star--voteCount">(12K)</span></span>
  </li>
</ul>
"#;

    #[test]
    fn collects_aligned_field_lists() {
        let fields = collect_fields(CHART);
        assert_eq!(fields.titles, ["Movie 1", "Movie 2", "Movie 3"]);
        assert_eq!(fields.years, ["2020", "2021", "2022"]);
        assert_eq!(fields.durations, ["2h 0m", "2h 30m", "1h 30m"]);
        assert_eq!(fields.groups, ["Action", "Drama", "Comedy"]);
        assert_eq!(fields.ratings[0], "8.5\n(210K)");
    }

    #[test]
    fn extracts_records_from_chart() {
        let fields = collect_fields(CHART);
        let records = extract::extract(
            &fields.titles,
            &fields.years,
            &fields.ratings,
            &fields.durations,
            &fields.groups,
        );
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].rating, "8.5");
        assert_eq!(records[2].group_category, "Comedy");
        let minutes: Vec<i32> = records.iter().map(|r| r.duration_minutes).collect();
        assert_eq!(minutes, [120, 150, 90]);
    }

    #[test]
    fn missing_metadata_shortens_one_collection() {
        // Third metadata span absent: groups has fewer entries than titles.
        let html = r#"
<ul class="ipc-metadata-list">
  <li class="ipc-metadata-list-summary-item">
    <div class="ipc-title"><h3 class="ipc-title__text">Movie 1</h3></div>
    <div class="cli-title-metadata">
      <span class="cli-title-metadata-item">2020</span>
      <span class="cli-title-metadata-item">2h 0m</span>
    </div>
    <span class="ratingGroup--imdb-rating">8.5</span>
  </li>
</ul>
"#;
        let fields = collect_fields(html);
        assert_eq!(fields.titles.len(), 1);
        assert!(fields.groups.is_empty());
        let records = extract::extract(
            &fields.titles,
            &fields.years,
            &fields.ratings,
            &fields.durations,
            &fields.groups,
        );
        assert!(records.is_empty());
    }
}
