use compact_str::CompactString;

use crate::util::duration_minutes;

/// One normalized row of the movie chart. `(title, year)` is the natural
/// key; uniqueness is enforced by the store, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRecord {
    pub title: CompactString,
    pub year: CompactString,
    pub rating: CompactString,
    pub duration_minutes: i32,
    pub rating_amount: Option<i32>,
    pub group_category: CompactString,
}

impl MovieRecord {
    /// Only records with a non-empty title and year are persistable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() && !self.year.is_empty()
    }
}

/// Aligns the five independently queried field collections by position and
/// builds one record per retained position.
///
/// The collections come from separate selector queries against the same
/// page, so a structure change can leave them with different lengths. The
/// policy is truncation to the shortest, never an error. The raw rating
/// text may carry a vote-count suffix on a following line; only the
/// leading line is the rating.
pub fn extract(
    titles: &[String],
    years: &[String],
    ratings: &[String],
    durations: &[String],
    groups: &[String],
) -> Vec<MovieRecord> {
    let n = titles
        .len()
        .min(years.len())
        .min(ratings.len())
        .min(durations.len())
        .min(groups.len());
    let longest = titles
        .len()
        .max(years.len())
        .max(ratings.len())
        .max(durations.len())
        .max(groups.len());
    if longest != n {
        tracing::warn!(target: "extract", "field collections differ in length, truncating to {n}");
    }

    (0..n)
        .map(|i| MovieRecord {
            title: titles[i].trim().into(),
            year: years[i].trim().into(),
            rating: ratings[i].split('\n').next().unwrap_or("").into(),
            duration_minutes: duration_minutes(&durations[i]),
            rating_amount: None,
            group_category: groups[i].trim().into(),
        })
        .collect()
}
