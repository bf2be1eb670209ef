mod scrape;

use mscr::db::{Connection, DbConfig, MovieTable, MovieUpdate};
use mscr::extract::{self, MovieRecord};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    pretty_env_logger::init_timed();

    let records = match scrape::fetch_chart().await {
        Ok(fields) => extract::extract(
            &fields.titles,
            &fields.years,
            &fields.ratings,
            &fields.durations,
            &fields.groups,
        ),
        Err(e) => {
            tracing::error!(target: "moviemeter", "scrape failed: {e:?}");
            Vec::new()
        }
    };
    tracing::info!(target: "moviemeter", "{} records extracted", records.len());
    for record in records.iter().take(5) {
        tracing::debug!(target: "moviemeter", "{record:?}");
    }

    let mut conn = Connection::open(&DbConfig::from_env()).await?;
    run_pipeline(&conn, &records).await;
    conn.close().await;

    Ok(())
}

/// A store-step failure is logged and the pipeline moves on to the next
/// step; each operation commits or rolls back on its own.
async fn run_pipeline(conn: &Connection, records: &[MovieRecord]) {
    let table = MovieTable::new(conn);

    if let Err(e) = table.ensure_schema().await {
        tracing::error!(target: "moviemeter", "{e}");
    }
    match table.schema_info().await {
        Ok(columns) => {
            for (name, data_type) in columns {
                tracing::info!(target: "moviemeter", "column {name}: {data_type}");
            }
        }
        Err(e) => tracing::error!(target: "moviemeter", "{e}"),
    }

    if records.is_empty() {
        tracing::warn!(target: "moviemeter", "no data to insert");
    } else if let Err(e) = table.insert_many(records).await {
        tracing::error!(target: "moviemeter", "{e}");
    }

    match table.select_all().await {
        Ok(rows) => {
            tracing::info!(target: "moviemeter", "{} records stored", rows.len());
            for row in rows {
                tracing::info!(target: "moviemeter", "{row:?}");
            }
        }
        Err(e) => tracing::error!(target: "moviemeter", "{e}"),
    }

    if let Some(first) = records.first() {
        let update = [
            MovieUpdate::Rating("9.1".into()),
            MovieUpdate::DurationMinutes(first.duration_minutes + 5),
        ];
        if let Err(e) = table
            .update_by_key(&first.title, &first.year, &update)
            .await
        {
            tracing::error!(target: "moviemeter", "{e}");
        }
    }

    if let Some(second) = records.get(1) {
        if let Err(e) = table.delete_by_key(&second.title, &second.year).await {
            tracing::error!(target: "moviemeter", "{e}");
        }
    }

    if let Err(e) = table.drop_table().await {
        tracing::error!(target: "moviemeter", "{e}");
    }
}
