use core::pin::pin;
use core::time::Duration;

use futures_util::TryStreamExt;
use tokio_postgres::{Client, NoTls, types::ToSql};

use crate::extract::MovieRecord;

pub type DBError = tokio_postgres::Error;
pub type StoreResult<T> = Result<T, StoreError>;

const TABLE: &str = "IMDB";
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot establish database session: {0}")]
    Connection(DBError),
    #[error("database session is closed")]
    Closed,
    #[error("schema statement failed: {0}")]
    Schema(DBError),
    #[error("table {0} does not exist")]
    MissingTable(&'static str),
    #[error("query failed: {0}")]
    Query(DBError),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
}

impl DbConfig {
    /// Reads `DB_NAME`, `DB_USER`, `DB_PASSWORD`, `DB_HOST` and `DB_PORT`
    /// from the environment. Values are passed through to the server
    /// unvalidated.
    #[must_use]
    pub fn from_env() -> Self {
        let var =
            |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_owned());
        Self {
            name: var("DB_NAME", "postgres"),
            user: var("DB_USER", "postgres"),
            password: std::env::var("DB_PASSWORD").ok(),
            host: var("DB_HOST", "/var/run/postgresql"),
            port: std::env::var("DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
        }
    }
}

/// One live database session: the client plus the spawned task driving the
/// wire connection. No pooling; a caller wanting concurrent pipelines opens
/// one `Connection` each.
pub struct Connection {
    client: Option<Client>,
    driver: Option<tokio::task::JoinHandle<()>>,
}

impl Connection {
    pub async fn open(config: &DbConfig) -> StoreResult<Self> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&config.user)
            .dbname(&config.name)
            .connect_timeout(CONNECTION_TIMEOUT);
        if let Some(password) = &config.password {
            pg.password(password);
        }

        let (client, connection) = pg.connect(NoTls).await.map_err(StoreError::Connection)?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "db", "connection error: {e:?}");
            }
        });
        tracing::info!(target: "db", "database session established");

        Ok(Self {
            client: Some(client),
            driver: Some(driver),
        })
    }

    pub(crate) fn client(&self) -> StoreResult<&Client> {
        self.client.as_ref().ok_or(StoreError::Closed)
    }

    /// Idempotent. Dropping the client lets the driver task wind down; the
    /// task is awaited so the session is fully released on return.
    pub async fn close(&mut self) {
        if self.client.take().is_none() {
            return;
        }
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                tracing::error!(target: "db", "driver task error: {e:?}");
            }
        }
        tracing::info!(target: "db", "database session closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.client = None;
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// Closed set of updatable columns. Identifiers interpolated into the SET
/// clause come only from this enumeration, never from caller text.
#[derive(Debug)]
pub enum MovieUpdate {
    Rating(String),
    DurationMinutes(i32),
    RatingAmount(Option<i32>),
    GroupCategory(String),
}

impl MovieUpdate {
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Rating(_) => "Rating",
            Self::DurationMinutes(_) => "Duration_minutes",
            Self::RatingAmount(_) => "Rating_Amount",
            Self::GroupCategory(_) => "Group_Category",
        }
    }

    fn value(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::Rating(v) | Self::GroupCategory(v) => v,
            Self::DurationMinutes(v) => v,
            Self::RatingAmount(v) => v,
        }
    }
}

fn record_from_row(row: &tokio_postgres::Row) -> Result<MovieRecord, DBError> {
    Ok(MovieRecord {
        title: row.try_get::<_, &str>(0)?.into(),
        year: row.try_get::<_, &str>(1)?.into(),
        rating: row.try_get::<_, &str>(2)?.into(),
        duration_minutes: row.try_get(3)?,
        rating_amount: row.try_get(4)?,
        group_category: row.try_get::<_, &str>(5)?.into(),
    })
}

fn update_sql(fields: &[MovieUpdate]) -> String {
    use core::fmt::Write;

    let mut sql = format!("update \"{TABLE}\" set ");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        let _ = write!(sql, "\"{}\" = ${}", field.column(), i + 1);
    }
    let _ = write!(
        sql,
        " where \"Title\" = ${} and \"Year\" = ${}",
        fields.len() + 1,
        fields.len() + 2
    );
    sql
}

/// Schema owner for the `"IMDB"` table.
pub struct MovieTable<'c> {
    conn: &'c Connection,
}

impl<'c> MovieTable<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        const SQL: &str = "create table if not exists \"IMDB\" (\
            \"id\" serial primary key, \
            \"Title\" varchar(255), \
            \"Year\" varchar(4), \
            \"Rating\" varchar(255), \
            \"Duration_minutes\" int, \
            \"Rating_Amount\" int, \
            \"Group_Category\" varchar(10), \
            unique (\"Title\", \"Year\"))";

        let client = self.conn.client()?;
        client.execute(SQL, &[]).await.map_err(StoreError::Schema)?;
        tracing::info!(target: "db", "table {TABLE} created or already exists");
        Ok(())
    }

    /// `Ok(false)` means the table is absent; a transport failure is an
    /// `Err`, never a `false`.
    pub async fn exists(&self) -> StoreResult<bool> {
        const SQL: &str = "select to_regclass('public.\"IMDB\"') is not null";

        let client = self.conn.client()?;
        let row = client.query_one(SQL, &[]).await.map_err(StoreError::Query)?;
        row.try_get(0).map_err(StoreError::Query)
    }

    /// Column name/type pairs from the catalog, for logging.
    pub async fn schema_info(&self) -> StoreResult<Vec<(String, String)>> {
        const SQL: &str = "select column_name::text, data_type::text \
            from information_schema.columns where table_name = $1";

        let client = self.conn.client()?;
        let rows = client
            .query(SQL, &[&TABLE])
            .await
            .map_err(StoreError::Query)?;
        rows.into_iter()
            .map(|row| Ok((row.try_get(0)?, row.try_get(1)?)))
            .collect::<Result<_, DBError>>()
            .map_err(StoreError::Query)
    }

    /// Bulk insert as one atomic statement; rows conflicting on the
    /// (Title, Year) key are silently skipped. Records with an empty title
    /// or year are not persistable and are dropped up front. Fails without
    /// touching the store when the table is absent.
    pub async fn insert_many(&self, records: &[MovieRecord]) -> StoreResult<u64> {
        const SQL: &str = "insert into \"IMDB\" \
            (\"Title\", \"Year\", \"Rating\", \"Duration_minutes\", \"Rating_Amount\", \"Group_Category\") \
            select * from unnest($1::text[], $2::text[], $3::text[], $4::int[], $5::int[], $6::text[]) \
            on conflict (\"Title\", \"Year\") do nothing";

        if !self.exists().await? {
            tracing::error!(target: "db", "table {TABLE} does not exist, cannot insert");
            return Err(StoreError::MissingTable(TABLE));
        }
        if records.is_empty() {
            return Ok(0);
        }

        let valid: Vec<&MovieRecord> = records.iter().filter(|r| r.is_valid()).collect();
        if valid.len() != records.len() {
            tracing::warn!(
                target: "db",
                "{} records dropped for missing title/year",
                records.len() - valid.len(),
            );
        }

        let titles: Vec<&str> = valid.iter().map(|r| &*r.title).collect();
        let years: Vec<&str> = valid.iter().map(|r| &*r.year).collect();
        let ratings: Vec<&str> = valid.iter().map(|r| &*r.rating).collect();
        let durations: Vec<i32> = valid.iter().map(|r| r.duration_minutes).collect();
        let amounts: Vec<Option<i32>> = valid.iter().map(|r| r.rating_amount).collect();
        let groups: Vec<&str> = valid.iter().map(|r| &*r.group_category).collect();

        let client = self.conn.client()?;
        let n = client
            .execute(
                SQL,
                &[&titles, &years, &ratings, &durations, &amounts, &groups],
            )
            .await
            .map_err(StoreError::Query)?;
        tracing::info!(target: "db", "{n}/{} records inserted.", valid.len());
        Ok(n)
    }

    /// Distinct rows, catalog order.
    pub async fn select_all(&self) -> StoreResult<Vec<MovieRecord>> {
        const SQL: &str = "select distinct \"Title\", \"Year\", \"Rating\", \
            \"Duration_minutes\", \"Rating_Amount\", \"Group_Category\" from \"IMDB\"";

        let client = self.conn.client()?;
        let stream = client
            .query_raw(SQL, core::iter::empty::<&dyn ToSql>())
            .await
            .map_err(StoreError::Query)?;
        let mut stream = pin!(stream);

        let mut result = Vec::new();
        while let Some(row) = stream.try_next().await.map_err(StoreError::Query)? {
            result.push(record_from_row(&row).map_err(StoreError::Query)?);
        }
        Ok(result)
    }

    /// Partial update of the single row matching the natural key. Zero
    /// matching rows is a success with zero rows affected.
    pub async fn update_by_key(
        &self,
        title: &str,
        year: &str,
        fields: &[MovieUpdate],
    ) -> StoreResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }

        let sql = update_sql(fields);
        let mut params: Vec<&(dyn ToSql + Sync)> = fields.iter().map(MovieUpdate::value).collect();
        params.push(&title);
        params.push(&year);

        let client = self.conn.client()?;
        let n = client
            .execute(sql.as_str(), &params)
            .await
            .map_err(StoreError::Query)?;
        tracing::info!(target: "db", "{n} records updated.");
        Ok(n)
    }

    pub async fn delete_by_key(&self, title: &str, year: &str) -> StoreResult<u64> {
        const SQL: &str = "delete from \"IMDB\" where \"Title\" = $1 and \"Year\" = $2";

        let client = self.conn.client()?;
        let n = client
            .execute(SQL, &[&title, &year])
            .await
            .map_err(StoreError::Query)?;
        tracing::info!(target: "db", "{n} records deleted.");
        Ok(n)
    }

    /// If-exists semantics: dropping an absent table is a success.
    pub async fn drop_table(&self) -> StoreResult<()> {
        const SQL: &str = "drop table if exists \"IMDB\"";

        let client = self.conn.client()?;
        client.execute(SQL, &[]).await.map_err(StoreError::Schema)?;
        tracing::info!(target: "db", "table {TABLE} dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MovieUpdate, update_sql};

    #[test]
    fn update_sql_enumerates_whitelisted_columns() {
        let fields = [
            MovieUpdate::Rating("9.1".into()),
            MovieUpdate::DurationMinutes(125),
        ];
        assert_eq!(
            update_sql(&fields),
            "update \"IMDB\" set \"Rating\" = $1, \"Duration_minutes\" = $2 \
             where \"Title\" = $3 and \"Year\" = $4",
        );
    }

    #[test]
    fn update_sql_single_field() {
        let fields = [MovieUpdate::RatingAmount(Some(210_000))];
        assert_eq!(
            update_sql(&fields),
            "update \"IMDB\" set \"Rating_Amount\" = $1 where \"Title\" = $2 and \"Year\" = $3",
        );
    }

    #[test]
    fn column_names_are_static() {
        assert_eq!(MovieUpdate::Rating(String::new()).column(), "Rating");
        assert_eq!(MovieUpdate::DurationMinutes(0).column(), "Duration_minutes");
        assert_eq!(MovieUpdate::RatingAmount(None).column(), "Rating_Amount");
        assert_eq!(
            MovieUpdate::GroupCategory(String::new()).column(),
            "Group_Category"
        );
    }
}
