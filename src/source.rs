//! URL sources feeding collection runs.
//!
//! A source is opened once per run and yields a lazy, finite, forward-only
//! stream of URLs. Failing to open the stream aborts the run; a bad
//! individual record is yielded as [`SourceError::Row`] so the consumer can
//! skip it and keep going.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Connection, Executor};
use tracing::{debug, info};

/// Query used when none is configured.
pub const DEFAULT_QUERY: &str = "SELECT url FROM bookmarks";

/// Maximum connections held by the SQLite pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// How long a run waits for a pooled connection before giving up.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Stream of URLs produced by an opened source.
pub type UrlStream<'a> = BoxStream<'a, Result<String, SourceError>>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open URL source: {0}")]
    Open(String),

    #[error("failed to read URL record: {0}")]
    Row(String),
}

/// Read-only provider of the URLs to probe.
#[async_trait]
pub trait UrlSource: Send + Sync {
    /// Opens a fresh sequence of URLs for one collection run.
    async fn open<'a>(&'a self) -> Result<UrlStream<'a>, SourceError>;
}

/// URL source backed by a SQLite table.
#[derive(Clone)]
pub struct SqliteSource {
    pool: SqlitePool,
    query: String,
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl SqliteSource {
    /// Connects to the database at `db`, either a filesystem path or a
    /// `sqlite:` URL. The database must already exist; it is opened read-only.
    pub async fn connect(db: &str, query: impl Into<String>) -> Result<Self, SourceError> {
        let options = if db.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(db).map_err(|e| SourceError::Open(e.to_string()))?
        } else {
            SqliteConnectOptions::new().filename(db)
        };
        let options = options.create_if_missing(false).read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| SourceError::Open(e.to_string()))?;

        info!("Opened URL store: {}", db);

        Ok(Self {
            pool,
            query: query.into(),
        })
    }

    /// Verifies that a connection to the store can be established.
    pub async fn ping(&self) -> Result<(), SourceError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| SourceError::Open(e.to_string()))?;
        conn.ping()
            .await
            .map_err(|e| SourceError::Open(e.to_string()))
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Closes the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl UrlSource for SqliteSource {
    async fn open<'a>(&'a self) -> Result<UrlStream<'a>, SourceError> {
        // Preparing up front surfaces a missing table or unreadable file
        // as an open failure rather than as the first row.
        (&self.pool)
            .prepare(self.query.as_str())
            .await
            .map_err(|e| SourceError::Open(e.to_string()))?;

        debug!(query = %self.query, "URL query prepared");

        let rows = sqlx::query_scalar::<_, Option<String>>(self.query.as_str())
            .fetch(&self.pool)
            .map(|row| match row {
                Ok(Some(url)) => Ok(url),
                Ok(None) => Err(SourceError::Row("url is NULL".to_string())),
                Err(e) => Err(SourceError::Row(e.to_string())),
            });

        Ok(rows.boxed())
    }
}

/// In-memory source, used by the `test` command and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    rows: Vec<Result<String, SourceError>>,
}

impl StaticSource {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            rows: urls.into_iter().map(Ok).collect(),
        }
    }

    /// Builds a source that also yields unreadable records.
    pub fn with_rows(rows: Vec<Result<String, SourceError>>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl UrlSource for StaticSource {
    async fn open<'a>(&'a self) -> Result<UrlStream<'a>, SourceError> {
        Ok(stream::iter(self.rows.clone()).boxed())
    }
}
