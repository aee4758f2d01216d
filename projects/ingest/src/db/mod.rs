pub mod schema;
pub mod git_issue {
    pub mod models;
    pub mod queries;
}
pub mod stack_question {
    pub mod models;
    pub mod queries;
}

use std::future::Future;

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::info;

use crate::config::DatabaseConfig;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Width of every `VARCHAR(255)` column.
pub const VARCHAR_WIDTH: usize = 255;
/// Width of `git_issues.body`.
pub const BODY_WIDTH: usize = 2048;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("BuildPool {database}: {source}")]
    BuildPool {
        database: String,
        source: r2d2::Error,
    },

    #[error("JoinBlockingTask: {source}")]
    JoinBlockingTask {
        #[from]
        source: JoinError,
    },
}

/// Opens a single-connection pool.
///
/// Blocks until the first connection is up, or until r2d2's connection timeout
/// (30 s by default) elapses when the server is unreachable. Async callers go
/// through [`PgTable::connect`].
pub fn connect(config: &DatabaseConfig) -> Result<PgPool, ConnectError> {
    info!(host = %config.host, database = %config.database_name, "initializing database connection");

    let manager = ConnectionManager::<PgConnection>::new(config.connection_string());
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|source| ConnectError::BuildPool {
            database: config.database_name.clone(),
            source,
        })?;

    info!(database = %config.database_name, "database connection established");
    Ok(pool)
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("ResetTable: {source}")]
    Reset {
        source: diesel::result::Error,
    },

    #[error("InsertRow: {source}")]
    Insert {
        source: diesel::result::Error,
    },

    #[error("GetConnectionFromPool: {source}")]
    Checkout {
        source: r2d2::Error,
    },

    #[error("JoinBlockingTask: {source}")]
    JoinBlockingTask {
        source: JoinError,
    },
}

/// A destination table that is only ever wholly replaced: reset, then insert row by row.
///
/// Implementations block; see [`RowStore`] for the async side.
pub trait ReplaceTable<R> {
    /// Drops and recreates the table.
    fn reset(&mut self) -> Result<(), TableError>;

    fn insert(&mut self, row: &R) -> Result<(), TableError>;
}

/// Resets the table, then inserts `rows` one statement at a time, in order.
pub fn replace_rows<R, T>(table: &mut T, rows: &[R]) -> Result<usize, TableError>
where
    T: ReplaceTable<R> + ?Sized,
{
    table.reset()?;
    for row in rows {
        table.insert(row)?;
    }
    Ok(rows.len())
}

/// What the pipelines write to: replaces the whole table with `rows`.
pub trait RowStore<R> {
    fn replace(&mut self, rows: Vec<R>) -> impl Future<Output = Result<usize, TableError>> + Send;
}

/// One database's tables, reached through a pool whose blocking work runs on
/// tokio's blocking threads.
#[derive(Clone)]
pub struct PgTable {
    pool: PgPool,
}

impl PgTable {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ConnectError> {
        let config = config.clone();
        let pool = tokio::task::spawn_blocking(move || connect(&config)).await??;
        Ok(Self::new(pool))
    }

    async fn with_connection<F, T>(&self, f: F) -> Result<T, TableError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, TableError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|source| TableError::Checkout { source })?;
            f(&mut conn)
        })
        .await
        .map_err(|source| TableError::JoinBlockingTask { source })?
    }
}

impl<R> RowStore<R> for PgTable
where
    PgConnection: ReplaceTable<R>,
    R: Send + 'static,
{
    async fn replace(&mut self, rows: Vec<R>) -> Result<usize, TableError> {
        self.with_connection(move |conn| replace_rows(conn, &rows)).await
    }
}

/// Cuts `value` to at most `max` characters; Postgres rejects over-long VARCHARs.
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((end, _)) => value[..end].to_owned(),
        None => value.to_owned(),
    }
}
