//! GitHub issue and StackOverflow question ingestion service
//!
//! - Fetch/decode/persist pipelines in `pipelines/`, run in order by `driver`
//! - PostgreSQL schema, models and queries in `db/`
//! - Liveness and Prometheus endpoints in `endpoints/`
//! - Requires DB_PASSWORD env var; everything else has defaults (see `config`)

pub mod config;
pub mod db;
pub mod driver;
pub mod endpoints;
pub mod metrics;
pub mod pipelines;
