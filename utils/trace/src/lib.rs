use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins over `default_level` when it is set and parses.
fn env_filter(default_level: &str) -> Result<EnvFilter, TracingInitError> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(directives.as_deref(), default_level)
}

fn filter_from(directives: Option<&str>, default_level: &str) -> Result<EnvFilter, TracingInitError> {
    match directives.map(EnvFilter::try_new) {
        Some(Ok(filter)) => Ok(filter),
        _ => EnvFilter::try_new(default_level)
            .map_err(|source| TracingInitError::InvalidFilter { source }),
    }
}

pub fn tracing_init(default_level: &str) -> Result<(), TracingInitError> {
    let subscriber = tracing_subscriber::registry()
        .with(env_filter(default_level)?)
        .with(fmt::layer().compact().with_target(false));

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|source| TracingInitError::SetGlobalDefault { source })?;

    Ok(())
}

#[derive(Debug, Error)]
pub enum TracingInitError {
    #[error("InvalidFilter: {source}")]
    InvalidFilter {
        #[from]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("SetGlobalDefault: {source}")]
    SetGlobalDefault {
        #[from]
        source: tracing::subscriber::SetGlobalDefaultError,
    },
}
