use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{serve, Router};
use projects_ingest::{
    config::{Config, ConfigError},
    driver::{repeat_until, run_ingest, IngestReport, RunIngestError},
    endpoints::{liveness_router, metrics_router},
    metrics::{MetricsInitError, PrometheusMetrics},
    pipelines::build_http_client,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use utils_trace::tracing_init;

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum MainError {
    #[error("TracingInit: {source}")]
    TracingInit {
        #[source]
        source: utils_trace::TracingInitError,
    },
    #[error("LoadConfig: {source}")]
    LoadConfig {
        #[source]
        source: ConfigError,
    },
    #[error("MetricsInit: {source}")]
    MetricsInit {
        #[source]
        source: MetricsInitError,
    },
    #[error("HttpClient: {source}")]
    HttpClient {
        #[source]
        source: reqwest::Error,
    },
    #[error("TcpListenerBind {addr}: {source}")]
    TcpListenerBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Ingest: {source}")]
    Ingest {
        #[source]
        source: RunIngestError,
    },
    #[error("Signal: {source}")]
    Signal {
        #[source]
        source: std::io::Error,
    },
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    tracing_init("info").map_err(|source| MainError::TracingInit { source })?;

    let config = Config::from_env().map_err(|source| MainError::LoadConfig { source })?;
    info!(
        repositories = config.ingest.repositories.len(),
        query_terms = config.ingest.query_terms.len(),
        policy = ?config.ingest.failure_policy,
        "configuration loaded"
    );

    let metrics =
        Arc::new(PrometheusMetrics::new().map_err(|source| MainError::MetricsInit { source })?);

    spawn_server("liveness", config.server.port, liveness_router()).await?;
    spawn_server("metrics", config.server.metrics_port, metrics_router(metrics.clone())).await?;
    spawn_metrics_upkeep(metrics.clone());

    let client =
        build_http_client(&config.ingest).map_err(|source| MainError::HttpClient { source })?;

    let observer = metrics.as_ref();
    match config.ingest.interval {
        None => {
            let mut shutdown = pin!(tokio::signal::ctrl_c());
            tokio::select! {
                signal = &mut shutdown => {
                    signal.map_err(|source| MainError::Signal { source })?;
                    warn!("interrupted during ingest");
                }
                result = run_ingest(&config, &client, observer) => {
                    let report = result.map_err(|source| MainError::Ingest { source })?;
                    log_report(&report);

                    info!("ingest done; serving metrics until interrupted");
                    shutdown.await.map_err(|source| MainError::Signal { source })?;
                }
            }
        }
        Some(interval) => {
            let (config, client) = (&config, &client);
            repeat_until(interval, tokio::signal::ctrl_c(), move || async move {
                match run_ingest(config, client, observer).await {
                    Ok(report) => log_report(&report),
                    Err(err) => error!(error = %err, "ingest run failed; retrying at next interval"),
                }
            })
            .await
            .map_err(|source| MainError::Signal { source })?;
        }
    }

    info!("shutting down");
    Ok(())
}

async fn spawn_server(name: &'static str, port: u16, app: Router) -> Result<(), MainError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| MainError::TcpListenerBind { addr, source })?;

    info!("{} server running on addr: {}", name, addr);

    tokio::spawn(async move {
        if let Err(err) = serve(listener, app).await {
            error!(server = name, error = %err, "server stopped");
        }
    });

    Ok(())
}

fn spawn_metrics_upkeep(metrics: Arc<PrometheusMetrics>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            ticker.tick().await;
            metrics.run_upkeep();
        }
    });
}

fn log_report(report: &IngestReport) {
    for summary in &report.stored {
        info!(item = %summary.target, rows = summary.rows, "stored");
    }
    for failure in &report.failures {
        warn!(item = %failure.target, kind = ?failure.kind, error = %failure.error, "skipped after failure");
    }
}
