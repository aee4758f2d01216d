pub mod liveness {
    pub mod index;
}
pub mod metrics {
    pub mod index;
}

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crate::metrics::PrometheusMetrics;

/// Served on `PORT`.
pub fn liveness_router() -> Router {
    Router::new().route("/", get(liveness::index::handler))
}

/// Served on `METRICS_PORT`.
pub fn metrics_router(metrics: Arc<PrometheusMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics::index::handler))
        .layer(Extension(metrics))
}
