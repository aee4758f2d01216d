use std::sync::Arc;

use axum::{
    body::Body,
    extract::Extension,
    http::{header, Response, StatusCode},
    response::IntoResponse,
};

use crate::metrics::PrometheusMetrics;

pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Axum handler: GET /metrics
pub async fn handler(Extension(metrics): Extension<Arc<PrometheusMetrics>>) -> impl IntoResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)
        .body(Body::from(metrics.render()))
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}
