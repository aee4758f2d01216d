use axum::{http::StatusCode, response::IntoResponse};

pub const GREETING: &str = "Hello, world!";

/// Axum handler: GET /
pub async fn handler() -> impl IntoResponse {
    (StatusCode::OK, GREETING)
}
