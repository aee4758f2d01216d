//! Fetch → decode → table-reset → insert, one module per source.
//!
//! Fetching is async; storage goes through [`RowStore`](crate::db::RowStore),
//! which keeps the blocking diesel work off the async workers.

pub mod git_issues;
pub mod stack_questions;

use std::future::Future;
use std::time::Instant;

use reqwest::{Client, StatusCode};

use crate::config::IngestConfig;
use crate::metrics::{ApiLabel, ApiObserver, ApiSource, Outcome};

/// Coarse classification of a pipeline failure, for logs and callers that
/// treat some kinds differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The GET could not be sent or its body could not be read.
    Transport,
    /// The API answered with a non-success status.
    Status,
    /// The body was not the expected JSON shape.
    Decode,
    /// A payload value could not be mapped to a row.
    Mapping,
    /// DDL or DML failed.
    Storage,
}

pub trait PipelineFailure {
    fn kind(&self) -> FailureKind;
}

/// Client shared by both pipelines. No timeout unless configured.
pub fn build_http_client(config: &IngestConfig) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));

    if let Some(timeout) = config.http_timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}

/// Awaits one GET and records its duration, count and body size under the
/// source's success or error label.
pub(crate) async fn observe_fetch<Fut, E>(
    observer: &dyn ApiObserver,
    source: ApiSource,
    fetch: Fut,
) -> Result<(StatusCode, String), E>
where
    Fut: Future<Output = Result<(StatusCode, String), E>>,
{
    let start = Instant::now();
    let result = fetch.await;
    let elapsed = start.elapsed();

    match &result {
        Ok((status, body)) => {
            let outcome = if status.is_success() {
                Outcome::Success
            } else {
                Outcome::Error
            };
            let label = ApiLabel::new(source, outcome);
            observer.observe_request(label, elapsed);
            observer.observe_response_size(label, body.len());
        }
        Err(_) => observer.observe_request(ApiLabel::new(source, Outcome::Error), elapsed),
    }

    result
}

/// Start of an error body, for messages.
pub(crate) fn excerpt(body: &str) -> String {
    crate::db::truncate_chars(body, 200)
}
