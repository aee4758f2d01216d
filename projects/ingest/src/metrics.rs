//! Outbound request instrumentation.
//!
//! Pipelines only see the [`ApiObserver`] capability. [`PrometheusMetrics`] is the
//! process-wide implementation, built once at startup and rendered by `GET /metrics`.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, with_local_recorder, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use thiserror::Error;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const RESPONSE_SIZE: &str = "http_response_size_bytes";

/// Prometheus client default buckets.
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSource {
    Git,
    Stackoverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

/// The `api` label value: source and outcome, e.g. `GitSuccess`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiLabel {
    pub source: ApiSource,
    pub outcome: Outcome,
}

impl ApiLabel {
    pub const fn new(source: ApiSource, outcome: Outcome) -> Self {
        Self { source, outcome }
    }

    pub fn as_str(&self) -> &'static str {
        match (self.source, self.outcome) {
            (ApiSource::Git, Outcome::Success) => "GitSuccess",
            (ApiSource::Git, Outcome::Error) => "GitError",
            (ApiSource::Stackoverflow, Outcome::Success) => "StackoverflowSuccess",
            (ApiSource::Stackoverflow, Outcome::Error) => "StackoverflowError",
        }
    }
}

pub trait ApiObserver: Send + Sync {
    /// One outbound request finished (or failed) after `elapsed`.
    fn observe_request(&self, label: ApiLabel, elapsed: Duration);

    fn observe_response_size(&self, label: ApiLabel, bytes: usize);
}

#[derive(Debug, Error)]
pub enum MetricsInitError {
    #[error("DurationBuckets: {source}")]
    DurationBuckets {
        #[from]
        source: BuildError,
    },
}

pub struct PrometheusMetrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    /// Durations get histogram buckets; response sizes are left unbucketed so
    /// the exporter renders them as a summary.
    pub fn new() -> Result<Self, MetricsInitError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_owned()), &DEFAULT_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();

        with_local_recorder(&recorder, || {
            describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests made");
            describe_histogram!(REQUEST_DURATION, Unit::Seconds, "Histogram of HTTP request durations");
            describe_histogram!(RESPONSE_SIZE, Unit::Bytes, "Summary of HTTP response sizes in bytes");
        });

        Ok(Self { recorder, handle })
    }

    /// Text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drains buffered histogram samples; call periodically.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}

impl ApiObserver for PrometheusMetrics {
    fn observe_request(&self, label: ApiLabel, elapsed: Duration) {
        with_local_recorder(&self.recorder, || {
            counter!(REQUESTS_TOTAL, "api" => label.as_str()).increment(1);
            histogram!(REQUEST_DURATION, "api" => label.as_str()).record(elapsed.as_secs_f64());
        });
    }

    fn observe_response_size(&self, label: ApiLabel, bytes: usize) {
        with_local_recorder(&self.recorder, || {
            histogram!(RESPONSE_SIZE, "api" => label.as_str()).record(bytes as f64);
        });
    }
}
