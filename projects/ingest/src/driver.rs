//! Runs both pipelines over the configured targets, one target at a time.
//!
//! Issues go to the GitHub database, questions to the StackOverflow database;
//! each handle is closed before the next is opened. Every target reuses the same
//! destination table, so after a full run each table holds the last target's rows.

use std::error::Error as StdError;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::{Config, FailurePolicy, IngestConfig, RepoTarget};
use crate::db::{
    git_issue::models::NewGitIssue, stack_question::models::NewStackQuestion, ConnectError,
    PgTable, RowStore,
};
use crate::metrics::ApiObserver;
use crate::pipelines::{
    git_issues::sync_repo_issues, stack_questions::sync_search_questions, FailureKind,
    PipelineFailure,
};

#[derive(Debug, Error)]
pub enum RunIngestError {
    #[error("Connect: {source}")]
    Connect {
        #[from]
        source: ConnectError,
    },

    #[error("TargetFailed {target} ({kind:?}): {source}")]
    TargetFailed {
        target: String,
        kind: FailureKind,
        source: Box<dyn StdError + Send + Sync>,
    },
}

#[derive(Debug)]
pub struct TargetSummary {
    pub target: String,
    pub rows: usize,
}

#[derive(Debug)]
pub struct TargetFailure {
    pub target: String,
    pub kind: FailureKind,
    pub error: Box<dyn StdError + Send + Sync>,
}

/// What one run stored, and which targets failed under [`FailurePolicy::Continue`].
#[derive(Debug, Default)]
pub struct IngestReport {
    pub stored: Vec<TargetSummary>,
    pub failures: Vec<TargetFailure>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn settle<E>(
        &mut self,
        policy: FailurePolicy,
        target: String,
        result: Result<usize, E>,
    ) -> Result<(), RunIngestError>
    where
        E: PipelineFailure + StdError + Send + Sync + 'static,
    {
        let err = match result {
            Ok(rows) => {
                self.stored.push(TargetSummary { target, rows });
                return Ok(());
            }
            Err(err) => err,
        };

        let kind = err.kind();
        error!(item = %target, ?kind, error = %err, "ingest target failed");

        match policy {
            FailurePolicy::Abort => Err(RunIngestError::TargetFailed {
                target,
                kind,
                source: Box::new(err),
            }),
            FailurePolicy::Continue => {
                self.failures.push(TargetFailure {
                    target,
                    kind,
                    error: Box::new(err),
                });
                Ok(())
            }
        }
    }
}

/// One full pass: every repository, then every query term.
pub async fn run_ingest(
    config: &Config,
    client: &Client,
    observer: &dyn ApiObserver,
) -> Result<IngestReport, RunIngestError> {
    let mut report = IngestReport::default();

    {
        let mut table = PgTable::connect(&config.github_db).await?;
        run_issue_targets(&mut table, client, observer, &config.ingest, &mut report).await?;
    }

    {
        let mut table = PgTable::connect(&config.stack_db).await?;
        run_question_targets(&mut table, client, observer, &config.ingest, &mut report).await?;
    }

    info!(
        stored = report.stored.len(),
        failed = report.failures.len(),
        "ingest run finished"
    );
    Ok(report)
}

pub async fn run_issue_targets<T>(
    table: &mut T,
    client: &Client,
    observer: &dyn ApiObserver,
    ingest: &IngestConfig,
    report: &mut IngestReport,
) -> Result<(), RunIngestError>
where
    T: RowStore<NewGitIssue> + ?Sized,
{
    for RepoTarget { owner, repo } in &ingest.repositories {
        info!(owner, repo, "syncing issues");
        let result =
            sync_repo_issues(client, &ingest.github_api_url, observer, table, owner, repo).await;
        report.settle(ingest.failure_policy, format!("{owner}/{repo}"), result)?;
    }
    Ok(())
}

pub async fn run_question_targets<T>(
    table: &mut T,
    client: &Client,
    observer: &dyn ApiObserver,
    ingest: &IngestConfig,
    report: &mut IngestReport,
) -> Result<(), RunIngestError>
where
    T: RowStore<NewStackQuestion> + ?Sized,
{
    for term in &ingest.query_terms {
        info!(term, "syncing questions");
        let result =
            sync_search_questions(client, &ingest.stackexchange_api_url, observer, table, term)
                .await;
        report.settle(ingest.failure_policy, term.clone(), result)?;
    }
    Ok(())
}

/// Calls `run` on every tick of `period` until `shutdown` resolves, and returns
/// its output. A run still in flight when `shutdown` fires is dropped. Ticks
/// missed during a long run are delayed rather than fired back to back.
pub async fn repeat_until<S, F, Fut>(period: Duration, shutdown: S, mut run: F) -> S::Output
where
    S: Future,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = pin!(shutdown);

    loop {
        tokio::select! {
            output = &mut shutdown => return output,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            output = &mut shutdown => return output,
            () = run() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::MemoryTable;
    use crate::pipelines::testing::{serve_stub, RecordingObserver};
    use std::cell::{Cell, RefCell};
    use tokio::time::{sleep, Instant};
    use axum::{extract::Path, http::StatusCode, routing::get, Router};

    /// `broken/*` answers with garbage, everything else with one issue named after the repo.
    fn issues_stub() -> Router {
        Router::new().route(
            "/repos/{owner}/{repo}/issues",
            get(|Path((owner, repo)): Path<(String, String)>| async move {
                if owner == "broken" {
                    return (StatusCode::OK, "not json".to_owned());
                }
                let body = format!(
                    r#"[{{"title":"{repo}","state":"open","created_at":"2024-01-01T00:00:00Z","body":null,"id":1}}]"#
                );
                (StatusCode::OK, body)
            }),
        )
    }

    fn ingest(base: String, repositories: &[(&str, &str)], policy: FailurePolicy) -> IngestConfig {
        IngestConfig {
            repositories: repositories
                .iter()
                .map(|(owner, repo)| RepoTarget::new(*owner, *repo))
                .collect(),
            query_terms: Vec::new(),
            failure_policy: policy,
            interval: None,
            http_timeout: None,
            github_api_url: base,
            stackexchange_api_url: String::new(),
        }
    }

    #[tokio::test]
    async fn table_ends_with_the_last_targets_rows() {
        let base = serve_stub(issues_stub()).await;
        let config = ingest(base, &[("a", "one"), ("b", "two")], FailurePolicy::Abort);
        let mut table = MemoryTable::<NewGitIssue>::default();
        let mut report = IngestReport::default();

        run_issue_targets(&mut table, &Client::new(), &RecordingObserver::default(), &config, &mut report)
            .await
            .expect("both targets succeed");

        assert!(report.is_clean());
        assert_eq!(report.stored.len(), 2);
        assert_eq!(report.stored[0].target, "a/one");
        assert_eq!(table.resets, 2);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].repo, "two");
        assert_eq!(table.rows[0].title, "two");
    }

    #[tokio::test]
    async fn abort_stops_at_the_first_failure() {
        let base = serve_stub(issues_stub()).await;
        let config = ingest(
            base,
            &[("a", "one"), ("broken", "x"), ("c", "three")],
            FailurePolicy::Abort,
        );
        let observer = RecordingObserver::default();
        let mut table = MemoryTable::<NewGitIssue>::default();
        let mut report = IngestReport::default();

        let err = run_issue_targets(&mut table, &Client::new(), &observer, &config, &mut report)
            .await
            .expect_err("second target fails");

        assert!(matches!(
            err,
            RunIngestError::TargetFailed { ref target, kind: FailureKind::Decode, .. } if target == "broken/x"
        ));
        assert_eq!(report.stored.len(), 1);
        assert_eq!(observer.requests().len(), 2);
        assert_eq!(table.rows[0].repo, "one");
    }

    #[tokio::test]
    async fn continue_records_the_failure_and_moves_on() {
        let base = serve_stub(issues_stub()).await;
        let config = ingest(
            base,
            &[("a", "one"), ("broken", "x"), ("c", "three")],
            FailurePolicy::Continue,
        );
        let mut table = MemoryTable::<NewGitIssue>::default();
        let mut report = IngestReport::default();

        run_issue_targets(&mut table, &Client::new(), &RecordingObserver::default(), &config, &mut report)
            .await
            .expect("failures are collected, not returned");

        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target, "broken/x");
        assert_eq!(report.failures[0].kind, FailureKind::Decode);
        assert_eq!(report.stored.len(), 2);
        assert_eq!(table.rows[0].repo, "three");
    }

    #[tokio::test]
    async fn question_targets_run_in_order() {
        let base = serve_stub(Router::new().route(
            "/search",
            get(|| async {
                r#"{"items":[{"title":"q","is_answered":true,"owner":{},"question_id":5,"creation_date":0}]}"#
            }),
        ))
        .await;
        let config = IngestConfig {
            query_terms: vec!["docker".to_owned(), "golang".to_owned()],
            stackexchange_api_url: base,
            ..ingest(String::new(), &[], FailurePolicy::Abort)
        };
        let mut table = MemoryTable::<NewStackQuestion>::default();
        let mut report = IngestReport::default();

        run_question_targets(&mut table, &Client::new(), &RecordingObserver::default(), &config, &mut report)
            .await
            .expect("both terms succeed");

        let targets: Vec<&str> = report.stored.iter().map(|s| s.target.as_str()).collect();
        assert_eq!(targets, vec!["docker", "golang"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].query, "golang");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_run_in_flight() {
        let started = Cell::new(0);
        let finished = Cell::new(0);
        let (started_ref, finished_ref) = (&started, &finished);

        repeat_until(Duration::from_secs(60), sleep(Duration::from_secs(10)), move || {
            started_ref.set(started_ref.get() + 1);
            async move {
                sleep(Duration::from_secs(3600)).await;
                finished_ref.set(finished_ref.get() + 1);
            }
        })
        .await;

        assert_eq!(started.get(), 1);
        assert_eq!(finished.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn a_long_run_delays_the_next_ticks_instead_of_bunching_them() {
        let period = Duration::from_secs(10);
        let origin = Instant::now();
        let starts = RefCell::new(Vec::new());
        let starts_ref = &starts;

        repeat_until(period, sleep(Duration::from_secs(70)), move || {
            starts_ref.borrow_mut().push(origin.elapsed());
            let first = starts_ref.borrow().len() == 1;
            async move {
                if first {
                    sleep(Duration::from_secs(35)).await;
                }
            }
        })
        .await;

        let starts = starts.into_inner();
        assert_eq!(starts[0], Duration::ZERO);
        assert_eq!(starts[1], Duration::from_secs(35));
        assert!(starts.len() >= 3);
        assert!(starts.windows(2).all(|pair| pair[1] - pair[0] >= period));
    }
}
