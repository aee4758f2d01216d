use interfaces_github_issues::index::{
    fetch_repo_issues, parse_issues, FetchRepoIssuesError, GitHubIssue, GitHubIssuesResult,
};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::info;

use crate::db::{git_issue::models::NewGitIssue, truncate_chars, RowStore, TableError, BODY_WIDTH, VARCHAR_WIDTH};
use crate::metrics::{ApiObserver, ApiSource};
use crate::pipelines::{excerpt, observe_fetch, FailureKind, PipelineFailure};

#[derive(Debug, Error)]
pub enum SyncRepoIssuesError {
    #[error("FetchRepoIssues: {source}")]
    FetchRepoIssues {
        #[from]
        source: FetchRepoIssuesError,
    },

    #[error("UnexpectedStatus: {status}: {body}")]
    UnexpectedStatus {
        status: StatusCode,
        body: String,
    },

    #[error("DeserializeResponseBody: {source}")]
    DeserializeResponseBody {
        source: serde_json::Error,
    },

    #[error("Persist: {source}")]
    Persist {
        #[from]
        source: TableError,
    },
}

impl PipelineFailure for SyncRepoIssuesError {
    fn kind(&self) -> FailureKind {
        match self {
            SyncRepoIssuesError::FetchRepoIssues { .. } => FailureKind::Transport,
            SyncRepoIssuesError::UnexpectedStatus { .. } => FailureKind::Status,
            SyncRepoIssuesError::DeserializeResponseBody { .. } => FailureKind::Decode,
            SyncRepoIssuesError::Persist { .. } => FailureKind::Storage,
        }
    }
}

/// Replaces the contents of `table` with the first page of `owner/repo`'s issues.
///
/// The table is only touched once the payload has decoded, so a failed fetch
/// leaves the previous run's rows in place. Returns the number of rows written.
pub async fn sync_repo_issues<T>(
    client: &Client,
    api_base: &str,
    observer: &dyn ApiObserver,
    table: &mut T,
    owner: &str,
    repo: &str,
) -> Result<usize, SyncRepoIssuesError>
where
    T: RowStore<NewGitIssue> + ?Sized,
{
    let (status, body) = observe_fetch(observer, ApiSource::Git, async {
        fetch_repo_issues(client, api_base, owner, repo)
            .await
            .map(|GitHubIssuesResult { body, status }| (status, body))
    })
    .await?;

    if !status.is_success() {
        return Err(SyncRepoIssuesError::UnexpectedStatus {
            status,
            body: excerpt(&body),
        });
    }

    let issues = parse_issues(&body)
        .map_err(|source| SyncRepoIssuesError::DeserializeResponseBody { source })?;

    let written = persist_issues(table, repo, &issues).await?;

    info!(owner, repo, rows = written, "issues fetched and stored");
    Ok(written)
}

/// Replaces the table with one row per issue, in payload order.
pub async fn persist_issues<T>(
    table: &mut T,
    repo: &str,
    issues: &[GitHubIssue],
) -> Result<usize, TableError>
where
    T: RowStore<NewGitIssue> + ?Sized,
{
    table.replace(issue_rows(repo, issues)).await
}

pub fn issue_rows(repo: &str, issues: &[GitHubIssue]) -> Vec<NewGitIssue> {
    issues.iter().map(|issue| issue_row(issue, repo)).collect()
}

pub fn issue_row(issue: &GitHubIssue, repo: &str) -> NewGitIssue {
    NewGitIssue {
        title: truncate_chars(&issue.title, VARCHAR_WIDTH),
        state: truncate_chars(&issue.state, VARCHAR_WIDTH),
        created_at: truncate_chars(&issue.created_at, VARCHAR_WIDTH),
        repo: truncate_chars(repo, VARCHAR_WIDTH),
        body: issue.body.as_deref().map(|body| truncate_chars(body, BODY_WIDTH)),
        issue_id: issue.id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::MemoryTable;
    use crate::pipelines::testing::{serve_stub, unreachable_base, RecordingObserver};
    use axum::{extract::Path, http::StatusCode as AxumStatus, routing::get, Router};

    const TWO_ISSUES: &str = r#"[
        {"title":"A","state":"open","created_at":"2024-01-01T00:00:00Z","body":"x","id":"1"},
        {"title":"B","state":"closed","created_at":"2024-02-01T00:00:00Z","body":"y","id":"2"}
    ]"#;

    fn stub_with(status: AxumStatus, body: &'static str) -> Router {
        Router::new().route(
            "/repos/{owner}/{repo}/issues",
            get(move |Path((_owner, _repo)): Path<(String, String)>| async move { (status, body) }),
        )
    }

    fn row(title: &str, state: &str, created_at: &str, body: &str, issue_id: i64) -> NewGitIssue {
        NewGitIssue {
            title: title.to_owned(),
            state: state.to_owned(),
            created_at: created_at.to_owned(),
            repo: "demo".to_owned(),
            body: Some(body.to_owned()),
            issue_id,
        }
    }

    #[tokio::test]
    async fn stores_two_stubbed_issues_in_order() {
        let base = serve_stub(stub_with(AxumStatus::OK, TWO_ISSUES)).await;
        let observer = RecordingObserver::default();
        let mut table = MemoryTable::<NewGitIssue>::default();

        let written = sync_repo_issues(&Client::new(), &base, &observer, &mut table, "acme", "demo")
            .await
            .expect("sync succeeds");

        assert_eq!(written, 2);
        assert_eq!(table.inserts, 2);
        assert_eq!(
            table.rows,
            vec![
                row("A", "open", "2024-01-01T00:00:00Z", "x", 1),
                row("B", "closed", "2024-02-01T00:00:00Z", "y", 2),
            ]
        );
        assert_eq!(observer.requests(), vec!["GitSuccess"]);
        assert_eq!(observer.sizes(), vec![("GitSuccess", TWO_ISSUES.len())]);
    }

    #[tokio::test]
    async fn second_run_replaces_first() {
        let first = serve_stub(stub_with(AxumStatus::OK, TWO_ISSUES)).await;
        let second = serve_stub(stub_with(
            AxumStatus::OK,
            r#"[{"title":"C","state":"open","created_at":"2024-03-01T00:00:00Z","body":"z","id":3}]"#,
        ))
        .await;
        let observer = RecordingObserver::default();
        let mut table = MemoryTable::<NewGitIssue>::default();
        let client = Client::new();

        sync_repo_issues(&client, &first, &observer, &mut table, "acme", "demo")
            .await
            .expect("first run");
        sync_repo_issues(&client, &second, &observer, &mut table, "acme", "demo")
            .await
            .expect("second run");

        assert_eq!(table.resets, 2);
        assert_eq!(table.rows, vec![row("C", "open", "2024-03-01T00:00:00Z", "z", 3)]);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error_and_writes_nothing() {
        let base = serve_stub(stub_with(AxumStatus::OK, "this is not json")).await;
        let observer = RecordingObserver::default();
        let mut table = MemoryTable::<NewGitIssue>::default();

        let err = sync_repo_issues(&Client::new(), &base, &observer, &mut table, "acme", "demo")
            .await
            .expect_err("decode fails");

        assert_eq!(err.kind(), FailureKind::Decode);
        assert_eq!(table.inserts, 0);
        assert_eq!(table.resets, 0);
        assert_eq!(observer.requests(), vec!["GitSuccess"]);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let base = unreachable_base().await;
        let observer = RecordingObserver::default();
        let mut table = MemoryTable::<NewGitIssue>::default();

        let err = sync_repo_issues(&Client::new(), &base, &observer, &mut table, "acme", "demo")
            .await
            .expect_err("connection refused");

        assert_eq!(err.kind(), FailureKind::Transport);
        assert!(matches!(
            err,
            SyncRepoIssuesError::FetchRepoIssues { source: FetchRepoIssuesError::RequestSend { .. } }
        ));
        assert_eq!(table.resets, 0);
        assert_eq!(observer.requests(), vec!["GitError"]);
        assert!(observer.sizes().is_empty());
    }

    #[tokio::test]
    async fn error_status_is_reported_with_body_excerpt() {
        let base = serve_stub(stub_with(
            AxumStatus::FORBIDDEN,
            r#"{"message":"API rate limit exceeded"}"#,
        ))
        .await;
        let observer = RecordingObserver::default();
        let mut table = MemoryTable::<NewGitIssue>::default();

        let err = sync_repo_issues(&Client::new(), &base, &observer, &mut table, "acme", "demo")
            .await
            .expect_err("forbidden");

        assert_eq!(err.kind(), FailureKind::Status);
        assert!(err.to_string().contains("rate limit"));
        assert_eq!(table.resets, 0);
        assert_eq!(observer.requests(), vec!["GitError"]);
    }

    #[tokio::test]
    async fn insert_failure_is_a_storage_error() {
        let base = serve_stub(stub_with(AxumStatus::OK, TWO_ISSUES)).await;
        let observer = RecordingObserver::default();
        let mut table = MemoryTable {
            fail_insert_at: Some(1),
            ..MemoryTable::<NewGitIssue>::default()
        };

        let err = sync_repo_issues(&Client::new(), &base, &observer, &mut table, "acme", "demo")
            .await
            .expect_err("second insert fails");

        assert_eq!(err.kind(), FailureKind::Storage);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn row_mapping_attaches_repo_and_truncates_to_column_width() {
        let issue = GitHubIssue {
            title: "t".repeat(300),
            state: "open".to_owned(),
            created_at: "2024-01-01T00:00:00Z".to_owned(),
            body: Some("b".repeat(5000)),
            id: 42,
        };

        let mapped = issue_row(&issue, "compose");

        assert_eq!(mapped.repo, "compose");
        assert_eq!(mapped.title.len(), VARCHAR_WIDTH);
        assert_eq!(mapped.body.map(|body| body.len()), Some(BODY_WIDTH));
        assert_eq!(mapped.issue_id, 42);
        assert_eq!(mapped.created_at, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn row_mapping_keeps_missing_body_null() {
        let issue = GitHubIssue {
            title: "A".to_owned(),
            state: "open".to_owned(),
            created_at: "2024-01-01T00:00:00Z".to_owned(),
            body: None,
            id: 1,
        };

        assert_eq!(issue_rows("demo", &[issue])[0].body, None);
    }
}
