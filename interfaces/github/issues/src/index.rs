use reqwest::{Client, StatusCode};
use serde::{de, Deserialize, Deserializer};
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

pub struct GitHubIssuesResult {
    pub body: String,
    pub status: StatusCode,
}

/// Issues endpoint for one repository, all states, first page only.
pub fn repo_issues_url(api_base: &str, owner: &str, repo: &str) -> String {
    format!(
        "{}/repos/{owner}/{repo}/issues?state=all",
        api_base.trim_end_matches('/')
    )
}

pub async fn fetch_repo_issues(
    client: &Client,
    api_base: &str,
    owner: &str,
    repo: &str,
) -> Result<GitHubIssuesResult, FetchRepoIssuesError> {
    let response = client
        .get(repo_issues_url(api_base, owner, repo))
        .header("Accept", "application/vnd.github+json")
        .send()
        .await
        .map_err(|source| FetchRepoIssuesError::RequestSend { source })?;

    let status = response.status();

    let body = response
        .text()
        .await
        .map_err(|source| FetchRepoIssuesError::ResponseRead { source })?;

    Ok(GitHubIssuesResult { body, status })
}

#[derive(Debug, Error)]
pub enum FetchRepoIssuesError {
    #[error("RequestSend: {source}")]
    RequestSend {
        source: reqwest::Error,
    },

    #[error("ResponseRead: {source}")]
    ResponseRead {
        source: reqwest::Error,
    },
}

/// The subset of a GitHub issue object that gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubIssue {
    pub title: String,
    pub state: String,
    pub created_at: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(deserialize_with = "numeric_id")]
    pub id: i64,
}

pub fn parse_issues(body: &str) -> Result<Vec<GitHubIssue>, serde_json::Error> {
    serde_json::from_str(body)
}

// The REST API sends ids as numbers; older fixtures and proxies send them quoted.
fn numeric_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .parse()
            .map_err(|_| de::Error::custom(format!("issue id {text:?} is not numeric"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_requests_every_state() {
        assert_eq!(
            repo_issues_url(DEFAULT_API_BASE, "golang", "go"),
            "https://api.github.com/repos/golang/go/issues?state=all"
        );
        assert_eq!(
            repo_issues_url("http://127.0.0.1:9000/", "docker", "compose"),
            "http://127.0.0.1:9000/repos/docker/compose/issues?state=all"
        );
    }

    #[test]
    fn parses_numeric_and_quoted_ids() {
        let body = r#"[
            {"title":"A","state":"open","created_at":"2024-01-01T00:00:00Z","body":"x","id":"1"},
            {"title":"B","state":"closed","created_at":"2024-02-01T00:00:00Z","body":"y","id":2233445566,"labels":[]}
        ]"#;

        let issues = parse_issues(body).expect("payload should decode");

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].id, 1);
        assert_eq!(issues[0].title, "A");
        assert_eq!(issues[0].body.as_deref(), Some("x"));
        assert_eq!(issues[1].id, 2_233_445_566);
        assert_eq!(issues[1].state, "closed");
    }

    #[test]
    fn null_or_missing_body_is_none() {
        let body = r#"[
            {"title":"A","state":"open","created_at":"2024-01-01T00:00:00Z","body":null,"id":1},
            {"title":"B","state":"open","created_at":"2024-01-01T00:00:00Z","id":2}
        ]"#;

        let issues = parse_issues(body).expect("payload should decode");

        assert!(issues.iter().all(|issue| issue.body.is_none()));
    }

    #[test]
    fn rejects_non_array_payloads() {
        assert!(parse_issues(r#"{"message":"Not Found"}"#).is_err());
        assert!(parse_issues("<html>rate limited</html>").is_err());
    }

    #[test]
    fn rejects_non_numeric_id() {
        let body = r#"[{"title":"A","state":"open","created_at":"2024-01-01T00:00:00Z","id":"abc"}]"#;

        let err = parse_issues(body).expect_err("id must be numeric");

        assert!(err.to_string().contains("not numeric"));
    }
}
