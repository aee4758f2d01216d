use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.stackexchange.com/2.3";

pub struct StackExchangeSearchResult {
    pub body: String,
    pub status: StatusCode,
}

/// Title search on stackoverflow, most recently active first.
pub fn search_url(api_base: &str, term: &str) -> Result<Url, url::ParseError> {
    Url::parse_with_params(
        &format!("{}/search", api_base.trim_end_matches('/')),
        &[
            ("order", "desc"),
            ("sort", "activity"),
            ("intitle", term),
            ("site", "stackoverflow"),
        ],
    )
}

pub async fn fetch_search(
    client: &Client,
    api_base: &str,
    term: &str,
) -> Result<StackExchangeSearchResult, FetchSearchError> {
    let url = search_url(api_base, term).map_err(|source| FetchSearchError::InvalidUrl { source })?;

    // The API always answers gzip-compressed; reqwest decodes it with the `gzip` feature.
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchSearchError::RequestSend { source })?;

    let status = response.status();

    let body = response
        .text()
        .await
        .map_err(|source| FetchSearchError::ResponseRead { source })?;

    Ok(StackExchangeSearchResult { body, status })
}

#[derive(Debug, Error)]
pub enum FetchSearchError {
    #[error("InvalidUrl: {source}")]
    InvalidUrl {
        source: url::ParseError,
    },

    #[error("RequestSend: {source}")]
    RequestSend {
        source: reqwest::Error,
    },

    #[error("ResponseRead: {source}")]
    ResponseRead {
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResponse {
    pub items: Vec<SearchItem>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub quota_remaining: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchItem {
    pub title: String,
    #[serde(default)]
    pub is_answered: bool,
    #[serde(default)]
    pub owner: Owner,
    pub question_id: i64,
    /// Unix epoch seconds.
    pub creation_date: i64,
}

/// Deleted accounts come back with `user_type: "does_not_exist"` and no ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

pub fn parse_search(body: &str) -> Result<SearchResponse, serde_json::Error> {
    serde_json::from_str(body)
}
