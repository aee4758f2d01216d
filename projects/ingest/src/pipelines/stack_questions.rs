use chrono::DateTime;
use chrono_tz::America::Chicago;
use interfaces_stackexchange_search::index::{
    fetch_search, parse_search, FetchSearchError, SearchItem, StackExchangeSearchResult,
};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{stack_question::models::NewStackQuestion, truncate_chars, RowStore, TableError, VARCHAR_WIDTH};
use crate::metrics::{ApiObserver, ApiSource};
use crate::pipelines::{excerpt, observe_fetch, FailureKind, PipelineFailure};

/// Local time plus a `±HH:MM:SS` offset, e.g. `2023-11-14T16:13:20 -06:00:00`.
pub const CREATION_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S %::z";

#[derive(Debug, Error)]
pub enum SyncSearchQuestionsError {
    #[error("FetchSearch: {source}")]
    FetchSearch {
        #[from]
        source: FetchSearchError,
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

    #[error("InvalidCreationDate: question {question_id} has creation_date {creation_date}")]
    InvalidCreationDate {
        question_id: i64,
        creation_date: i64,
    },

    #[error("Persist: {source}")]
    Persist {
        #[from]
        source: TableError,
    },
}

impl PipelineFailure for SyncSearchQuestionsError {
    fn kind(&self) -> FailureKind {
        match self {
            SyncSearchQuestionsError::FetchSearch { .. } => FailureKind::Transport,
            SyncSearchQuestionsError::UnexpectedStatus { .. } => FailureKind::Status,
            SyncSearchQuestionsError::DeserializeResponseBody { .. } => FailureKind::Decode,
            SyncSearchQuestionsError::InvalidCreationDate { .. } => FailureKind::Mapping,
            SyncSearchQuestionsError::Persist { .. } => FailureKind::Storage,
        }
    }
}

/// Replaces the contents of `table` with the first page of questions whose
/// title contains `term`. Returns the number of rows written.
pub async fn sync_search_questions<T>(
    client: &Client,
    api_base: &str,
    observer: &dyn ApiObserver,
    table: &mut T,
    term: &str,
) -> Result<usize, SyncSearchQuestionsError>
where
    T: RowStore<NewStackQuestion> + ?Sized,
{
    let (status, body) = observe_fetch(observer, ApiSource::Stackoverflow, async {
        fetch_search(client, api_base, term)
            .await
            .map(|StackExchangeSearchResult { body, status }| (status, body))
    })
    .await?;

    if !status.is_success() {
        return Err(SyncSearchQuestionsError::UnexpectedStatus {
            status,
            body: excerpt(&body),
        });
    }

    let response = parse_search(&body)
        .map_err(|source| SyncSearchQuestionsError::DeserializeResponseBody { source })?;

    if response.has_more {
        warn!(term, fetched = response.items.len(), "more results available; only the first page is stored");
    }

    let written = persist_questions(table, term, &response.items).await?;

    info!(term, rows = written, quota_remaining = ?response.quota_remaining, "questions fetched and stored");
    Ok(written)
}

/// Replaces the table with one row per item, tagged with `term`.
pub async fn persist_questions<T>(
    table: &mut T,
    term: &str,
    items: &[SearchItem],
) -> Result<usize, SyncSearchQuestionsError>
where
    T: RowStore<NewStackQuestion> + ?Sized,
{
    let rows = question_rows(term, items)?;
    Ok(table.replace(rows).await?)
}

/// Maps every item before anything is written, so a bad date leaves the table untouched.
pub fn question_rows(
    term: &str,
    items: &[SearchItem],
) -> Result<Vec<NewStackQuestion>, SyncSearchQuestionsError> {
    items.iter().map(|item| question_row(item, term)).collect()
}

pub fn question_row(item: &SearchItem, term: &str) -> Result<NewStackQuestion, SyncSearchQuestionsError> {
    let creation_date = format_creation_date(item.creation_date).ok_or(
        SyncSearchQuestionsError::InvalidCreationDate {
            question_id: item.question_id,
            creation_date: item.creation_date,
        },
    )?;

    Ok(NewStackQuestion {
        question: truncate_chars(&item.title, VARCHAR_WIDTH),
        answer: item.is_answered,
        display_name: item
            .owner
            .display_name
            .as_deref()
            .map(|name| truncate_chars(name, VARCHAR_WIDTH)),
        account_id: item.owner.account_id,
        user_id: item.owner.user_id,
        question_id: item.question_id,
        creation_date,
        query: truncate_chars(term, VARCHAR_WIDTH),
    })
}

/// Unix epoch seconds rendered in America/Chicago, DST-aware.
pub fn format_creation_date(epoch_secs: i64) -> Option<String> {
    let utc = DateTime::from_timestamp(epoch_secs, 0)?;
    Some(utc.with_timezone(&Chicago).format(CREATION_DATE_FORMAT).to_string())
}
