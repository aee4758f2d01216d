use diesel::prelude::*;
use crate::db::schema::git_issues;

/// One `git_issues` row; `repo` comes from the caller, not the API payload.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = git_issues)]
pub struct NewGitIssue {
    pub title: String,
    pub state: String,
    pub created_at: String,
    pub repo: String,
    pub body: Option<String>,
    pub issue_id: i64,
}
