use diesel::prelude::*;
use crate::db::{git_issue::models::NewGitIssue, schema::git_issues, ReplaceTable, TableError};

const DROP_GIT_ISSUES: &str = "DROP TABLE IF EXISTS git_issues";

const CREATE_GIT_ISSUES: &str = r#"CREATE TABLE IF NOT EXISTS "git_issues" (
    "id" SERIAL,
    "title" VARCHAR(255) NOT NULL,
    "state" VARCHAR(255) NOT NULL,
    "created_at" VARCHAR(255) NOT NULL,
    "repo" VARCHAR(255) NOT NULL,
    "body" VARCHAR(2048),
    "issue_id" BIGINT NOT NULL,
    PRIMARY KEY ("id")
)"#;

pub fn reset_git_issues_table(conn: &mut PgConnection) -> Result<(), TableError> {
    diesel::sql_query(DROP_GIT_ISSUES)
        .execute(conn)
        .map_err(|source| TableError::Reset { source })?;

    diesel::sql_query(CREATE_GIT_ISSUES)
        .execute(conn)
        .map_err(|source| TableError::Reset { source })?;

    Ok(())
}

pub fn insert_git_issue(
    conn: &mut PgConnection,
    new: &NewGitIssue,
) -> Result<usize, TableError> {
    diesel::insert_into(git_issues::table)
        .values(new)
        .execute(conn)
        .map_err(|source| TableError::Insert { source })
}

impl ReplaceTable<NewGitIssue> for PgConnection {
    fn reset(&mut self) -> Result<(), TableError> {
        reset_git_issues_table(self)
    }

    fn insert(&mut self, row: &NewGitIssue) -> Result<(), TableError> {
        insert_git_issue(self, row).map(|_| ())
    }
}
