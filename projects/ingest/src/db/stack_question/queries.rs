use diesel::prelude::*;
use crate::db::{schema::stack_issues, stack_question::models::NewStackQuestion, ReplaceTable, TableError};

const DROP_STACK_ISSUES: &str = "DROP TABLE IF EXISTS stack_issues";

const CREATE_STACK_ISSUES: &str = r#"CREATE TABLE IF NOT EXISTS "stack_issues" (
    "id" SERIAL,
    "question" VARCHAR(255) NOT NULL,
    "answer" BOOL NOT NULL,
    "display_name" VARCHAR(255),
    "account_id" BIGINT,
    "user_id" BIGINT,
    "question_id" BIGINT NOT NULL,
    "creation_date" VARCHAR(255) NOT NULL,
    "query" VARCHAR(255) NOT NULL,
    PRIMARY KEY ("id")
)"#;

pub fn reset_stack_issues_table(conn: &mut PgConnection) -> Result<(), TableError> {
    diesel::sql_query(DROP_STACK_ISSUES)
        .execute(conn)
        .map_err(|source| TableError::Reset { source })?;

    diesel::sql_query(CREATE_STACK_ISSUES)
        .execute(conn)
        .map_err(|source| TableError::Reset { source })?;

    Ok(())
}

pub fn insert_stack_question(
    conn: &mut PgConnection,
    new: &NewStackQuestion,
) -> Result<usize, TableError> {
    diesel::insert_into(stack_issues::table)
        .values(new)
        .execute(conn)
        .map_err(|source| TableError::Insert { source })
}

impl ReplaceTable<NewStackQuestion> for PgConnection {
    fn reset(&mut self) -> Result<(), TableError> {
        reset_stack_issues_table(self)
    }

    fn insert(&mut self, row: &NewStackQuestion) -> Result<(), TableError> {
        insert_stack_question(self, row).map(|_| ())
    }
}
