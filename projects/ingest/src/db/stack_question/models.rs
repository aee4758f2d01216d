use diesel::prelude::*;
use crate::db::schema::stack_issues;

/// One `stack_issues` row; `query` is the search term that found the question.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = stack_issues)]
pub struct NewStackQuestion {
    pub question: String,
    pub answer: bool,
    pub display_name: Option<String>,
    pub account_id: Option<i64>,
    pub user_id: Option<i64>,
    pub question_id: i64,
    pub creation_date: String,
    pub query: String,
}
