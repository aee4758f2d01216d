// Recreated by `queries::reset_*`; their tests check the DDL against these tables.

diesel::table! {
    git_issues (id) {
        id -> Int4,
        #[max_length = 255]
        title -> Varchar,
        #[max_length = 255]
        state -> Varchar,
        #[max_length = 255]
        created_at -> Varchar,
        #[max_length = 255]
        repo -> Varchar,
        #[max_length = 2048]
        body -> Nullable<Varchar>,
        issue_id -> Int8,
    }
}

diesel::table! {
    stack_issues (id) {
        id -> Int4,
        #[max_length = 255]
        question -> Varchar,
        answer -> Bool,
        #[max_length = 255]
        display_name -> Nullable<Varchar>,
        account_id -> Nullable<Int8>,
        user_id -> Nullable<Int8>,
        question_id -> Int8,
        #[max_length = 255]
        creation_date -> Varchar,
        #[max_length = 255]
        query -> Varchar,
    }
}
