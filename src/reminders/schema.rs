diesel::table! {
    reminders (id) {
        id -> BigInt,
        user_id -> Nullable<BigInt>,
        #[sql_name = "datetime"]
        scheduled_at -> Nullable<Text>,
        #[sql_name = "text"]
        body -> Nullable<Text>,
        sent -> Nullable<Bool>,
    }
}
