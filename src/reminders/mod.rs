use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::RunQueryDsl;
use serde::Serialize;

use crate::db::{self, storage_err, SqliteAsyncConn, SqlitePool};
use crate::error::{ReminderBotError, Result};

mod schema;
use schema::reminders;

type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

/// Storage format of the `datetime` column.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub id: i64,
    pub user_id: i64,
    pub scheduled_at: NaiveDateTime,
    pub text: String,
    pub sent: bool,
}

#[derive(Queryable)]
struct ReminderRow {
    id: i64,
    user_id: Option<i64>,
    scheduled_at: Option<String>,
    body: Option<String>,
    sent: Option<bool>,
}

#[derive(Insertable)]
#[diesel(table_name = reminders)]
struct NewReminder<'a> {
    user_id: i64,
    scheduled_at: String,
    body: &'a str,
    sent: bool,
}

pub fn format_scheduled_at(value: &NaiveDateTime) -> String {
    value.format(CANONICAL_FORMAT).to_string()
}

pub fn parse_scheduled_at(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), CANONICAL_FORMAT)
        .map_err(|e| ReminderBotError::Storage(format!("bad datetime {raw:?}: {e}")))
}

/// Durable reminder table shared by request handlers and the delivery loop.
pub struct ReminderStore {
    pool: SqlitePool,
}

impl ReminderStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        db::ensure_parent_dir(sqlite_path)?;
        db::run_migrations(sqlite_path).await?;
        let pool = db::build_pool(sqlite_path).await?;
        Ok(Self { pool })
    }

    pub async fn create(
        &self,
        user_id: i64,
        scheduled_at: NaiveDateTime,
        text: &str,
    ) -> Result<Reminder> {
        let mut conn = self.conn().await?;
        let new = NewReminder {
            user_id,
            scheduled_at: format_scheduled_at(&scheduled_at),
            body: text,
            sent: false,
        };

        diesel::insert_into(reminders::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;

        let id: i64 = diesel::select(diesel::dsl::sql::<BigInt>("last_insert_rowid()"))
            .get_result(&mut conn)
            .await
            .map_err(storage_err)?;

        let row: ReminderRow = reminders::table
            .filter(reminders::id.eq(id))
            .first(&mut conn)
            .await
            .map_err(storage_err)?;
        map_row(row)
    }

    pub async fn get(&self, id: i64, user_id: i64) -> Result<Option<Reminder>> {
        let mut conn = self.conn().await?;
        let row: Option<ReminderRow> = reminders::table
            .filter(reminders::id.eq(id))
            .filter(reminders::user_id.eq(user_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(storage_err)?;
        row.map(map_row).transpose()
    }

    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Reminder>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ReminderRow> = reminders::table
            .filter(reminders::user_id.eq(user_id))
            .order((reminders::scheduled_at.asc(), reminders::id.asc()))
            .load(&mut conn)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(map_row).collect()
    }

    /// Removes the reminder only when `user_id` owns it.
    pub async fn delete_by_id(&self, id: i64, user_id: i64) -> Result<bool> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(
            reminders::table
                .filter(reminders::id.eq(id))
                .filter(reminders::user_id.eq(user_id)),
        )
        .execute(&mut conn)
        .await
        .map_err(storage_err)?;
        Ok(deleted > 0)
    }

    pub async fn delete_all_by_user(&self, user_id: i64) -> Result<usize> {
        let mut conn = self.conn().await?;
        diesel::delete(reminders::table.filter(reminders::user_id.eq(user_id)))
            .execute(&mut conn)
            .await
            .map_err(storage_err)
    }

    /// Unsent reminders scheduled at or before `as_of`, oldest first. Rows
    /// that cannot be read are logged and left out so the rest still go out.
    pub async fn find_due(&self, as_of: NaiveDateTime) -> Result<Vec<Reminder>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ReminderRow> = reminders::table
            .filter(reminders::scheduled_at.le(format_scheduled_at(&as_of)))
            .filter(reminders::sent.eq(false))
            .order((reminders::scheduled_at.asc(), reminders::id.asc()))
            .load(&mut conn)
            .await
            .map_err(storage_err)?;

        let mut due = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match map_row(row) {
                Ok(reminder) => due.push(reminder),
                Err(err) => {
                    tracing::warn!(reminder_id = id, error = %err, "Skipping unreadable reminder row");
                }
            }
        }
        Ok(due)
    }

    /// Returns whether this call flipped the flag. Already-sent and deleted
    /// reminders are left alone.
    pub async fn mark_sent(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            reminders::table
                .filter(reminders::id.eq(id))
                .filter(reminders::sent.eq(false)),
        )
        .set(reminders::sent.eq(true))
        .execute(&mut conn)
        .await
        .map_err(storage_err)?;
        Ok(updated > 0)
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        db::configure_connection(&mut conn).await?;
        Ok(conn)
    }
}

fn map_row(row: ReminderRow) -> Result<Reminder> {
    let user_id = row
        .user_id
        .ok_or_else(|| ReminderBotError::Storage(format!("reminder {} has no user_id", row.id)))?;
    let raw = row
        .scheduled_at
        .ok_or_else(|| ReminderBotError::Storage(format!("reminder {} has no datetime", row.id)))?;
    Ok(Reminder {
        id: row.id,
        user_id,
        scheduled_at: parse_scheduled_at(&raw)?,
        text: row.body.unwrap_or_default(),
        sent: row.sent.unwrap_or(false),
    })
}
