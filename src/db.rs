use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{ReminderBotError, Result};

pub type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
pub type SqlitePool = Pool<SqliteAsyncConn>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
const BUSY_TIMEOUT_MS: u32 = 5000;

pub(crate) fn storage_err(err: impl std::fmt::Display) -> ReminderBotError {
    ReminderBotError::Storage(err.to_string())
}

pub fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }
    }
    Ok(())
}

pub fn open_connection_sync(database_url: &str) -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url).map_err(storage_err)?;
    conn.batch_execute(&format!(
        "PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}; PRAGMA journal_mode = WAL;"
    ))
    .map_err(storage_err)?;
    Ok(conn)
}

/// Applies pending migrations. Databases created by older releases already
/// hold the `reminders` table; the migration only adds what is missing.
pub async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = open_connection_sync(&database_url)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(storage_err)?;
        for version in applied {
            tracing::info!(migration = %version, "Applied database migration");
        }
        Ok::<_, ReminderBotError>(())
    })
    .await
    .map_err(|e| ReminderBotError::Runtime(e.to_string()))??;
    Ok(())
}

pub async fn build_pool(database_url: &str) -> Result<SqlitePool> {
    let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(database_url);
    Pool::builder().build(manager).await.map_err(storage_err)
}

pub async fn configure_connection(conn: &mut SqliteAsyncConn) -> Result<()> {
    diesel_async::RunQueryDsl::execute(
        diesel::sql_query(format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}")),
        conn,
    )
    .await
    .map_err(storage_err)?;
    Ok(())
}
