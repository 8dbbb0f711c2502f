//! Shared SQLite bootstrap helpers for DB pools.

use std::path::Path;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::error::DbResult;

pub(crate) async fn create_file_pool(db_path: &Path, max_connections: u32) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = create_pool(options, max_connections).await?;
    apply_file_pragmas(&pool).await?;
    Ok(pool)
}

#[cfg(any(test, feature = "test-helpers"))]
pub(crate) async fn create_in_memory_pool(max_connections: u32) -> DbResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .foreign_keys(true);

    create_pool(options, max_connections).await
}

async fn create_pool(options: SqliteConnectOptions, max_connections: u32) -> DbResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn apply_file_pragmas(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(pool)
        .await?;

    Ok(())
}
