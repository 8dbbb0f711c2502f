//! Test helpers for the settings database.

use crate::{
    error::{DbError, DbResult},
    settings_db::SettingsDbPool,
    sqlite_runtime::create_in_memory_pool,
};

/// Create an in-memory settings database for testing
pub async fn create_test_settings_pool() -> DbResult<SettingsDbPool> {
    // A single connection keeps every query on the same in-memory database.
    let pool = create_in_memory_pool(1).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?;

    Ok(SettingsDbPool::from_pool(pool))
}
