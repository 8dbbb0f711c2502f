//! Settings database connection pool and initialization.

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::{DbError, DbResult},
    sqlite_runtime::create_file_pool,
};

/// Guild settings database pool wrapper
#[derive(Debug, Clone)]
pub struct SettingsDbPool {
    pool: SqlitePool,
    path: PathBuf,
}

impl SettingsDbPool {
    /// Open the database at the default location and run migrations.
    pub async fn new() -> DbResult<Self> {
        Self::open(Self::db_path()?).await
    }

    /// Open the database at `db_path`, creating it and its parent
    /// directory if needed, then run migrations.
    pub async fn open(db_path: PathBuf) -> DbResult<Self> {
        info!("Initializing settings database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = create_file_pool(&db_path, 5).await?;

        Self::run_migrations(&pool).await?;

        info!("Settings database initialized successfully");
        Ok(Self {
            pool,
            path: db_path,
        })
    }

    /// Get the inner SQLx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Location of the database file; `:memory:` for in-memory pools
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default database file path
    pub fn db_path() -> DbResult<PathBuf> {
        let data_dir = dirs::data_dir().ok_or(DbError::NoConfigDir)?;
        Ok(data_dir.join("uvocbot").join("settings.sqlite3"))
    }

    async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        info!("Settings database migrations completed");
        Ok(())
    }

    /// Close the pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create a SettingsDbPool from an existing SqlitePool (for testing)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            path: PathBuf::from(":memory:"),
        }
    }
}
