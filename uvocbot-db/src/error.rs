//! Database error types.

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// SQL error from sqlx
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Role menu not found
    #[error("Role menu not found: {0}")]
    RoleMenuNotFound(i64),

    /// A role menu already offers this role
    #[error("Role {role_id} is already on role menu {menu_id}")]
    DuplicateMenuRole { menu_id: i64, role_id: u64 },

    /// A role menu has no room for another button
    #[error("Role menu {0} already has the maximum number of roles")]
    RoleMenuFull(i64),

    /// Stored JSON column could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Config directory not found
    #[error("Config/data directory not found")]
    NoConfigDir,

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for database operations
pub type DbResult<T> = Result<T, DbError>;
