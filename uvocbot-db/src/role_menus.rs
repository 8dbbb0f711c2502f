//! Self-assignable role menus.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::{DbError, DbResult},
    ids::{from_db, opt_from_db, to_db},
};

/// Discord allows five rows of five buttons per message.
pub const MAX_MENU_ROLES: usize = 25;

/// One toggle button on a role menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMenuRole {
    pub role_id: u64,
    pub label: String,
    pub emoji: Option<String>,
}

/// A message of role buttons members click to add or remove roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMenu {
    pub id: i64,
    pub guild_id: u64,
    pub channel_id: u64,
    /// Set once the menu has been posted
    pub message_id: Option<u64>,
    pub author_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub roles: Vec<RoleMenuRole>,
    pub created_at: i64,
}

impl RoleMenu {
    pub fn find_role(&self, role_id: u64) -> Option<&RoleMenuRole> {
        self.roles.iter().find(|r| r.role_id == role_id)
    }
}

/// Fields supplied when creating a role menu
#[derive(Debug, Clone)]
pub struct NewRoleMenu {
    pub guild_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub title: String,
    pub description: Option<String>,
}

/// Role menu repository for database operations
pub struct RoleMenuRepository;

impl RoleMenuRepository {
    /// Create an empty menu
    pub async fn create(pool: &SqlitePool, menu: &NewRoleMenu) -> DbResult<RoleMenu> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO role_menus (guild_id, channel_id, author_id, title, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(to_db(menu.guild_id))
        .bind(to_db(menu.channel_id))
        .bind(to_db(menu.author_id))
        .bind(&menu.title)
        .bind(&menu.description)
        .bind(now)
        .execute(pool)
        .await?;

        let id = result.last_insert_rowid();
        info!("Created role menu {} in guild {}", id, menu.guild_id);

        Self::get(pool, id).await?.ok_or(DbError::RoleMenuNotFound(id))
    }

    /// Get a menu with its roles
    pub async fn get(pool: &SqlitePool, id: i64) -> DbResult<Option<RoleMenu>> {
        let row = sqlx::query_as::<_, RoleMenuRow>(
            "SELECT id, guild_id, channel_id, message_id, author_id, title, description, created_at
             FROM role_menus
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => {
                let roles = Self::load_roles(pool, row.id).await?;
                Ok(Some(row.into_menu(roles)))
            }
            None => Ok(None),
        }
    }

    /// Get a menu only if it belongs to `guild_id`
    pub async fn get_in_guild(pool: &SqlitePool, guild_id: u64, id: i64) -> DbResult<Option<RoleMenu>> {
        Ok(Self::get(pool, id)
            .await?
            .filter(|menu| menu.guild_id == guild_id))
    }

    /// List menus of a guild, oldest first
    pub async fn list_for_guild(pool: &SqlitePool, guild_id: u64) -> DbResult<Vec<RoleMenu>> {
        let rows = sqlx::query_as::<_, RoleMenuRow>(
            "SELECT id, guild_id, channel_id, message_id, author_id, title, description, created_at
             FROM role_menus
             WHERE guild_id = ?
             ORDER BY id",
        )
        .bind(to_db(guild_id))
        .fetch_all(pool)
        .await?;

        let mut menus = Vec::with_capacity(rows.len());
        for row in rows {
            let roles = Self::load_roles(pool, row.id).await?;
            menus.push(row.into_menu(roles));
        }
        Ok(menus)
    }

    /// Append a role button to a menu
    pub async fn add_role(pool: &SqlitePool, menu_id: i64, role: &RoleMenuRole) -> DbResult<RoleMenu> {
        let menu = Self::get(pool, menu_id)
            .await?
            .ok_or(DbError::RoleMenuNotFound(menu_id))?;

        if menu.find_role(role.role_id).is_some() {
            return Err(DbError::DuplicateMenuRole {
                menu_id,
                role_id: role.role_id,
            });
        }
        if menu.roles.len() >= MAX_MENU_ROLES {
            return Err(DbError::RoleMenuFull(menu_id));
        }

        sqlx::query(
            "INSERT INTO role_menu_roles (menu_id, role_id, label, emoji, position)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(menu_id)
        .bind(to_db(role.role_id))
        .bind(&role.label)
        .bind(&role.emoji)
        .bind(menu.roles.len() as i64)
        .execute(pool)
        .await?;

        Self::get(pool, menu_id)
            .await?
            .ok_or(DbError::RoleMenuNotFound(menu_id))
    }

    /// Remove a role button. Returns false if the menu did not offer it.
    pub async fn remove_role(pool: &SqlitePool, menu_id: i64, role_id: u64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM role_menu_roles WHERE menu_id = ? AND role_id = ?")
            .bind(menu_id)
            .bind(to_db(role_id))
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the message the menu was posted as
    pub async fn set_message_id(pool: &SqlitePool, menu_id: i64, message_id: u64) -> DbResult<()> {
        let result = sqlx::query("UPDATE role_menus SET message_id = ? WHERE id = ?")
            .bind(to_db(message_id))
            .bind(menu_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::RoleMenuNotFound(menu_id));
        }
        Ok(())
    }

    /// Delete a menu and its roles. Returns whether it existed.
    pub async fn delete(pool: &SqlitePool, menu_id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM role_menus WHERE id = ?")
            .bind(menu_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_roles(pool: &SqlitePool, menu_id: i64) -> DbResult<Vec<RoleMenuRole>> {
        let rows = sqlx::query_as::<_, RoleMenuRoleRow>(
            "SELECT role_id, label, emoji
             FROM role_menu_roles
             WHERE menu_id = ?
             ORDER BY position, role_id",
        )
        .bind(menu_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(RoleMenuRole::from).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RoleMenuRow {
    id: i64,
    guild_id: i64,
    channel_id: i64,
    message_id: Option<i64>,
    author_id: i64,
    title: String,
    description: Option<String>,
    created_at: i64,
}

impl RoleMenuRow {
    fn into_menu(self, roles: Vec<RoleMenuRole>) -> RoleMenu {
        RoleMenu {
            id: self.id,
            guild_id: from_db(self.guild_id),
            channel_id: from_db(self.channel_id),
            message_id: opt_from_db(self.message_id),
            author_id: from_db(self.author_id),
            title: self.title,
            description: self.description,
            roles,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RoleMenuRoleRow {
    role_id: i64,
    label: String,
    emoji: Option<String>,
}

impl From<RoleMenuRoleRow> for RoleMenuRole {
    fn from(row: RoleMenuRoleRow) -> Self {
        RoleMenuRole {
            role_id: from_db(row.role_id),
            label: row.label,
            emoji: row.emoji,
        }
    }
}
