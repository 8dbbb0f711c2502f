//! Welcome messages sent when a member joins a guild.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::{DbError, DbResult},
    ids::{from_db, opt_from_db, opt_to_db, to_db},
};

/// Placeholder replaced with the new member's mention.
pub const NAME_PLACEHOLDER: &str = "<name>";

/// Welcome message configuration for a guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    #[serde(default)]
    pub guild_id: u64,
    #[serde(default)]
    pub is_enabled: bool,
    pub channel_id: Option<u64>,
    #[serde(default)]
    pub message: String,
    /// Roles granted to every new member
    #[serde(default)]
    pub default_role_ids: Vec<u64>,
    /// Roles the new member may pick instead, offered as buttons
    #[serde(default)]
    pub alternate_role_ids: Vec<u64>,
    #[serde(default)]
    pub alternate_roles_label: String,
}

impl WelcomeMessage {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            ..Default::default()
        }
    }

    /// Render the message for a member, given their mention string.
    pub fn render(&self, member_mention: &str) -> String {
        self.message.replace(NAME_PLACEHOLDER, member_mention)
    }

    /// Whether a join should produce a message at all
    pub fn is_sendable(&self) -> bool {
        self.is_enabled
            && self.channel_id.is_some_and(|id| id != 0)
            && !self.message.trim().is_empty()
    }
}

/// Welcome message repository for database operations
pub struct WelcomeMessageRepository;

impl WelcomeMessageRepository {
    /// Get the welcome message for a guild, or the defaults if none is stored
    pub async fn get(pool: &SqlitePool, guild_id: u64) -> DbResult<WelcomeMessage> {
        let row = sqlx::query_as::<_, WelcomeMessageRow>(
            "SELECT guild_id, is_enabled, channel_id, message, default_role_ids,
                    alternate_role_ids, alternate_roles_label
             FROM guild_welcome_messages
             WHERE guild_id = ?",
        )
        .bind(to_db(guild_id))
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Ok(WelcomeMessage::new(guild_id)),
        }
    }

    /// Insert or replace the welcome message for `welcome.guild_id`
    pub async fn upsert(pool: &SqlitePool, welcome: &WelcomeMessage) -> DbResult<WelcomeMessage> {
        let default_roles = encode_ids(&welcome.default_role_ids)?;
        let alternate_roles = encode_ids(&welcome.alternate_role_ids)?;
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO guild_welcome_messages
               (guild_id, is_enabled, channel_id, message, default_role_ids,
                alternate_role_ids, alternate_roles_label, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET
               is_enabled = excluded.is_enabled,
               channel_id = excluded.channel_id,
               message = excluded.message,
               default_role_ids = excluded.default_role_ids,
               alternate_role_ids = excluded.alternate_role_ids,
               alternate_roles_label = excluded.alternate_roles_label,
               updated_at = excluded.updated_at",
        )
        .bind(to_db(welcome.guild_id))
        .bind(welcome.is_enabled)
        .bind(opt_to_db(welcome.channel_id))
        .bind(&welcome.message)
        .bind(default_roles)
        .bind(alternate_roles)
        .bind(&welcome.alternate_roles_label)
        .bind(now)
        .execute(pool)
        .await?;

        info!("Updated welcome message for guild {}", welcome.guild_id);
        Ok(welcome.clone())
    }

    /// Remove the stored welcome message. Returns whether a row existed.
    pub async fn delete(pool: &SqlitePool, guild_id: u64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM guild_welcome_messages WHERE guild_id = ?")
            .bind(to_db(guild_id))
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn encode_ids(ids: &[u64]) -> DbResult<String> {
    serde_json::to_string(ids).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode_ids(raw: &str) -> DbResult<Vec<u64>> {
    serde_json::from_str(raw).map_err(|e| DbError::Serialization(e.to_string()))
}

#[derive(Debug, sqlx::FromRow)]
struct WelcomeMessageRow {
    guild_id: i64,
    is_enabled: i64,
    channel_id: Option<i64>,
    message: String,
    default_role_ids: String,
    alternate_role_ids: String,
    alternate_roles_label: String,
}

impl TryFrom<WelcomeMessageRow> for WelcomeMessage {
    type Error = DbError;

    fn try_from(row: WelcomeMessageRow) -> Result<Self, Self::Error> {
        Ok(WelcomeMessage {
            guild_id: from_db(row.guild_id),
            is_enabled: row.is_enabled != 0,
            channel_id: opt_from_db(row.channel_id),
            message: row.message,
            default_role_ids: decode_ids(&row.default_role_ids)?,
            alternate_role_ids: decode_ids(&row.alternate_role_ids)?,
            alternate_roles_label: row.alternate_roles_label,
        })
    }
}
