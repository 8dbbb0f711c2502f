//! Twitter relay settings.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::DbResult,
    ids::{from_db, opt_from_db, opt_to_db, to_db},
};

/// Where and whether tweets from followed accounts are relayed in a guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterSettings {
    #[serde(default)]
    pub guild_id: u64,
    pub relay_channel_id: Option<u64>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub twitter_user_ids: BTreeSet<u64>,
}

impl TwitterSettings {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            ..Default::default()
        }
    }
}

/// Twitter settings repository for database operations
pub struct TwitterSettingsRepository;

impl TwitterSettingsRepository {
    /// Get settings for a guild, or the defaults if none are stored
    pub async fn get(pool: &SqlitePool, guild_id: u64) -> DbResult<TwitterSettings> {
        let row = sqlx::query_as::<_, TwitterSettingsRow>(
            "SELECT guild_id, relay_channel_id, is_enabled
             FROM guild_twitter_settings
             WHERE guild_id = ?",
        )
        .bind(to_db(guild_id))
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else {
            return Ok(TwitterSettings::new(guild_id));
        };

        let users: Vec<(i64,)> = sqlx::query_as(
            "SELECT twitter_user_id FROM guild_twitter_users WHERE guild_id = ?",
        )
        .bind(to_db(guild_id))
        .fetch_all(pool)
        .await?;

        let mut settings = TwitterSettings::from(row);
        settings.twitter_user_ids = users.into_iter().map(|(id,)| from_db(id)).collect();
        Ok(settings)
    }

    /// Insert or replace the settings for `settings.guild_id`, including the
    /// followed account set
    pub async fn upsert(pool: &SqlitePool, settings: &TwitterSettings) -> DbResult<TwitterSettings> {
        let guild_id = to_db(settings.guild_id);
        let now = Utc::now().timestamp();

        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO guild_twitter_settings (guild_id, relay_channel_id, is_enabled, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET
               relay_channel_id = excluded.relay_channel_id,
               is_enabled = excluded.is_enabled,
               updated_at = excluded.updated_at",
        )
        .bind(guild_id)
        .bind(opt_to_db(settings.relay_channel_id))
        .bind(settings.is_enabled)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM guild_twitter_users WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&mut *tx)
            .await?;

        for user_id in &settings.twitter_user_ids {
            sqlx::query(
                "INSERT INTO guild_twitter_users (guild_id, twitter_user_id) VALUES (?, ?)",
            )
            .bind(guild_id)
            .bind(to_db(*user_id))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!("Updated twitter settings for guild {}", settings.guild_id);
        Ok(settings.clone())
    }

    /// Remove all stored settings for a guild. Returns whether a row existed.
    pub async fn delete(pool: &SqlitePool, guild_id: u64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM guild_twitter_settings WHERE guild_id = ?")
            .bind(to_db(guild_id))
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TwitterSettingsRow {
    guild_id: i64,
    relay_channel_id: Option<i64>,
    is_enabled: i64,
}

impl From<TwitterSettingsRow> for TwitterSettings {
    fn from(row: TwitterSettingsRow) -> Self {
        TwitterSettings {
            guild_id: from_db(row.guild_id),
            relay_channel_id: opt_from_db(row.relay_channel_id),
            is_enabled: row.is_enabled != 0,
            twitter_user_ids: BTreeSet::new(),
        }
    }
}
