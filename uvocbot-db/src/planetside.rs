//! PlanetSide preferences and outfit tracking.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::DbResult,
    ids::{from_db, opt_from_db, opt_to_db, to_db},
};

/// PlanetSide preferences for a guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanetsideSettings {
    #[serde(default)]
    pub guild_id: u64,
    /// World used when a command omits the server option
    pub default_world_id: Option<u32>,
    /// Channel that receives base capture notifications
    pub base_capture_channel_id: Option<u64>,
    #[serde(default)]
    pub tracked_outfit_ids: BTreeSet<u64>,
}

impl PlanetsideSettings {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            ..Default::default()
        }
    }
}

/// A guild that wants to hear about captures by a given outfit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutfitSubscription {
    pub guild_id: u64,
    pub channel_id: u64,
}

/// PlanetSide settings repository for database operations
pub struct PlanetsideSettingsRepository;

impl PlanetsideSettingsRepository {
    /// Get settings for a guild, or the defaults if none are stored
    pub async fn get(pool: &SqlitePool, guild_id: u64) -> DbResult<PlanetsideSettings> {
        let row = sqlx::query_as::<_, PlanetsideSettingsRow>(
            "SELECT guild_id, default_world_id, base_capture_channel_id
             FROM planetside_settings
             WHERE guild_id = ?",
        )
        .bind(to_db(guild_id))
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else {
            return Ok(PlanetsideSettings::new(guild_id));
        };

        let outfits: Vec<(i64,)> = sqlx::query_as(
            "SELECT outfit_id FROM planetside_tracked_outfits WHERE guild_id = ?",
        )
        .bind(to_db(guild_id))
        .fetch_all(pool)
        .await?;

        let mut settings = PlanetsideSettings::from(row);
        settings.tracked_outfit_ids = outfits.into_iter().map(|(id,)| from_db(id)).collect();
        Ok(settings)
    }

    /// Insert or replace the settings for `settings.guild_id`, including the
    /// tracked outfit set
    pub async fn upsert(
        pool: &SqlitePool,
        settings: &PlanetsideSettings,
    ) -> DbResult<PlanetsideSettings> {
        let guild_id = to_db(settings.guild_id);
        let now = Utc::now().timestamp();

        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO planetside_settings (guild_id, default_world_id, base_capture_channel_id, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET
               default_world_id = excluded.default_world_id,
               base_capture_channel_id = excluded.base_capture_channel_id,
               updated_at = excluded.updated_at",
        )
        .bind(guild_id)
        .bind(settings.default_world_id.map(i64::from))
        .bind(opt_to_db(settings.base_capture_channel_id))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM planetside_tracked_outfits WHERE guild_id = ?")
            .bind(guild_id)
            .execute(&mut *tx)
            .await?;

        for outfit_id in &settings.tracked_outfit_ids {
            sqlx::query(
                "INSERT INTO planetside_tracked_outfits (guild_id, outfit_id) VALUES (?, ?)",
            )
            .bind(guild_id)
            .bind(to_db(*outfit_id))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!("Updated planetside settings for guild {}", settings.guild_id);
        Ok(settings.clone())
    }

    /// Start tracking an outfit. Returns false if it was already tracked.
    pub async fn add_tracked_outfit(
        pool: &SqlitePool,
        guild_id: u64,
        outfit_id: u64,
    ) -> DbResult<bool> {
        let now = Utc::now().timestamp();
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT OR IGNORE INTO planetside_settings (guild_id, updated_at) VALUES (?, ?)",
        )
        .bind(to_db(guild_id))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO planetside_tracked_outfits (guild_id, outfit_id) VALUES (?, ?)",
        )
        .bind(to_db(guild_id))
        .bind(to_db(outfit_id))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stop tracking an outfit. Returns false if it was not tracked.
    pub async fn remove_tracked_outfit(
        pool: &SqlitePool,
        guild_id: u64,
        outfit_id: u64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "DELETE FROM planetside_tracked_outfits WHERE guild_id = ? AND outfit_id = ?",
        )
        .bind(to_db(guild_id))
        .bind(to_db(outfit_id))
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Guilds tracking `outfit_id` that have a capture channel configured
    pub async fn subscriptions_for_outfit(
        pool: &SqlitePool,
        outfit_id: u64,
    ) -> DbResult<Vec<OutfitSubscription>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT s.guild_id, s.base_capture_channel_id
             FROM planetside_tracked_outfits t
             JOIN planetside_settings s ON s.guild_id = t.guild_id
             WHERE t.outfit_id = ? AND s.base_capture_channel_id IS NOT NULL
             ORDER BY s.guild_id",
        )
        .bind(to_db(outfit_id))
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(guild_id, channel_id)| OutfitSubscription {
                guild_id: from_db(guild_id),
                channel_id: from_db(channel_id),
            })
            .collect())
    }

    /// Remove all stored settings for a guild. Returns whether a row existed.
    pub async fn delete(pool: &SqlitePool, guild_id: u64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM planetside_settings WHERE guild_id = ?")
            .bind(to_db(guild_id))
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanetsideSettingsRow {
    guild_id: i64,
    default_world_id: Option<i64>,
    base_capture_channel_id: Option<i64>,
}

impl From<PlanetsideSettingsRow> for PlanetsideSettings {
    fn from(row: PlanetsideSettingsRow) -> Self {
        PlanetsideSettings {
            guild_id: from_db(row.guild_id),
            default_world_id: row.default_world_id.and_then(|id| u32::try_from(id).ok()),
            base_capture_channel_id: opt_from_db(row.base_capture_channel_id),
            tracked_outfit_ids: BTreeSet::new(),
        }
    }
}
