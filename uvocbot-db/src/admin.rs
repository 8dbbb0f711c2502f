//! Admin event logging settings.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::DbResult,
    ids::{from_db, opt_from_db, opt_to_db, to_db},
};

/// Set of guild events that are written to the admin log channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogType(u32);

impl LogType {
    pub const NONE: LogType = LogType(0);
    pub const MEMBER_JOIN: LogType = LogType(1);
    pub const MEMBER_LEAVE: LogType = LogType(2);

    /// Every known flag, with the name shown to users.
    pub const NAMED: [(LogType, &'static str); 2] = [
        (LogType::MEMBER_JOIN, "member-join"),
        (LogType::MEMBER_LEAVE, "member-leave"),
    ];

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Unknown bits are dropped.
    pub fn from_bits_truncate(bits: u32) -> Self {
        LogType(bits & (Self::MEMBER_JOIN.0 | Self::MEMBER_LEAVE.0))
    }

    pub fn contains(self, other: LogType) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: LogType) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: LogType) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(flag, _)| *flag)
    }

    /// Names of the set flags, in declaration order
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, n)| *n)
            .collect()
    }
}

impl std::ops::BitOr for LogType {
    type Output = LogType;

    fn bitor(self, rhs: Self) -> Self::Output {
        LogType(self.0 | rhs.0)
    }
}

/// Admin logging configuration for a guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSettings {
    #[serde(default)]
    pub guild_id: u64,
    pub logging_channel_id: Option<u64>,
    #[serde(default)]
    pub log_types: LogType,
}

impl AdminSettings {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            ..Default::default()
        }
    }

    /// Channel to log `event` to, if that event type is enabled
    pub fn channel_for(&self, event: LogType) -> Option<u64> {
        if self.log_types.contains(event) {
            self.logging_channel_id
        } else {
            None
        }
    }
}

/// Admin settings repository for database operations
pub struct AdminSettingsRepository;

impl AdminSettingsRepository {
    /// Get settings for a guild, or the defaults if none are stored
    pub async fn get(pool: &SqlitePool, guild_id: u64) -> DbResult<AdminSettings> {
        let row = sqlx::query_as::<_, AdminSettingsRow>(
            "SELECT guild_id, logging_channel_id, log_types
             FROM guild_admin_settings
             WHERE guild_id = ?",
        )
        .bind(to_db(guild_id))
        .fetch_optional(pool)
        .await?;

        Ok(row
            .map(AdminSettings::from)
            .unwrap_or_else(|| AdminSettings::new(guild_id)))
    }

    /// Insert or replace the settings for `settings.guild_id`
    pub async fn upsert(pool: &SqlitePool, settings: &AdminSettings) -> DbResult<AdminSettings> {
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO guild_admin_settings (guild_id, logging_channel_id, log_types, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET
               logging_channel_id = excluded.logging_channel_id,
               log_types = excluded.log_types,
               updated_at = excluded.updated_at",
        )
        .bind(to_db(settings.guild_id))
        .bind(opt_to_db(settings.logging_channel_id))
        .bind(i64::from(settings.log_types.bits()))
        .bind(now)
        .execute(pool)
        .await?;

        info!("Updated admin settings for guild {}", settings.guild_id);
        Ok(settings.clone())
    }

    /// Remove all stored settings for a guild. Returns whether a row existed.
    pub async fn delete(pool: &SqlitePool, guild_id: u64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM guild_admin_settings WHERE guild_id = ?")
            .bind(to_db(guild_id))
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminSettingsRow {
    guild_id: i64,
    logging_channel_id: Option<i64>,
    log_types: i64,
}

impl From<AdminSettingsRow> for AdminSettings {
    fn from(row: AdminSettingsRow) -> Self {
        AdminSettings {
            guild_id: from_db(row.guild_id),
            logging_channel_id: opt_from_db(row.logging_channel_id),
            log_types: LogType::from_bits_truncate(u32::try_from(row.log_types).unwrap_or(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_settings_pool;

    #[test]
    fn test_log_type_flags() {
        let mut types = LogType::NONE;
        assert!(types.is_empty());
        assert!(!types.contains(LogType::MEMBER_JOIN));

        types.insert(LogType::MEMBER_LEAVE);
        assert!(types.contains(LogType::MEMBER_LEAVE));
        assert!(!types.contains(LogType::MEMBER_JOIN));
        assert_eq!(types.names(), vec!["member-leave"]);

        types = types | LogType::MEMBER_JOIN;
        assert_eq!(types.bits(), 3);
        types.remove(LogType::MEMBER_LEAVE);
        assert_eq!(types, LogType::MEMBER_JOIN);

        assert_eq!(LogType::from_bits_truncate(0xFF).bits(), 3);
        assert_eq!(LogType::from_name("Member-Join"), Some(LogType::MEMBER_JOIN));
        assert_eq!(LogType::from_name("message-delete"), None);
    }

    #[test]
    fn test_channel_for_requires_flag() {
        let settings = AdminSettings {
            guild_id: 1,
            logging_channel_id: Some(99),
            log_types: LogType::MEMBER_JOIN,
        };
        assert_eq!(settings.channel_for(LogType::MEMBER_JOIN), Some(99));
        assert_eq!(settings.channel_for(LogType::MEMBER_LEAVE), None);
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = create_test_settings_pool().await.unwrap();
        let pool = db.pool();

        assert_eq!(
            AdminSettingsRepository::get(pool, 4).await.unwrap(),
            AdminSettings::new(4)
        );

        let settings = AdminSettings {
            guild_id: 4,
            logging_channel_id: Some(8),
            log_types: LogType::MEMBER_JOIN | LogType::MEMBER_LEAVE,
        };
        AdminSettingsRepository::upsert(pool, &settings).await.unwrap();
        assert_eq!(AdminSettingsRepository::get(pool, 4).await.unwrap(), settings);

        assert!(AdminSettingsRepository::delete(pool, 4).await.unwrap());
    }

    #[test]
    fn test_log_type_serializes_as_bits() {
        let json = serde_json::to_string(&(LogType::MEMBER_JOIN | LogType::MEMBER_LEAVE)).unwrap();
        assert_eq!(json, "3");
    }
}
