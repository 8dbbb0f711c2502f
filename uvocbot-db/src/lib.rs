//! uvocbot-db: SQLite persistence for per-guild UVOCBot settings.
//!
//! This crate provides database operations for:
//! - Twitter relay configuration
//! - PlanetSide preferences and tracked outfits
//! - Welcome messages and admin logging
//! - Role menus

pub mod admin;
pub mod error;
mod ids;
pub mod planetside;
pub mod role_menus;
pub mod settings_db;
mod sqlite_runtime;
pub mod twitter;
pub mod welcome_message;

// Re-export commonly used types
pub use admin::{AdminSettings, AdminSettingsRepository, LogType};
pub use error::{DbError, DbResult};
pub use planetside::{OutfitSubscription, PlanetsideSettings, PlanetsideSettingsRepository};
pub use role_menus::{MAX_MENU_ROLES, NewRoleMenu, RoleMenu, RoleMenuRepository, RoleMenuRole};
pub use settings_db::SettingsDbPool;
pub use twitter::{TwitterSettings, TwitterSettingsRepository};
pub use welcome_message::{NAME_PLACEHOLDER, WelcomeMessage, WelcomeMessageRepository};

// Re-export test helpers when running tests or when test-helpers feature is enabled
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
