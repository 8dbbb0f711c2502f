//! Secrets configuration loaded from environment variables only.
//!
//! Tokens and service ids are never written to the settings file.

use std::env;

/// Census service id used when `CENSUS_SERVICE_ID` is not set.
///
/// The `example` id is heavily throttled by Daybreak and only suitable for
/// development.
pub const DEFAULT_CENSUS_SERVICE_ID: &str = "example";

/// Secrets loaded exclusively from environment variables.
#[derive(Debug, Clone)]
pub struct Secrets {
    /// Discord bot token (env: DISCORD_BOT_TOKEN)
    pub discord_bot_token: Option<String>,

    /// Census service id without the `s:` prefix (env: CENSUS_SERVICE_ID)
    pub census_service_id: String,
}

impl Default for Secrets {
    fn default() -> Self {
        Self {
            discord_bot_token: None,
            census_service_id: DEFAULT_CENSUS_SERVICE_ID.to_string(),
        }
    }
}

/// Errors that can occur when loading secrets
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidSecret { name: &'static str, reason: String },
}

impl Secrets {
    /// Load secrets from environment variables.
    ///
    /// This function also loads .env file if present (for development),
    /// but production should rely on actual environment variables.
    pub fn from_env() -> Result<Self, SecretsError> {
        // Load .env file if present (development convenience)
        let _ = dotenvy::dotenv();

        Self::from_env_inner()
    }

    /// Internal method to load from environment without loading .env
    pub(crate) fn from_env_inner() -> Result<Self, SecretsError> {
        let discord_bot_token = env::var("DISCORD_BOT_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let census_service_id = match env::var("CENSUS_SERVICE_ID") {
            Ok(raw) => {
                let trimmed = raw.trim();
                let id = trimmed.strip_prefix("s:").unwrap_or(trimmed);
                if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(SecretsError::InvalidSecret {
                        name: "CENSUS_SERVICE_ID",
                        reason: "must be a non-empty alphanumeric id".to_string(),
                    });
                }
                id.to_string()
            }
            Err(_) => DEFAULT_CENSUS_SERVICE_ID.to_string(),
        };

        Ok(Self {
            discord_bot_token,
            census_service_id,
        })
    }

    /// Whether a Discord token is available
    pub fn has_discord_token(&self) -> bool {
        self.discord_bot_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Use a mutex to ensure tests that modify environment variables don't run concurrently
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        unsafe {
            env::remove_var("DISCORD_BOT_TOKEN");
            env::remove_var("CENSUS_SERVICE_ID");
        }
    }

    #[test]
    fn test_defaults_without_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let secrets = Secrets::from_env_inner().unwrap();
        assert!(secrets.discord_bot_token.is_none());
        assert!(!secrets.has_discord_token());
        assert_eq!(secrets.census_service_id, DEFAULT_CENSUS_SERVICE_ID);
    }

    #[test]
    fn test_service_id_prefix_is_stripped() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("CENSUS_SERVICE_ID", "s:uvocbot");
            env::set_var("DISCORD_BOT_TOKEN", "  token  ");
        }

        let secrets = Secrets::from_env_inner().unwrap();
        assert_eq!(secrets.census_service_id, "uvocbot");
        assert_eq!(secrets.discord_bot_token.as_deref(), Some("token"));
        clear_env();
    }

    #[test]
    fn test_invalid_service_id() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("CENSUS_SERVICE_ID", "bad id!");
        }

        let result = Secrets::from_env_inner();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("CENSUS_SERVICE_ID"));
        clear_env();
    }

    #[test]
    fn test_empty_token_is_none() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("DISCORD_BOT_TOKEN", "   ");
        }

        let secrets = Secrets::from_env_inner().unwrap();
        assert!(secrets.discord_bot_token.is_none());
        clear_env();
    }
}
