//! Configuration management for UVOCBot.
//!
//! Secrets come from environment variables, settings from a TOML file.
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `DISCORD_BOT_TOKEN` - Discord bot token
//! - `CENSUS_SERVICE_ID` - Daybreak Census service id (defaults to `example`)
//!
//! ## Settings (TOML File)
//! Located at `~/.config/uvocbot/config.toml`:
//! ```toml
//! [gateway]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [discord]
//! enabled = true
//!
//! [census]
//! min_interval_ms = 200
//!
//! [facility_capture]
//! pacing_ms = 100
//! ```

mod secrets;
mod settings;

pub use secrets::{Secrets, SecretsError};
pub use settings::{
    CensusSettings, DatabaseSettings, DiscordSettings, FacilityCaptureSettings, GatewaySettings,
    LoggingSettings, PopulationSettings, Settings, SettingsError,
};

/// Load .env file if it exists.
pub fn load_dotenv() {
    // Silently ignore errors (file might not exist)
    let _ = dotenvy::dotenv();
}

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Unknown population provider '{0}' (expected 'honu' or 'fisu')")]
    UnknownPopulationProvider(String),
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file cannot be read or parsed, or if it
    /// names a population provider that does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env()?;
        let settings = Settings::load()?;
        Self::from_parts(secrets, settings)
    }

    /// Validate and combine already-loaded secrets and settings.
    pub fn from_parts(secrets: Secrets, settings: Settings) -> Result<Self, ConfigError> {
        for provider in &settings.population.providers {
            if provider != "honu" && provider != "fisu" {
                return Err(ConfigError::UnknownPopulationProvider(provider.clone()));
            }
        }

        Ok(Self { secrets, settings })
    }

    /// Get Discord bot token
    pub fn discord_bot_token(&self) -> Option<&str> {
        self.secrets.discord_bot_token.as_deref()
    }

    /// Whether the Discord bot should be started
    pub fn discord_enabled(&self) -> bool {
        self.settings.discord.enabled
    }

    /// Census service id used to build request URLs
    pub fn census_service_id(&self) -> &str {
        &self.secrets.census_service_id
    }

    /// Get the HTTP bind address for the API server
    pub fn bind_addr(&self) -> String {
        self.settings.bind_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_accepts_known_providers() {
        let settings = Settings::default();
        let config = Config::from_parts(Secrets::default(), settings).unwrap();
        assert_eq!(config.settings.population.providers, vec!["honu", "fisu"]);
        assert!(config.discord_bot_token().is_none());
    }

    #[test]
    fn test_from_parts_rejects_unknown_provider() {
        let mut settings = Settings::default();
        settings.population.providers = vec!["voidwell".to_string()];

        let err = Config::from_parts(Secrets::default(), settings).unwrap_err();
        assert!(err.to_string().contains("voidwell"));
    }
}
