pub mod config;
pub mod facility;
pub mod planetside;

// Config re-exports
pub use config::{
    CensusSettings, Config, ConfigError, DatabaseSettings, DiscordSettings,
    FacilityCaptureSettings, GatewaySettings, LoggingSettings, PopulationSettings, Secrets,
    SecretsError, Settings, SettingsError, load_dotenv,
};

// Domain re-exports
pub use facility::{FacilityControlEvent, MapRegion};
pub use planetside::{Faction, Outfit, PopulationSource, WorldId, WorldPopulation, ZoneId};
