//! Shared application state for the Discord bot and the HTTP API.

use std::sync::Arc;

use sqlx::SqlitePool;
use uvocbot_db::SettingsDbPool;

use crate::census::CensusClient;
use crate::circuit_breaker::CircuitBreaker;
use crate::facility_capture::FacilityCaptureService;
use crate::population::PopulationService;

pub struct AppState {
    /// Guild settings database
    pub db: SettingsDbPool,

    /// Census REST client
    pub census: Arc<CensusClient>,

    /// Population lookups with provider fallback
    pub population: Arc<PopulationService>,

    /// Capture resolution loop and its queue
    pub facility_capture: Arc<FacilityCaptureService>,

    /// Breaker shared by every upstream client
    pub breaker: Arc<CircuitBreaker>,
}

impl AppState {
    pub fn new(
        db: SettingsDbPool,
        census: Arc<CensusClient>,
        population: Arc<PopulationService>,
        facility_capture: Arc<FacilityCaptureService>,
    ) -> Self {
        let breaker = Arc::clone(census.breaker());
        Self {
            db,
            census,
            population,
            facility_capture,
            breaker,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }
}
