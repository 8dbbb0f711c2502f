pub mod cache;
pub mod census;
pub mod circuit_breaker;
pub mod discord;
pub mod facility_capture;
pub mod population;
pub mod server;
pub mod state;

pub use facility_capture::{FacilityCaptureError, FacilityCaptureService, MapRegionResolver};
pub use state::AppState;
