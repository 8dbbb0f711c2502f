//! Facility → map region lookup used by the capture loop.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uvocbot_core::MapRegion;

use crate::cache::LookupCache;
use crate::census::{CensusClient, CensusError};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The upstream is known to be unhealthy (circuit breaker open).
    #[error("map region source is unavailable: {0}")]
    DependencyUnhealthy(String),

    /// Any other lookup failure.
    #[error("map region lookup failed: {0}")]
    Failed(String),
}

impl ResolveError {
    /// Whether the loop should pause before retrying.
    pub fn is_backoff_worthy(&self) -> bool {
        matches!(self, ResolveError::DependencyUnhealthy(_))
    }
}

impl From<CensusError> for ResolveError {
    fn from(err: CensusError) -> Self {
        match err {
            CensusError::CircuitOpen => ResolveError::DependencyUnhealthy(err.to_string()),
            other => ResolveError::Failed(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
pub trait MapRegionResolver: Send + Sync {
    /// `Ok(None)` means the facility does not exist upstream.
    async fn resolve_facility_region(
        &self,
        facility_id: u64,
    ) -> Result<Option<MapRegion>, ResolveError>;
}

/// Census-backed resolver. Map regions never change, so hits are cached.
pub struct CensusMapRegionResolver {
    census: Arc<CensusClient>,
    cache: LookupCache<MapRegion>,
}

impl CensusMapRegionResolver {
    pub fn new(census: Arc<CensusClient>, cache_ttl: Duration) -> Self {
        Self {
            census,
            cache: LookupCache::new(cache_ttl),
        }
    }
}

#[async_trait::async_trait]
impl MapRegionResolver for CensusMapRegionResolver {
    async fn resolve_facility_region(
        &self,
        facility_id: u64,
    ) -> Result<Option<MapRegion>, ResolveError> {
        if let Some(region) = self.cache.fresh(facility_id) {
            debug!("Map region cache hit for facility {}", facility_id);
            return Ok(Some(region));
        }

        let region = self.census.map_region(facility_id).await?;
        if let Some(region) = &region {
            self.cache.store(region);
        }
        Ok(region)
    }
}
