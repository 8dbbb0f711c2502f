use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uvocbot_core::{PopulationSettings, WorldId, WorldPopulation};

use crate::cache::LookupCache;
use crate::circuit_breaker::{CircuitBreaker, CooldownReason};

pub mod fisu;
pub mod honu;

#[derive(Debug, thiserror::Error)]
pub enum PopulationError {
    #[error("no population provider is available")]
    AllProvidersUnavailable,
    #[error("{0} is not tracked by any population provider")]
    Unsupported(WorldId),
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl PopulationError {
    fn cooldown_reason(&self) -> Option<CooldownReason> {
        match self {
            PopulationError::RateLimited => Some(CooldownReason::RateLimited),
            PopulationError::RequestFailed(_) | PopulationError::Decode(_) => {
                Some(CooldownReason::ServerError)
            }
            PopulationError::AllProvidersUnavailable | PopulationError::Unsupported(_) => None,
        }
    }
}

#[async_trait::async_trait]
pub trait PopulationProvider: Send + Sync {
    /// Breaker alias and config name of the provider.
    fn name(&self) -> &'static str;

    fn supports(&self, _world: WorldId) -> bool {
        true
    }

    async fn world_population(&self, world: WorldId) -> Result<WorldPopulation, PopulationError>;
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, PopulationError> {
    reqwest::Client::builder()
        .user_agent(concat!("uvocbot/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| PopulationError::RequestFailed(e.to_string()))
}

pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, PopulationError> {
    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(PopulationError::RateLimited);
    }
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(PopulationError::RequestFailed(format!("HTTP {}: {}", status, body)));
    }
    Ok(response)
}

/// Population lookups with provider fallback and a short-lived cache.
///
/// Providers are tried in configured order; one whose breaker is open is
/// skipped, one that fails is recorded on the breaker and the next is tried.
pub struct PopulationService {
    providers: Vec<Arc<dyn PopulationProvider>>,
    breaker: Arc<CircuitBreaker>,
    cache: LookupCache<WorldPopulation>,
}

impl PopulationService {
    pub fn new(
        providers: Vec<Arc<dyn PopulationProvider>>,
        breaker: Arc<CircuitBreaker>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            providers,
            breaker,
            cache: LookupCache::new(cache_ttl),
        }
    }

    /// Build the configured provider chain.
    pub fn from_settings(
        settings: &PopulationSettings,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, PopulationError> {
        let timeout = Duration::from_secs(settings.timeout_seconds);
        let mut providers: Vec<Arc<dyn PopulationProvider>> = Vec::new();
        for name in &settings.providers {
            match name.as_str() {
                honu::HONU_ALIAS => providers.push(Arc::new(honu::HonuProvider::new(
                    &settings.honu_url,
                    timeout,
                )?)),
                fisu::FISU_ALIAS => providers.push(Arc::new(fisu::FisuProvider::new(
                    &settings.fisu_url,
                    timeout,
                )?)),
                other => warn!("Skipping unknown population provider '{}'", other),
            }
        }

        Ok(Self::new(
            providers,
            breaker,
            Duration::from_secs(settings.cache_ttl_seconds),
        ))
    }

    pub async fn world_population(&self, world: WorldId) -> Result<WorldPopulation, PopulationError> {
        if let Some(cached) = self.cache.fresh(world) {
            return Ok(cached);
        }

        let candidates: Vec<&Arc<dyn PopulationProvider>> =
            self.providers.iter().filter(|p| p.supports(world)).collect();
        if candidates.is_empty() {
            return Err(PopulationError::Unsupported(world));
        }

        let mut last_error = None;
        for provider in candidates {
            let alias = provider.name();
            if !self.breaker.is_available(alias) {
                debug!("Skipping {} population provider, breaker open", alias);
                continue;
            }

            match provider.world_population(world).await {
                Ok(population) => {
                    self.breaker.record_success(alias);
                    self.cache.store(&population);
                    return Ok(population);
                }
                Err(e) => {
                    warn!("{} population lookup for {} failed: {}", alias, world, e);
                    if let Some(reason) = e.cooldown_reason() {
                        self.breaker.record_failure(alias, reason);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(PopulationError::AllProvidersUnavailable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uvocbot_core::PopulationSource;

    struct FakeProvider {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl PopulationProvider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn world_population(&self, world: WorldId) -> Result<WorldPopulation, PopulationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PopulationError::RequestFailed("boom".to_string()));
            }
            Ok(WorldPopulation {
                world,
                vs: 1,
                nc: 2,
                tr: 3,
                ns: 0,
                total: 6,
                source: if self.name == "honu" {
                    PopulationSource::Honu
                } else {
                    PopulationSource::Fisu
                },
            })
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_provider() {
        let honu = FakeProvider::new("honu", true);
        let fisu = FakeProvider::new("fisu", false);
        let service = PopulationService::new(
            vec![honu.clone(), fisu.clone()],
            Arc::new(CircuitBreaker::new(1, Duration::from_secs(60))),
            Duration::from_secs(60),
        );

        let pop = service.world_population(WorldId::Miller).await.unwrap();
        assert_eq!(pop.source, PopulationSource::Fisu);

        // Cached
        service.world_population(WorldId::Miller).await.unwrap();
        assert_eq!(fisu.calls.load(Ordering::SeqCst), 1);

        // honu's breaker is open, so a different world skips it entirely
        service.world_population(WorldId::Cobalt).await.unwrap();
        assert_eq!(honu.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reports_last_error_when_all_fail() {
        let service = PopulationService::new(
            vec![FakeProvider::new("honu", true)],
            Arc::new(CircuitBreaker::new(1, Duration::from_secs(60))),
            Duration::from_secs(60),
        );

        let err = service.world_population(WorldId::Emerald).await.unwrap_err();
        assert!(matches!(err, PopulationError::RequestFailed(_)));

        let err = service.world_population(WorldId::Emerald).await.unwrap_err();
        assert!(matches!(err, PopulationError::AllProvidersUnavailable));
    }

    #[tokio::test]
    async fn from_settings_builds_chain_in_order() {
        let settings = PopulationSettings {
            providers: vec!["fisu".to_string(), "honu".to_string()],
            ..Default::default()
        };
        let service =
            PopulationService::from_settings(&settings, Arc::new(CircuitBreaker::default())).unwrap();
        let names: Vec<&str> = service.providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["fisu", "honu"]);
    }
}
