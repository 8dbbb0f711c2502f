//! Daybreak Census API client.
//!
//! Every request goes through the shared circuit breaker under the
//! [`CENSUS_ALIAS`] alias and is spaced by a minimum interval, since the
//! service id is throttled upstream.

mod models;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;
use uvocbot_core::{CensusSettings, MapRegion, Outfit, WorldId, ZoneId};

use crate::circuit_breaker::{CircuitBreaker, CooldownReason};

pub use models::ZoneTerritory;
use models::{CensusMap, CensusMapRegion, CensusOutfit, CensusOutfitMember};

/// Breaker alias shared by every Census request.
pub const CENSUS_ALIAS: &str = "census";

const OUTFIT_LEADER_WORLD_JOIN: &str =
    "characters_world^on:leader_character_id^to:character_id^inject_at:leader_world";
const OUTFIT_MEMBER_JOINS: &str = "characters_online_status^on:character_id^inject_at:online,\
     character^on:character_id^show:name.first^inject_at:character";

#[derive(Debug, thiserror::Error)]
pub enum CensusError {
    #[error("Census circuit breaker is open")]
    CircuitOpen,

    #[error("Census rate limited the request")]
    RateLimited,

    #[error("Census request failed: {0}")]
    RequestFailed(String),

    #[error("Census returned an error: {0}")]
    Api(String),

    #[error("Failed to decode Census response: {0}")]
    Decode(String),
}

impl CensusError {
    /// Failures that say something about Census health, as opposed to
    /// failures decoding what it sent.
    fn cooldown_reason(&self) -> Option<CooldownReason> {
        match self {
            CensusError::RateLimited => Some(CooldownReason::RateLimited),
            CensusError::RequestFailed(_) | CensusError::Api(_) => Some(CooldownReason::ServerError),
            CensusError::CircuitOpen | CensusError::Decode(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct CensusClient {
    client: reqwest::Client,
    base_url: String,
    service_id: String,
    timeout: Duration,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
    breaker: Arc<CircuitBreaker>,
}

impl CensusClient {
    pub fn new(
        settings: &CensusSettings,
        service_id: &str,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, CensusError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("uvocbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CensusError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            service_id: service_id.to_string(),
            timeout: Duration::from_secs(settings.timeout_seconds),
            min_interval: Duration::from_millis(settings.min_interval_ms),
            last_request: Mutex::new(None),
            breaker,
        })
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/s:{}/get/ps2:v2/{}",
            self.base_url, self.service_id, collection
        )
    }

    async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch(&self, collection: &str, query: &[(&str, String)]) -> Result<Vec<Value>, CensusError> {
        self.wait_for_slot().await;
        debug!("Census query {} {:?}", collection, query);

        let response = self
            .client
            .get(self.collection_url(collection))
            .timeout(self.timeout)
            .query(query)
            .send()
            .await
            .map_err(|e| CensusError::RequestFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CensusError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CensusError::RequestFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CensusError::RequestFailed(e.to_string()))?;

        extract_list(body, collection)
    }

    /// Run a query against `collection`, recording the outcome on the breaker.
    async fn get_collection<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, CensusError> {
        if !self.breaker.is_available(CENSUS_ALIAS) {
            return Err(CensusError::CircuitOpen);
        }

        let result = self.fetch(collection, query).await;
        match &result {
            Ok(_) => self.breaker.record_success(CENSUS_ALIAS),
            Err(e) => {
                if let Some(reason) = e.cooldown_reason() {
                    self.breaker.record_failure(CENSUS_ALIAS, reason);
                }
            }
        }

        result?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|e| CensusError::Decode(e.to_string())))
            .collect()
    }

    /// The map region containing `facility_id`, if Census knows the facility.
    pub async fn map_region(&self, facility_id: u64) -> Result<Option<MapRegion>, CensusError> {
        let regions: Vec<CensusMapRegion> = self
            .get_collection(
                "map_region",
                &[
                    ("facility_id", facility_id.to_string()),
                    ("c:limit", "1".to_string()),
                ],
            )
            .await?;

        regions.into_iter().next().map(MapRegion::try_from).transpose()
    }

    /// Find an outfit by its tag, case-insensitively.
    pub async fn outfit_by_tag(&self, tag: &str) -> Result<Option<Outfit>, CensusError> {
        let outfits: Vec<CensusOutfit> = self
            .get_collection(
                "outfit",
                &[
                    ("alias_lower", tag.trim().to_lowercase()),
                    ("c:join", OUTFIT_LEADER_WORLD_JOIN.to_string()),
                    ("c:limit", "1".to_string()),
                ],
            )
            .await?;

        outfits.into_iter().next().map(Outfit::try_from).transpose()
    }

    pub async fn outfit_by_id(&self, outfit_id: u64) -> Result<Option<Outfit>, CensusError> {
        let outfits: Vec<CensusOutfit> = self
            .get_collection(
                "outfit",
                &[
                    ("outfit_id", outfit_id.to_string()),
                    ("c:join", OUTFIT_LEADER_WORLD_JOIN.to_string()),
                ],
            )
            .await?;

        outfits.into_iter().next().map(Outfit::try_from).transpose()
    }

    /// Names of the outfit's members that are online, sorted.
    pub async fn online_members(&self, outfit_id: u64) -> Result<Vec<String>, CensusError> {
        let members: Vec<CensusOutfitMember> = self
            .get_collection(
                "outfit_member",
                &[
                    ("outfit_id", outfit_id.to_string()),
                    ("c:limit", "1000".to_string()),
                    ("c:show", "character_id".to_string()),
                    ("c:join", OUTFIT_MEMBER_JOINS.to_string()),
                ],
            )
            .await?;

        let mut names: Vec<String> = members
            .into_iter()
            .filter_map(CensusOutfitMember::online_name)
            .collect();
        names.sort_by_key(|name| name.to_lowercase());
        Ok(names)
    }

    /// Territory control on every continent of `world`.
    pub async fn world_territory(&self, world: WorldId) -> Result<Vec<ZoneTerritory>, CensusError> {
        let zone_ids = ZoneId::ALL
            .iter()
            .map(|z| z.id().to_string())
            .collect::<Vec<_>>()
            .join(",");

        let maps: Vec<CensusMap> = self
            .get_collection(
                "map",
                &[("world_id", world.id().to_string()), ("zone_ids", zone_ids)],
            )
            .await?;

        maps.into_iter().map(ZoneTerritory::try_from).collect()
    }
}

/// Pull `{collection}_list` out of a Census response body.
///
/// Census reports most failures with HTTP 200 and an `error` or
/// `errorCode` field instead of the list.
fn extract_list(mut body: Value, collection: &str) -> Result<Vec<Value>, CensusError> {
    if let Some(error) = body.get("error") {
        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return Err(CensusError::Api(message));
    }
    if let Some(code) = body.get("errorCode").and_then(Value::as_str) {
        let message = body
            .get("errorMessage")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(CensusError::Api(format!("{} {}", code, message).trim().to_string()));
    }

    match body.get_mut(format!("{}_list", collection)).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(CensusError::Decode(format!(
            "response has no {}_list array",
            collection
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(breaker: Arc<CircuitBreaker>) -> CensusClient {
        CensusClient::new(&CensusSettings::default(), "uvocbot", breaker).unwrap()
    }

    #[test]
    fn test_collection_url_includes_service_id() {
        let census = client(Arc::new(CircuitBreaker::default()));
        assert_eq!(
            census.collection_url("map_region"),
            "https://census.daybreakgames.com/s:uvocbot/get/ps2:v2/map_region"
        );
    }

    #[test]
    fn test_extract_list() {
        let body = json!({ "map_region_list": [{ "map_region_id": "1" }], "returned": 1 });
        let items = extract_list(body, "map_region").unwrap();
        assert_eq!(items.len(), 1);

        let empty = json!({ "outfit_list": [], "returned": 0 });
        assert!(extract_list(empty, "outfit").unwrap().is_empty());
    }

    #[test]
    fn test_extract_list_error_bodies() {
        let err = extract_list(json!({ "error": "No data found." }), "outfit").unwrap_err();
        assert!(matches!(err, CensusError::Api(ref m) if m == "No data found."));

        let err = extract_list(
            json!({ "errorCode": "SERVER_ERROR", "errorMessage": "Timeout" }),
            "outfit",
        )
        .unwrap_err();
        assert!(matches!(err, CensusError::Api(ref m) if m == "SERVER_ERROR Timeout"));

        let err = extract_list(json!({ "returned": 0 }), "outfit").unwrap_err();
        assert!(matches!(err, CensusError::Decode(_)));
    }

    #[test]
    fn test_only_upstream_failures_trip_the_breaker() {
        assert_eq!(
            CensusError::RateLimited.cooldown_reason(),
            Some(CooldownReason::RateLimited)
        );
        assert_eq!(
            CensusError::Api("x".into()).cooldown_reason(),
            Some(CooldownReason::ServerError)
        );
        assert_eq!(CensusError::Decode("x".into()).cooldown_reason(), None);
        assert_eq!(CensusError::CircuitOpen.cooldown_reason(), None);
    }

    #[tokio::test]
    async fn test_open_breaker_fails_fast() {
        let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(60)));
        breaker.record_failure(CENSUS_ALIAS, CooldownReason::ServerError);
        let census = client(breaker);

        let err = census.map_region(222_280).await.unwrap_err();
        assert!(matches!(err, CensusError::CircuitOpen));
    }
}
