use std::time::Duration;

use serde::Deserialize;
use uvocbot_core::{PopulationSource, WorldId, WorldPopulation};

use super::{PopulationError, PopulationProvider, check_status, http_client};

pub const FISU_ALIAS: &str = "fisu";

/// ps2.fisu.pw population API.
#[derive(Debug, Clone)]
pub struct FisuProvider {
    client: reqwest::Client,
    base_url: String,
}

impl FisuProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PopulationError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct FisuResponse {
    #[serde(default)]
    result: Vec<FisuPopulation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FisuPopulation {
    world_id: u32,
    #[serde(default)]
    vs: u32,
    #[serde(default)]
    nc: u32,
    #[serde(default)]
    tr: u32,
    #[serde(default)]
    ns: u32,
    #[serde(default)]
    unknown: u32,
}

fn into_population(response: FisuResponse, world: WorldId) -> Result<WorldPopulation, PopulationError> {
    let entry = response
        .result
        .into_iter()
        .find(|e| e.world_id == world.id())
        .ok_or_else(|| PopulationError::Decode(format!("fisu returned no entry for {}", world)))?;

    Ok(WorldPopulation {
        world,
        vs: entry.vs,
        nc: entry.nc,
        tr: entry.tr,
        ns: entry.ns,
        total: entry.vs + entry.nc + entry.tr + entry.ns + entry.unknown,
        source: PopulationSource::Fisu,
    })
}

#[async_trait::async_trait]
impl PopulationProvider for FisuProvider {
    fn name(&self) -> &'static str {
        FISU_ALIAS
    }

    async fn world_population(&self, world: WorldId) -> Result<WorldPopulation, PopulationError> {
        let response = self
            .client
            .get(format!("{}/api/population/", self.base_url))
            .query(&[("world", world.id())])
            .send()
            .await
            .map_err(|e| PopulationError::RequestFailed(e.to_string()))?;

        let body: FisuResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| PopulationError::Decode(e.to_string()))?;

        into_population(body, world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fisu_response() {
        let body = r#"{
            "config": { "world": "10" },
            "result": [
                { "worldId": 10, "timestamp": 1714593600, "vs": 120, "nc": 140, "tr": 130, "ns": 8, "unknown": 2 }
            ],
            "timing": { "total-ms": 4 }
        }"#;
        let response: FisuResponse = serde_json::from_str(body).unwrap();

        let pop = into_population(response, WorldId::Miller).unwrap();
        assert_eq!(pop.total, 400);
        assert_eq!(pop.nc, 140);
        assert_eq!(pop.source, PopulationSource::Fisu);
    }

    #[test]
    fn test_empty_result_is_decode_error() {
        let response: FisuResponse = serde_json::from_str(r#"{"result": []}"#).unwrap();
        assert!(matches!(
            into_population(response, WorldId::Miller),
            Err(PopulationError::Decode(_))
        ));
    }
}
