use std::time::Duration;

use serde::Deserialize;
use uvocbot_core::{PopulationSource, WorldId, WorldPopulation};

use super::{PopulationError, PopulationProvider, check_status, http_client};

pub const HONU_ALIAS: &str = "honu";

/// wt.honu.pw population API. Only tracks PC worlds.
#[derive(Debug, Clone)]
pub struct HonuProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HonuProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PopulationError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HonuPopulation {
    #[serde(rename = "worldID")]
    world_id: u32,
    total: u32,
    vs: u32,
    nc: u32,
    tr: u32,
    ns: u32,
}

fn into_population(entries: Vec<HonuPopulation>, world: WorldId) -> Result<WorldPopulation, PopulationError> {
    let entry = entries
        .into_iter()
        .find(|e| e.world_id == world.id())
        .ok_or_else(|| PopulationError::Decode(format!("honu returned no entry for {}", world)))?;

    Ok(WorldPopulation {
        world,
        vs: entry.vs,
        nc: entry.nc,
        tr: entry.tr,
        ns: entry.ns,
        total: entry.total,
        source: PopulationSource::Honu,
    })
}

#[async_trait::async_trait]
impl PopulationProvider for HonuProvider {
    fn name(&self) -> &'static str {
        HONU_ALIAS
    }

    fn supports(&self, world: WorldId) -> bool {
        !world.is_console()
    }

    async fn world_population(&self, world: WorldId) -> Result<WorldPopulation, PopulationError> {
        let response = self
            .client
            .get(format!("{}/api/population/multiple", self.base_url))
            .query(&[("worldID", world.id())])
            .send()
            .await
            .map_err(|e| PopulationError::RequestFailed(e.to_string()))?;

        let entries: Vec<HonuPopulation> = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| PopulationError::Decode(e.to_string()))?;

        into_population(entries, world)
    }
}
