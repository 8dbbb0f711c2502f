//! Census wire types.
//!
//! Census encodes every number as a JSON string, so the raw types keep
//! strings and convert into the core domain types explicitly.

use serde::Deserialize;
use uvocbot_core::{Faction, MapRegion, Outfit, ZoneId};

use super::CensusError;

pub(crate) fn parse_num<T: std::str::FromStr>(
    raw: &str,
    field: &'static str,
) -> Result<T, CensusError> {
    raw.trim()
        .parse()
        .map_err(|_| CensusError::Decode(format!("{} is not a number: {:?}", field, raw)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusMapRegion {
    pub map_region_id: String,
    pub zone_id: String,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub facility_name: Option<String>,
    #[serde(default)]
    pub facility_type: Option<String>,
}

impl TryFrom<CensusMapRegion> for MapRegion {
    type Error = CensusError;

    fn try_from(raw: CensusMapRegion) -> Result<Self, Self::Error> {
        let facility_id = raw
            .facility_id
            .as_deref()
            .ok_or_else(|| CensusError::Decode("map_region has no facility_id".to_string()))?;

        Ok(MapRegion {
            map_region_id: parse_num(&raw.map_region_id, "map_region_id")?,
            facility_id: parse_num(facility_id, "facility_id")?,
            facility_name: raw.facility_name.unwrap_or_else(|| "Unknown facility".to_string()),
            facility_type: raw.facility_type.filter(|t| !t.is_empty()),
            zone_id: parse_num(&raw.zone_id, "zone_id")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusOutfit {
    pub outfit_id: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub member_count: Option<String>,
    #[serde(default)]
    pub leader_world: Option<CensusCharacterWorld>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusCharacterWorld {
    pub world_id: String,
}

impl TryFrom<CensusOutfit> for Outfit {
    type Error = CensusError;

    fn try_from(raw: CensusOutfit) -> Result<Self, Self::Error> {
        let member_count = match raw.member_count.as_deref() {
            Some(count) => parse_num(count, "member_count")?,
            None => 0,
        };
        let world_id = match raw.leader_world {
            Some(world) => Some(parse_num(&world.world_id, "world_id")?),
            None => None,
        };

        Ok(Outfit {
            id: parse_num(&raw.outfit_id, "outfit_id")?,
            name: raw.name,
            tag: raw.alias.filter(|a| !a.is_empty()),
            member_count,
            world_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusOutfitMember {
    #[serde(default)]
    pub online: Option<CensusOnlineStatus>,
    #[serde(default)]
    pub character: Option<CensusCharacterName>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusOnlineStatus {
    pub online_status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusCharacterName {
    pub name: CensusName,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusName {
    pub first: String,
}

impl CensusOutfitMember {
    /// Name of the member if they are currently online. Census reports the
    /// world id as the online status, with "0" meaning offline.
    pub fn online_name(self) -> Option<String> {
        let online = self
            .online
            .is_some_and(|status| status.online_status.trim() != "0");
        if online {
            self.character.map(|c| c.name.first)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusMap {
    #[serde(rename = "ZoneId")]
    pub zone_id: String,
    #[serde(rename = "Regions")]
    pub regions: CensusMapRegions,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusMapRegions {
    #[serde(rename = "Row", default)]
    pub rows: Vec<CensusMapRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusMapRow {
    #[serde(rename = "RowData")]
    pub data: CensusMapRowData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CensusMapRowData {
    #[serde(rename = "FactionId")]
    pub faction_id: String,
}

/// Territory control on one continent, counted in map regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneTerritory {
    pub zone: ZoneId,
    pub vs: u32,
    pub nc: u32,
    pub tr: u32,
    pub unowned: u32,
}

impl ZoneTerritory {
    pub fn total(&self) -> u32 {
        self.vs + self.nc + self.tr + self.unowned
    }

    /// Share of regions held by `faction`, in whole percent.
    pub fn percent(&self, faction: Faction) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        let count = match faction {
            Faction::Vs => self.vs,
            Faction::Nc => self.nc,
            Faction::Tr => self.tr,
            Faction::None | Faction::Nso => self.unowned,
        };
        ((count as f64 / total as f64) * 100.0).round() as u32
    }

    /// The faction holding every region, if the continent is locked.
    pub fn locked_by(&self) -> Option<Faction> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        [(Faction::Vs, self.vs), (Faction::Nc, self.nc), (Faction::Tr, self.tr)]
            .into_iter()
            .find(|(_, count)| *count == total)
            .map(|(faction, _)| faction)
    }
}

impl TryFrom<CensusMap> for ZoneTerritory {
    type Error = CensusError;

    fn try_from(raw: CensusMap) -> Result<Self, Self::Error> {
        let zone_id: u32 = parse_num(&raw.zone_id, "ZoneId")?;
        let zone = ZoneId::from_id(zone_id)
            .ok_or_else(|| CensusError::Decode(format!("unknown zone {}", zone_id)))?;

        let mut territory = ZoneTerritory {
            zone,
            vs: 0,
            nc: 0,
            tr: 0,
            unowned: 0,
        };
        for row in raw.regions.rows {
            let faction_id: u32 = parse_num(&row.data.faction_id, "FactionId")?;
            match Faction::from_id(faction_id) {
                Some(Faction::Vs) => territory.vs += 1,
                Some(Faction::Nc) => territory.nc += 1,
                Some(Faction::Tr) => territory.tr += 1,
                _ => territory.unowned += 1,
            }
        }
        Ok(territory)
    }
}
