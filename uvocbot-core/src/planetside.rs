//! PlanetSide 2 domain types shared by the database, gateway and API layers.

use serde::{Deserialize, Serialize};

/// A PlanetSide 2 game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum WorldId {
    Connery,
    Miller,
    Cobalt,
    Emerald,
    Jaeger,
    SolTech,
    Genudine,
    Ceres,
}

impl WorldId {
    /// All worlds, in the order they are offered as command choices.
    pub const ALL: [WorldId; 8] = [
        WorldId::Connery,
        WorldId::Miller,
        WorldId::Cobalt,
        WorldId::Emerald,
        WorldId::Jaeger,
        WorldId::SolTech,
        WorldId::Genudine,
        WorldId::Ceres,
    ];

    pub fn id(self) -> u32 {
        match self {
            WorldId::Connery => 1,
            WorldId::Miller => 10,
            WorldId::Cobalt => 13,
            WorldId::Emerald => 17,
            WorldId::Jaeger => 19,
            WorldId::SolTech => 40,
            WorldId::Genudine => 1000,
            WorldId::Ceres => 2000,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            WorldId::Connery => "Connery",
            WorldId::Miller => "Miller",
            WorldId::Cobalt => "Cobalt",
            WorldId::Emerald => "Emerald",
            WorldId::Jaeger => "Jaeger",
            WorldId::SolTech => "SolTech",
            WorldId::Genudine => "Genudine",
            WorldId::Ceres => "Ceres",
        }
    }

    /// PS4 worlds are not tracked by every aggregator.
    pub fn is_console(self) -> bool {
        matches!(self, WorldId::Genudine | WorldId::Ceres)
    }
}

impl From<WorldId> for u32 {
    fn from(world: WorldId) -> Self {
        world.id()
    }
}

impl TryFrom<u32> for WorldId {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        WorldId::from_id(value).ok_or_else(|| format!("Unknown world id: {}", value))
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for WorldId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<u32>() {
            return WorldId::try_from(id);
        }
        WorldId::ALL
            .into_iter()
            .find(|w| w.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("Unknown world: {}", s))
    }
}

/// A continent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum ZoneId {
    Indar,
    Hossin,
    Amerish,
    Esamir,
    Oshur,
}

impl ZoneId {
    pub const ALL: [ZoneId; 5] = [
        ZoneId::Indar,
        ZoneId::Hossin,
        ZoneId::Amerish,
        ZoneId::Esamir,
        ZoneId::Oshur,
    ];

    pub fn id(self) -> u32 {
        match self {
            ZoneId::Indar => 2,
            ZoneId::Hossin => 4,
            ZoneId::Amerish => 6,
            ZoneId::Esamir => 8,
            ZoneId::Oshur => 344,
        }
    }

    /// Resolve a zone from a raw Census zone id.
    ///
    /// Instanced zones carry the instance in the upper 16 bits; the
    /// definition id is the low 16 bits.
    pub fn from_id(raw: u32) -> Option<Self> {
        let definition = raw & 0xFFFF;
        Self::ALL.into_iter().find(|z| z.id() == definition)
    }

    pub fn name(self) -> &'static str {
        match self {
            ZoneId::Indar => "Indar",
            ZoneId::Hossin => "Hossin",
            ZoneId::Amerish => "Amerish",
            ZoneId::Esamir => "Esamir",
            ZoneId::Oshur => "Oshur",
        }
    }
}

impl From<ZoneId> for u32 {
    fn from(zone: ZoneId) -> Self {
        zone.id()
    }
}

impl TryFrom<u32> for ZoneId {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        ZoneId::from_id(value).ok_or_else(|| format!("Unknown zone id: {}", value))
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Empire a player or territory belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Faction {
    None,
    Vs,
    Nc,
    Tr,
    Nso,
}

impl Faction {
    pub fn id(self) -> u32 {
        match self {
            Faction::None => 0,
            Faction::Vs => 1,
            Faction::Nc => 2,
            Faction::Tr => 3,
            Faction::Nso => 4,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Faction::None),
            1 => Some(Faction::Vs),
            2 => Some(Faction::Nc),
            3 => Some(Faction::Tr),
            4 => Some(Faction::Nso),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Faction::None => "None",
            Faction::Vs => "VS",
            Faction::Nc => "NC",
            Faction::Tr => "TR",
            Faction::Nso => "NSO",
        }
    }

    /// Embed colour associated with the faction.
    pub fn colour(self) -> u32 {
        match self {
            Faction::None => 0x575757,
            Faction::Vs => 0x440E62,
            Faction::Nc => 0x004B80,
            Faction::Tr => 0x9E0B0F,
            Faction::Nso => 0x565656,
        }
    }
}

impl From<Faction> for u32 {
    fn from(faction: Faction) -> Self {
        faction.id()
    }
}

impl TryFrom<u32> for Faction {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Faction::from_id(value).ok_or_else(|| format!("Unknown faction id: {}", value))
    }
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A player outfit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outfit {
    pub id: u64,
    pub name: String,
    pub tag: Option<String>,
    pub member_count: u32,
    pub world_id: Option<u32>,
}

impl Outfit {
    /// `[TAG] Name`, or just the name for tagless outfits.
    pub fn display_name(&self) -> String {
        match self.tag.as_deref().filter(|t| !t.is_empty()) {
            Some(tag) => format!("[{}] {}", tag, self.name),
            None => self.name.clone(),
        }
    }
}

/// Which aggregator a population figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationSource {
    Honu,
    Fisu,
}

impl PopulationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PopulationSource::Honu => "honu",
            PopulationSource::Fisu => "fisu",
        }
    }
}

impl std::fmt::Display for PopulationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Online player counts for a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldPopulation {
    pub world: WorldId,
    pub vs: u32,
    pub nc: u32,
    pub tr: u32,
    pub ns: u32,
    pub total: u32,
    pub source: PopulationSource,
}

impl WorldPopulation {
    /// Share of the world population for `faction`, in whole percent.
    pub fn percent(&self, faction: Faction) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let count = match faction {
            Faction::Vs => self.vs,
            Faction::Nc => self.nc,
            Faction::Tr => self.tr,
            Faction::Nso => self.ns,
            Faction::None => 0,
        };
        ((count as f64 / self.total as f64) * 100.0).round() as u32
    }
}
