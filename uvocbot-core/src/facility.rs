//! Facility capture events and the map regions they resolve to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::planetside::{Faction, ZoneId};

/// A facility changed (or kept) ownership.
///
/// Only `facility_id` matters to the resolution loop; the remaining fields
/// are carried through untouched for whoever handles the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityControlEvent {
    pub facility_id: u64,
    pub world_id: u32,
    pub zone_id: u32,
    pub old_faction_id: u32,
    pub new_faction_id: u32,
    /// Outfit credited with the capture, if any.
    pub outfit_id: Option<u64>,
    /// Seconds the previous owner held the facility.
    pub duration_held: u64,
    pub timestamp: DateTime<Utc>,
}

impl FacilityControlEvent {
    /// A capture changes the owning faction; a defense does not.
    pub fn is_capture(&self) -> bool {
        self.old_faction_id != self.new_faction_id
    }

    pub fn new_faction(&self) -> Option<Faction> {
        Faction::from_id(self.new_faction_id)
    }

    pub fn old_faction(&self) -> Option<Faction> {
        Faction::from_id(self.old_faction_id)
    }

    pub fn zone(&self) -> Option<ZoneId> {
        ZoneId::from_id(self.zone_id)
    }
}

/// The static map region a facility sits in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRegion {
    pub map_region_id: u64,
    pub facility_id: u64,
    pub facility_name: String,
    pub facility_type: Option<String>,
    pub zone_id: u32,
}

impl MapRegion {
    pub fn zone(&self) -> Option<ZoneId> {
        ZoneId::from_id(self.zone_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(old: u32, new: u32) -> FacilityControlEvent {
        FacilityControlEvent {
            facility_id: 222_280,
            world_id: 1,
            zone_id: 2,
            old_faction_id: old,
            new_faction_id: new,
            outfit_id: Some(37_570_391_403_474_619),
            duration_held: 600,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_capture_vs_defense() {
        assert!(event(1, 2).is_capture());
        assert!(!event(3, 3).is_capture());
    }

    #[test]
    fn test_faction_and_zone_accessors() {
        let evt = event(1, 3);
        assert_eq!(evt.old_faction(), Some(Faction::Vs));
        assert_eq!(evt.new_faction(), Some(Faction::Tr));
        assert_eq!(evt.zone(), Some(ZoneId::Indar));
    }
}
