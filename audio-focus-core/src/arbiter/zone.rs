use std::collections::{BTreeMap, BTreeSet};

use crate::models::error::FocusError;

/// Zone every pid belongs to unless assigned elsewhere.
pub const DEFAULT_ZONE_ID: i32 = 0;

/// Pid → zone assignment.
///
/// A pid belongs to at most one explicit zone; pids not listed anywhere are
/// in `DEFAULT_ZONE_ID`. The default zone always exists and is never stored.
#[derive(Debug, Clone, Default)]
pub struct ZoneTable {
    zones: BTreeMap<i32, BTreeSet<i32>>,
}

impl ZoneTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, zone_id: i32) -> bool {
        zone_id == DEFAULT_ZONE_ID || self.zones.contains_key(&zone_id)
    }

    pub fn zone_of(&self, pid: i32) -> i32 {
        self.zones
            .iter()
            .find(|(_, pids)| pids.contains(&pid))
            .map(|(id, _)| *id)
            .unwrap_or(DEFAULT_ZONE_ID)
    }

    /// Explicit zone ids, ascending. Does not include the default zone.
    pub fn zone_ids(&self) -> Vec<i32> {
        self.zones.keys().copied().collect()
    }

    pub fn pids(&self, zone_id: i32) -> Vec<i32> {
        self.zones
            .get(&zone_id)
            .map(|pids| pids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Create `zone_id` holding `pids`, taking them from whatever zone had them.
    pub fn create(&mut self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        if zone_id == DEFAULT_ZONE_ID {
            return Err(FocusError::InvalidParam("zone 0 is the default zone".into()));
        }
        if self.zones.contains_key(&zone_id) {
            return Err(FocusError::InvalidParam(format!("zone {} already exists", zone_id)));
        }
        self.detach(pids);
        self.zones.insert(zone_id, pids.iter().copied().collect());
        Ok(())
    }

    pub fn add(&mut self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        if !self.zones.contains_key(&zone_id) {
            return Err(FocusError::InvalidParam(format!("no zone {}", zone_id)));
        }
        self.detach(pids);
        if let Some(members) = self.zones.get_mut(&zone_id) {
            members.extend(pids.iter().copied());
        }
        Ok(())
    }

    /// Move `pids` from `zone_id` back to the default zone. Returns the pids
    /// that were actually members.
    pub fn remove(&mut self, zone_id: i32, pids: &[i32]) -> Result<Vec<i32>, FocusError> {
        let members = self
            .zones
            .get_mut(&zone_id)
            .ok_or_else(|| FocusError::InvalidParam(format!("no zone {}", zone_id)))?;
        Ok(pids.iter().copied().filter(|pid| members.remove(pid)).collect())
    }

    /// Drop the zone. Returns its pids, or `None` if it did not exist.
    pub fn release(&mut self, zone_id: i32) -> Option<Vec<i32>> {
        self.zones
            .remove(&zone_id)
            .map(|pids| pids.into_iter().collect())
    }

    fn detach(&mut self, pids: &[i32]) {
        for members in self.zones.values_mut() {
            for pid in pids {
                members.remove(pid);
            }
        }
    }
}
