//! Concurrent in-memory lookup caches rebuilt fresh on every scan.

use dashmap::{DashMap, DashSet};

/// Per-scan working set: depot ownership and app-name lookups hot enough
/// to need a lock-free map, plus the set of depot ids already resolved
/// this run so the orphan pass doesn't redo work.
#[derive(Default)]
pub struct EngineCaches {
    pub owner_cache: DashMap<u32, u32>,
    pub name_cache: DashMap<u32, String>,
    pub scanned: DashSet<u32>,
}

impl EngineCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_owner(&self, depot_id: u32, app_id: u32) {
        self.owner_cache.insert(depot_id, app_id);
        self.scanned.insert(depot_id);
    }

    pub fn record_name(&self, app_id: u32, name: String) {
        self.name_cache.insert(app_id, name);
    }

    pub fn owner_of(&self, depot_id: u32) -> Option<u32> {
        self.owner_cache.get(&depot_id).map(|r| *r)
    }

    pub fn name_of(&self, app_id: u32) -> Option<String> {
        self.name_cache.get(&app_id).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_owner_also_marks_scanned() {
        let caches = EngineCaches::new();
        caches.record_owner(10, 100);
        assert_eq!(caches.owner_of(10), Some(100));
        assert!(caches.scanned.contains(&10));
    }
}
