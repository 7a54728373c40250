//! Bridge counters

use std::cell::Cell;

use serde::Serialize;

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) proxies_created: Cell<u64>,
    pub(crate) proxies_reclaimed: Cell<u64>,
    pub(crate) proxies_forgotten: Cell<u64>,
    pub(crate) thunks_created: Cell<u64>,
    pub(crate) thunks_reclaimed: Cell<u64>,
    pub(crate) script_objects_created: Cell<u64>,
}

pub(crate) fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

/// Point-in-time snapshot of a bridge's tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub proxies_created: u64,
    pub proxies_live: usize,
    pub proxies_reclaimed: u64,
    pub proxies_forgotten: u64,
    pub thunks_created: u64,
    pub thunks_live: usize,
    pub thunks_reclaimed: u64,
    pub script_objects_created: u64,
    pub script_objects_live: usize,
    pub identifiers: usize,
}

impl BridgeStats {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
