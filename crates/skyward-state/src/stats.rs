//! Access statistics.
//!
//! Every relational map of a (tier, action) state is counted: reads, writes
//! and current length. The counters feed `system/statistic` and exist to
//! make the storage cost of the unlinkability maps observable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The instrumented maps of one action state, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapName {
    SeedToAddress,
    SeedToAccountId,
    AddressToToken,
    TokenToSeed,
    ValidTokens,
    AddressToRecovery,
    SeedToAccessAddress,
    PenultimateAddress,
    PkrToAddressUpdate,
    PkrToClaimPayload,
}

pub const MAP_COUNT: usize = 10;

impl MapName {
    pub const ALL: [MapName; MAP_COUNT] = [
        MapName::SeedToAddress,
        MapName::SeedToAccountId,
        MapName::AddressToToken,
        MapName::TokenToSeed,
        MapName::ValidTokens,
        MapName::AddressToRecovery,
        MapName::SeedToAccessAddress,
        MapName::PenultimateAddress,
        MapName::PkrToAddressUpdate,
        MapName::PkrToClaimPayload,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MapName::SeedToAddress => "SeedToAddress",
            MapName::SeedToAccountId => "SeedToAccountID",
            MapName::AddressToToken => "AddressToToken",
            MapName::TokenToSeed => "TokenToSeed",
            MapName::ValidTokens => "ValidTokens",
            MapName::AddressToRecovery => "AddressToRecovery",
            MapName::SeedToAccessAddress => "SeedToAccessAdr",
            MapName::PenultimateAddress => "PenultimateAdr",
            MapName::PkrToAddressUpdate => "PkrToAdrUpd",
            MapName::PkrToClaimPayload => "PkrToBonusData",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Read/write/length counters for one map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapStat {
    pub name: String,
    pub reads: u64,
    pub writes: u64,
    pub length: usize,
}

/// All counters of one action state. Guarded by its own mutex in
/// [`crate::ActionState`], so recording never contends with map access.
#[derive(Debug)]
pub struct MapStats {
    slots: [MapStat; MAP_COUNT],
}

impl Default for MapStats {
    fn default() -> Self {
        let slots = MapName::ALL.map(|name| MapStat {
            name: name.name().to_string(),
            ..MapStat::default()
        });
        Self { slots }
    }
}

impl MapStats {
    pub fn record_read(&mut self, name: MapName) {
        self.slots[name.slot()].reads += 1;
    }

    pub fn record_write(&mut self, name: MapName, len: usize) {
        let slot = &mut self.slots[name.slot()];
        slot.writes += 1;
        slot.length = len;
    }

    pub fn snapshot(&self) -> Vec<MapStat> {
        self.slots.to_vec()
    }
}

// ── Endpoint counters ────────────────────────────────────────────────────────

/// How often each wire endpoint was called since startup (or the last reset).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCounters {
    pub system_info: u64,
    pub register: u64,
    pub reset: u64,
    pub debug: u64,
    pub statistic: u64,
    pub exit: u64,
    pub send_booking: u64,
    pub get_booking_code: u64,
    pub blind_signature: u64,
    pub access_bonus_system: u64,
    pub set_address: u64,
    pub participate: u64,
    pub can_be_used_for_recovery: u64,
    pub recovery_test: u64,
    pub last_adr_bundle: u64,
}

// ── Wire summary ─────────────────────────────────────────────────────────────

/// Map statistics of one action of one tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStatistic {
    pub action: String,
    pub maps: Vec<MapStat>,
}

/// The `system/statistic` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticSummary {
    pub tiers: BTreeMap<String, Vec<ActionStatistic>>,
    pub counters: EndpointCounters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_line_up_with_names() {
        let stats = MapStats::default();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.len(), MAP_COUNT);
        for (slot, name) in snapshot.iter().zip(MapName::ALL) {
            assert_eq!(slot.name, name.name());
        }
    }

    #[test]
    fn recording_updates_the_right_slot() {
        let mut stats = MapStats::default();
        stats.record_read(MapName::AddressToToken);
        stats.record_write(MapName::AddressToToken, 4);
        stats.record_write(MapName::ValidTokens, 9);

        let snapshot = stats.snapshot();
        let att = snapshot.iter().find(|s| s.name == "AddressToToken").unwrap();
        assert_eq!((att.reads, att.writes, att.length), (1, 1, 4));
        let vt = snapshot.iter().find(|s| s.name == "ValidTokens").unwrap();
        assert_eq!((vt.reads, vt.writes, vt.length), (0, 1, 9));
    }
}
