//! Read-only views of the server: the public `system/info` payload, the
//! `system/statistic` summary, and the full `system/debug` dump.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use skyward_core::flight::Flight;
use skyward_core::types::Action;
use skyward_crypto::WirePublicKey;

use crate::action::ActionMaps;
use crate::server::Server;
use crate::stats::{ActionStatistic, StatisticSummary};

// ── system/info ──────────────────────────────────────────────────────────────

/// Public copy of a tier: thresholds, hierarchy and the per-action public
/// keys — everything a client needs, nothing the server must keep private.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierPublicInfo {
    pub id: String,
    #[serde(rename = "validDuration")]
    pub valid_duration_days: i64,
    #[serde(rename = "minCodes")]
    pub min_codes: usize,
    #[serde(rename = "lowerTiers")]
    pub lower_tiers: Vec<String>,
    #[serde(rename = "bookingKey")]
    pub booking_key: WirePublicKey,
    #[serde(rename = "claimKey")]
    pub claim_key: WirePublicKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightPublicInfo {
    pub id: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    pub flights: Vec<FlightPublicInfo>,
    pub tiers: Vec<TierPublicInfo>,
}

// ── system/debug ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ActionDump {
    #[serde(flatten)]
    pub maps: ActionMaps,
    #[serde(rename = "validTokens")]
    pub valid_tokens: HashMap<String, bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierDump {
    pub booking: ActionDump,
    pub claim: ActionDump,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugCode {
    pub id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "mintedFor")]
    pub minted_for: String,
}

/// Everything mutable, as JSON. Private keys are deliberately absent.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DebugSnapshot {
    pub flights: Vec<Flight>,
    pub codes: Vec<DebugCode>,
    #[serde(rename = "clientIDs")]
    pub client_ids: Vec<u32>,
    pub tiers: BTreeMap<String, TierDump>,
}

impl Server {
    /// The `system/info` payload: flight ids plus public tier copies, in
    /// verification priority order.
    pub fn system_info(&self) -> SystemInfo {
        let shared = self.op_guard();
        let flights = shared
            .flights
            .keys()
            .map(|&id| FlightPublicInfo { id })
            .collect();

        let tiers = self
            .catalog()
            .priority_order()
            .iter()
            .map(|&idx| {
                let tier = self.catalog().tier(idx);
                TierPublicInfo {
                    id: tier.id.clone(),
                    valid_duration_days: tier.valid_duration_days,
                    min_codes: tier.min_codes,
                    lower_tiers: tier
                        .lower
                        .iter()
                        .map(|&l| self.catalog().tier(l).id.clone())
                        .collect(),
                    booking_key: WirePublicKey::from_key(
                        self.action_state(idx, Action::Booking).keypair().public(),
                    ),
                    claim_key: WirePublicKey::from_key(
                        self.action_state(idx, Action::Claim).keypair().public(),
                    ),
                }
            })
            .collect();

        SystemInfo { flights, tiers }
    }

    /// The `system/statistic` payload.
    pub fn statistics(&self) -> StatisticSummary {
        let mut tiers = BTreeMap::new();
        for (idx, tier) in self.catalog().iter() {
            let entries = Action::ALL
                .iter()
                .map(|&action| ActionStatistic {
                    action: action.to_string(),
                    maps: self.action_state(idx, action).stats_snapshot(),
                })
                .collect();
            tiers.insert(tier.id.clone(), entries);
        }
        StatisticSummary {
            tiers,
            counters: self.counters().clone(),
        }
    }

    /// The `system/debug` payload: a deep copy of all mutable state.
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let shared = self.op_guard();

        let mut codes: Vec<DebugCode> = shared
            .registry
            .iter()
            .map(|code| DebugCode {
                id: code.id.clone(),
                created_at: code.created_at,
                minted_for: self.catalog().tier(code.minted_for).id.clone(),
            })
            .collect();
        codes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut tiers = BTreeMap::new();
        for (idx, tier) in self.catalog().iter() {
            let (booking_maps, booking_tokens) = self.action_state(idx, Action::Booking).dump();
            let (claim_maps, claim_tokens) = self.action_state(idx, Action::Claim).dump();
            tiers.insert(
                tier.id.clone(),
                TierDump {
                    booking: ActionDump {
                        maps: booking_maps,
                        valid_tokens: booking_tokens,
                    },
                    claim: ActionDump {
                        maps: claim_maps,
                        valid_tokens: claim_tokens,
                    },
                },
            );
        }

        DebugSnapshot {
            flights: shared.flights.values().cloned().collect(),
            codes,
            client_ids: shared.client_ids.clone(),
            tiers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_lists_tiers_most_senior_first() {
        let server = Server::with_default_catalog().unwrap();
        let info = server.system_info();
        let ids: Vec<&str> = info.tiers.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "middle", "low"]);
        assert_eq!(info.flights.len(), 100);
        assert_eq!(info.tiers[0].lower_tiers, vec!["middle", "low"]);
    }

    #[test]
    fn info_exposes_distinct_keys_per_action() {
        let server = Server::with_default_catalog().unwrap();
        let info = server.system_info();
        for tier in &info.tiers {
            assert_ne!(tier.booking_key, tier.claim_key);
        }
    }

    #[test]
    fn debug_snapshot_serializes() {
        let server = Server::with_default_catalog().unwrap();
        server.register();
        let snapshot = server.debug_snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["clientIDs"], serde_json::json!([0]));
        assert!(json["tiers"]["middle"]["claim"]["validTokens"].is_object());
    }

    #[test]
    fn statistics_cover_every_tier_and_action() {
        let server = Server::with_default_catalog().unwrap();
        let stats = server.statistics();
        assert_eq!(stats.tiers.len(), 3);
        for entries in stats.tiers.values() {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].maps.len(), 10);
        }
    }
}
