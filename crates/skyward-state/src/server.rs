//! The server: tier catalog, per-tier action states, and the shared
//! booking-side state under the coarse operation lock.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use tracing::info;

use skyward_core::error::SkywardError;
use skyward_core::flight::{default_flight_map, Flight};
use skyward_core::types::Action;
use skyward_tiers::{default_catalog, CodeRegistry, TierCatalog, TierIdx};

use crate::action::ActionState;
use crate::lock;
use crate::stats::EndpointCounters;

/// Booking and Claim state of one tier.
pub struct TierStates {
    pub booking: ActionState,
    pub claim: ActionState,
}

impl TierStates {
    fn new() -> Result<Self, SkywardError> {
        Ok(Self {
            booking: ActionState::new(Action::Booking)?,
            claim: ActionState::new(Action::Claim)?,
        })
    }

    pub fn state(&self, action: Action) -> &ActionState {
        match action {
            Action::Booking => &self.booking,
            Action::Claim => &self.claim,
        }
    }
}

/// Everything the coarse server-wide mutex guards directly: the code
/// registry, the flight list, and the registered client ids. Operations that
/// only need serialization (not the data) still take this lock.
#[derive(Default)]
pub struct SharedState {
    pub registry: CodeRegistry,
    pub flights: BTreeMap<u32, Flight>,
    pub client_ids: Vec<u32>,
}

pub struct Server {
    catalog: TierCatalog,
    /// Parallel to the catalog's tier indices.
    states: Vec<TierStates>,
    shared: Mutex<SharedState>,
    counters: Mutex<EndpointCounters>,
}

impl Server {
    /// Build a server over `catalog`. Generates one RSA keypair per
    /// (tier, action) — the expensive part of startup.
    pub fn new(catalog: TierCatalog) -> Result<Self, SkywardError> {
        let mut states = Vec::with_capacity(catalog.len());
        for (_, tier) in catalog.iter() {
            info!(tier = %tier.id, "generating blind-signature keypairs");
            states.push(TierStates::new()?);
        }
        Ok(Self {
            catalog,
            states,
            shared: Mutex::new(SharedState {
                registry: CodeRegistry::new(),
                flights: default_flight_map(),
                client_ids: Vec::new(),
            }),
            counters: Mutex::new(EndpointCounters::default()),
        })
    }

    pub fn with_default_catalog() -> Result<Self, SkywardError> {
        Self::new(default_catalog())
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    pub fn tier_idx(&self, tier_id: &str) -> Result<TierIdx, SkywardError> {
        self.catalog
            .get(tier_id)
            .ok_or_else(|| SkywardError::UnknownTier(tier_id.to_string()))
    }

    pub fn action_state(&self, tier: TierIdx, action: Action) -> &ActionState {
        self.states[tier].state(action)
    }

    /// The coarse server-wide lock. Operations that must not interleave take
    /// this guard for their full duration, whether or not they touch the
    /// shared data behind it.
    pub fn op_guard(&self) -> MutexGuard<'_, SharedState> {
        lock(&self.shared)
    }

    pub fn counters(&self) -> MutexGuard<'_, EndpointCounters> {
        lock(&self.counters)
    }

    /// Hand out the next client id, starting from 0.
    pub fn register(&self) -> u32 {
        let mut shared = self.op_guard();
        let client_id = shared.client_ids.len() as u32;
        shared.client_ids.push(client_id);
        client_id
    }

    /// Clear every mutable structure: registry, flights, clients, all
    /// relational maps, token sets and statistics. The blind-signature
    /// keypairs are startup resources and survive, so public keys cached by
    /// clients stay usable.
    pub fn reset(&self) {
        let mut shared = self.op_guard();
        shared.registry.clear();
        shared.flights = default_flight_map();
        shared.client_ids.clear();
        for tier in &self.states {
            tier.booking.clear();
            tier.claim.clear();
        }
        *lock(&self.counters) = EndpointCounters::default();
        info!("server state reset");
    }

    /// The newest chain endpoint recorded for a seed — the starting point of
    /// a reconstructing client's scan. Reads only the (tier, Claim) maps.
    pub fn last_address_bundle(
        &self,
        seed_hex: &str,
        tier_id: &str,
    ) -> Result<(String, u32), SkywardError> {
        let tier = self.tier_idx(tier_id)?;
        let maps = self.states[tier].claim.maps();
        let address = maps
            .address_for_seed(seed_hex)
            .ok_or(SkywardError::UnknownSeed)?;
        let account_id = maps.account_for_seed(seed_hex).ok_or_else(|| {
            SkywardError::Corrupt("seed has an address but no account id".into())
        })?;
        Ok((address, account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_hands_out_monotonic_ids() {
        let server = Server::with_default_catalog().unwrap();
        assert_eq!(server.register(), 0);
        assert_eq!(server.register(), 1);
        assert_eq!(server.register(), 2);
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let server = Server::with_default_catalog().unwrap();
        assert!(matches!(
            server.tier_idx("platinum"),
            Err(SkywardError::UnknownTier(_))
        ));
    }

    #[test]
    fn reset_clears_clients_and_maps() {
        let server = Server::with_default_catalog().unwrap();
        server.register();
        let tier = server.tier_idx("middle").unwrap();
        server
            .action_state(tier, Action::Claim)
            .maps()
            .set_address_for_seed("s", "a");
        server.reset();
        assert_eq!(server.register(), 0);
        assert!(server
            .action_state(tier, Action::Claim)
            .maps()
            .address_for_seed("s")
            .is_none());
    }

    #[test]
    fn last_address_bundle_requires_known_seed() {
        let server = Server::with_default_catalog().unwrap();
        assert!(matches!(
            server.last_address_bundle("cafe", "middle"),
            Err(SkywardError::UnknownSeed)
        ));
    }
}
