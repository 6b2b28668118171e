//! Per-(tier, action) state.
//!
//! Each tier keeps two of these, one for Booking and one for Claim. The
//! relational maps drive the pseudonymous address chain; `valid_tokens`
//! sits under its own finer mutex because token validity is checked and
//! consumed by the blind-signature path without touching the wider maps.
//!
//! All map access goes through [`MapsGuard`], whose accessors bump the
//! read/write statistics as a side effect — instrumentation cannot be
//! forgotten at a call site.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use skyward_core::error::SkywardError;
use skyward_core::types::Action;
use skyward_crypto::BlindKeyPair;

use crate::lock;
use crate::stats::{MapName, MapStats};

/// What a successful Participate handed out, retrievable later by pkr.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimPayload {
    pub token: String,
    #[serde(rename = "recoveryToken")]
    pub recovery_token: String,
    #[serde(rename = "bonusData")]
    pub bonus_data: String,
}

/// The relational maps of one action state. Consumed entries in
/// `address_to_token` / `token_to_seed` are set to the empty string rather
/// than removed: a key that was ever present marks its address or token as
/// burned, which is what makes the freshness check in SetAddress work.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMaps {
    pub(crate) seed_to_address: HashMap<String, String>,
    pub(crate) seed_to_account_id: HashMap<String, u32>,
    pub(crate) address_to_token: HashMap<String, String>,
    pub(crate) token_to_seed: HashMap<String, String>,
    pub(crate) address_to_recovery: HashMap<String, String>,
    pub(crate) seed_to_access_address: HashMap<String, String>,
    pub(crate) penultimate_address: HashMap<String, String>,
    pub(crate) pkr_to_address_update: HashMap<String, String>,
    pub(crate) pkr_to_claim_payload: HashMap<String, ClaimPayload>,
}

pub struct ActionState {
    action: Action,
    keypair: BlindKeyPair,
    maps: Mutex<ActionMaps>,
    valid_tokens: Mutex<HashMap<String, bool>>,
    stats: Mutex<MapStats>,
}

impl ActionState {
    pub fn new(action: Action) -> Result<Self, SkywardError> {
        Ok(Self {
            action,
            keypair: BlindKeyPair::generate()?,
            maps: Mutex::new(ActionMaps::default()),
            valid_tokens: Mutex::new(HashMap::new()),
            stats: Mutex::new(MapStats::default()),
        })
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn keypair(&self) -> &BlindKeyPair {
        &self.keypair
    }

    /// Lock the relational maps. The guard records statistics on every
    /// accessor call; hold it for the whole of a classifier run so the
    /// reads are atomic against writers.
    pub fn maps(&self) -> MapsGuard<'_> {
        MapsGuard {
            maps: lock(&self.maps),
            stats: &self.stats,
        }
    }

    // ── Token lifecycle (finer mutex) ────────────────────────────────────────

    /// Register a freshly issued token as valid-and-unused.
    pub fn add_valid_token(&self, token: &str) -> Result<(), SkywardError> {
        let mut tokens = lock(&self.valid_tokens);
        match tokens.get(token).copied() {
            Some(true) => return Err(SkywardError::TokenAlreadyUsed),
            Some(false) => return Err(SkywardError::TokenCollision),
            None => {
                tokens.insert(token.to_string(), false);
            }
        }
        let len = tokens.len();
        drop(tokens);
        self.record_write(MapName::ValidTokens, len);
        Ok(())
    }

    /// Known and not yet used. "unknown" and "used" both answer false.
    pub fn is_token_valid(&self, token: &str) -> bool {
        let tokens = lock(&self.valid_tokens);
        self.record_read(MapName::ValidTokens);
        matches!(tokens.get(token).copied(), Some(false))
    }

    /// Atomically check validity and mark the token used. Exactly one caller
    /// can ever succeed per token.
    pub fn consume_token(&self, token: &str) -> Result<(), SkywardError> {
        let mut tokens = lock(&self.valid_tokens);
        match tokens.get_mut(token) {
            Some(used) if !*used => *used = true,
            _ => return Err(SkywardError::TokenNotValid),
        }
        let len = tokens.len();
        drop(tokens);
        self.record_write(MapName::ValidTokens, len);
        Ok(())
    }

    /// Drop every mutable structure; the keypair stays.
    pub fn clear(&self) {
        *lock(&self.maps) = ActionMaps::default();
        lock(&self.valid_tokens).clear();
        *lock(&self.stats) = MapStats::default();
    }

    pub fn stats_snapshot(&self) -> Vec<crate::stats::MapStat> {
        lock(&self.stats).snapshot()
    }

    pub(crate) fn dump(&self) -> (ActionMaps, HashMap<String, bool>) {
        (lock(&self.maps).clone(), lock(&self.valid_tokens).clone())
    }

    fn record_read(&self, name: MapName) {
        lock(&self.stats).record_read(name);
    }

    fn record_write(&self, name: MapName, len: usize) {
        lock(&self.stats).record_write(name, len);
    }
}

impl std::fmt::Debug for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActionState({})", self.action)
    }
}

// ── MapsGuard ────────────────────────────────────────────────────────────────

/// Exclusive view of the relational maps with instrumented accessors.
pub struct MapsGuard<'a> {
    maps: MutexGuard<'a, ActionMaps>,
    stats: &'a Mutex<MapStats>,
}

impl MapsGuard<'_> {
    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn address_for_seed(&self, seed_hex: &str) -> Option<String> {
        self.read(MapName::SeedToAddress);
        self.maps.seed_to_address.get(seed_hex).cloned()
    }

    pub fn account_for_seed(&self, seed_hex: &str) -> Option<u32> {
        self.read(MapName::SeedToAccountId);
        self.maps.seed_to_account_id.get(seed_hex).copied()
    }

    pub fn token_at_address(&self, address: &str) -> Option<String> {
        self.read(MapName::AddressToToken);
        self.maps.address_to_token.get(address).cloned()
    }

    /// Freshness test for SetAddress: true if the address was *ever* a chain
    /// endpoint, including burned ones.
    pub fn address_seen(&self, address: &str) -> bool {
        self.read(MapName::AddressToToken);
        self.maps.address_to_token.contains_key(address)
    }

    pub fn recovery_at_address(&self, address: &str) -> Option<String> {
        self.read(MapName::AddressToRecovery);
        self.maps.address_to_recovery.get(address).cloned()
    }

    pub fn access_address_for_seed(&self, seed_hex: &str) -> Option<String> {
        self.read(MapName::SeedToAccessAddress);
        self.maps.seed_to_access_address.get(seed_hex).cloned()
    }

    pub fn penultimate_for_seed(&self, seed_hex: &str) -> Option<String> {
        self.read(MapName::PenultimateAddress);
        self.maps.penultimate_address.get(seed_hex).cloned()
    }

    pub fn address_update_for_pkr(&self, pkr: &str) -> Option<String> {
        self.read(MapName::PkrToAddressUpdate);
        self.maps.pkr_to_address_update.get(pkr).cloned()
    }

    pub fn claim_payload_for_pkr(&self, pkr: &str) -> Option<ClaimPayload> {
        self.read(MapName::PkrToClaimPayload);
        self.maps.pkr_to_claim_payload.get(pkr).cloned()
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    pub fn set_address_for_seed(&mut self, seed_hex: &str, address: &str) {
        self.maps
            .seed_to_address
            .insert(seed_hex.to_string(), address.to_string());
        self.wrote(MapName::SeedToAddress, self.maps.seed_to_address.len());
    }

    pub fn set_account_for_seed(&mut self, seed_hex: &str, account_id: u32) {
        self.maps
            .seed_to_account_id
            .insert(seed_hex.to_string(), account_id);
        self.wrote(MapName::SeedToAccountId, self.maps.seed_to_account_id.len());
    }

    pub fn set_token_at_address(&mut self, address: &str, token: &str) {
        self.maps
            .address_to_token
            .insert(address.to_string(), token.to_string());
        self.wrote(MapName::AddressToToken, self.maps.address_to_token.len());
    }

    pub fn set_seed_for_token(&mut self, token: &str, seed_hex: &str) {
        self.maps
            .token_to_seed
            .insert(token.to_string(), seed_hex.to_string());
        self.wrote(MapName::TokenToSeed, self.maps.token_to_seed.len());
    }

    pub fn set_recovery_at_address(&mut self, address: &str, recovery_token: &str) {
        self.maps
            .address_to_recovery
            .insert(address.to_string(), recovery_token.to_string());
        self.wrote(MapName::AddressToRecovery, self.maps.address_to_recovery.len());
    }

    /// The chain anchor. Written once per seed; later accesses keep the
    /// original anchor.
    pub fn set_access_address_once(&mut self, seed_hex: &str, address: &str) {
        self.maps
            .seed_to_access_address
            .entry(seed_hex.to_string())
            .or_insert_with(|| address.to_string());
        self.wrote(
            MapName::SeedToAccessAddress,
            self.maps.seed_to_access_address.len(),
        );
    }

    pub fn set_address_update_for_pkr(&mut self, pkr: &str, address: &str) {
        self.maps
            .pkr_to_address_update
            .insert(pkr.to_string(), address.to_string());
        self.wrote(
            MapName::PkrToAddressUpdate,
            self.maps.pkr_to_address_update.len(),
        );
    }

    pub fn set_claim_payload_for_pkr(&mut self, pkr: &str, payload: ClaimPayload) {
        self.maps
            .pkr_to_claim_payload
            .insert(pkr.to_string(), payload);
        self.wrote(
            MapName::PkrToClaimPayload,
            self.maps.pkr_to_claim_payload.len(),
        );
    }

    /// Advance the chain of `seed_hex` to `new_address`.
    ///
    /// The previous endpoint's token mappings are burned (emptied, not
    /// removed) and the old address becomes the penultimate one.
    /// `address_to_recovery` keeps the old entry: deleting it would strand
    /// any client that crashed two rotations ago.
    pub fn refresh_chain(
        &mut self,
        seed_hex: &str,
        new_address: &str,
        new_account_id: u32,
        new_token: &str,
        new_recovery_token: &str,
    ) {
        let old_address = self.address_for_seed(seed_hex).unwrap_or_default();
        let old_token = self.token_at_address(&old_address).unwrap_or_default();

        self.maps.token_to_seed.insert(old_token, String::new());
        self.wrote(MapName::TokenToSeed, self.maps.token_to_seed.len());
        self.set_seed_for_token(new_token, seed_hex);

        self.maps
            .address_to_token
            .insert(old_address.clone(), String::new());
        self.wrote(MapName::AddressToToken, self.maps.address_to_token.len());
        self.set_token_at_address(new_address, new_token);

        self.set_address_for_seed(seed_hex, new_address);
        self.set_account_for_seed(seed_hex, new_account_id);

        self.maps
            .penultimate_address
            .insert(seed_hex.to_string(), old_address);
        self.wrote(
            MapName::PenultimateAddress,
            self.maps.penultimate_address.len(),
        );

        self.set_recovery_at_address(new_address, new_recovery_token);
    }

    fn read(&self, name: MapName) {
        lock(self.stats).record_read(name);
    }

    fn wrote(&self, name: MapName, len: usize) {
        lock(self.stats).record_write(name, len);
    }
}
