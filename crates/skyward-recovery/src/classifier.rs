//! The recovery classifier and recovery test.
//!
//! `can_be_used_for_recovery` is a pure query: given the (tier, Claim) state
//! and an address bundle, it decides which of the five recovery situations
//! applies and which token the client needs next. It takes only the per-tier
//! maps lock, so it can run while booking-side traffic proceeds.
//!
//! `recovery_test` re-runs the classifier under the server-wide lock and
//! releases the stored tokens once the caller has proven chain continuity
//! with the matching pkr.

use tracing::debug;

use skyward_core::error::SkywardError;
use skyward_core::types::{Action, AddressBundle};
use skyward_state::Server;

use crate::status::RecoveryStatus;

/// Classify `bundle` against the chain state of `tier_id`.
///
/// Returns the status and the token the client acts on next: the still-valid
/// chain token for `AfterAccess`, otherwise the recovery token the client
/// must blind into a pkr. `Failure` situations surface as errors so the
/// caller can forward the reason.
pub fn can_be_used_for_recovery(
    server: &Server,
    tier_id: &str,
    bundle: &AddressBundle,
) -> Result<(RecoveryStatus, String), SkywardError> {
    let tier = server.tier_idx(tier_id)?;
    let state = server.action_state(tier, Action::Claim);
    let seed_hex = bundle.seed_hex();

    // One guard for the whole classification: the reads must see a single
    // consistent snapshot of the chain.
    let maps = state.maps();

    let current = maps.address_for_seed(&seed_hex).unwrap_or_default();
    if current.is_empty() || current != bundle.address {
        return Err(SkywardError::AddressNotOnChain);
    }

    let chain_token = maps.token_at_address(&current).unwrap_or_default();
    if state.is_token_valid(&chain_token) {
        // The endpoint's token was never spent on a participation.
        if maps.access_address_for_seed(&seed_hex).as_deref() == Some(current.as_str()) {
            return Ok((RecoveryStatus::AfterAccess, chain_token));
        }
        let penultimate = maps
            .penultimate_for_seed(&seed_hex)
            .filter(|a| !a.is_empty())
            .ok_or(SkywardError::NoPenultimateAddress)?;
        let recovery = maps.recovery_at_address(&penultimate).unwrap_or_default();
        if maps.access_address_for_seed(&seed_hex).as_deref() == Some(penultimate.as_str()) {
            Ok((RecoveryStatus::AfterFirstAddressUpdate, recovery))
        } else {
            Ok((RecoveryStatus::PenultimateAddress, recovery))
        }
    } else {
        // Spent token: the crash happened after a participation.
        let recovery = maps.recovery_at_address(&current).unwrap_or_default();
        Ok((RecoveryStatus::RecoveryTest, recovery))
    }
}

/// Verify a recovery claim and hand back the tokens a reconstructed client
/// needs to continue its chain: `(token, recovery_token, bonus_data)`.
///
/// The `recovery_token` parameter is carried for wire compatibility; the
/// classification is re-derived from state alone.
pub fn recovery_test(
    server: &Server,
    tier_id: &str,
    _recovery_token: &str,
    pkr: &str,
    bundle: &AddressBundle,
) -> Result<(String, String, String), SkywardError> {
    let _serial = server.op_guard();

    let (status, _) = can_be_used_for_recovery(server, tier_id, bundle)?;

    let tier = server.tier_idx(tier_id)?;
    let state = server.action_state(tier, Action::Claim);
    let maps = state.maps();

    debug!(%tier_id, %status, "recovery test");
    match status {
        RecoveryStatus::AfterAccess => {
            // The client never rotated; it only needs its recovery token back.
            let recovery = maps.recovery_at_address(&bundle.address).unwrap_or_default();
            Ok((String::new(), recovery, String::new()))
        }
        RecoveryStatus::AfterFirstAddressUpdate => {
            // pkr must prove the one address update that created this endpoint.
            let updated = maps
                .address_update_for_pkr(pkr)
                .ok_or(SkywardError::PkrNoAddressUpdate)?;
            if updated != bundle.address {
                return Err(SkywardError::PkrAddressMismatch);
            }
            let token = maps.token_at_address(&bundle.address).unwrap_or_default();
            let recovery = maps.recovery_at_address(&bundle.address).unwrap_or_default();
            Ok((token, recovery, String::new()))
        }
        RecoveryStatus::RecoveryTest => {
            // The crash ate a participation result; replay it by pkr.
            let payload = maps
                .claim_payload_for_pkr(pkr)
                .ok_or(SkywardError::PkrNoClaim)?;
            Ok((payload.token, payload.recovery_token, payload.bonus_data))
        }
        RecoveryStatus::PenultimateAddress => {
            // Continuity runs through the participation before the last
            // rotation: its pkr vouches for the chain, the endpoint supplies
            // the live token pair, the participation supplies the payload.
            let payload = maps
                .claim_payload_for_pkr(pkr)
                .ok_or(SkywardError::PkrNoClaim)?;
            let token = maps.token_at_address(&bundle.address).unwrap_or_default();
            let recovery = maps.recovery_at_address(&bundle.address).unwrap_or_default();
            Ok((token, recovery, payload.bonus_data))
        }
        RecoveryStatus::Failure => Err(SkywardError::RecoveryNotPossible),
    }
}
