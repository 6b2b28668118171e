//! The operation flows of the bonus system.
//!
//! Everything here runs under the coarse server lock: the guard is taken at
//! the top of each operation and held to the end, so flows never interleave.
//! Per-tier map locks nest inside it.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::Utc;
use tracing::{debug, info};

use skyward_core::constants::BONUS_DATA_BYTES;
use skyward_core::error::SkywardError;
use skyward_core::types::{Action, AddressBundle};
use skyward_crypto::{address_from_bundle, generate_token, random_hex, verify};

use skyward_tiers::verify_codes;

use crate::action::ClaimPayload;
use crate::server::Server;

impl Server {
    /// Record a booking and hand back the one-shot token that pays for a
    /// blind-signature request on the Booking side of the tier.
    pub fn booking(
        &self,
        customer_id: u32,
        flight_id: u32,
        tier_id: &str,
    ) -> Result<String, SkywardError> {
        let mut shared = self.op_guard();

        let tier = self.tier_idx(tier_id)?;
        let flight = shared
            .flights
            .get_mut(&flight_id)
            .ok_or(SkywardError::UnknownFlight(flight_id))?;

        let token = generate_token()?;
        self.action_state(tier, Action::Booking)
            .add_valid_token(&token)?;
        flight.add_booking(customer_id, tier_id);

        debug!(%tier_id, flight_id, "booking recorded");
        Ok(token)
    }

    /// Exchange an unblinded booking signature for a fresh bonus code. The
    /// server cannot connect the signature to the token it once signed — that
    /// is the point of the blinding.
    pub fn get_booking_code(
        &self,
        tier_id: &str,
        hash: &[u8],
        sig: &[u8],
    ) -> Result<String, SkywardError> {
        let mut shared = self.op_guard();

        let tier = self.tier_idx(tier_id)?;
        if hash.is_empty() || sig.is_empty() {
            return Err(SkywardError::EmptyHashOrSignature);
        }
        let pk = self.action_state(tier, Action::Booking).keypair().public();
        if !verify(pk, hash, sig) {
            return Err(SkywardError::BlindSignatureInvalid);
        }

        let code = shared.registry.mint(tier, Utc::now())?;
        debug!(%tier_id, "bonus code minted");
        Ok(code)
    }

    /// Sign a blinded value under the (tier, action) key, consuming `token`.
    /// Exactly one signature is ever issued per token.
    pub fn get_blind_signature(
        &self,
        tier_id: &str,
        token: &str,
        blinded: &[u8],
        action: Action,
    ) -> Result<String, SkywardError> {
        let _serial = self.op_guard();

        let tier = self.tier_idx(tier_id)?;
        let state = self.action_state(tier, action);
        state.consume_token(token)?;
        let blind_sig = state.keypair().sign_blinded(blinded);
        Ok(URL_SAFE.encode(blind_sig))
    }

    /// Spend bonus codes to unlock tiers, anchoring the pseudonymous chain of
    /// `bundle` on the Claim side of every unlocked tier. Returns per-tier
    /// tokens and recovery tokens.
    pub fn access_bonus_system(
        &self,
        codes: &[String],
        bundle: &AddressBundle,
    ) -> Result<(BTreeMap<String, String>, BTreeMap<String, String>), SkywardError> {
        let mut shared = self.op_guard();

        let recomputed = address_from_bundle(bundle)?;
        if recomputed != bundle.address {
            return Err(SkywardError::SeedAddressMismatch);
        }

        let unlocked = verify_codes(&mut shared.registry, self.catalog(), codes, Utc::now());
        if unlocked.is_empty() {
            return Err(SkywardError::NoTierAccessible);
        }

        let seed_hex = bundle.seed_hex();
        let mut tokens = BTreeMap::new();
        let mut recovery_tokens = BTreeMap::new();

        for tier in unlocked {
            let tier_id = self.catalog().tier(tier).id.clone();
            let state = self.action_state(tier, Action::Claim);

            let token = generate_token()?;
            let recovery_token = generate_token()?;
            {
                let mut maps = state.maps();
                maps.set_seed_for_token(&token, &seed_hex);
                maps.set_address_for_seed(&seed_hex, &bundle.address);
                maps.set_account_for_seed(&seed_hex, bundle.account_id);
                maps.set_token_at_address(&bundle.address, &token);
                maps.set_recovery_at_address(&bundle.address, &recovery_token);
                maps.set_access_address_once(&seed_hex, &bundle.address);
            }
            state.add_valid_token(&token)?;

            tokens.insert(tier_id.clone(), token);
            recovery_tokens.insert(tier_id, recovery_token);
        }

        info!(tiers = tokens.len(), "bonus system accessed");
        Ok((tokens, recovery_tokens))
    }

    /// Rotate the chain of `bundle.seed` to a fresh address, authorized by a
    /// blind signature under (tier, action). `pkr` is indexed so a
    /// reconstructing client can later prove this rotation was theirs.
    pub fn set_address(
        &self,
        tier_id: &str,
        hash: &[u8],
        sig: &[u8],
        bundle: &AddressBundle,
        action: Action,
        pkr: &str,
    ) -> Result<(String, String), SkywardError> {
        let _serial = self.op_guard();

        let tier = self.tier_idx(tier_id)?;
        let state = self.action_state(tier, action);
        let seed_hex = bundle.seed_hex();

        if state.maps().address_for_seed(&seed_hex).is_none() {
            return Err(SkywardError::UnknownSeed);
        }

        if hash.is_empty() || sig.is_empty() {
            return Err(SkywardError::EmptyHashOrSignature);
        }
        if !verify(state.keypair().public(), hash, sig) {
            return Err(SkywardError::BlindSignatureInvalid);
        }

        let recomputed = address_from_bundle(bundle)?;
        if recomputed != bundle.address {
            return Err(SkywardError::SeedAddressMismatch);
        }

        // A chain never revisits an endpoint, burned or live.
        if state.maps().address_seen(&bundle.address) {
            return Err(SkywardError::AddressAlreadyUsed);
        }
        // The two pkr indexes stay disjoint.
        if state.maps().claim_payload_for_pkr(pkr).is_some() {
            return Err(SkywardError::PkrReused);
        }

        let token = generate_token()?;
        let recovery_token = generate_token()?;
        {
            let mut maps = state.maps();
            maps.refresh_chain(
                &seed_hex,
                &bundle.address,
                bundle.account_id,
                &token,
                &recovery_token,
            );
            maps.set_address_update_for_pkr(pkr, &bundle.address);
        }
        state.add_valid_token(&token)?;

        debug!(%tier_id, action = %action, "address rotated");
        Ok((token, recovery_token))
    }

    /// Draw a reward payload against an unlocked tier. No seed or address is
    /// touched; the claim binds to the chain through the pkr recorded by the
    /// preceding SetAddress.
    pub fn participate(
        &self,
        tier_id: &str,
        hash: &[u8],
        sig: &[u8],
        pkr: &str,
    ) -> Result<(String, String, String), SkywardError> {
        let _serial = self.op_guard();

        let tier = self.tier_idx(tier_id)?;
        let state = self.action_state(tier, Action::Claim);

        if hash.is_empty() || sig.is_empty() {
            return Err(SkywardError::EmptyHashOrSignature);
        }
        if !verify(state.keypair().public(), hash, sig) {
            return Err(SkywardError::BlindSignatureInvalid);
        }
        // The two pkr indexes stay disjoint.
        if state.maps().address_update_for_pkr(pkr).is_some() {
            return Err(SkywardError::PkrReused);
        }

        let token = generate_token()?;
        state.add_valid_token(&token)?;
        let recovery_token = generate_token()?;
        let bonus_data = format!("{tier_id}{}", random_hex(BONUS_DATA_BYTES)?);

        state.maps().set_claim_payload_for_pkr(
            pkr,
            ClaimPayload {
                token: token.clone(),
                recovery_token: recovery_token.clone(),
                bonus_data: bonus_data.clone(),
            },
        );

        debug!(%tier_id, "participation granted");
        Ok((token, recovery_token, bonus_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyward_crypto::{blind, derive_address, full_domain_hash, seed_from_mnemonic, unblind};

    const MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn bundle(seed: &[u8], account_id: u32, address_id: u32) -> AddressBundle {
        AddressBundle {
            seed: seed.to_vec(),
            account_id,
            address_id,
            address: derive_address(seed, account_id, address_id).unwrap(),
        }
    }

    /// Run the client side of one blind-signature exchange: blind a fresh
    /// message, have the server sign it under `token`, unblind.
    fn signed_hash(
        server: &Server,
        tier_id: &str,
        token: &str,
        action: Action,
        msg: &[u8],
    ) -> (Vec<u8>, Vec<u8>) {
        let tier = server.tier_idx(tier_id).unwrap();
        let pk = server.action_state(tier, action).keypair().public().clone();
        let hash = full_domain_hash(msg);
        let (blinded, unblinder) = blind(&pk, &hash).unwrap();
        let blind_sig_b64 = server
            .get_blind_signature(tier_id, token, &blinded, action)
            .unwrap();
        let blind_sig = URL_SAFE.decode(blind_sig_b64.as_bytes()).unwrap();
        let sig = unblind(&pk, &blind_sig, &unblinder).unwrap();
        (hash, sig)
    }

    /// Book once and convert the booking token into a bonus code.
    fn earn_code(server: &Server, tier_id: &str) -> String {
        let token = server.booking(1, 2, tier_id).unwrap();
        let (hash, sig) = signed_hash(server, tier_id, &token, Action::Booking, b"code-req");
        server.get_booking_code(tier_id, &hash, &sig).unwrap()
    }

    #[test]
    fn booking_token_allows_exactly_one_signature() {
        let server = Server::with_default_catalog().unwrap();
        let token = server.booking(1, 2, "middle").unwrap();
        assert!(!token.is_empty());

        let result = server.get_blind_signature("middle", &token, &[0x01], Action::Booking);
        assert!(result.is_ok());

        let second = server.get_blind_signature("middle", &token, &[0x01], Action::Booking);
        assert!(matches!(second, Err(SkywardError::TokenNotValid)));
    }

    #[test]
    fn booking_rejects_unknown_tier_and_flight() {
        let server = Server::with_default_catalog().unwrap();
        assert!(matches!(
            server.booking(1, 2, "platinum"),
            Err(SkywardError::UnknownTier(_))
        ));
        assert!(matches!(
            server.booking(1, 4711, "middle"),
            Err(SkywardError::UnknownFlight(4711))
        ));
    }

    #[test]
    fn booking_code_requires_valid_signature() {
        let server = Server::with_default_catalog().unwrap();
        let result = server.get_booking_code("middle", &[0xaa; 16], &[0xbb; 16]);
        assert!(matches!(result, Err(SkywardError::BlindSignatureInvalid)));
        let result = server.get_booking_code("middle", &[], &[]);
        assert!(matches!(result, Err(SkywardError::EmptyHashOrSignature)));
    }

    #[test]
    fn access_with_unknown_codes_fails() {
        let server = Server::with_default_catalog().unwrap();
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let result = server.access_bonus_system(
            &["x".to_string(), "y".to_string()],
            &bundle(&seed, 0, 0),
        );
        assert!(matches!(result, Err(SkywardError::NoTierAccessible)));
    }

    #[test]
    fn access_rejects_mismatched_bundle() {
        let server = Server::with_default_catalog().unwrap();
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let mut b = bundle(&seed, 0, 0);
        b.address_id = 3; // address string no longer matches the indices
        let result = server.access_bonus_system(&[], &b);
        assert!(matches!(result, Err(SkywardError::SeedAddressMismatch)));
    }

    #[test]
    fn access_with_three_middle_codes_unlocks_two_tiers() {
        let server = Server::with_default_catalog().unwrap();
        let codes: Vec<String> = (0..3).map(|_| earn_code(&server, "middle")).collect();
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();

        let (tokens, recoveries) = server
            .access_bonus_system(&codes, &bundle(&seed, 0, 0))
            .unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains_key("middle"));
        assert!(tokens.contains_key("low"));
        assert_eq!(recoveries.len(), 2);
        assert_ne!(tokens["middle"], recoveries["middle"]);

        // The same codes cannot be spent twice.
        let replay = server.access_bonus_system(&codes, &bundle(&seed, 0, 1));
        assert!(matches!(replay, Err(SkywardError::NoTierAccessible)));
    }

    #[test]
    fn set_address_advances_the_chain_once_per_address() {
        let server = Server::with_default_catalog().unwrap();
        let codes: Vec<String> = (0..3).map(|_| earn_code(&server, "middle")).collect();
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let (tokens, _) = server
            .access_bonus_system(&codes, &bundle(&seed, 0, 0))
            .unwrap();

        let (hash, sig) = signed_hash(&server, "middle", &tokens["middle"], Action::Claim, b"u1");
        let next = bundle(&seed, 0, 1);
        let (t1, r1) = server
            .set_address("middle", &hash, &sig, &next, Action::Claim, "pkr-1")
            .unwrap();
        assert!(!t1.is_empty() && !r1.is_empty());

        // Reusing the same address must fail, even with a fresh signature.
        let (hash2, sig2) = signed_hash(&server, "middle", &t1, Action::Claim, b"u2");
        let result = server.set_address("middle", &hash2, &sig2, &next, Action::Claim, "pkr-2");
        assert!(matches!(result, Err(SkywardError::AddressAlreadyUsed)));
    }

    #[test]
    fn set_address_requires_known_seed() {
        let server = Server::with_default_catalog().unwrap();
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let result = server.set_address(
            "middle",
            &[0x01],
            &[0x02],
            &bundle(&seed, 0, 0),
            Action::Claim,
            "pkr",
        );
        assert!(matches!(result, Err(SkywardError::UnknownSeed)));
    }

    #[test]
    fn participate_returns_tier_prefixed_bonus_data() {
        let server = Server::with_default_catalog().unwrap();
        let codes: Vec<String> = (0..3).map(|_| earn_code(&server, "middle")).collect();
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let (tokens, _) = server
            .access_bonus_system(&codes, &bundle(&seed, 0, 0))
            .unwrap();

        let (hash, sig) = signed_hash(&server, "middle", &tokens["middle"], Action::Claim, b"u1");
        let (claim_token, _r) = server
            .set_address("middle", &hash, &sig, &bundle(&seed, 0, 1), Action::Claim, "pkr-1")
            .unwrap();

        let (hash2, sig2) = signed_hash(&server, "middle", &claim_token, Action::Claim, b"p1");
        let (t, r, data) = server
            .participate("middle", &hash2, &sig2, "pkr-2")
            .unwrap();
        assert!(data.starts_with("middle"));
        assert_eq!(data.len(), "middle".len() + BONUS_DATA_BYTES * 2);
        assert!(!t.is_empty() && !r.is_empty());

        // The payload is retrievable by pkr.
        let tier = server.tier_idx("middle").unwrap();
        let payload = server
            .action_state(tier, Action::Claim)
            .maps()
            .claim_payload_for_pkr("pkr-2")
            .unwrap();
        assert_eq!(payload.bonus_data, data);
    }

    #[test]
    fn one_pkr_cannot_index_both_steps() {
        let server = Server::with_default_catalog().unwrap();
        let codes: Vec<String> = (0..3).map(|_| earn_code(&server, "middle")).collect();
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let (tokens, _) = server
            .access_bonus_system(&codes, &bundle(&seed, 0, 0))
            .unwrap();

        let (hash, sig) = signed_hash(&server, "middle", &tokens["middle"], Action::Claim, b"u1");
        let (claim_token, _) = server
            .set_address("middle", &hash, &sig, &bundle(&seed, 0, 1), Action::Claim, "shared")
            .unwrap();

        let (hash2, sig2) = signed_hash(&server, "middle", &claim_token, Action::Claim, b"p1");
        let result = server.participate("middle", &hash2, &sig2, "shared");
        assert!(matches!(result, Err(SkywardError::PkrReused)));
    }
}
