//! The client-side protocol driver.
//!
//! A [`Wallet`] owns nothing but its mnemonic-derived key material and the
//! tokens the server has handed out so far. Everything else — including a
//! completely lost session — can be rebuilt through the recovery driver at
//! the bottom of this file.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use zeroize::Zeroizing;

use skyward_core::constants::{MAX_ACCOUNT_ID, MAX_ADDRESS_ID};
use skyward_core::types::{Action, AddressBundle};
use skyward_crypto::{
    blind, blind_recovery_token_for, derive_address, full_domain_hash, generate_token,
    seed_from_mnemonic, unblind,
};
use skyward_recovery::RecoveryStatus;
use skyward_state::{SystemInfo, TierPublicInfo};

use crate::rpc_client::RpcClient;

pub struct Wallet {
    pub client_id: u32,
    mnemonic: String,
    seed: Zeroizing<Vec<u8>>,
    pub account_id: u32,
    /// Next unused address index within the current account.
    pub address_id: u32,
    recovery_id: u32,
    rpc: RpcClient,
    /// Per-tier chain token (the one-shot authorization for the next step).
    pub tier_tokens: HashMap<String, String>,
    /// Per-tier recovery token (retained at every step).
    pub tier_recovery: HashMap<String, String>,
    /// Earned, unspent bonus-code ids.
    pub codes: Vec<String>,
    info: Option<SystemInfo>,
}

impl Wallet {
    pub fn new(url: &str, mnemonic: &str, recovery_id: u32) -> anyhow::Result<Self> {
        let seed = seed_from_mnemonic(mnemonic).context("deriving seed from mnemonic")?;
        Ok(Self {
            client_id: 0,
            mnemonic: mnemonic.to_string(),
            seed: Zeroizing::new(seed),
            account_id: 0,
            address_id: 0,
            recovery_id,
            rpc: RpcClient::new(url),
            tier_tokens: HashMap::new(),
            tier_recovery: HashMap::new(),
            codes: Vec::new(),
            info: None,
        })
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn seed_hex(&self) -> String {
        hex::encode(self.seed.as_slice())
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Register at the server; the client id also seeds the initial wallet
    /// account so clients spread across accounts deterministically.
    pub async fn register(&mut self) -> anyhow::Result<u32> {
        self.client_id = self.rpc.register().await?;
        self.account_id = self.client_id % MAX_ACCOUNT_ID;
        Ok(self.client_id)
    }

    /// Pull flights and tier descriptions (with per-action public keys).
    pub async fn fetch_info(&mut self) -> anyhow::Result<()> {
        self.info = Some(self.rpc.system_info().await?);
        Ok(())
    }

    fn tier_info(&self, tier_id: &str) -> anyhow::Result<&TierPublicInfo> {
        self.info
            .as_ref()
            .and_then(|info| info.tiers.iter().find(|t| t.id == tier_id))
            .ok_or_else(|| anyhow!("unknown bonus level '{tier_id}' (fetch_info first?)"))
    }

    /// The address bundle for `address_id` under the current account.
    pub fn bundle(&self, address_id: u32) -> anyhow::Result<AddressBundle> {
        let address = derive_address(self.seed.as_slice(), self.account_id, address_id)?;
        Ok(AddressBundle {
            seed: self.seed.to_vec(),
            account_id: self.account_id,
            address_id,
            address,
        })
    }

    /// Deterministically blind a recovery token into its pkr tag.
    pub fn pkr(&self, recovery_token: &str) -> anyhow::Result<String> {
        Ok(blind_recovery_token_for(
            self.seed.as_slice(),
            self.account_id,
            self.recovery_id,
            recovery_token,
        )?)
    }

    /// One full blind-signature exchange: invent a fresh message, blind its
    /// full-domain hash, have the server sign it under `token`, unblind.
    /// Returns `(hash, signature)` ready for the follow-up request.
    pub async fn signature_for_token(
        &self,
        tier_id: &str,
        token: &str,
        action: Action,
    ) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
        let info = self.tier_info(tier_id)?;
        let wire_key = match action {
            Action::Booking => &info.booking_key,
            Action::Claim => &info.claim_key,
        };
        let pk = wire_key.to_key()?;

        let message = generate_token()?;
        let hash = full_domain_hash(message.as_bytes());
        let (blinded, unblinder) = blind(&pk, &hash)?;

        let blind_sig_b64 = self
            .rpc
            .get_blind_signature(tier_id, token, &blinded, action.wire())
            .await?;
        let blind_sig = URL_SAFE
            .decode(blind_sig_b64.as_bytes())
            .context("decoding blind signature")?;
        let sig = unblind(&pk, &blind_sig, &unblinder)?;
        Ok((hash, sig))
    }

    // ── Booking ──────────────────────────────────────────────────────────────

    /// Book a flight at a tier and convert the booking token into a bonus
    /// code the server cannot link back to this booking.
    pub async fn book(&mut self, flight_id: u32, tier_id: &str) -> anyhow::Result<()> {
        self.tier_info(tier_id)?;
        let token = self
            .rpc
            .send_booking(self.client_id, flight_id, tier_id)
            .await?;
        if token.is_empty() {
            bail!("no token received for booking");
        }

        let (hash, sig) = self
            .signature_for_token(tier_id, &token, Action::Booking)
            .await?;
        let code = self.rpc.get_booking_code(tier_id, &hash, &sig).await?;
        self.codes.push(code);
        Ok(())
    }

    // ── Access ───────────────────────────────────────────────────────────────

    /// Spend the earned codes, anchoring the pseudonymous chain at the next
    /// fresh address. The address index advances even on failure: a
    /// presented address is treated as exposed either way.
    pub async fn access(&mut self) -> anyhow::Result<()> {
        let bundle = self.bundle(self.address_id)?;
        let result = self.rpc.access_bonus_system(&self.codes, &bundle).await;
        self.address_id += 1;
        let data = result?;

        if data.tokens.is_empty() {
            bail!("no tokens received");
        }
        if data.recovery_tokens.is_empty() {
            bail!("no recovery tokens received");
        }

        self.tier_tokens.extend(data.tokens);
        self.tier_recovery.extend(data.recovery_tokens);
        self.codes.clear();
        Ok(())
    }

    // ── Claim cycle ──────────────────────────────────────────────────────────

    /// Rotate the chain of `tier_id` to the next address. Returns the fresh
    /// (token, recovery token) pair minted at the new endpoint.
    pub async fn address_update(&mut self, tier_id: &str) -> anyhow::Result<(String, String)> {
        let current_token = self
            .tier_tokens
            .get(tier_id)
            .cloned()
            .ok_or_else(|| anyhow!("no token for bonus level '{tier_id}'"))?;
        let current_recovery = self
            .tier_recovery
            .get(tier_id)
            .cloned()
            .ok_or_else(|| anyhow!("no recovery token for bonus level '{tier_id}'"))?;

        let (hash, sig) = self
            .signature_for_token(tier_id, &current_token, Action::Claim)
            .await?;
        let bundle = self.bundle(self.address_id)?;
        let pkr = self.pkr(&current_recovery)?;

        let data = self
            .rpc
            .set_address(tier_id, &hash, &sig, &bundle, Action::Claim.wire(), &pkr)
            .await?;
        Ok((data.token, data.recovery_token))
    }

    /// One complete claim: address update, then participation. Returns the
    /// bonus data.
    pub async fn claim(&mut self, tier_id: &str) -> anyhow::Result<String> {
        let (participate_token, recovery) = self.address_update(tier_id).await?;
        self.tier_recovery.insert(tier_id.to_string(), recovery);
        self.advance_address();

        let (hash, sig) = self
            .signature_for_token(tier_id, &participate_token, Action::Claim)
            .await?;
        let pkr = self.pkr(&self.tier_recovery[tier_id])?;

        let data = self.rpc.participate(tier_id, &hash, &sig, &pkr).await?;
        self.tier_tokens.insert(tier_id.to_string(), data.token);
        self.tier_recovery
            .insert(tier_id.to_string(), data.recovery_token);
        Ok(data.bonus_data)
    }

    /// Step to the next address index; past the per-account window, rotate
    /// to a deterministically-chosen fresh account.
    fn advance_address(&mut self) {
        self.address_id += 1;
        if self.address_id >= MAX_ADDRESS_ID {
            self.account_id = (self.account_id + self.client_id + 1) % MAX_ACCOUNT_ID;
            self.address_id = 0;
        }
    }

    // ── Recovery driver ──────────────────────────────────────────────────────

    /// Rebuild the chain state of one tier after losing everything but the
    /// mnemonic: ask for the last recorded endpoint, then scan the bounded
    /// address window from there, classifying each candidate.
    pub async fn restore(&mut self, tier_id: &str) -> anyhow::Result<String> {
        let last = self
            .rpc
            .last_adr_bundle(&self.seed_hex(), tier_id)
            .await?
            .ok_or_else(|| anyhow!("no chain recorded for this seed"))?;

        self.account_id = last.account_id;
        let start = self.address_index_of(&last.address).unwrap_or(0);

        for address_id in start..MAX_ADDRESS_ID {
            if let Some(bonus_data) = self.restore_with_address(tier_id, address_id).await? {
                self.address_id = address_id + 1;
                return Ok(bonus_data);
            }
        }
        bail!("no restore possible")
    }

    /// Try one address index. `Ok(None)` means "keep scanning".
    async fn restore_with_address(
        &mut self,
        tier_id: &str,
        address_id: u32,
    ) -> anyhow::Result<Option<String>> {
        let bundle = self.bundle(address_id)?;
        let classified = self.rpc.can_be_used_for_recovery(tier_id, &bundle).await?;

        match RecoveryStatus::from_wire(classified.recovery_status) {
            None | Some(RecoveryStatus::Failure) => Ok(None),
            Some(RecoveryStatus::AfterAccess) => {
                // The classifier already returned the still-valid chain token;
                // the recovery test recovers the recovery token.
                let data = self.rpc.recovery_test(tier_id, "", "", &bundle).await?;
                self.tier_tokens
                    .insert(tier_id.to_string(), classified.token);
                self.tier_recovery
                    .insert(tier_id.to_string(), data.found_recovery_token);
                Ok(Some(data.bonus_data))
            }
            Some(_) => {
                // The classifier returned a recovery token; prove continuity
                // with its reconstructed pkr.
                let pkr = self.pkr(&classified.token)?;
                let data = self
                    .rpc
                    .recovery_test(tier_id, &classified.token, &pkr, &bundle)
                    .await?;
                self.tier_tokens.insert(tier_id.to_string(), data.token);
                self.tier_recovery
                    .insert(tier_id.to_string(), data.found_recovery_token);
                Ok(Some(data.bonus_data))
            }
        }
    }

    /// Full reconstruction from the mnemonic bundle: fetch the catalog and
    /// restore every tier, keeping the highest address index reached.
    pub async fn restore_all(&mut self) -> anyhow::Result<HashMap<String, String>> {
        self.fetch_info().await?;
        self.account_id = 0;
        self.address_id = 0;

        let tier_ids: Vec<String> = self
            .info
            .as_ref()
            .map(|i| i.tiers.iter().map(|t| t.id.clone()).collect())
            .unwrap_or_default();

        let mut recovered = HashMap::new();
        let mut highest = 0;
        for tier_id in tier_ids {
            match self.restore(&tier_id).await {
                Ok(bonus_data) => {
                    highest = highest.max(self.address_id);
                    recovered.insert(tier_id, bonus_data);
                }
                Err(e) => tracing::debug!(tier = %tier_id, error = %e, "tier not restored"),
            }
        }

        if recovered.is_empty() {
            bail!("no restore possible");
        }
        self.address_id = highest;
        Ok(recovered)
    }

    /// Reverse-map an address string to its index in the current account's
    /// window.
    fn address_index_of(&self, address: &str) -> Option<u32> {
        (0..MAX_ADDRESS_ID).find(|&idx| {
            derive_address(self.seed.as_slice(), self.account_id, idx)
                .map(|a| a == address)
                .unwrap_or(false)
        })
    }
}
