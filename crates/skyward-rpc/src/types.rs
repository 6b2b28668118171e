//! Wire types.
//!
//! Every response carries the `{data, err}` envelope: a non-empty `err`
//! signals an application-level failure independent of the transport, and
//! `data` falls back to its default. Binary request fields arrive hex-
//! encoded; tokens and blind signatures travel as URL-safe base64.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use skyward_core::error::SkywardError;
use skyward_core::types::AddressBundle;

// ── Envelope ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub err: String,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data,
            err: String::new(),
        }
    }
}

impl<T: Default> Envelope<T> {
    pub fn fail(err: &SkywardError) -> Self {
        Self {
            data: T::default(),
            err: err.to_string(),
        }
    }
}

/// Placeholder payload for endpoints that return nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyData {}

// ── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendBookingRequest {
    #[serde(rename = "customerID")]
    pub customer_id: u32,
    #[serde(rename = "flightID")]
    pub flight_id: u32,
    #[serde(rename = "tierID")]
    pub tier_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCodeRequest {
    #[serde(rename = "tierID")]
    pub tier_id: String,
    /// Full-domain hash, hex.
    #[serde(rename = "hashValue")]
    pub hash_value: String,
    /// Unblinded signature, hex.
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlindSignatureRequest {
    #[serde(rename = "tierID")]
    pub tier_id: String,
    pub token: String,
    /// Blinded message, hex.
    #[serde(rename = "blindToken")]
    pub blind_token: String,
    /// Booking=0, Claim=1.
    pub action: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub codes: Vec<String>,
    #[serde(rename = "adrBundle")]
    pub adr_bundle: AddressBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAddressRequest {
    #[serde(rename = "tierID")]
    pub tier_id: String,
    #[serde(rename = "hashValue")]
    pub hash_value: String,
    pub signature: String,
    #[serde(rename = "adrBundle")]
    pub adr_bundle: AddressBundle,
    pub action: u8,
    pub pkr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipateRequest {
    #[serde(rename = "tierID")]
    pub tier_id: String,
    #[serde(rename = "hashValue")]
    pub hash_value: String,
    pub signature: String,
    pub pkr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanBeUsedForRecoveryRequest {
    #[serde(rename = "tierID")]
    pub tier_id: String,
    #[serde(rename = "adrBundle")]
    pub adr_bundle: AddressBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryTestRequest {
    #[serde(rename = "tierID")]
    pub tier_id: String,
    #[serde(rename = "recoveryToken")]
    pub recovery_token: String,
    pub pkr: String,
    #[serde(rename = "adrBundle")]
    pub adr_bundle: AddressBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastAdrBundleRequest {
    /// Wallet seed, hex.
    pub seed: String,
    #[serde(rename = "tierID")]
    pub tier_id: String,
}

// ── Responses ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterData {
    #[serde(rename = "clientID")]
    pub client_id: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingData {
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeData {
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlindSignatureData {
    /// URL-safe base64.
    #[serde(rename = "blindSignature")]
    pub blind_signature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessData {
    pub tokens: BTreeMap<String, String>,
    #[serde(rename = "recoveryTokens")]
    pub recovery_tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetAddressData {
    pub token: String,
    #[serde(rename = "recoveryToken")]
    pub recovery_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipateData {
    pub token: String,
    #[serde(rename = "recoveryToken")]
    pub recovery_token: String,
    #[serde(rename = "bonusData")]
    pub bonus_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryStatusData {
    /// Wire-stable classifier outcome, 0..4.
    #[serde(rename = "recoveryStatus")]
    pub recovery_status: u8,
    pub token: String,
}

impl Default for RecoveryStatusData {
    fn default() -> Self {
        Self {
            recovery_status: skyward_recovery::RecoveryStatus::Failure.wire(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryTestData {
    pub token: String,
    #[serde(rename = "foundRecoveryToken")]
    pub found_recovery_token: String,
    #[serde(rename = "bonusData")]
    pub bonus_data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastAdrData {
    pub address: String,
    #[serde(rename = "accountID")]
    pub account_id: u32,
}
