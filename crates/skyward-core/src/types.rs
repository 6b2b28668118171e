use serde::{Deserialize, Serialize};

use crate::error::SkywardError;

/// The two request flavours each tier keeps separate blind-signature state
/// for. Wire representation is an integer: Booking=0, Claim=1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Booking,
    Claim,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Booking, Action::Claim];

    pub fn from_wire(value: u8) -> Result<Self, SkywardError> {
        match value {
            0 => Ok(Action::Booking),
            1 => Ok(Action::Claim),
            other => Err(SkywardError::UnknownAction(other)),
        }
    }

    pub fn wire(self) -> u8 {
        match self {
            Action::Booking => 0,
            Action::Claim => 1,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Booking => write!(f, "Booking"),
            Action::Claim => write!(f, "Claim"),
        }
    }
}

// ── AddressBundle ────────────────────────────────────────────────────────────

/// The evidence a client presents that a specific chain endpoint was produced
/// by a seed it controls: the seed, the wallet account and address indices,
/// and the address string those indices are claimed to derive to.
///
/// The server never trusts `address` on its own; every operation that accepts
/// a bundle recomputes the address from the other three fields first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBundle {
    /// BIP39-derived wallet seed, hex-encoded on the wire.
    #[serde(with = "hex_bytes")]
    pub seed: Vec<u8>,
    #[serde(rename = "accountID")]
    pub account_id: u32,
    #[serde(rename = "addressID")]
    pub address_id: u32,
    pub address: String,
}

impl AddressBundle {
    /// Hex form of the seed, the key used by all seed-indexed server maps.
    pub fn seed_hex(&self) -> String {
        hex::encode(&self.seed)
    }
}

/// Serde adapter: `Vec<u8>` as a hex string on the wire.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
