//! Protocol-wide constants.

/// Random bytes per one-shot authorization token (URL-safe base64 on the wire).
pub const TOKEN_BYTES: usize = 16;

/// Random bytes per bonus-code identifier.
pub const BONUS_CODE_BYTES: usize = 64;

/// Random bytes appended (hex-encoded) to the tier id to form a bonus payload.
pub const BONUS_DATA_BYTES: usize = 16;

/// RSA modulus size for the per-(tier, action) blind-signature keypairs.
pub const RSA_KEY_BITS: usize = 2048;

/// Full-domain-hash width. Must stay well below `RSA_KEY_BITS` so the hash,
/// read as an integer, is always smaller than the modulus.
pub const FDH_BITS: usize = 1536;

/// BIP44 coin type of the wallet derivation path `m/44'/626'/0'/account/index`.
pub const COIN_TYPE: u32 = 626;

/// Address indices a client walks within one wallet account before rotating.
pub const MAX_ADDRESS_ID: u32 = 12;

/// Upper bound (exclusive) for wallet account indices.
pub const MAX_ACCOUNT_ID: u32 = 100;

/// Number of flights the server offers out of the box.
pub const DEFAULT_FLIGHT_COUNT: u32 = 100;
