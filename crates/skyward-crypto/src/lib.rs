pub mod blind;
pub mod hdwallet;
pub mod recovery_blind;
pub mod token;

pub use blind::{blind, full_domain_hash, unblind, verify, BlindKeyPair, WirePublicKey};
pub use hdwallet::{address_from_bundle, derive_address, derive_secret_key, seed_from_mnemonic};
pub use recovery_blind::{blind_recovery_token, blind_recovery_token_for};
pub use token::{generate_bonus_code_id, generate_token, random_hex};
