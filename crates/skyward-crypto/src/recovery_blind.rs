//! Deterministic blinding of recovery tokens.
//!
//! A client proves continuity between two consecutive server operations with
//! `pkr`, the x-coordinate of an ECDSA signature over the recovery token.
//! RFC6979 nonces make the signature — and therefore pkr — a pure function
//! of (derived recovery key, recovery token), so a client rebuilt from its
//! mnemonic recomputes the exact same tag. No secrecy of pkr against the
//! server is assumed.

use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use k256::SecretKey;

use skyward_core::error::SkywardError;

use crate::hdwallet::derive_secret_key;

/// pkr for a recovery token under an already-derived recovery key.
pub fn blind_recovery_token(recovery_key: &SecretKey, recovery_token: &str) -> String {
    let signer = SigningKey::from(recovery_key);
    let sig: Signature = signer.sign(recovery_token.as_bytes());
    let (r, _s) = sig.split_scalars();
    hex::encode(r.to_bytes())
}

/// Derive the recovery key for `(seed, account, recovery_id)` and blind the
/// token with it. The recovery id doubles as the address index of the key,
/// so the key rotates together with the wallet account.
pub fn blind_recovery_token_for(
    seed: &[u8],
    account_id: u32,
    recovery_id: u32,
    recovery_token: &str,
) -> Result<String, SkywardError> {
    let key = derive_secret_key(seed, account_id, recovery_id)?;
    Ok(blind_recovery_token(&key, recovery_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdwallet::seed_from_mnemonic;

    const MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn pkr_is_reconstructible() {
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let a = blind_recovery_token_for(&seed, 1, 2, "recovery-token").unwrap();
        let b = blind_recovery_token_for(&seed, 1, 2, "recovery-token").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pkr_depends_on_token_and_key() {
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let base = blind_recovery_token_for(&seed, 1, 2, "recovery-token").unwrap();
        let other_token = blind_recovery_token_for(&seed, 1, 2, "another-token").unwrap();
        let other_key = blind_recovery_token_for(&seed, 1, 3, "recovery-token").unwrap();
        assert_ne!(base, other_token);
        assert_ne!(base, other_key);
    }
}
