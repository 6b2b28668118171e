//! BIP32-style hierarchical key derivation over secp256k1.
//!
//! Wallet layout is `m/44'/626'/0'/account/index`: the first three segments
//! are hardened and fixed, the account segment selects one rotation epoch of
//! a client, and the final index walks the pseudonymous address chain.
//! Addresses are version-0 base58check over HASH160 of the compressed
//! public key.

use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{NonZeroScalar, Scalar, SecretKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use skyward_core::constants::COIN_TYPE;
use skyward_core::error::SkywardError;
use skyward_core::types::AddressBundle;

type HmacSha512 = Hmac<Sha512>;

const HARDENED: u32 = 0x8000_0000;
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// A derivation node: private scalar plus chain code.
pub struct ExtendedKey {
    secret: SecretKey,
    chain_code: [u8; 32],
}

impl ExtendedKey {
    /// Master node from a BIP39 seed.
    pub fn master(seed: &[u8]) -> Result<Self, SkywardError> {
        let mut mac = HmacSha512::new_from_slice(MASTER_HMAC_KEY)
            .map_err(|_| SkywardError::Corrupt("hmac key setup failed".into()))?;
        mac.update(seed);
        let digest = mac.finalize().into_bytes();
        let secret = SecretKey::from_slice(&digest[..32])
            .map_err(|_| SkywardError::Corrupt("master key outside curve order".into()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        Ok(Self { secret, chain_code })
    }

    /// One derivation step. Indices ≥ 2³¹ are hardened.
    pub fn child(&self, index: u32) -> Result<Self, SkywardError> {
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|_| SkywardError::Corrupt("hmac key setup failed".into()))?;
        if index >= HARDENED {
            mac.update(&[0u8]);
            mac.update(&self.secret.to_bytes());
        } else {
            let point = self.secret.public_key().to_encoded_point(true);
            mac.update(point.as_bytes());
        }
        mac.update(&index.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let tweak = SecretKey::from_slice(&digest[..32])
            .map_err(|_| SkywardError::Corrupt("child tweak outside curve order".into()))?;
        let sum: Scalar =
            *tweak.to_nonzero_scalar().as_ref() + *self.secret.to_nonzero_scalar().as_ref();
        let scalar = Option::<NonZeroScalar>::from(NonZeroScalar::new(sum))
            .ok_or_else(|| SkywardError::Corrupt("derived child key is zero".into()))?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        Ok(Self {
            secret: SecretKey::from(scalar),
            chain_code,
        })
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Address string for this node's public key.
    pub fn address(&self) -> String {
        let point = self.secret.public_key().to_encoded_point(true);
        let sha = Sha256::digest(point.as_bytes());
        let h160 = Ripemd160::digest(sha);
        bs58::encode(h160.as_slice()).with_check_version(0).into_string()
    }
}

/// The account-level external node all chain addresses hang off.
fn external_node(seed: &[u8], account_id: u32) -> Result<ExtendedKey, SkywardError> {
    ExtendedKey::master(seed)?
        .child(HARDENED + 44)?
        .child(HARDENED + COIN_TYPE)?
        .child(HARDENED)?
        .child(account_id)
}

/// The pure derivation function of the protocol:
/// (seed, account, index) → address string.
pub fn derive_address(seed: &[u8], account_id: u32, address_id: u32) -> Result<String, SkywardError> {
    Ok(external_node(seed, account_id)?.child(address_id)?.address())
}

/// (seed, account, index) → private key, for recovery blinding.
pub fn derive_secret_key(
    seed: &[u8],
    account_id: u32,
    address_id: u32,
) -> Result<SecretKey, SkywardError> {
    Ok(external_node(seed, account_id)?
        .child(address_id)?
        .secret
        .clone())
}

/// Recompute the address a bundle claims. The caller compares the result
/// against `bundle.address`; a mismatch is a Conflict.
pub fn address_from_bundle(bundle: &AddressBundle) -> Result<String, SkywardError> {
    derive_address(&bundle.seed, bundle.account_id, bundle.address_id)
}

/// BIP39 mnemonic → 64-byte wallet seed (empty passphrase).
pub fn seed_from_mnemonic(mnemonic: &str) -> Result<Vec<u8>, SkywardError> {
    let parsed = bip39::Mnemonic::parse_normalized(mnemonic)
        .map_err(|_| SkywardError::InvalidField("mnemonic".into()))?;
    Ok(parsed.to_seed("").to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn derivation_is_deterministic() {
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let a = derive_address(&seed, 3, 5).unwrap();
        let b = derive_address(&seed, 3, 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_indices_give_distinct_addresses() {
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let a = derive_address(&seed, 0, 0).unwrap();
        let b = derive_address(&seed, 0, 1).unwrap();
        let c = derive_address(&seed, 1, 0).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn bundle_verification_matches_derivation() {
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let address = derive_address(&seed, 2, 4).unwrap();
        let bundle = AddressBundle {
            seed: seed.clone(),
            account_id: 2,
            address_id: 4,
            address: address.clone(),
        };
        assert_eq!(address_from_bundle(&bundle).unwrap(), address);
    }

    #[test]
    fn address_is_version_zero_base58check() {
        let seed = seed_from_mnemonic(MNEMONIC).unwrap();
        let address = derive_address(&seed, 0, 0).unwrap();
        let decoded = bs58::decode(&address).with_check(None).into_vec().unwrap();
        assert_eq!(decoded[0], 0, "version byte");
        assert_eq!(decoded.len(), 21, "version + HASH160 payload");
    }

    #[test]
    fn garbage_mnemonic_rejected() {
        assert!(seed_from_mnemonic("definitely not a mnemonic").is_err());
    }
}
