//! RSA-FDH blind signatures.
//!
//! The server signs a value it cannot see: the client expands its message
//! through a full-domain hash, multiplies it by `r^e mod n` for a random
//! unit `r` (blinding), and later divides the raw signature by `r`
//! (unblinding). Verification is plain RSA: `sig^e ≡ fdh(msg) (mod n)`.

use num_bigint_dig::{BigUint, ModInverse, RandBigInt};
use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use skyward_core::constants::{FDH_BITS, RSA_KEY_BITS};
use skyward_core::error::SkywardError;

/// Full-domain hash: iterated SHA-256 expanded to `FDH_BITS` bits.
/// Block `i` is `SHA256(msg ‖ i_be32)`. The width stays below the modulus
/// size so the digest, read big-endian, is always a valid residue.
pub fn full_domain_hash(msg: &[u8]) -> Vec<u8> {
    let want = FDH_BITS / 8;
    let mut out = Vec::with_capacity(want);
    let mut counter: u32 = 0;
    while out.len() < want {
        let mut hasher = Sha256::new();
        hasher.update(msg);
        hasher.update(counter.to_be_bytes());
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(want);
    out
}

/// The per-(tier, action) signing keypair. Generated once at startup;
/// signing afterwards is pure arithmetic on immutable key material.
pub struct BlindKeyPair {
    sk: RsaPrivateKey,
    pk: RsaPublicKey,
}

impl BlindKeyPair {
    pub fn generate() -> Result<Self, SkywardError> {
        let sk = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| SkywardError::Rng(e.to_string()))?;
        let pk = sk.to_public_key();
        Ok(Self { sk, pk })
    }

    pub fn public(&self) -> &RsaPublicKey {
        &self.pk
    }

    /// Raw RSA on the blinded value: `blinded^d mod n`.
    pub fn sign_blinded(&self, blinded: &[u8]) -> Vec<u8> {
        let m = BigUint::from_bytes_be(blinded);
        m.modpow(self.sk.d(), self.pk.n()).to_bytes_be()
    }
}

impl std::fmt::Debug for BlindKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlindKeyPair({} bits)", self.pk.n().bits())
    }
}

/// Blind a full-domain hash under `pk`. Returns `(blinded, unblinder)`;
/// the unblinder is the raw `r` the caller must keep secret until unblinding.
pub fn blind(pk: &RsaPublicKey, msg_hash: &[u8]) -> Result<(Vec<u8>, Vec<u8>), SkywardError> {
    let n = pk.n();
    let m = BigUint::from_bytes_be(msg_hash);

    // r must be a unit mod n; retry on the (negligible) non-invertible draws.
    let one = BigUint::from(1u32);
    let r = loop {
        let candidate = OsRng.gen_biguint_below(n);
        if candidate <= one {
            continue;
        }
        if (&candidate).mod_inverse(n).is_some() {
            break candidate;
        }
    };

    let blinded = (m * r.modpow(pk.e(), n)) % n;
    Ok((blinded.to_bytes_be(), r.to_bytes_be()))
}

/// Divide the blind signature by the unblinder: `blind_sig * r⁻¹ mod n`.
pub fn unblind(
    pk: &RsaPublicKey,
    blind_sig: &[u8],
    unblinder: &[u8],
) -> Result<Vec<u8>, SkywardError> {
    let n = pk.n();
    let s = BigUint::from_bytes_be(blind_sig);
    let r = BigUint::from_bytes_be(unblinder);
    let r_inv = (&r)
        .mod_inverse(n)
        .and_then(|i| i.to_biguint())
        .ok_or_else(|| SkywardError::Corrupt("unblinder is not invertible".into()))?;
    Ok(((s % n) * r_inv % n).to_bytes_be())
}

/// `sig^e ≡ msg_hash (mod n)`. Empty inputs never verify.
pub fn verify(pk: &RsaPublicKey, msg_hash: &[u8], sig: &[u8]) -> bool {
    if msg_hash.is_empty() || sig.is_empty() {
        return false;
    }
    let n = pk.n();
    let expected = BigUint::from_bytes_be(msg_hash) % n;
    let recovered = BigUint::from_bytes_be(sig).modpow(pk.e(), n);
    recovered == expected
}

// ── Wire form ────────────────────────────────────────────────────────────────

/// Public key as exchanged over `system/info`: hex-encoded modulus and
/// exponent, big-endian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePublicKey {
    pub n: String,
    pub e: String,
}

impl WirePublicKey {
    pub fn from_key(pk: &RsaPublicKey) -> Self {
        Self {
            n: hex::encode(pk.n().to_bytes_be()),
            e: hex::encode(pk.e().to_bytes_be()),
        }
    }

    pub fn to_key(&self) -> Result<RsaPublicKey, SkywardError> {
        let n = hex::decode(&self.n)
            .map_err(|_| SkywardError::InvalidField("public key modulus".into()))?;
        let e = hex::decode(&self.e)
            .map_err(|_| SkywardError::InvalidField("public key exponent".into()))?;
        RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
            .map_err(|_| SkywardError::InvalidField("public key".into()))
    }
}
