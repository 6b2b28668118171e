use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;

use skyward_core::constants::{BONUS_CODE_BYTES, TOKEN_BYTES};
use skyward_core::error::SkywardError;

/// URL-safe base64 over `len` fresh random bytes.
fn random_string(len: usize) -> Result<String, SkywardError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SkywardError::Rng(e.to_string()))?;
    Ok(URL_SAFE.encode(&bytes))
}

/// A one-shot authorization token (16 random bytes).
pub fn generate_token() -> Result<String, SkywardError> {
    random_string(TOKEN_BYTES)
}

/// A bonus-code identifier (64 random bytes).
pub fn generate_bonus_code_id() -> Result<String, SkywardError> {
    random_string(BONUS_CODE_BYTES)
}

/// `len` fresh random bytes, hex-encoded. Used for bonus-data payloads.
pub fn random_hex(len: usize) -> Result<String, SkywardError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SkywardError::Rng(e.to_string()))?;
    Ok(hex::encode(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_decodes_to_sixteen_bytes() {
        let token = generate_token().unwrap();
        let raw = URL_SAFE.decode(token.as_bytes()).unwrap();
        assert_eq!(raw.len(), TOKEN_BYTES);
    }

    #[test]
    fn code_id_decodes_to_sixty_four_bytes() {
        let code = generate_bonus_code_id().unwrap();
        let raw = URL_SAFE.decode(code.as_bytes()).unwrap();
        assert_eq!(raw.len(), BONUS_CODE_BYTES);
    }

    #[test]
    fn consecutive_tokens_differ() {
        assert_ne!(generate_token().unwrap(), generate_token().unwrap());
    }
}
