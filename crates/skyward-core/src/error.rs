use thiserror::Error;

/// The six wire-visible failure classes. Every [`SkywardError`] variant maps
/// onto exactly one kind; the kind decides how the dispatcher reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Unauthorized,
    Conflict,
    RecoveryMismatch,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::BadRequest => "bad request",
            ErrorKind::NotFound => "not found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Conflict => "conflict",
            ErrorKind::RecoveryMismatch => "recovery mismatch",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error)]
pub enum SkywardError {
    // ── Bad requests ─────────────────────────────────────────────────────────
    #[error("missing body element(s): {0}")]
    MissingField(String),

    #[error("wrong parameter type: {0}")]
    InvalidField(String),

    #[error("hash value or signature is empty")]
    EmptyHashOrSignature,

    #[error("unknown action {0}")]
    UnknownAction(u8),

    // ── Not found ────────────────────────────────────────────────────────────
    #[error("bonus level '{0}' does not exist")]
    UnknownTier(String),

    #[error("flight with id {0} does not exist")]
    UnknownFlight(u32),

    #[error("seed unknown")]
    UnknownSeed,

    #[error("no bonus level accessible")]
    NoTierAccessible,

    // ── Unauthorized ─────────────────────────────────────────────────────────
    #[error("token is not valid")]
    TokenNotValid,

    #[error("token was already used")]
    TokenAlreadyUsed,

    #[error("blind signature verification failed")]
    BlindSignatureInvalid,

    // ── Conflicts ────────────────────────────────────────────────────────────
    #[error("address is not valid. Already used")]
    AddressAlreadyUsed,

    #[error("address does not fit to given seed")]
    SeedAddressMismatch,

    #[error("address invalid")]
    AddressNotOnChain,

    #[error("no penultimate address found")]
    NoPenultimateAddress,

    #[error("address bundle cannot be used for recovery")]
    RecoveryNotPossible,

    #[error("pkr was already used for a different step")]
    PkrReused,

    // ── Recovery mismatches ──────────────────────────────────────────────────
    #[error("pkr does not match any address update step")]
    PkrNoAddressUpdate,

    #[error("pkr does not match the given address")]
    PkrAddressMismatch,

    #[error("pkr does not match any participation step")]
    PkrNoClaim,

    // ── Internal ─────────────────────────────────────────────────────────────
    #[error("randomness source failed: {0}")]
    Rng(String),

    #[error("token is already valid")]
    TokenCollision,

    #[error("tier hierarchy contains a cycle through '{0}'")]
    TierCycle(String),

    #[error("tier '{0}' references unknown lower tier '{1}'")]
    UnknownLowerTier(String, String),

    #[error("corrupt state: {0}")]
    Corrupt(String),
}

impl SkywardError {
    /// The taxonomy kind this error reports as.
    pub fn kind(&self) -> ErrorKind {
        use SkywardError::*;
        match self {
            MissingField(_) | InvalidField(_) | EmptyHashOrSignature | UnknownAction(_) => {
                ErrorKind::BadRequest
            }
            UnknownTier(_) | UnknownFlight(_) | UnknownSeed | NoTierAccessible => {
                ErrorKind::NotFound
            }
            TokenNotValid | TokenAlreadyUsed | BlindSignatureInvalid => ErrorKind::Unauthorized,
            AddressAlreadyUsed | SeedAddressMismatch | AddressNotOnChain
            | NoPenultimateAddress | RecoveryNotPossible | PkrReused => ErrorKind::Conflict,
            PkrNoAddressUpdate | PkrAddressMismatch | PkrNoClaim => ErrorKind::RecoveryMismatch,
            Rng(_) | TokenCollision | TierCycle(_) | UnknownLowerTier(_, _) | Corrupt(_) => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_is_reachable() {
        assert_eq!(
            SkywardError::MissingField("codes".into()).kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(SkywardError::UnknownSeed.kind(), ErrorKind::NotFound);
        assert_eq!(SkywardError::TokenNotValid.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            SkywardError::AddressAlreadyUsed.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            SkywardError::PkrNoClaim.kind(),
            ErrorKind::RecoveryMismatch
        );
        assert_eq!(SkywardError::Rng("closed".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn wire_stable_messages() {
        // These strings are observed by clients; changing them is a protocol break.
        assert_eq!(
            SkywardError::AddressAlreadyUsed.to_string(),
            "address is not valid. Already used"
        );
        assert_eq!(
            SkywardError::NoTierAccessible.to_string(),
            "no bonus level accessible"
        );
    }
}
