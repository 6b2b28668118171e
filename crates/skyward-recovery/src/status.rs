use serde::{Deserialize, Serialize};

/// Where on its chain a presented address bundle sits. The discriminants are
/// wire-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecoveryStatus {
    /// Between access and the first address update: the access token is
    /// still unspent at the anchor address.
    AfterAccess = 0,
    /// Exactly one address update happened; the penultimate address is the
    /// access anchor itself.
    AfterFirstAddressUpdate = 1,
    /// The live endpoint of a chain with at least two updates; continuity is
    /// proven through the participation preceding the last update.
    PenultimateAddress = 2,
    /// The endpoint's token was already spent: the client crashed after a
    /// participation and before rotating.
    RecoveryTest = 3,
    Failure = 4,
}

impl RecoveryStatus {
    pub fn wire(self) -> u8 {
        self as u8
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(RecoveryStatus::AfterAccess),
            1 => Some(RecoveryStatus::AfterFirstAddressUpdate),
            2 => Some(RecoveryStatus::PenultimateAddress),
            3 => Some(RecoveryStatus::RecoveryTest),
            4 => Some(RecoveryStatus::Failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecoveryStatus::AfterAccess => "RecoveryTestAfterAccess",
            RecoveryStatus::AfterFirstAddressUpdate => "RecoveryTest After 1st Adr Upd",
            RecoveryStatus::PenultimateAddress => "RecoveryTest Penultimate Adr",
            RecoveryStatus::RecoveryTest => "RecoveryTest",
            RecoveryStatus::Failure => "Failure",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_stable() {
        assert_eq!(RecoveryStatus::AfterAccess.wire(), 0);
        assert_eq!(RecoveryStatus::AfterFirstAddressUpdate.wire(), 1);
        assert_eq!(RecoveryStatus::PenultimateAddress.wire(), 2);
        assert_eq!(RecoveryStatus::RecoveryTest.wire(), 3);
        assert_eq!(RecoveryStatus::Failure.wire(), 4);
    }

    #[test]
    fn wire_round_trip() {
        for v in 0..=4u8 {
            assert_eq!(RecoveryStatus::from_wire(v).unwrap().wire(), v);
        }
        assert!(RecoveryStatus::from_wire(5).is_none());
    }
}
