//! Roles taken by the two parties of a swap. A role is fully determined by
//! which chain the party spends from and who opened the negotiation.

use std::io;

use crate::consensus::{self, Decodable, Encodable};

/// The four possible swap roles. The native side owns the coins locked in the
/// shared native output; the foreign side locks its coins in the foreign
/// chain contract and chooses the swap secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(Debug)]
pub enum SwapRole {
    NativeSideInitiator,
    NativeSideResponder,
    ForeignSideInitiator,
    ForeignSideResponder,
}

impl SwapRole {
    /// Reconstruct a role from the two persisted booleans.
    pub fn from_flags(is_native_side: bool, is_initiator: bool) -> Self {
        match (is_native_side, is_initiator) {
            (true, true) => SwapRole::NativeSideInitiator,
            (true, false) => SwapRole::NativeSideResponder,
            (false, true) => SwapRole::ForeignSideInitiator,
            (false, false) => SwapRole::ForeignSideResponder,
        }
    }

    /// True for the party owning the native coins locked in the shared output.
    pub fn is_native_side(&self) -> bool {
        matches!(
            self,
            SwapRole::NativeSideInitiator | SwapRole::NativeSideResponder
        )
    }

    /// True for the party that sent the invitation.
    pub fn is_initiator(&self) -> bool {
        matches!(
            self,
            SwapRole::NativeSideInitiator | SwapRole::ForeignSideInitiator
        )
    }

    /// The role held by the counter-party.
    pub fn other(&self) -> Self {
        SwapRole::from_flags(!self.is_native_side(), !self.is_initiator())
    }
}

impl Encodable for SwapRole {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        match self {
            SwapRole::NativeSideInitiator => 0x01u8.consensus_encode(writer),
            SwapRole::NativeSideResponder => 0x02u8.consensus_encode(writer),
            SwapRole::ForeignSideInitiator => 0x03u8.consensus_encode(writer),
            SwapRole::ForeignSideResponder => 0x04u8.consensus_encode(writer),
        }
    }
}

impl Decodable for SwapRole {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match Decodable::consensus_decode(d)? {
            0x01u8 => Ok(SwapRole::NativeSideInitiator),
            0x02u8 => Ok(SwapRole::NativeSideResponder),
            0x03u8 => Ok(SwapRole::ForeignSideInitiator),
            0x04u8 => Ok(SwapRole::ForeignSideResponder),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(SwapRole);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_roundtrip() {
        for native in [true, false] {
            for initiator in [true, false] {
                let role = SwapRole::from_flags(native, initiator);
                assert_eq!(role.is_native_side(), native);
                assert_eq!(role.is_initiator(), initiator);
                assert_eq!(role.other().other(), role);
            }
        }
    }
}
