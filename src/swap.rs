// Copyright 2021-2022 Farcaster Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

//! High level swap definitions: identifiers, amounts and heights, user
//! visible statuses, and the protocol constants shared by both parties.

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consensus::{self, Decodable, Encodable};
use crate::crypto::Scalar;

/// A height on the native chain.
pub type Height = u64;

/// An amount in the base unit of either chain.
pub type Amount = u64;

/// A unix timestamp in seconds, used for foreign chain lock times.
pub type Timestamp = u64;

/// Sentinel for an unbounded kernel height window.
pub const MAX_HEIGHT: Height = u64::MAX;

/// Default lifetime, in native blocks, granted to the lock transaction
/// negotiation on top of the peer response window.
pub const DEFAULT_TX_LIFETIME: Height = 720;

/// Default number of native blocks the peer has to answer before the swap is
/// considered expired.
pub const DEFAULT_RESPONSE_TIME: Height = 1440;

/// Number of native blocks after the swap's `MinHeight` at which the shared
/// output becomes refundable to its original owner.
pub const NATIVE_LOCK_TIME_BLOCKS: Height = 4 * 24 * 60;

/// Peer protocol version advertised in invitations.
pub const PROTO_VERSION: u32 = 4;

/// A unique swap identifier, 128 bits, opaque to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapId(pub Uuid);

impl SwapId {
    /// Generate a new random swap identifier.
    pub fn random() -> Self {
        SwapId(Uuid::new_v4())
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encodable for SwapId {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.0.into_bytes().consensus_encode(s)
    }
}

impl Decodable for SwapId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        let bytes: [u8; 16] = Decodable::consensus_decode(d)?;
        Ok(SwapId(Uuid::from_bytes(bytes)))
    }
}

impl_strict_encoding!(SwapId);

fixed_hash::construct_fixed_hash!(
    /// A transport address identifying one party's wallet endpoint.
    pub struct WalletId(32);
);

impl Encodable for WalletId {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(s)
    }
}

impl Decodable for WalletId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        let bytes: [u8; 32] = Decodable::consensus_decode(d)?;
        Ok(Self::from_slice(&bytes))
    }
}

impl_strict_encoding!(WalletId);

/// User visible status of a swap, persisted under the `Status` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(Debug)]
pub enum TxStatus {
    Pending,
    InProgress,
    Completed,
    Canceled,
    Failed,
}

impl TxStatus {
    /// A terminal status cannot change anymore.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending | TxStatus::InProgress)
    }
}

impl Encodable for TxStatus {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        match self {
            TxStatus::Pending => 0x01u8.consensus_encode(writer),
            TxStatus::InProgress => 0x02u8.consensus_encode(writer),
            TxStatus::Completed => 0x03u8.consensus_encode(writer),
            TxStatus::Canceled => 0x04u8.consensus_encode(writer),
            TxStatus::Failed => 0x05u8.consensus_encode(writer),
        }
    }
}

impl Decodable for TxStatus {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match Decodable::consensus_decode(d)? {
            0x01u8 => Ok(TxStatus::Pending),
            0x02u8 => Ok(TxStatus::InProgress),
            0x03u8 => Ok(TxStatus::Completed),
            0x04u8 => Ok(TxStatus::Canceled),
            0x05u8 => Ok(TxStatus::Failed),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(TxStatus);

/// Top level state of a swap. Persisted under the `State` parameter of the
/// default partition; the machine performs at most one transition per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(Debug)]
pub enum State {
    Initial,
    BuildingNativeLockTx,
    BuildingNativeRefundTx,
    BuildingNativeRedeemTx,
    HandlingContractTx,
    SendingNativeLockTx,
    SendingNativeRedeemTx,
    SendingNativeRefundTx,
    SendingRedeemTx,
    SendingRefundTx,
    CompleteSwap,
    Canceled,
    Failed,
    Refunded,
}

impl State {
    /// Exactly one of these is reached and never left.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            State::CompleteSwap | State::Canceled | State::Failed | State::Refunded
        )
    }
}

impl Encodable for State {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let code: u32 = match self {
            State::Initial => 0,
            State::BuildingNativeLockTx => 1,
            State::BuildingNativeRefundTx => 2,
            State::BuildingNativeRedeemTx => 3,
            State::HandlingContractTx => 4,
            State::SendingNativeLockTx => 5,
            State::SendingNativeRedeemTx => 6,
            State::SendingNativeRefundTx => 7,
            State::SendingRedeemTx => 8,
            State::SendingRefundTx => 9,
            State::CompleteSwap => 10,
            State::Canceled => 11,
            State::Failed => 12,
            State::Refunded => 13,
        };
        code.consensus_encode(writer)
    }
}

impl Decodable for State {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match u32::consensus_decode(d)? {
            0 => Ok(State::Initial),
            1 => Ok(State::BuildingNativeLockTx),
            2 => Ok(State::BuildingNativeRefundTx),
            3 => Ok(State::BuildingNativeRedeemTx),
            4 => Ok(State::HandlingContractTx),
            5 => Ok(State::SendingNativeLockTx),
            6 => Ok(State::SendingNativeRedeemTx),
            7 => Ok(State::SendingNativeRefundTx),
            8 => Ok(State::SendingRedeemTx),
            9 => Ok(State::SendingRefundTx),
            10 => Ok(State::CompleteSwap),
            11 => Ok(State::Canceled),
            12 => Ok(State::Failed),
            13 => Ok(State::Refunded),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(State);

/// Construction state of one sub-transaction, persisted under the `State`
/// parameter of its partition. Kept separate from the top level [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(Debug)]
pub enum SubTxState {
    Initial,
    Invitation,
    Constructed,
}

impl Encodable for SubTxState {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        match self {
            SubTxState::Initial => 0x01u8.consensus_encode(writer),
            SubTxState::Invitation => 0x02u8.consensus_encode(writer),
            SubTxState::Constructed => 0x03u8.consensus_encode(writer),
        }
    }
}

impl Decodable for SubTxState {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match u8::consensus_decode(d)? {
            0x01u8 => Ok(SubTxState::Initial),
            0x02u8 => Ok(SubTxState::Invitation),
            0x03u8 => Ok(SubTxState::Constructed),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(SubTxState);

/// A wallet coin: a spendable native output with its blinding factor, as
/// handed out by the owning wallet. Key derivation stays in the wallet; the
/// protocol only ever sees the resulting scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coin {
    pub id: u64,
    pub amount: Amount,
    pub blinding: Scalar,
}

impl Encodable for Coin {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.id.consensus_encode(s)?;
        len += self.amount.consensus_encode(s)?;
        Ok(len + self.blinding.consensus_encode(s)?)
    }
}

impl Decodable for Coin {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Coin {
            id: Decodable::consensus_decode(d)?,
            amount: Decodable::consensus_decode(d)?,
            blinding: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(Coin);

/// The coin family of the foreign chain, selecting the side adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(Debug)]
pub enum ForeignCoin {
    Bitcoin,
    Litecoin,
}

impl FromStr for ForeignCoin {
    type Err = consensus::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "btc" | "bitcoin" | "Bitcoin" => Ok(ForeignCoin::Bitcoin),
            "ltc" | "litecoin" | "Litecoin" => Ok(ForeignCoin::Litecoin),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl Encodable for ForeignCoin {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        match self {
            ForeignCoin::Bitcoin => 0x01u8.consensus_encode(writer),
            ForeignCoin::Litecoin => 0x02u8.consensus_encode(writer),
        }
    }
}

impl Decodable for ForeignCoin {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match u8::consensus_decode(d)? {
            0x01u8 => Ok(ForeignCoin::Bitcoin),
            0x02u8 => Ok(ForeignCoin::Litecoin),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(ForeignCoin);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};

    #[test]
    fn swap_id_roundtrip() {
        let id = SwapId::random();
        assert_eq!(deserialize::<SwapId>(&serialize(&id)).unwrap(), id);
    }

    #[test]
    fn state_codes_roundtrip() {
        for state in [
            State::Initial,
            State::HandlingContractTx,
            State::SendingNativeRedeemTx,
            State::Refunded,
        ] {
            assert_eq!(deserialize::<State>(&serialize(&state)).unwrap(), state);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TxStatus::Pending.is_terminal());
        assert!(!TxStatus::InProgress.is_terminal());
        assert!(TxStatus::Completed.is_terminal());
        assert!(TxStatus::Canceled.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
    }
}
