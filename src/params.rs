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

//! The per-swap parameter store: a typed dictionary keyed by
//! `(sub-transaction, parameter)` holding everything a swap needs to resume
//! after a restart. Writes produced by one state machine turn are staged and
//! committed together, so a crash between turns never observes a partial
//! turn.

use thiserror::Error;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;

use crate::consensus::{self, Decodable, Encodable};
use crate::crypto::{Point, ProofNonces, ProofPartial, Scalar};
use crate::swap::{Coin, ForeignCoin, State, SubTxState, SwapId, TxStatus, WalletId};
use crate::transaction::{KernelId, TxKernel};

/// Parameter store errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A required parameter is absent.
    #[error("Missing parameter {0}")]
    MissingParameter(ParameterId),
    /// A parameter is present with an unexpected payload type.
    #[error("Type mismatch for parameter {0}")]
    TypeMismatch(ParameterId),
}

/// Partitions of the parameter store, one per sub-transaction. `Default`
/// holds the top level swap parameters. The foreign partitions are written
/// by the side adapter only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(Debug)]
pub enum SubTxId {
    Default,
    ForeignLockTx,
    NativeLockTx,
    NativeRefundTx,
    NativeRedeemTx,
    ForeignRefundTx,
    ForeignRedeemTx,
}

impl SubTxId {
    fn code(&self) -> u16 {
        match self {
            SubTxId::Default => 0,
            SubTxId::ForeignLockTx => 1,
            SubTxId::NativeLockTx => 2,
            SubTxId::NativeRefundTx => 3,
            SubTxId::NativeRedeemTx => 4,
            SubTxId::ForeignRefundTx => 5,
            SubTxId::ForeignRedeemTx => 6,
        }
    }
}

impl Encodable for SubTxId {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.code().consensus_encode(s)
    }
}

impl Decodable for SubTxId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match u16::consensus_decode(d)? {
            0 => Ok(SubTxId::Default),
            1 => Ok(SubTxId::ForeignLockTx),
            2 => Ok(SubTxId::NativeLockTx),
            3 => Ok(SubTxId::NativeRefundTx),
            4 => Ok(SubTxId::NativeRedeemTx),
            5 => Ok(SubTxId::ForeignRefundTx),
            6 => Ok(SubTxId::ForeignRedeemTx),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(SubTxId);

macro_rules! parameter_ids {
    ($($name:ident = $code:expr),* $(,)?) => {
        /// Closed enumeration of parameter identifiers. Each identifier has
        /// one expected payload kind enforced by the typed accessors.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum ParameterId {
            $($name,)*
        }

        impl ParameterId {
            fn code(&self) -> u8 {
                match self {
                    $(ParameterId::$name => $code,)*
                }
            }

            fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(ParameterId::$name),)*
                    _ => None,
                }
            }
        }

        impl fmt::Display for ParameterId {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    $(ParameterId::$name => f.write_str(stringify!($name)),)*
                }
            }
        }
    };
}

parameter_ids! {
    TransactionType = 0,
    Amount = 1,
    Fee = 2,
    MinHeight = 3,
    MaxHeight = 4,
    Lifetime = 5,
    CreateTime = 6,
    ModifyTime = 7,
    IsSender = 8,
    IsInitiator = 9,
    MyId = 10,
    PeerId = 11,
    Status = 12,
    State = 13,
    FailureReason = 14,
    InternalFailureReason = 15,
    PeerProtoVersion = 16,
    PeerResponseTime = 17,
    PeerResponseHeight = 18,
    PeerMaxHeight = 19,

    PeerPublicExcess = 30,
    PeerPublicNonce = 31,
    PeerSignature = 32,
    PeerOffset = 33,
    PeerSharedBulletProofPart2 = 34,
    PeerSharedBulletProofPart3 = 35,
    PeerPublicSharedBlindingFactor = 36,
    SubTxIndex = 37,

    AtomicSwapCoin = 50,
    AtomicSwapAmount = 51,
    AtomicSwapIsNativeSide = 52,
    AtomicSwapPublicKey = 53,
    AtomicSwapPeerPublicKey = 54,
    AtomicSwapExternalLockTime = 55,
    AtomicSwapExternalTxId = 56,
    AtomicSwapExternalTxOutputIndex = 57,
    AtomicSwapSecretPublicKey = 58,
    AtomicSwapSecretPrivateKey = 59,

    KernelId = 70,
    KernelProofHeight = 71,
    KernelUnconfirmedHeight = 72,
    TransactionRegistered = 73,
    Kernel = 74,
    SharedCoinId = 75,

    Offset = 90,
    Nonce = 91,
    BlindingExcess = 92,
    SharedBlindingFactor = 93,
    InputCoins = 94,
    ChangeAmount = 95,
    ChangeCoin = 96,
}

impl ParameterId {
    /// Whether a peer message is allowed to write this parameter into the
    /// store. Secret bearing and machine owned identifiers are rejected at
    /// ingestion.
    pub fn is_peer_settable(&self) -> bool {
        matches!(
            self,
            ParameterId::Amount
                | ParameterId::Fee
                | ParameterId::MinHeight
                | ParameterId::Lifetime
                | ParameterId::IsSender
                | ParameterId::FailureReason
                | ParameterId::PeerProtoVersion
                | ParameterId::PeerMaxHeight
                | ParameterId::PeerPublicExcess
                | ParameterId::PeerPublicNonce
                | ParameterId::PeerSignature
                | ParameterId::PeerOffset
                | ParameterId::PeerSharedBulletProofPart2
                | ParameterId::PeerSharedBulletProofPart3
                | ParameterId::PeerPublicSharedBlindingFactor
                | ParameterId::AtomicSwapCoin
                | ParameterId::AtomicSwapAmount
                | ParameterId::AtomicSwapIsNativeSide
                | ParameterId::AtomicSwapPeerPublicKey
                | ParameterId::AtomicSwapExternalLockTime
                | ParameterId::AtomicSwapExternalTxId
                | ParameterId::AtomicSwapExternalTxOutputIndex
        )
    }
}

impl Encodable for ParameterId {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.code().consensus_encode(s)
    }
}

impl Decodable for ParameterId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        ParameterId::from_code(u8::consensus_decode(d)?).ok_or(consensus::Error::UnknownType)
    }
}

impl_strict_encoding!(ParameterId);

/// Reason a swap or one of its sub-transactions failed. The only failure
/// information ever put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Unknown,
    Canceled,
    InvalidPeerSignature,
    FailedToCreateMultiSig,
    InvalidTransaction,
    MaxHeightUnacceptable,
    NotEnoughTimeToFinishForeignTx,
    TransactionExpired,
    FailedToRegister,
    FailedToSendParameters,
    SubTxFailed,
    FailToStartSwap,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            FailureReason::Unknown => "Unexpected reason, please send wallet logs",
            FailureReason::Canceled => "Transaction cancelled",
            FailureReason::InvalidPeerSignature => "Peer's signature is not valid",
            FailureReason::FailedToCreateMultiSig => "Failed to create multi-signature",
            FailureReason::InvalidTransaction => "Transaction is not valid",
            FailureReason::MaxHeightUnacceptable => "Kernel maximum height is unacceptable",
            FailureReason::NotEnoughTimeToFinishForeignTx => {
                "Not enough time to finish the foreign chain transaction"
            }
            FailureReason::TransactionExpired => "Transaction has expired",
            FailureReason::FailedToRegister => "Transaction not registered by the node",
            FailureReason::FailedToSendParameters => "Failed to send tx parameters",
            FailureReason::SubTxFailed => "Subtransaction has failed",
            FailureReason::FailToStartSwap => "Failed to start the swap",
        };
        write!(f, "{}", msg)
    }
}

impl Encodable for FailureReason {
    fn consensus_encode<W: io::Write>(&self, writer: &mut W) -> Result<usize, io::Error> {
        let code: u8 = match self {
            FailureReason::Unknown => 0,
            FailureReason::Canceled => 1,
            FailureReason::InvalidPeerSignature => 2,
            FailureReason::FailedToCreateMultiSig => 3,
            FailureReason::InvalidTransaction => 4,
            FailureReason::MaxHeightUnacceptable => 5,
            FailureReason::NotEnoughTimeToFinishForeignTx => 6,
            FailureReason::TransactionExpired => 7,
            FailureReason::FailedToRegister => 8,
            FailureReason::FailedToSendParameters => 9,
            FailureReason::SubTxFailed => 10,
            FailureReason::FailToStartSwap => 11,
        };
        code.consensus_encode(writer)
    }
}

impl Decodable for FailureReason {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match u8::consensus_decode(d)? {
            0 => Ok(FailureReason::Unknown),
            1 => Ok(FailureReason::Canceled),
            2 => Ok(FailureReason::InvalidPeerSignature),
            3 => Ok(FailureReason::FailedToCreateMultiSig),
            4 => Ok(FailureReason::InvalidTransaction),
            5 => Ok(FailureReason::MaxHeightUnacceptable),
            6 => Ok(FailureReason::NotEnoughTimeToFinishForeignTx),
            7 => Ok(FailureReason::TransactionExpired),
            8 => Ok(FailureReason::FailedToRegister),
            9 => Ok(FailureReason::FailedToSendParameters),
            10 => Ok(FailureReason::SubTxFailed),
            11 => Ok(FailureReason::FailToStartSwap),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(FailureReason);

/// Typed payload of a parameter. The closed sum replaces the original's
/// untyped byte buffers with runtime type assertions: a mistyped read is an
/// explicit error, not a reinterpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U32(u32),
    U64(u64),
    Str(String),
    WalletId(WalletId),
    Scalar(Scalar),
    Point(Point),
    ProofNonces(ProofNonces),
    ProofPartial(ProofPartial),
    KernelId(KernelId),
    Kernel(TxKernel),
    State(State),
    SubTxState(SubTxState),
    Status(TxStatus),
    FailureReason(FailureReason),
    ForeignCoin(ForeignCoin),
    SubTxId(SubTxId),
    Coin(Coin),
    Coins(Vec<Coin>),
}

impl Encodable for Value {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        macro_rules! tagged {
            ($tag:expr, $inner:expr) => {{
                let len = ($tag as u8).consensus_encode(s)?;
                Ok(len + $inner.consensus_encode(s)?)
            }};
        }
        match self {
            Value::Bool(v) => tagged!(1, v),
            Value::U32(v) => tagged!(2, v),
            Value::U64(v) => tagged!(3, v),
            Value::Str(v) => tagged!(4, v),
            Value::WalletId(v) => tagged!(5, v),
            Value::Scalar(v) => tagged!(6, v),
            Value::Point(v) => tagged!(7, v),
            Value::ProofNonces(v) => tagged!(8, v),
            Value::ProofPartial(v) => tagged!(9, v),
            Value::KernelId(v) => tagged!(10, v),
            Value::Kernel(v) => tagged!(11, v),
            Value::State(v) => tagged!(12, v),
            Value::SubTxState(v) => tagged!(13, v),
            Value::Status(v) => tagged!(14, v),
            Value::FailureReason(v) => tagged!(15, v),
            Value::ForeignCoin(v) => tagged!(16, v),
            Value::SubTxId(v) => tagged!(17, v),
            Value::Coin(v) => tagged!(18, v),
            Value::Coins(v) => tagged!(19, v),
        }
    }
}

impl Decodable for Value {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match u8::consensus_decode(d)? {
            1 => Ok(Value::Bool(Decodable::consensus_decode(d)?)),
            2 => Ok(Value::U32(Decodable::consensus_decode(d)?)),
            3 => Ok(Value::U64(Decodable::consensus_decode(d)?)),
            4 => Ok(Value::Str(Decodable::consensus_decode(d)?)),
            5 => Ok(Value::WalletId(Decodable::consensus_decode(d)?)),
            6 => Ok(Value::Scalar(Decodable::consensus_decode(d)?)),
            7 => Ok(Value::Point(Decodable::consensus_decode(d)?)),
            8 => Ok(Value::ProofNonces(Decodable::consensus_decode(d)?)),
            9 => Ok(Value::ProofPartial(Decodable::consensus_decode(d)?)),
            10 => Ok(Value::KernelId(Decodable::consensus_decode(d)?)),
            11 => Ok(Value::Kernel(Decodable::consensus_decode(d)?)),
            12 => Ok(Value::State(Decodable::consensus_decode(d)?)),
            13 => Ok(Value::SubTxState(Decodable::consensus_decode(d)?)),
            14 => Ok(Value::Status(Decodable::consensus_decode(d)?)),
            15 => Ok(Value::FailureReason(Decodable::consensus_decode(d)?)),
            16 => Ok(Value::ForeignCoin(Decodable::consensus_decode(d)?)),
            17 => Ok(Value::SubTxId(Decodable::consensus_decode(d)?)),
            18 => Ok(Value::Coin(Decodable::consensus_decode(d)?)),
            19 => Ok(Value::Coins(Decodable::consensus_decode(d)?)),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl_strict_encoding!(Value);

/// Conversion between a concrete payload type and [`Value`]. Implementers
/// are exactly the payload kinds of the closed sum.
pub trait Parameter: Sized {
    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_parameter {
    ($type:ty, $variant:ident) => {
        impl Parameter for $type {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_parameter!(bool, Bool);
impl_parameter!(u32, U32);
impl_parameter!(u64, U64);
impl_parameter!(String, Str);
impl_parameter!(WalletId, WalletId);
impl_parameter!(Scalar, Scalar);
impl_parameter!(Point, Point);
impl_parameter!(ProofNonces, ProofNonces);
impl_parameter!(ProofPartial, ProofPartial);
impl_parameter!(KernelId, KernelId);
impl_parameter!(TxKernel, Kernel);
impl_parameter!(State, State);
impl_parameter!(SubTxState, SubTxState);
impl_parameter!(TxStatus, Status);
impl_parameter!(FailureReason, FailureReason);
impl_parameter!(ForeignCoin, ForeignCoin);
impl_parameter!(SubTxId, SubTxId);
impl_parameter!(Coin, Coin);
impl_parameter!(Vec<Coin>, Coins);

/// One persisted parameter record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub sub_tx: SubTxId,
    pub id: ParameterId,
    pub value: Value,
}

impl Encodable for Record {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.sub_tx.consensus_encode(s)?;
        len += self.id.consensus_encode(s)?;
        Ok(len + self.value.consensus_encode(s)?)
    }
}

impl Decodable for Record {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Record {
            sub_tx: Decodable::consensus_decode(d)?,
            id: Decodable::consensus_decode(d)?,
            value: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(Record);

/// Persistence behind the parameter store. One `persist` call receives all
/// records staged by a single state machine turn.
pub trait Storage {
    fn persist(&mut self, swap: SwapId, records: &[Record]);
    fn load(&self, swap: SwapId) -> Vec<Record>;
}

/// The per-swap parameter store.
#[derive(Debug, Default, Clone)]
pub struct ParameterStore {
    committed: BTreeMap<(SubTxId, ParameterId), Value>,
    staged: BTreeMap<(SubTxId, ParameterId), Value>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted records.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut committed = BTreeMap::new();
        for record in records {
            committed.insert((record.sub_tx, record.id), record.value);
        }
        ParameterStore {
            committed,
            staged: BTreeMap::new(),
        }
    }

    /// Read a parameter from the default partition.
    pub fn get<T: Parameter>(&self, id: ParameterId) -> Option<T> {
        self.get_sub(id, SubTxId::Default)
    }

    /// Read a parameter from the given partition. Staged writes of the
    /// current turn are visible.
    pub fn get_sub<T: Parameter>(&self, id: ParameterId, sub_tx: SubTxId) -> Option<T> {
        self.staged
            .get(&(sub_tx, id))
            .or_else(|| self.committed.get(&(sub_tx, id)))
            .and_then(T::from_value)
    }

    /// Read a mandatory parameter from the default partition.
    pub fn get_required<T: Parameter>(&self, id: ParameterId) -> Result<T, Error> {
        self.get_required_sub(id, SubTxId::Default)
    }

    /// Read a mandatory parameter from the given partition.
    pub fn get_required_sub<T: Parameter>(
        &self,
        id: ParameterId,
        sub_tx: SubTxId,
    ) -> Result<T, Error> {
        match self
            .staged
            .get(&(sub_tx, id))
            .or_else(|| self.committed.get(&(sub_tx, id)))
        {
            None => Err(Error::MissingParameter(id)),
            Some(value) => T::from_value(value).ok_or(Error::TypeMismatch(id)),
        }
    }

    /// Stage a write on the default partition.
    pub fn set<T: Parameter>(&mut self, id: ParameterId, value: T) {
        self.set_sub(id, value, SubTxId::Default)
    }

    /// Stage a write on the given partition.
    pub fn set_sub<T: Parameter>(&mut self, id: ParameterId, value: T, sub_tx: SubTxId) {
        self.staged.insert((sub_tx, id), value.into_value());
    }

    /// Stage a write only if the parameter is not already present.
    pub fn set_default<T: Parameter>(&mut self, id: ParameterId, value: T, sub_tx: SubTxId) {
        if self.get_sub::<Value>(id, sub_tx).is_none() {
            self.set_sub(id, value, sub_tx);
        }
    }

    /// Whether the current turn staged any write.
    pub fn is_dirty(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Flush the staged writes of the current turn into the committed view
    /// and persist them in one batch.
    pub fn commit<S: Storage + ?Sized>(&mut self, swap: SwapId, storage: &mut S) {
        if self.staged.is_empty() {
            return;
        }
        let records: Vec<Record> = self
            .staged
            .iter()
            .map(|((sub_tx, id), value)| Record {
                sub_tx: *sub_tx,
                id: *id,
                value: value.clone(),
            })
            .collect();
        self.committed.append(&mut self.staged);
        storage.persist(swap, &records);
    }

    /// The committed view as records, for audit and tests.
    pub fn records(&self) -> Vec<Record> {
        self.committed
            .iter()
            .map(|((sub_tx, id), value)| Record {
                sub_tx: *sub_tx,
                id: *id,
                value: value.clone(),
            })
            .collect()
    }
}

impl Parameter for Value {
    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// In-memory [`Storage`], the reference implementation used by the test
/// suites and by tools replaying persisted swaps.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    swaps: HashMap<SwapId, BTreeMap<(SubTxId, ParameterId), Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn persist(&mut self, swap: SwapId, records: &[Record]) {
        let entry = self.swaps.entry(swap).or_default();
        for record in records {
            entry.insert((record.sub_tx, record.id), record.value.clone());
        }
    }

    fn load(&self, swap: SwapId) -> Vec<Record> {
        self.swaps
            .get(&swap)
            .map(|entries| {
                entries
                    .iter()
                    .map(|((sub_tx, id), value)| Record {
                        sub_tx: *sub_tx,
                        id: *id,
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};

    #[test]
    fn typed_access() {
        let mut store = ParameterStore::new();
        store.set(ParameterId::Amount, 42u64);
        assert_eq!(store.get::<u64>(ParameterId::Amount), Some(42));
        assert_eq!(store.get::<bool>(ParameterId::Amount), None);
        assert_eq!(
            store.get_required::<bool>(ParameterId::Amount),
            Err(Error::TypeMismatch(ParameterId::Amount))
        );
        assert_eq!(
            store.get_required::<u64>(ParameterId::Fee),
            Err(Error::MissingParameter(ParameterId::Fee))
        );
    }

    #[test]
    fn partitions_are_disjoint() {
        let mut store = ParameterStore::new();
        store.set_sub(ParameterId::Fee, 7u64, SubTxId::NativeLockTx);
        assert_eq!(store.get::<u64>(ParameterId::Fee), None);
        assert_eq!(
            store.get_sub::<u64>(ParameterId::Fee, SubTxId::NativeLockTx),
            Some(7)
        );
    }

    #[test]
    fn staged_writes_commit_in_batch() {
        let swap = SwapId::random();
        let mut storage = MemoryStorage::new();
        let mut store = ParameterStore::new();

        store.set(ParameterId::Amount, 10u64);
        store.set(ParameterId::Fee, 1u64);
        assert!(storage.load(swap).is_empty());

        store.commit(swap, &mut storage);
        assert_eq!(storage.load(swap).len(), 2);

        let restored = ParameterStore::from_records(storage.load(swap));
        assert_eq!(restored.get::<u64>(ParameterId::Amount), Some(10));
        assert_eq!(restored.get::<u64>(ParameterId::Fee), Some(1));
    }

    #[test]
    fn set_default_does_not_overwrite() {
        let mut store = ParameterStore::new();
        store.set(ParameterId::Lifetime, 100u64);
        store.set_default(ParameterId::Lifetime, 200u64, SubTxId::Default);
        assert_eq!(store.get::<u64>(ParameterId::Lifetime), Some(100));
    }

    #[test]
    fn record_roundtrip() {
        let record = Record {
            sub_tx: SubTxId::NativeRedeemTx,
            id: ParameterId::KernelProofHeight,
            value: Value::U64(420),
        };
        assert_eq!(deserialize::<Record>(&serialize(&record)).unwrap(), record);
    }

    #[test]
    fn secret_ids_are_not_peer_settable() {
        assert!(!ParameterId::AtomicSwapSecretPrivateKey.is_peer_settable());
        assert!(!ParameterId::Offset.is_peer_settable());
        assert!(!ParameterId::Nonce.is_peer_settable());
        assert!(!ParameterId::BlindingExcess.is_peer_settable());
        assert!(!ParameterId::SharedBlindingFactor.is_peer_settable());
        assert!(!ParameterId::State.is_peer_settable());
        assert!(ParameterId::PeerPublicExcess.is_peer_settable());
    }
}
