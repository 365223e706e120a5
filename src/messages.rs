//! Peer wire messages. A message is a bundle of `(parameter, value)` pairs
//! scoped by a sub-transaction, named from the receiver's point of view: a
//! party sends its own public excess under `PeerPublicExcess` so the
//! receiver stores it unchanged.

use std::io;

use crate::consensus::{self, Decodable, Encodable};
use crate::params::{Parameter, ParameterId, ParameterStore, SubTxId, Value};
use crate::swap::SwapId;

/// A parameter bundle exchanged between the two parties.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub swap_id: SwapId,
    pub sub_tx: SubTxId,
    parameters: Vec<(ParameterId, Value)>,
}

impl Message {
    /// Start an empty bundle on the default partition.
    pub fn new(swap_id: SwapId) -> Self {
        Message {
            swap_id,
            sub_tx: SubTxId::Default,
            parameters: Vec::new(),
        }
    }

    /// Scope the bundle to a sub-transaction partition.
    pub fn with_sub_tx(mut self, sub_tx: SubTxId) -> Self {
        self.sub_tx = sub_tx;
        self
    }

    /// Add a parameter, builder style.
    pub fn with<T: Parameter>(mut self, id: ParameterId, value: T) -> Self {
        self.add(id, value);
        self
    }

    /// Add a parameter.
    pub fn add<T: Parameter>(&mut self, id: ParameterId, value: T) {
        self.parameters.push((id, value.into_value()));
    }

    /// Read a parameter out of the bundle.
    pub fn get<T: Parameter>(&self, id: ParameterId) -> Option<T> {
        self.parameters
            .iter()
            .find(|(param, _)| *param == id)
            .and_then(|(_, value)| T::from_value(value))
    }

    pub fn contains(&self, id: ParameterId) -> bool {
        self.parameters.iter().any(|(param, _)| *param == id)
    }

    pub fn parameters(&self) -> &[(ParameterId, Value)] {
        &self.parameters
    }

    /// Ingest the bundle into the receiving store. Identifiers a peer is not
    /// allowed to write, secret bearing ones included, are dropped here
    /// before they can reach the store.
    pub fn apply(&self, store: &mut ParameterStore) {
        for (id, value) in &self.parameters {
            if !id.is_peer_settable() {
                log::warn!(
                    "{} dropping non peer-settable parameter {} from message",
                    self.swap_id,
                    id
                );
                continue;
            }
            store.set_sub(*id, value.clone(), self.sub_tx);
        }
    }
}

impl Encodable for Message {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.swap_id.consensus_encode(s)?;
        len += self.sub_tx.consensus_encode(s)?;
        Ok(len + self.parameters.consensus_encode(s)?)
    }
}

impl Encodable for (ParameterId, Value) {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let len = self.0.consensus_encode(s)?;
        Ok(len + self.1.consensus_encode(s)?)
    }
}

impl Decodable for (ParameterId, Value) {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok((
            Decodable::consensus_decode(d)?,
            Decodable::consensus_decode(d)?,
        ))
    }
}

impl Decodable for Message {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Message {
            swap_id: Decodable::consensus_decode(d)?,
            sub_tx: Decodable::consensus_decode(d)?,
            parameters: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(Message);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};
    use crate::crypto::random_scalar;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn bundle_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let msg = Message::new(SwapId::random())
            .with_sub_tx(SubTxId::NativeLockTx)
            .with(ParameterId::Fee, 100u64)
            .with(ParameterId::PeerProtoVersion, 4u32)
            .with(ParameterId::PeerOffset, random_scalar(&mut rng));
        let decoded: Message = deserialize(&serialize(&msg)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn apply_filters_non_peer_settable() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let mut store = ParameterStore::new();
        let msg = Message::new(SwapId::random())
            .with(ParameterId::Amount, 10u64)
            .with(
                ParameterId::AtomicSwapSecretPrivateKey,
                random_scalar(&mut rng),
            );
        msg.apply(&mut store);
        assert_eq!(store.get::<u64>(ParameterId::Amount), Some(10));
        assert!(store
            .get::<crate::crypto::Scalar>(ParameterId::AtomicSwapSecretPrivateKey)
            .is_none());
    }
}
