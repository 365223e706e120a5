//! The foreign chain seen through a capability set. The state machine never
//! talks to a foreign chain directly; a per-coin adapter implements this
//! polled, non-blocking interface and keeps its own progress in the swap's
//! parameter store under the foreign partitions.

use thiserror::Error;

use std::collections::HashMap;

use crate::messages::Message;
use crate::params::{ParameterId, ParameterStore};
use crate::swap::ForeignCoin;

/// Side adapter resolution errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No factory registered for the requested coin family.
    #[error("No second side factory registered for {0}")]
    FactoryNotRegistered(ForeignCoin),
    /// The adapter is not available yet; the swap retries on a later turn.
    #[error("Second side not initialized yet")]
    Uninitialized,
}

/// Capability set of a foreign chain adapter. Every method is polled: a
/// `false` means "not yet, ask again on the next tip". The adapter never
/// blocks.
pub trait SecondSide {
    /// Idempotent setup, e.g. deriving keys and waiting for the peer's
    /// foreign public key. Must eventually return true or the swap times
    /// out in its initial state.
    fn initialize(&mut self, store: &mut ParameterStore) -> Result<bool, crate::Error>;

    /// Initiator only: choose the foreign lock time respecting the safety
    /// margin against the native refund window.
    fn init_lock_time(&mut self, store: &mut ParameterStore) -> Result<(), crate::Error>;

    /// Responder only: reject a peer-chosen lock time violating the margin.
    fn validate_lock_time(&self, store: &ParameterStore) -> bool;

    /// Foreign side pre-flight before broadcasting its lock.
    fn has_enough_time_to_process_lock_tx(&self, store: &ParameterStore) -> bool;

    fn send_lock_tx(&mut self, store: &mut ParameterStore) -> bool;
    fn confirm_lock_tx(&mut self, store: &mut ParameterStore) -> bool;

    fn is_lock_time_expired(&self, store: &ParameterStore) -> bool;

    fn send_refund(&mut self, store: &mut ParameterStore) -> bool;
    fn confirm_refund_tx(&mut self, store: &mut ParameterStore) -> bool;

    fn send_redeem(&mut self, store: &mut ParameterStore) -> bool;
    fn confirm_redeem_tx(&mut self, store: &mut ParameterStore) -> bool;

    /// Fill the peer-observable identifiers of the foreign lock into an
    /// outgoing message.
    fn add_tx_details(&self, store: &ParameterStore, msg: &mut Message);
}

/// Creates adapters for one coin family.
pub trait SecondSideFactory {
    fn create_second_side(
        &self,
        store: &ParameterStore,
        is_native_side: bool,
    ) -> Box<dyn SecondSide>;
}

/// Registry mapping coin families to adapter factories. The state machine
/// resolves its adapter lazily on first use.
#[derive(Default)]
pub struct SecondSideRegistry {
    factories: HashMap<ForeignCoin, Box<dyn SecondSideFactory>>,
}

impl SecondSideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, coin: ForeignCoin, factory: Box<dyn SecondSideFactory>) {
        self.factories.insert(coin, factory);
    }

    /// Resolve the adapter for a swap from its persisted coin family.
    pub fn create(&self, store: &ParameterStore) -> Result<Box<dyn SecondSide>, crate::Error> {
        let coin = store.get_required::<ForeignCoin>(ParameterId::AtomicSwapCoin)?;
        let is_native_side =
            store.get_required::<bool>(ParameterId::AtomicSwapIsNativeSide)?;
        let factory = self
            .factories
            .get(&coin)
            .ok_or(Error::FactoryNotRegistered(coin))?;
        Ok(factory.create_second_side(store, is_native_side))
    }
}
