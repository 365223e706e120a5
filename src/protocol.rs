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

//! The swap state machine. One [`AtomicSwap`] drives one swap from the
//! invitation handshake to a terminal state, advancing by at most one
//! transition per turn and persisting every turn through the parameter
//! store, so a crashed wallet resumes exactly where it stopped.
//!
//! The machine is a synchronous step function. It never blocks: when it
//! cannot progress it registers interest in the next tip or the next
//! scheduler tick through the [`Gateway`] and returns.

use crate::builders::{LockTxBuilder, SharedTxBuilder};
use crate::crypto::{self, Scalar};
use crate::messages::Message;
use crate::params::{
    FailureReason, ParameterId, ParameterStore, Storage, SubTxId,
};
use crate::side::{self, SecondSide, SecondSideRegistry};
use crate::swap::{
    Amount, Coin, ForeignCoin, Height, State, SubTxState, SwapId, Timestamp, TxStatus, WalletId,
    NATIVE_LOCK_TIME_BLOCKS, PROTO_VERSION,
};
use crate::syncer::{ChainEvent, Gateway, RegistrationStatus, Wallet};
use crate::transaction::{KernelId, Transaction, TxKernel, ValidationContext};
use crate::Error;

/// Transaction type tag recorded for every swap.
pub const ATOMIC_SWAP_TX_TYPE: u32 = 5;

/// Flat fee charged on the native withdrawals.
// TODO(fee): derive the withdraw fee from the node's fee rate instead.
pub const WITHDRAW_FEE: Amount = 100;

/// Build the parameter set of a fresh swap, on the side that publishes it.
/// The published side is not the wire initiator: the accepting party opens
/// the conversation.
#[allow(clippy::too_many_arguments)]
pub fn init_new_swap(
    my_id: WalletId,
    min_height: Height,
    amount: Amount,
    fee: Amount,
    swap_coin: ForeignCoin,
    swap_amount: Amount,
    is_native_side: bool,
    lifetime: Height,
    response_time: Height,
    create_time: Timestamp,
) -> (SwapId, ParameterStore) {
    let id = SwapId::random();
    let mut store = ParameterStore::new();

    store.set(ParameterId::TransactionType, ATOMIC_SWAP_TX_TYPE);
    store.set(ParameterId::CreateTime, create_time);
    store.set(ParameterId::Amount, amount);
    store.set(ParameterId::Fee, fee);
    store.set(ParameterId::Lifetime, lifetime);

    store.set(ParameterId::MinHeight, min_height);
    store.set(ParameterId::PeerResponseTime, response_time);
    store.set(ParameterId::MyId, my_id);
    store.set(ParameterId::IsSender, is_native_side);
    store.set(ParameterId::IsInitiator, false);

    store.set(ParameterId::AtomicSwapCoin, swap_coin);
    store.set(ParameterId::AtomicSwapAmount, swap_amount);
    store.set(ParameterId::AtomicSwapIsNativeSide, is_native_side);

    (id, store)
}

/// Build the accepting side's parameter set from a published one: swap the
/// endpoints, flip the perspective flags, and mark this side as the wire
/// initiator.
pub fn accept_swap_parameters(initial: &ParameterStore, my_id: WalletId) -> ParameterStore {
    let mut store = initial.clone();

    if let Some(peer) = initial.get::<WalletId>(ParameterId::MyId) {
        store.set(ParameterId::PeerId, peer);
    }
    store.set(ParameterId::MyId, my_id);

    let is_native_side = initial
        .get::<bool>(ParameterId::AtomicSwapIsNativeSide)
        .unwrap_or_default();
    store.set(ParameterId::IsSender, !is_native_side);
    store.set(ParameterId::AtomicSwapIsNativeSide, !is_native_side);
    store.set(ParameterId::IsInitiator, true);

    store
}

/// Refuse to start a swap whose peer endpoint is one of our own addresses.
pub fn check_and_complete_parameters(
    store: &ParameterStore,
    wallet: &dyn Wallet,
) -> Result<(), Error> {
    if let Some(peer) = store.get::<WalletId>(ParameterId::PeerId) {
        if wallet.is_own_address(&peer) {
            log::info!("Failed to initiate the atomic swap. Not able to use own address as receiver's.");
            return Err(Error::FailToStartSwap);
        }
    }
    Ok(())
}

/// External collaborators of one machine turn.
pub struct SwapContext<'a> {
    pub wallet: &'a mut dyn Wallet,
    pub gateway: &'a mut dyn Gateway,
    pub registry: &'a SecondSideRegistry,
}

/// Events that wake a swap up. The runtime funnels them into a per-swap
/// queue and delivers them one turn at a time.
#[derive(Debug)]
pub enum SwapEvent {
    /// Scheduler tick requested with `update_async`.
    Tick,
    /// A new native chain tip.
    Tip(Height),
    /// An inbound peer bundle.
    PeerMessage(Message),
    /// A node gateway response.
    Chain(ChainEvent),
}

enum BuildFailure {
    Sub(FailureReason, SubTxId, bool),
    Swap(FailureReason, bool),
}

struct BuildResult {
    state: SubTxState,
    failure: Option<BuildFailure>,
    transaction: Option<Transaction>,
}

/// The per-swap protocol engine.
pub struct AtomicSwap {
    id: SwapId,
    store: ParameterStore,
    second_side: Option<Box<dyn SecondSide>>,
    lock_tx: Option<Transaction>,
    withdraw_tx: Option<Transaction>,
}

impl AtomicSwap {
    pub fn new(id: SwapId, store: ParameterStore) -> Self {
        AtomicSwap {
            id,
            store,
            second_side: None,
            lock_tx: None,
            withdraw_tx: None,
        }
    }

    /// Resume a persisted swap from storage alone.
    pub fn load(id: SwapId, storage: &dyn Storage) -> Self {
        Self::new(id, ParameterStore::from_records(storage.load(id)))
    }

    pub fn id(&self) -> SwapId {
        self.id
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn state(&self) -> State {
        self.store
            .get::<State>(ParameterId::State)
            .unwrap_or(State::Initial)
    }

    pub fn status(&self) -> TxStatus {
        self.store
            .get::<TxStatus>(ParameterId::Status)
            .unwrap_or(TxStatus::Pending)
    }

    fn sub_tx_state(&self, sub_tx: SubTxId) -> SubTxState {
        self.store
            .get_sub::<SubTxState>(ParameterId::State, sub_tx)
            .unwrap_or(SubTxState::Initial)
    }

    fn set_state(&mut self, state: State) {
        self.store.set(ParameterId::State, state);
    }

    fn set_next_state(&mut self, state: State, ctx: &mut SwapContext) {
        self.set_state(state);
        ctx.gateway.update_async(self.id);
    }

    fn set_status(&mut self, status: TxStatus) {
        self.store.set(ParameterId::Status, status);
    }

    /// The role held by this party, derived from the two persisted flags.
    pub fn role(&self) -> crate::role::SwapRole {
        crate::role::SwapRole::from_flags(self.is_native_side(), self.is_initiator())
    }

    fn is_native_side(&self) -> bool {
        self.store
            .get::<bool>(ParameterId::AtomicSwapIsNativeSide)
            .unwrap_or_default()
    }

    fn is_initiator(&self) -> bool {
        self.store
            .get::<bool>(ParameterId::IsInitiator)
            .unwrap_or_default()
    }

    fn is_sender(&self) -> bool {
        self.store
            .get::<bool>(ParameterId::IsSender)
            .unwrap_or_default()
    }

    fn amount(&self) -> Result<Amount, Error> {
        Ok(self.store.get_required::<Amount>(ParameterId::Amount)?)
    }

    fn peer_id(&self) -> Result<WalletId, Error> {
        Ok(self.store.get_required::<WalletId>(ParameterId::PeerId)?)
    }

    /// Resolve the side adapter lazily from the registry.
    fn ensure_second_side(&mut self, ctx: &SwapContext) -> Result<(), Error> {
        if self.second_side.is_none() {
            self.second_side = Some(ctx.registry.create(&self.store)?);
        }
        Ok(())
    }

    /// Entry point for any wake-up event.
    pub fn handle(&mut self, event: SwapEvent, ctx: &mut SwapContext) {
        match event {
            SwapEvent::Tick | SwapEvent::Tip(_) => self.update(ctx),
            SwapEvent::PeerMessage(msg) => self.on_message(msg, ctx),
            SwapEvent::Chain(event) => self.on_chain_event(event, ctx),
        }
    }

    /// Ingest a peer bundle and advance. The bundle becomes visible to this
    /// turn, as it is applied before the step function runs.
    pub fn on_message(&mut self, msg: Message, ctx: &mut SwapContext) {
        msg.apply(&mut self.store);
        self.update(ctx);
    }

    /// Ingest a node gateway response and advance.
    pub fn on_chain_event(&mut self, event: ChainEvent, ctx: &mut SwapContext) {
        match event {
            ChainEvent::TransactionRegistered { sub_tx, status } => {
                self.store
                    .set_sub(ParameterId::TransactionRegistered, status.code(), sub_tx);
            }
            ChainEvent::KernelProof { sub_tx, height } => {
                self.store
                    .set_sub(ParameterId::KernelProofHeight, height, sub_tx);
                self.store
                    .set_sub(ParameterId::KernelUnconfirmedHeight, 0u64, sub_tx);
            }
            ChainEvent::KernelUnconfirmed { sub_tx, height } => {
                self.store
                    .set_sub(ParameterId::KernelUnconfirmedHeight, height, sub_tx);
            }
            ChainEvent::KernelBody { sub_tx, kernel } => {
                self.store.set_sub(ParameterId::Kernel, kernel, sub_tx);
            }
        }
        self.update(ctx);
    }

    /// One turn of the step function. All failures are routed through the
    /// state dependent rollback; the only silently swallowed condition is a
    /// not-yet-available side adapter.
    pub fn update(&mut self, ctx: &mut SwapContext) {
        if let Err(err) = self.update_impl(ctx) {
            match err {
                Error::Side(side::Error::Uninitialized) => {}
                err => {
                    log::error!("{} swap turn failed: {}", self.id, err);
                    let reason = failure_reason_of(&err);
                    self.on_failed(ctx, reason, false);
                }
            }
        }
        self.store.commit(self.id, ctx.wallet);
    }

    fn update_impl(&mut self, ctx: &mut SwapContext) -> Result<(), Error> {
        if self.status().is_terminal() {
            return Ok(());
        }

        self.check_external_failures(ctx);
        if self.check_expired(ctx) {
            return Ok(());
        }
        self.check_sub_tx_failures(ctx);

        let state = self.state();
        let is_native_side = self.is_native_side();

        match state {
            State::Initial => {
                if self
                    .store
                    .get::<Height>(ParameterId::PeerResponseHeight)
                    .is_none()
                {
                    let min_height = self.store.get_required::<Height>(ParameterId::MinHeight)?;
                    let response_time = self
                        .store
                        .get_required::<Height>(ParameterId::PeerResponseTime)?;
                    self.store
                        .set(ParameterId::PeerResponseHeight, min_height + response_time);
                }

                if self.is_initiator() {
                    self.ensure_second_side(ctx)?;
                    let side = self.second_side.as_mut().ok_or(side::Error::Uninitialized)?;
                    if !side.initialize(&mut self.store)? {
                        return Ok(());
                    }
                    side.init_lock_time(&mut self.store)?;
                    self.send_invitation(ctx)?;
                    log::info!("{} Invitation sent.", self.id);
                } else {
                    if self
                        .store
                        .get::<Timestamp>(ParameterId::AtomicSwapExternalLockTime)
                        .is_none()
                    {
                        // No answer from the other participant yet.
                        ctx.gateway.update_on_next_tip(self.id);
                        return Ok(());
                    }
                    self.ensure_second_side(ctx)?;
                    let side = self.second_side.as_mut().ok_or(side::Error::Uninitialized)?;
                    if !side.initialize(&mut self.store)? {
                        return Ok(());
                    }
                    if !side.validate_lock_time(&self.store) {
                        log::error!("{} Lock height is unacceptable.", self.id);
                        self.on_sub_tx_failed(
                            ctx,
                            FailureReason::InvalidTransaction,
                            SubTxId::ForeignLockTx,
                            true,
                        );
                        return Ok(());
                    }
                }

                self.set_next_state(State::BuildingNativeLockTx, ctx);
            }
            State::BuildingNativeLockTx => {
                let lock_state = self.build_native_lock_tx(ctx)?;
                if self.state() != State::BuildingNativeLockTx {
                    // A builder failure already rerouted the swap.
                    return Ok(());
                }
                if lock_state != SubTxState::Constructed {
                    ctx.gateway.update_on_next_tip(self.id);
                    return Ok(());
                }
                log::info!("{} Native LockTx constructed.", self.id);
                self.set_next_state(State::BuildingNativeRefundTx, ctx);
            }
            State::BuildingNativeRefundTx => {
                let sub_state = self.build_native_withdraw_tx(ctx, SubTxId::NativeRefundTx)?;
                if self.state() != State::BuildingNativeRefundTx {
                    return Ok(());
                }
                if sub_state != SubTxState::Constructed {
                    return Ok(());
                }
                self.withdraw_tx = None;
                log::info!("{} Native RefundTx constructed.", self.id);
                self.set_next_state(State::BuildingNativeRedeemTx, ctx);
            }
            State::BuildingNativeRedeemTx => {
                let sub_state = self.build_native_withdraw_tx(ctx, SubTxId::NativeRedeemTx)?;
                if self.state() != State::BuildingNativeRedeemTx {
                    return Ok(());
                }
                if sub_state != SubTxState::Constructed {
                    return Ok(());
                }
                self.withdraw_tx = None;
                log::info!("{} Native RedeemTx constructed.", self.id);
                self.set_next_state(State::HandlingContractTx, ctx);
            }
            State::HandlingContractTx => {
                self.ensure_second_side(ctx)?;
                if !is_native_side {
                    let side = self.second_side.as_mut().ok_or(side::Error::Uninitialized)?;
                    if !side.has_enough_time_to_process_lock_tx(&self.store) {
                        self.on_failed(ctx, FailureReason::NotEnoughTimeToFinishForeignTx, true);
                        return Ok(());
                    }
                    let side = self.second_side.as_mut().ok_or(side::Error::Uninitialized)?;
                    if !side.send_lock_tx(&mut self.store) {
                        return Ok(());
                    }

                    self.send_external_tx_details(ctx)?;

                    // The native lock is the peer's to broadcast; switch our
                    // copy straight to awaiting proofs.
                    self.store.set_sub(
                        ParameterId::TransactionRegistered,
                        RegistrationStatus::Ok.code(),
                        SubTxId::NativeLockTx,
                    );
                } else {
                    let side = self.second_side.as_mut().ok_or(side::Error::Uninitialized)?;
                    if !side.confirm_lock_tx(&mut self.store) {
                        ctx.gateway.update_on_next_tip(self.id);
                        return Ok(());
                    }
                }

                log::info!("{} LockTx completed.", self.id);
                self.set_next_state(State::SendingNativeLockTx, ctx);
            }
            State::SendingRefundTx => {
                debug_assert!(!is_native_side);
                self.ensure_second_side(ctx)?;
                let side = self.second_side.as_mut().ok_or(side::Error::Uninitialized)?;

                if !side.is_lock_time_expired(&self.store) {
                    ctx.gateway.update_on_next_tip(self.id);
                    return Ok(());
                }
                if !side.send_refund(&mut self.store) {
                    return Ok(());
                }
                if !side.confirm_refund_tx(&mut self.store) {
                    ctx.gateway.update_on_next_tip(self.id);
                    return Ok(());
                }

                log::info!("{} RefundTx completed!", self.id);
                self.set_next_state(State::Refunded, ctx);
            }
            State::SendingRedeemTx => {
                debug_assert!(is_native_side);
                self.ensure_second_side(ctx)?;
                let side = self.second_side.as_mut().ok_or(side::Error::Uninitialized)?;

                if !side.send_redeem(&mut self.store) {
                    return Ok(());
                }
                if !side.confirm_redeem_tx(&mut self.store) {
                    ctx.gateway.update_on_next_tip(self.id);
                    return Ok(());
                }

                log::info!("{} RedeemTx completed!", self.id);
                self.set_next_state(State::CompleteSwap, ctx);
            }
            State::SendingNativeLockTx => {
                if self.lock_tx.is_none() && is_native_side {
                    self.build_native_lock_tx(ctx)?;
                    if self.state() != State::SendingNativeLockTx {
                        return Ok(());
                    }
                }

                if let Some(tx) = self.lock_tx.clone() {
                    if !self.send_sub_tx(ctx, &tx, SubTxId::NativeLockTx) {
                        return Ok(());
                    }
                }

                if !is_native_side {
                    self.ensure_second_side(ctx)?;
                    let side = self.second_side.as_mut().ok_or(side::Error::Uninitialized)?;
                    if side.is_lock_time_expired(&self.store) {
                        log::info!("{} Lock time is expired.", self.id);
                        self.set_next_state(State::SendingRefundTx, ctx);
                        return Ok(());
                    }
                }

                if !self.complete_sub_tx(ctx, SubTxId::NativeLockTx)? {
                    return Ok(());
                }

                log::info!("{} Native LockTx completed.", self.id);
                self.set_next_state(State::SendingNativeRedeemTx, ctx);
            }
            State::SendingNativeRedeemTx => {
                if is_native_side {
                    ctx.gateway.update_on_next_tip(self.id);

                    if self.is_native_lock_time_expired(ctx) {
                        // With the secret already extracted this is a chain
                        // rollback, not an expiry; just rerun the
                        // transactions.
                        if self
                            .store
                            .get_sub::<Scalar>(
                                ParameterId::AtomicSwapSecretPrivateKey,
                                SubTxId::NativeRedeemTx,
                            )
                            .is_none()
                        {
                            log::info!("{} Native lock time expired.", self.id);
                            self.set_next_state(State::SendingNativeRefundTx, ctx);
                            return Ok(());
                        }
                    }

                    // The kernel body published by the peer carries the
                    // aggregated signature the secret is recovered from.
                    if !self.get_kernel_from_chain(ctx, SubTxId::NativeRedeemTx)? {
                        return Ok(());
                    }

                    self.extract_secret_private_key()?;

                    // Redeem the foreign coin.
                    self.set_next_state(State::SendingRedeemTx, ctx);
                } else {
                    if !self.complete_native_withdraw_tx(ctx, SubTxId::NativeRedeemTx)? {
                        return Ok(());
                    }

                    log::info!("{} Native RedeemTx completed!", self.id);
                    self.set_next_state(State::CompleteSwap, ctx);
                }
            }
            State::SendingNativeRefundTx => {
                debug_assert!(is_native_side);
                if !self.is_native_lock_time_expired(ctx) {
                    ctx.gateway.update_on_next_tip(self.id);
                    return Ok(());
                }

                if !self.complete_native_withdraw_tx(ctx, SubTxId::NativeRefundTx)? {
                    return Ok(());
                }

                log::info!("{} Native RefundTx completed!", self.id);
                self.set_next_state(State::Refunded, ctx);
            }
            State::CompleteSwap => {
                log::info!("{} Swap completed.", self.id);
                self.set_status(TxStatus::Completed);
                ctx.gateway.on_completed(self.id);
            }
            State::Canceled => {
                log::info!("{} Transaction cancelled.", self.id);
                self.notify_failure(ctx, FailureReason::Canceled);
                self.set_status(TxStatus::Canceled);

                self.rollback_tx(ctx);

                ctx.gateway.on_completed(self.id);
            }
            State::Failed => {
                match self.store.get::<FailureReason>(ParameterId::FailureReason) {
                    Some(FailureReason::Canceled) => {
                        log::error!(
                            "{} Swap cancelled. The other side has cancelled the transaction.",
                            self.id
                        );
                    }
                    Some(reason) => {
                        log::error!(
                            "{} The other side has failed the transaction. Reason: {}",
                            self.id,
                            reason
                        );
                    }
                    None => log::error!("{} Transaction failed.", self.id),
                }
                self.set_status(TxStatus::Failed);
                ctx.gateway.on_completed(self.id);
            }
            State::Refunded => {
                log::info!("{} Swap has not succeeded.", self.id);
                self.set_status(TxStatus::Failed);
                ctx.gateway.on_completed(self.id);
            }
        }

        Ok(())
    }

    /// Local cancellation, honored only while no value is committed.
    pub fn cancel(&mut self, ctx: &mut SwapContext) {
        let state = self.state();

        let honored = match state {
            State::HandlingContractTx => !self.is_native_side(),
            State::Initial
            | State::BuildingNativeLockTx
            | State::BuildingNativeRedeemTx
            | State::BuildingNativeRefundTx => true,
            _ => false,
        };

        if honored {
            self.set_next_state(State::Canceled, ctx);
        } else {
            log::info!(
                "{} You cannot cancel transaction in state: {}",
                self.id,
                state
            );
        }
    }

    /// Re-org handling: clear confirmation proofs above the new height and
    /// fall back to the matching sending state.
    pub fn rollback(&mut self, height: Height) -> bool {
        let mut rolled_back = false;

        if self.is_native_side() {
            for (sub_tx, state) in [
                (SubTxId::NativeRefundTx, State::SendingNativeRefundTx),
                (SubTxId::NativeLockTx, State::SendingNativeLockTx),
            ] {
                let proof_height = self
                    .store
                    .get_sub::<Height>(ParameterId::KernelProofHeight, sub_tx)
                    .unwrap_or(0);
                if proof_height > height {
                    self.store
                        .set_sub(ParameterId::KernelProofHeight, 0u64, sub_tx);
                    self.store
                        .set_sub(ParameterId::KernelUnconfirmedHeight, 0u64, sub_tx);
                    self.set_state(state);
                    rolled_back = true;
                }
            }
        } else {
            let proof_height = self
                .store
                .get_sub::<Height>(ParameterId::KernelProofHeight, SubTxId::NativeRedeemTx)
                .unwrap_or(0);
            if proof_height > height {
                self.store
                    .set_sub(ParameterId::KernelProofHeight, 0u64, SubTxId::NativeRedeemTx);
                self.store.set_sub(
                    ParameterId::KernelUnconfirmedHeight,
                    0u64,
                    SubTxId::NativeRedeemTx,
                );
                self.set_state(State::SendingNativeRedeemTx);
                rolled_back = true;
            }
        }

        if rolled_back {
            self.set_status(TxStatus::InProgress);
        }

        rolled_back
    }

    /// Expiry check, run every turn: a swap expires when its lock never made
    /// it on-chain inside the kernel window. Raised without notifying the
    /// peer.
    fn check_expired(&mut self, ctx: &mut SwapContext) -> bool {
        if self
            .store
            .get::<FailureReason>(ParameterId::InternalFailureReason)
            .is_some()
        {
            return false;
        }
        if self.status().is_terminal() {
            return false;
        }

        let lock_max_height = match self
            .store
            .get_sub::<Height>(ParameterId::MaxHeight, SubTxId::NativeLockTx)
            .or_else(|| self.store.get::<Height>(ParameterId::PeerResponseHeight))
        {
            Some(height) => height,
            None => return false,
        };

        let registered = self
            .store
            .get_sub::<u32>(ParameterId::TransactionRegistered, SubTxId::NativeLockTx);
        let kernel_id = self
            .store
            .get_sub::<KernelId>(ParameterId::KernelId, SubTxId::NativeLockTx);

        if registered.is_none() || kernel_id.is_none() {
            if let Some(tip) = ctx.gateway.tip() {
                if tip > lock_max_height {
                    log::info!(
                        "{} Transaction expired. Current height: {}, max kernel height: {}",
                        self.id,
                        tip,
                        lock_max_height
                    );
                    self.on_failed(ctx, FailureReason::TransactionExpired, false);
                    return true;
                }
            }
        } else {
            let last_unconfirmed = self
                .store
                .get_sub::<Height>(ParameterId::KernelUnconfirmedHeight, SubTxId::NativeLockTx)
                .unwrap_or(0);
            if last_unconfirmed > 0 && last_unconfirmed >= lock_max_height {
                log::info!(
                    "{} Transaction expired. Last unconfirmed height: {}, max kernel height: {}",
                    self.id,
                    last_unconfirmed,
                    lock_max_height
                );
                self.on_failed(ctx, FailureReason::TransactionExpired, false);
                return true;
            }
        }
        false
    }

    /// Peer-reported failures, delivered as a `FailureReason` bundle.
    fn check_external_failures(&mut self, ctx: &mut SwapContext) {
        if self
            .store
            .get::<FailureReason>(ParameterId::FailureReason)
            .is_none()
        {
            return;
        }

        match self.state() {
            State::Initial => {
                self.set_state(State::Failed);
            }
            State::BuildingNativeLockTx
            | State::BuildingNativeRedeemTx
            | State::BuildingNativeRefundTx => {
                self.rollback_tx(ctx);
                self.set_state(State::Failed);
            }
            State::HandlingContractTx => {
                if self.is_native_side() {
                    self.rollback_tx(ctx);
                    self.set_state(State::Failed);
                }
            }
            _ => {}
        }
    }

    /// Failures the side adapter recorded against the foreign lock while we
    /// were negotiating.
    fn check_sub_tx_failures(&mut self, ctx: &mut SwapContext) {
        let state = self.state();
        if matches!(state, State::Initial | State::HandlingContractTx) {
            if let Some(reason) = self
                .store
                .get_sub::<FailureReason>(ParameterId::InternalFailureReason, SubTxId::ForeignLockTx)
            {
                self.on_failed(ctx, reason, true);
            }
        }
    }

    /// State dependent failure routing, preserving the no-unilateral-loss
    /// property: a party whose foreign funds are exposed is sent down its
    /// refund path instead of a bare failure.
    fn on_failed(&mut self, ctx: &mut SwapContext, reason: FailureReason, notify: bool) {
        log::error!("{} Failed. {}", self.id, reason);

        if notify {
            self.notify_failure(ctx, reason);
        }

        self.store.set(ParameterId::InternalFailureReason, reason);

        let state = self.state();
        let is_native_side = self.is_native_side();

        match state {
            State::Initial => {}
            State::BuildingNativeLockTx
            | State::BuildingNativeRedeemTx
            | State::BuildingNativeRefundTx => {
                self.rollback_tx(ctx);
            }
            State::HandlingContractTx => {
                self.rollback_tx(ctx);
            }
            State::SendingNativeLockTx => {
                if is_native_side {
                    self.rollback_tx(ctx);
                } else {
                    self.set_next_state(State::SendingRefundTx, ctx);
                    return;
                }
            }
            State::SendingNativeRedeemTx => {
                if is_native_side {
                    debug_assert!(false, "impossible case");
                    return;
                } else {
                    self.set_next_state(State::SendingRefundTx, ctx);
                    return;
                }
            }
            State::SendingRedeemTx => {
                if is_native_side {
                    log::error!("{} Unexpected error.", self.id);
                }
                return;
            }
            _ => return,
        }

        self.set_next_state(State::Failed, ctx);
    }

    /// Sub-transaction failure with de-duplication on the recorded reason.
    fn on_sub_tx_failed(
        &mut self,
        ctx: &mut SwapContext,
        reason: FailureReason,
        sub_tx: SubTxId,
        notify: bool,
    ) {
        if self
            .store
            .get_sub::<FailureReason>(ParameterId::InternalFailureReason, sub_tx)
            == Some(reason)
        {
            return;
        }

        log::error!("{} [{}] Failed. {}", self.id, sub_tx, reason);

        self.store
            .set_sub(ParameterId::InternalFailureReason, reason, sub_tx);
        self.on_failed(ctx, FailureReason::SubTxFailed, notify);
    }

    fn rollback_tx(&mut self, ctx: &mut SwapContext) {
        log::info!("{} Rollback...", self.id);
        ctx.wallet.rollback(self.id);
    }

    fn notify_failure(&mut self, ctx: &mut SwapContext, reason: FailureReason) {
        if let Ok(peer) = self.peer_id() {
            let msg = Message::new(self.id).with(ParameterId::FailureReason, reason);
            ctx.gateway.send_message(&peer, msg);
        }
    }

    fn is_native_lock_time_expired(&self, ctx: &SwapContext) -> bool {
        let lock_time_height = self
            .store
            .get::<Height>(ParameterId::MinHeight)
            .unwrap_or(u64::MAX);
        match ctx.gateway.tip() {
            Some(tip) => tip > lock_time_height.saturating_add(NATIVE_LOCK_TIME_BLOCKS),
            None => false,
        }
    }

    fn build_native_lock_tx(&mut self, ctx: &mut SwapContext) -> Result<SubTxState, Error> {
        let sub_tx = SubTxId::NativeLockTx;
        let sub_state = self.sub_tx_state(sub_tx);
        let is_owner = self.is_native_side();
        let amount = self.amount()?;

        let fee = match self.store.get_sub::<Amount>(ParameterId::Fee, sub_tx) {
            Some(fee) => fee,
            None => {
                // The owner funds the lock from the main fee; the peer gets
                // it with the lock invitation.
                let fee = self.store.get_required::<Amount>(ParameterId::Fee)?;
                if is_owner && sub_state == SubTxState::Initial {
                    self.store.set_sub(ParameterId::Fee, fee, sub_tx);
                }
                fee
            }
        };

        let peer_id = self.peer_id()?;
        let result = drive_lock_builder(
            &mut self.store,
            ctx,
            self.id,
            &peer_id,
            sub_state,
            amount,
            fee,
            is_owner,
        )?;

        if let Some(tx) = result.transaction {
            self.lock_tx = Some(tx);
        }
        if let Some(failure) = result.failure {
            self.dispatch_build_failure(ctx, failure);
        }
        Ok(result.state)
    }

    fn build_native_withdraw_tx(
        &mut self,
        ctx: &mut SwapContext,
        sub_tx: SubTxId,
    ) -> Result<SubTxState, Error> {
        let sub_state = self.sub_tx_state(sub_tx);
        let is_native_side = self.is_native_side();

        let (amount, fee) = match (
            self.store.get_sub::<Amount>(ParameterId::Amount, sub_tx),
            self.store.get_sub::<Amount>(ParameterId::Fee, sub_tx),
        ) {
            (Some(amount), Some(fee)) => (amount, fee),
            _ => {
                let fee = WITHDRAW_FEE;
                let amount = self.amount()?.saturating_sub(fee);
                self.store.set_sub(ParameterId::Amount, amount, sub_tx);
                self.store.set_sub(ParameterId::Fee, fee, sub_tx);
                (amount, fee)
            }
        };

        let peer_id = self.peer_id()?;
        let result = drive_withdraw_builder(
            &mut self.store,
            ctx,
            self.id,
            &peer_id,
            sub_tx,
            sub_state,
            amount,
            fee,
            is_native_side,
        )?;

        if let Some(tx) = result.transaction {
            self.withdraw_tx = Some(tx);
        }
        if let Some(failure) = result.failure {
            self.dispatch_build_failure(ctx, failure);
        }
        Ok(result.state)
    }

    fn dispatch_build_failure(&mut self, ctx: &mut SwapContext, failure: BuildFailure) {
        match failure {
            BuildFailure::Sub(reason, sub_tx, notify) => {
                self.on_sub_tx_failed(ctx, reason, sub_tx, notify)
            }
            BuildFailure::Swap(reason, notify) => self.on_failed(ctx, reason, notify),
        }
    }

    /// Broadcast a constructed sub-transaction and interpret the node's
    /// registration verdict. A lock registration failure notifies the peer;
    /// a withdraw one does not.
    fn send_sub_tx(&mut self, ctx: &mut SwapContext, tx: &Transaction, sub_tx: SubTxId) -> bool {
        let registered = self
            .store
            .get_sub::<u32>(ParameterId::TransactionRegistered, sub_tx);
        let registered = match registered {
            None => {
                ctx.gateway.register_tx(self.id, sub_tx, tx);
                return false;
            }
            Some(code) => RegistrationStatus::from_code(code),
        };

        match registered {
            RegistrationStatus::Ok => true,
            RegistrationStatus::InvalidContext => {
                // Only fatal if the kernel is also known to be absent from
                // the chain; otherwise the registration is retried.
                let last_unconfirmed = self
                    .store
                    .get_sub::<Height>(ParameterId::KernelUnconfirmedHeight, sub_tx)
                    .unwrap_or(0);
                if last_unconfirmed > 0 {
                    self.on_sub_tx_failed(
                        ctx,
                        FailureReason::FailedToRegister,
                        sub_tx,
                        sub_tx == SubTxId::NativeLockTx,
                    );
                }
                false
            }
            _ => {
                self.on_sub_tx_failed(
                    ctx,
                    FailureReason::FailedToRegister,
                    sub_tx,
                    sub_tx == SubTxId::NativeLockTx,
                );
                false
            }
        }
    }

    /// Wait for the kernel proof; on the withdrawals also hand the received
    /// coin over to the wallet.
    fn complete_sub_tx(&mut self, ctx: &mut SwapContext, sub_tx: SubTxId) -> Result<bool, Error> {
        let proof_height = self
            .store
            .get_sub::<Height>(ParameterId::KernelProofHeight, sub_tx)
            .unwrap_or(0);
        if proof_height == 0 {
            let kernel_id = self
                .store
                .get_required_sub::<KernelId>(ParameterId::KernelId, sub_tx)?;
            ctx.gateway.confirm_kernel(self.id, sub_tx, &kernel_id);
            return Ok(false);
        }

        if matches!(sub_tx, SubTxId::NativeRedeemTx | SubTxId::NativeRefundTx) {
            let coin = self
                .store
                .get_required_sub::<Coin>(ParameterId::SharedCoinId, sub_tx)?;
            ctx.wallet.save_coin(self.id, coin);
        }

        ctx.wallet.complete_coins(self.id, proof_height);

        Ok(true)
    }

    fn complete_native_withdraw_tx(
        &mut self,
        ctx: &mut SwapContext,
        sub_tx: SubTxId,
    ) -> Result<bool, Error> {
        let entry_state = self.state();
        if self.withdraw_tx.is_none() {
            self.build_native_withdraw_tx(ctx, sub_tx)?;
            if self.state() != entry_state {
                return Ok(false);
            }
        }

        if let Some(tx) = self.withdraw_tx.clone() {
            if !self.send_sub_tx(ctx, &tx, sub_tx) {
                return Ok(false);
            }
        }

        self.complete_sub_tx(ctx, sub_tx)
    }

    /// Fetch the kernel body of the peer's published redeem.
    fn get_kernel_from_chain(
        &mut self,
        ctx: &mut SwapContext,
        sub_tx: SubTxId,
    ) -> Result<bool, Error> {
        if self
            .store
            .get_sub::<TxKernel>(ParameterId::Kernel, sub_tx)
            .is_some()
        {
            return Ok(true);
        }
        let kernel_id = self
            .store
            .get_required_sub::<KernelId>(ParameterId::KernelId, sub_tx)?;
        ctx.gateway.get_kernel(self.id, sub_tx, &kernel_id);
        Ok(false)
    }

    /// Recover the swap secret from the redeem kernel signature published by
    /// the peer: `s = σ'_peer + σ_mine − k`.
    fn extract_secret_private_key(&mut self) -> Result<(), Error> {
        let sub_tx = SubTxId::NativeRedeemTx;
        let kernel = self
            .store
            .get_required_sub::<TxKernel>(ParameterId::Kernel, sub_tx)?;
        let amount = self
            .store
            .get_required_sub::<Amount>(ParameterId::Amount, sub_tx)?;
        let fee = self
            .store
            .get_required_sub::<Amount>(ParameterId::Fee, sub_tx)?;

        let secret = {
            let mut builder = SharedTxBuilder::new(&mut self.store, sub_tx, amount, fee, false);
            builder.generate_nonce();
            builder.create_outputs()?;
            builder.create_kernel()?;
            builder.sign_partial()?;

            let peer_signature =
                builder
                    .peer_signature()
                    .ok_or(crate::params::Error::MissingParameter(
                        ParameterId::PeerSignature,
                    ))?;
            let full_signature = kernel
                .signature
                .ok_or(crate::transaction::Error::MissingSignature)?;

            crypto::extract_secret(
                &full_signature.k,
                &builder.partial_signature()?,
                &peer_signature,
            )
        };

        // The recovered scalar must open the secret point derived during
        // construction.
        let expected = self
            .store
            .get_required_sub::<crypto::Point>(ParameterId::AtomicSwapSecretPublicKey, sub_tx)?;
        if secret * crypto::blinding_generator() != expected {
            return Err(Error::Crypto(crypto::Error::InvalidSignature));
        }

        self.store
            .set_sub(ParameterId::AtomicSwapSecretPrivateKey, secret, sub_tx);
        Ok(())
    }

    fn send_invitation(&mut self, ctx: &mut SwapContext) -> Result<(), Error> {
        let swap_amount = self
            .store
            .get_required::<Amount>(ParameterId::AtomicSwapAmount)?;
        let swap_coin = self
            .store
            .get_required::<ForeignCoin>(ParameterId::AtomicSwapCoin)?;
        let swap_public_key = self
            .store
            .get_required::<String>(ParameterId::AtomicSwapPublicKey)?;
        let swap_lock_time = self
            .store
            .get_required::<Timestamp>(ParameterId::AtomicSwapExternalLockTime)?;
        let lifetime = self.store.get_required::<Height>(ParameterId::Lifetime)?;
        let fee = self.store.get_required::<Amount>(ParameterId::Fee)?;
        let peer_id = self.peer_id()?;

        let msg = Message::new(self.id)
            .with(ParameterId::Amount, self.amount()?)
            .with(ParameterId::Fee, fee)
            .with(ParameterId::IsSender, !self.is_sender())
            .with(ParameterId::Lifetime, lifetime)
            .with(ParameterId::AtomicSwapAmount, swap_amount)
            .with(ParameterId::AtomicSwapCoin, swap_coin)
            .with(ParameterId::AtomicSwapPeerPublicKey, swap_public_key)
            .with(ParameterId::AtomicSwapExternalLockTime, swap_lock_time)
            .with(ParameterId::AtomicSwapIsNativeSide, !self.is_native_side())
            .with(ParameterId::PeerProtoVersion, PROTO_VERSION);

        if !ctx.gateway.send_message(&peer_id, msg) {
            self.on_failed(ctx, FailureReason::FailedToSendParameters, false);
        }
        Ok(())
    }

    fn send_external_tx_details(&mut self, ctx: &mut SwapContext) -> Result<(), Error> {
        let peer_id = self.peer_id()?;
        let mut msg = Message::new(self.id).with_sub_tx(SubTxId::ForeignLockTx);
        let side = self.second_side.as_ref().ok_or(side::Error::Uninitialized)?;
        side.add_tx_details(&self.store, &mut msg);

        if !ctx.gateway.send_message(&peer_id, msg) {
            self.on_failed(ctx, FailureReason::FailedToSendParameters, false);
        }
        Ok(())
    }
}

fn failure_reason_of(err: &Error) -> FailureReason {
    match err {
        Error::Transaction(_) => FailureReason::InvalidTransaction,
        Error::Crypto(_) => FailureReason::InvalidPeerSignature,
        Error::MaxHeightUnacceptable => FailureReason::MaxHeightUnacceptable,
        Error::FailToStartSwap => FailureReason::FailToStartSwap,
        _ => FailureReason::Unknown,
    }
}

/// One pass over the lock builder, shared by the building and the sending
/// states. Returns the resulting sub-transaction state, a failure to route,
/// and the assembled transaction once the owner holds a complete one.
#[allow(clippy::too_many_arguments)]
fn drive_lock_builder(
    store: &mut ParameterStore,
    ctx: &mut SwapContext,
    swap_id: SwapId,
    peer_id: &WalletId,
    sub_state: SubTxState,
    amount: Amount,
    fee: Amount,
    is_owner: bool,
) -> Result<BuildResult, Error> {
    let mut sub_state = sub_state;
    let mut result = BuildResult {
        state: sub_state,
        failure: None,
        transaction: None,
    };

    let mut builder = LockTxBuilder::new(store, amount, fee, is_owner);

    if !builder.has_initial_tx_params() && sub_state == SubTxState::Initial {
        if is_owner {
            if let Some(response_height) = builder
                .store()
                .get::<Height>(ParameterId::PeerResponseHeight)
            {
                log::info!(
                    "{} [{}] Max height for response: {}",
                    swap_id,
                    SubTxId::NativeLockTx,
                    response_height
                );
            }
            builder.select_inputs(ctx.wallet)?;
        }
        builder.generate_offset();
        builder.store_mut().set(ParameterId::Status, TxStatus::InProgress);
    }

    builder.generate_nonce();
    builder.load_shared_parameters();

    match builder.update_max_height() {
        Ok(_) => {}
        Err(Error::MaxHeightUnacceptable) => {
            result.failure = Some(BuildFailure::Sub(
                FailureReason::MaxHeightUnacceptable,
                SubTxId::NativeLockTx,
                true,
            ));
            return Ok(result);
        }
        Err(err) => return Err(err),
    }

    builder.create_outputs()?;

    if builder.peer_public_excess_and_nonce().is_none() {
        if sub_state == SubTxState::Initial && is_owner {
            let is_initiator = builder
                .store()
                .get::<bool>(ParameterId::IsInitiator)
                .unwrap_or_default();
            if !is_initiator {
                // When the swap was not started from the native side, the
                // expiry check needs the real kernel bound.
                builder.save_max_height()?;
            }
            if !send_lock_tx_invitation(&builder, swap_id, peer_id, ctx.gateway)? {
                result.failure = Some(BuildFailure::Swap(
                    FailureReason::FailedToSendParameters,
                    false,
                ));
                return Ok(result);
            }
            builder.store_mut().set_sub(
                ParameterId::State,
                SubTxState::Invitation,
                SubTxId::NativeLockTx,
            );
            result.state = SubTxState::Invitation;
        }
        return Ok(result);
    }

    builder.create_kernel()?;
    builder.sign_partial()?;

    if matches!(sub_state, SubTxState::Initial | SubTxState::Invitation) {
        if builder.create_shared_proof_part2().is_err() {
            result.failure = Some(BuildFailure::Sub(
                FailureReason::FailedToCreateMultiSig,
                SubTxId::NativeLockTx,
                true,
            ));
            return Ok(result);
        }
        if builder.create_shared_proof_part3().is_err() {
            result.failure = Some(BuildFailure::Sub(
                FailureReason::FailedToCreateMultiSig,
                SubTxId::NativeLockTx,
                true,
            ));
            return Ok(result);
        }

        builder.store_mut().set_sub(
            ParameterId::State,
            SubTxState::Constructed,
            SubTxId::NativeLockTx,
        );
        sub_state = SubTxState::Constructed;
        result.state = sub_state;

        if !is_owner {
            // Part 2 and part 3 travel back with the confirmation.
            if !send_lock_tx_confirmation(&builder, swap_id, peer_id, ctx.gateway)? {
                result.failure = Some(BuildFailure::Swap(
                    FailureReason::FailedToSendParameters,
                    false,
                ));
            }
            return Ok(result);
        }
    } else if is_owner {
        // Rebuild after a restart: every proof contribution is persisted,
        // recompute the rounds deterministically.
        builder.create_shared_proof_part2()?;
        builder.create_shared_proof_part3()?;
    }

    if builder.peer_signature().is_none() {
        return Ok(result);
    }

    if !builder.is_peer_signature_valid()? {
        result.failure = Some(BuildFailure::Sub(
            FailureReason::InvalidPeerSignature,
            SubTxId::NativeLockTx,
            true,
        ));
        return Ok(result);
    }

    builder.finalize_signature()?;

    if is_owner {
        debug_assert_eq!(sub_state, SubTxState::Constructed);
        let transaction = builder.create_transaction(ctx.wallet)?;
        let context = ValidationContext {
            min_height: builder.min_height()?,
        };
        if transaction.validate(&context).is_err() {
            result.failure = Some(BuildFailure::Sub(
                FailureReason::InvalidTransaction,
                SubTxId::NativeLockTx,
                true,
            ));
            return Ok(result);
        }
        result.transaction = Some(transaction);
    }

    Ok(result)
}

/// One pass over the shared withdraw builder, covering both the redeem with
/// its adaptor exchange and the refund.
#[allow(clippy::too_many_arguments)]
fn drive_withdraw_builder(
    store: &mut ParameterStore,
    ctx: &mut SwapContext,
    swap_id: SwapId,
    peer_id: &WalletId,
    sub_tx: SubTxId,
    sub_state: SubTxState,
    amount: Amount,
    fee: Amount,
    is_native_side: bool,
) -> Result<BuildResult, Error> {
    let mut result = BuildResult {
        state: sub_state,
        failure: None,
        transaction: None,
    };

    // The refund pays the native side back; the redeem pays the foreign
    // side.
    let is_owner = (is_native_side && sub_tx == SubTxId::NativeRefundTx)
        || (!is_native_side && sub_tx == SubTxId::NativeRedeemTx);

    let mut builder = SharedTxBuilder::new(store, sub_tx, amount, fee, is_owner);

    if !builder.get_shared_parameters() {
        return Ok(result);
    }

    if !builder.has_initial_tx_params() && sub_state == SubTxState::Initial {
        builder.init_tx(ctx.wallet);
    }

    builder.generate_nonce();
    builder.create_outputs()?;

    if builder.peer_public_excess_and_nonce().is_none() {
        if sub_state == SubTxState::Initial && is_owner {
            if !send_shared_tx_invitation(&builder, swap_id, peer_id, ctx.gateway)? {
                result.failure = Some(BuildFailure::Swap(
                    FailureReason::FailedToSendParameters,
                    false,
                ));
                return Ok(result);
            }
            builder
                .store_mut()
                .set_sub(ParameterId::State, SubTxState::Invitation, sub_tx);
            result.state = SubTxState::Invitation;
        }
        return Ok(result);
    }

    builder.create_kernel()?;
    builder.sign_partial()?;

    if builder.peer_signature().is_none() {
        if sub_state == SubTxState::Initial && !is_owner {
            // Invited participant answers with its partial. For the redeem
            // the native side then keeps waiting for the adapted signature;
            // the refund is done from its point of view.
            if !confirm_shared_tx_invitation(&builder, swap_id, peer_id, ctx.gateway)? {
                result.failure = Some(BuildFailure::Swap(
                    FailureReason::FailedToSendParameters,
                    false,
                ));
                return Ok(result);
            }
            if sub_tx == SubTxId::NativeRefundTx {
                builder
                    .store_mut()
                    .set_sub(ParameterId::State, SubTxState::Constructed, sub_tx);
                result.state = SubTxState::Constructed;
            }
        }
        return Ok(result);
    }

    if sub_tx == SubTxId::NativeRedeemTx {
        if is_native_side {
            // The peer's signature is the adapted partial; it does not
            // verify, it defines the secret point tying the two chains.
            let (peer_excess, peer_nonce) = builder.peer_public_excess_and_nonce().ok_or(
                crate::params::Error::MissingParameter(ParameterId::PeerPublicExcess),
            )?;
            let peer_adapted =
                builder
                    .peer_signature()
                    .ok_or(crate::params::Error::MissingParameter(
                        ParameterId::PeerSignature,
                    ))?;
            let e = builder.challenge()?;
            let secret_public_key =
                crypto::secret_public_key(&peer_adapted, &peer_nonce, &peer_excess, &e);

            builder.store_mut().set_sub(
                ParameterId::AtomicSwapSecretPublicKey,
                secret_public_key,
                sub_tx,
            );
            builder
                .store_mut()
                .set_sub(ParameterId::State, SubTxState::Constructed, sub_tx);
            result.state = SubTxState::Constructed;
            return Ok(result);
        } else {
            // Foreign side: adapt the partial with the swap secret before
            // sending it over. The true partial never leaves this wallet
            // until the redeem itself is published.
            let secret = match builder
                .store()
                .get_sub::<Scalar>(ParameterId::AtomicSwapSecretPrivateKey, sub_tx)
            {
                Some(secret) => secret,
                None => {
                    let secret = crypto::random_scalar(&mut rand::rngs::OsRng);
                    builder.store_mut().set_sub(
                        ParameterId::AtomicSwapSecretPrivateKey,
                        secret,
                        sub_tx,
                    );
                    secret
                }
            };
            let adapted = crypto::adapt(&builder.partial_signature()?, &secret);

            let msg = Message::new(swap_id)
                .with_sub_tx(sub_tx)
                .with(ParameterId::PeerSignature, adapted);
            if !ctx.gateway.send_message(peer_id, msg) {
                result.failure = Some(BuildFailure::Swap(
                    FailureReason::FailedToSendParameters,
                    false,
                ));
                return Ok(result);
            }
        }
    }

    if !builder.is_peer_signature_valid()? {
        result.failure = Some(BuildFailure::Sub(
            FailureReason::InvalidPeerSignature,
            sub_tx,
            true,
        ));
        return Ok(result);
    }

    builder.finalize_signature()?;

    builder
        .store_mut()
        .set_sub(ParameterId::State, SubTxState::Constructed, sub_tx);
    result.state = SubTxState::Constructed;

    if is_owner {
        let transaction = builder.create_transaction(ctx.wallet)?;
        let context = ValidationContext {
            min_height: builder.min_height()?,
        };
        if transaction.validate(&context).is_err() {
            result.failure = Some(BuildFailure::Sub(
                FailureReason::InvalidTransaction,
                sub_tx,
                true,
            ));
            return Ok(result);
        }
        result.transaction = Some(transaction);
    }

    Ok(result)
}

fn send_lock_tx_invitation(
    builder: &LockTxBuilder,
    swap_id: SwapId,
    peer_id: &WalletId,
    gateway: &mut dyn Gateway,
) -> Result<bool, Error> {
    let swap_public_key = builder
        .store()
        .get_required::<String>(ParameterId::AtomicSwapPublicKey)?;

    let msg = Message::new(swap_id)
        .with_sub_tx(SubTxId::NativeLockTx)
        .with(ParameterId::PeerProtoVersion, PROTO_VERSION)
        .with(ParameterId::AtomicSwapPeerPublicKey, swap_public_key)
        .with(ParameterId::Fee, builder.fee())
        .with(ParameterId::PeerMaxHeight, builder.max_height()?)
        .with(ParameterId::PeerPublicExcess, builder.public_excess()?)
        .with(ParameterId::PeerPublicNonce, builder.public_nonce()?)
        .with(
            ParameterId::PeerSharedBulletProofPart2,
            builder.range_proof_part2()?,
        )
        .with(
            ParameterId::PeerPublicSharedBlindingFactor,
            builder.public_shared_blinding_factor()?,
        );

    Ok(gateway.send_message(peer_id, msg))
}

fn send_lock_tx_confirmation(
    builder: &LockTxBuilder,
    swap_id: SwapId,
    peer_id: &WalletId,
    gateway: &mut dyn Gateway,
) -> Result<bool, Error> {
    let msg = Message::new(swap_id)
        .with_sub_tx(SubTxId::NativeLockTx)
        .with(ParameterId::PeerProtoVersion, PROTO_VERSION)
        .with(ParameterId::PeerPublicExcess, builder.public_excess()?)
        .with(ParameterId::PeerPublicNonce, builder.public_nonce()?)
        .with(ParameterId::PeerMaxHeight, builder.max_height()?)
        .with(ParameterId::PeerSignature, builder.partial_signature()?)
        .with(ParameterId::PeerOffset, builder.offset()?)
        .with(
            ParameterId::PeerSharedBulletProofPart2,
            builder.range_proof_part2()?,
        )
        .with(
            ParameterId::PeerSharedBulletProofPart3,
            builder.range_proof_part3()?,
        )
        .with(
            ParameterId::PeerPublicSharedBlindingFactor,
            builder.public_shared_blinding_factor()?,
        );

    Ok(gateway.send_message(peer_id, msg))
}

fn send_shared_tx_invitation(
    builder: &SharedTxBuilder,
    swap_id: SwapId,
    peer_id: &WalletId,
    gateway: &mut dyn Gateway,
) -> Result<bool, Error> {
    let msg = Message::new(swap_id)
        .with_sub_tx(builder.sub_tx())
        .with(ParameterId::Amount, builder.amount())
        .with(ParameterId::Fee, builder.fee())
        .with(ParameterId::MinHeight, builder.min_height()?)
        .with(ParameterId::PeerPublicExcess, builder.public_excess()?)
        .with(ParameterId::PeerPublicNonce, builder.public_nonce()?);

    Ok(gateway.send_message(peer_id, msg))
}

fn confirm_shared_tx_invitation(
    builder: &SharedTxBuilder,
    swap_id: SwapId,
    peer_id: &WalletId,
    gateway: &mut dyn Gateway,
) -> Result<bool, Error> {
    let msg = Message::new(swap_id)
        .with_sub_tx(builder.sub_tx())
        .with(ParameterId::PeerPublicExcess, builder.public_excess()?)
        .with(ParameterId::PeerSignature, builder.partial_signature()?)
        .with(ParameterId::PeerPublicNonce, builder.public_nonce()?)
        .with(ParameterId::PeerOffset, builder.offset()?);

    Ok(gateway.send_message(peer_id, msg))
}
