//! Interfaces to the swap's external collaborators: the native chain node
//! gateway and peer transport on one side, the owning wallet on the other.
//! All requests are fire and forget; responses come back as [`ChainEvent`]s
//! delivered to the state machine on a later turn.

use crate::messages::Message;
use crate::params::{Storage, SubTxId};
use crate::swap::{Amount, Coin, Height, SwapId, WalletId};
use crate::transaction::{KernelId, Transaction, TxKernel};

/// Outcome of a transaction registration reported by the node, persisted
/// under `TransactionRegistered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Unspecified,
    Ok,
    InvalidContext,
    Rejected,
}

impl RegistrationStatus {
    pub fn code(&self) -> u32 {
        match self {
            RegistrationStatus::Unspecified => 0,
            RegistrationStatus::Ok => 1,
            RegistrationStatus::InvalidContext => 2,
            RegistrationStatus::Rejected => 3,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            1 => RegistrationStatus::Ok,
            2 => RegistrationStatus::InvalidContext,
            3 => RegistrationStatus::Rejected,
            _ => RegistrationStatus::Unspecified,
        }
    }
}

/// Responses of the node gateway, funneled back into the swap's turn queue.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// Outcome of a `register_tx` request.
    TransactionRegistered {
        sub_tx: SubTxId,
        status: RegistrationStatus,
    },
    /// A watched kernel was found in a block at this height.
    KernelProof { sub_tx: SubTxId, height: Height },
    /// A watched kernel was still absent at this height.
    KernelUnconfirmed { sub_tx: SubTxId, height: Height },
    /// The full kernel body requested with `get_kernel`.
    KernelBody { sub_tx: SubTxId, kernel: TxKernel },
}

/// The native chain node gateway, the peer transport and the per-swap
/// scheduler, as seen from the state machine. Methods never block; a request
/// resolves into a [`ChainEvent`] or an inbound [`Message`] on a later turn.
pub trait Gateway {
    /// Latest confirmed native chain height, if a tip was observed yet.
    fn tip(&self) -> Option<Height>;

    /// Broadcast a transaction; resolves into
    /// [`ChainEvent::TransactionRegistered`].
    fn register_tx(&mut self, swap: SwapId, sub_tx: SubTxId, tx: &Transaction);

    /// Watch a kernel for confirmation; resolves into
    /// [`ChainEvent::KernelProof`] or [`ChainEvent::KernelUnconfirmed`].
    fn confirm_kernel(&mut self, swap: SwapId, sub_tx: SubTxId, kernel_id: &KernelId);

    /// Fetch a kernel body from the chain; resolves into
    /// [`ChainEvent::KernelBody`].
    fn get_kernel(&mut self, swap: SwapId, sub_tx: SubTxId, kernel_id: &KernelId);

    /// Send a parameter bundle to the peer. Returns false when the transport
    /// refused the message outright.
    fn send_message(&mut self, to: &WalletId, msg: Message) -> bool;

    /// Re-enter the swap when the next native tip arrives.
    fn update_on_next_tip(&mut self, swap: SwapId);

    /// Re-enter the swap on the next scheduler tick.
    fn update_async(&mut self, swap: SwapId);

    /// The swap reached a terminal state; the runtime may drop it from
    /// active memory. Its parameter store records are retained.
    fn on_completed(&mut self, swap: SwapId);
}

/// The owning wallet: coin selection, fresh outputs with their blinding
/// factors, range proofs for single owner outputs, and the rollback used
/// when a swap aborts before completion. Extends [`Storage`] as the
/// parameter store persists through the wallet database.
pub trait Wallet: Storage {
    /// Whether the given transport address belongs to this wallet. Used to
    /// refuse swaps against one's own address.
    fn is_own_address(&self, id: &WalletId) -> bool;

    /// Pick unspent coins covering at least `total`, or `None` when the
    /// balance is insufficient.
    fn select_inputs(&mut self, total: Amount) -> Option<Vec<Coin>>;

    /// Create a fresh coin of the given amount with a new blinding factor.
    fn create_coin(&mut self, amount: Amount) -> Coin;

    /// Produce the range proof for a single owner output.
    fn output_proof(&mut self, coin: &Coin) -> Vec<u8>;

    /// Release every coin reserved or created for the swap.
    fn rollback(&mut self, swap: SwapId);

    /// Record the coin received by a completed withdrawal.
    fn save_coin(&mut self, swap: SwapId, coin: Coin);

    /// Mark the swap's coins spent/available after its kernel was proven at
    /// the given height.
    fn complete_coins(&mut self, swap: SwapId, proof_height: Height);
}
