//! Builder of the two withdrawals spending the shared output: Redeem, paying
//! the foreign side party, and Refund, paying the native side owner back
//! after the lock window. Unlike the lock there is no input selection and no
//! proof rounds; the single input is the shared commitment and the output is
//! an ordinary single owner coin.

use crate::crypto::{self, Point, Scalar};
use crate::params::{ParameterId, ParameterStore, SubTxId};
use crate::swap::{Amount, Coin, Height, MAX_HEIGHT, NATIVE_LOCK_TIME_BLOCKS};
use crate::syncer::Wallet;
use crate::transaction::{Input, KernelId, Output, RangeProof, Transaction};
use crate::Error;

use super::BaseTxBuilder;

pub struct SharedTxBuilder<'a> {
    base: BaseTxBuilder<'a>,
    is_owner: bool,
    output_coin: Option<Coin>,
}

impl<'a> SharedTxBuilder<'a> {
    pub fn new(
        store: &'a mut ParameterStore,
        sub_tx: SubTxId,
        amount: Amount,
        fee: Amount,
        is_owner: bool,
    ) -> Self {
        debug_assert!(matches!(
            sub_tx,
            SubTxId::NativeRedeemTx | SubTxId::NativeRefundTx
        ));
        let output_coin = store.get_sub::<Coin>(ParameterId::SharedCoinId, sub_tx);
        SharedTxBuilder {
            base: BaseTxBuilder::new(store, sub_tx, amount, fee),
            is_owner,
            output_coin,
        }
    }

    pub fn store(&self) -> &ParameterStore {
        self.base.store()
    }

    pub(crate) fn store_mut(&mut self) -> &mut ParameterStore {
        self.base.store_mut()
    }

    pub fn sub_tx(&self) -> SubTxId {
        self.base.sub_tx()
    }

    pub fn amount(&self) -> Amount {
        self.base.amount()
    }

    pub fn fee(&self) -> Amount {
        self.base.fee()
    }

    /// Both blinding shares of the lock output must be known before any
    /// withdrawal can be built.
    pub fn get_shared_parameters(&self) -> bool {
        self.base
            .store()
            .get_sub::<Scalar>(ParameterId::SharedBlindingFactor, SubTxId::NativeLockTx)
            .is_some()
            && self
                .base
                .store()
                .get_sub::<Point>(
                    ParameterId::PeerPublicSharedBlindingFactor,
                    SubTxId::NativeLockTx,
                )
                .is_some()
    }

    fn shared_blinding(&self) -> Result<Scalar, Error> {
        Ok(self
            .base
            .store()
            .get_required_sub::<Scalar>(ParameterId::SharedBlindingFactor, SubTxId::NativeLockTx)?)
    }

    /// The shared commitment being spent, reconstructed from both public
    /// blinding shares and the locked amount.
    pub fn shared_input_commitment(&self) -> Result<Point, Error> {
        let own = self.shared_blinding()? * crypto::blinding_generator();
        let peer = self.base.store().get_required_sub::<Point>(
            ParameterId::PeerPublicSharedBlindingFactor,
            SubTxId::NativeLockTx,
        )?;
        let locked = self
            .base
            .store()
            .get_required::<Amount>(ParameterId::Amount)?;
        Ok(own + peer + Scalar::from(locked) * crypto::value_generator())
    }

    /// Whether the withdrawal was already initialized on a previous turn.
    pub fn has_initial_tx_params(&self) -> bool {
        self.base
            .store()
            .get_sub::<Scalar>(ParameterId::Offset, self.base.sub_tx())
            .is_some()
    }

    /// First turn initialization: the owner creates the destination coin,
    /// both parties persist their offset.
    pub fn init_tx(&mut self, wallet: &mut dyn Wallet) {
        if self.is_owner && self.output_coin.is_none() {
            let coin = wallet.create_coin(self.amount());
            let sub_tx = self.base.sub_tx();
            self.base
                .store_mut()
                .set_sub(ParameterId::SharedCoinId, coin, sub_tx);
            self.output_coin = Some(coin);
        }
        self.base.generate_offset();
    }

    pub fn generate_nonce(&mut self) {
        self.base.generate_nonce();
    }

    /// The kernel minimum height: a redeem is valid from the swap's start,
    /// a refund only once the lock window has elapsed.
    pub fn min_height(&self) -> Result<Height, Error> {
        let min_height = self
            .base
            .store()
            .get_required::<Height>(ParameterId::MinHeight)?;
        match self.base.sub_tx() {
            SubTxId::NativeRefundTx => Ok(min_height + NATIVE_LOCK_TIME_BLOCKS),
            _ => Ok(min_height),
        }
    }

    /// Compute and record this party's blinding excess over the shared
    /// input.
    pub fn create_outputs(&mut self) -> Result<(), Error> {
        let offset = self.base.offset()?;
        let share = self.shared_blinding()?;
        let excess = if self.is_owner {
            let out = self
                .output_coin
                .as_ref()
                .ok_or(Error::Unknown("withdraw coin not created"))?
                .blinding;
            out - share - offset
        } else {
            -share - offset
        };
        self.base.set_excess(excess);
        Ok(())
    }

    pub fn peer_public_excess_and_nonce(&self) -> Option<(Point, Point)> {
        self.base.peer_public_excess_and_nonce()
    }

    pub fn public_excess(&self) -> Result<Point, Error> {
        self.base.public_excess()
    }

    pub fn public_nonce(&self) -> Result<Point, Error> {
        self.base.public_nonce()
    }

    pub fn offset(&self) -> Result<Scalar, Error> {
        self.base.offset()
    }

    pub fn create_kernel(&mut self) -> Result<(), Error> {
        let min_height = self.min_height()?;
        self.base.create_kernel(min_height, MAX_HEIGHT)
    }

    pub fn kernel_id(&self) -> Result<KernelId, Error> {
        self.base.kernel_id()
    }

    pub fn sign_partial(&mut self) -> Result<(), Error> {
        self.base.sign_partial()
    }

    pub fn partial_signature(&self) -> Result<Scalar, Error> {
        self.base.partial_signature()
    }

    pub fn peer_signature(&self) -> Option<Scalar> {
        self.base.peer_signature()
    }

    pub fn is_peer_signature_valid(&self) -> Result<bool, Error> {
        self.base.is_peer_signature_valid()
    }

    pub fn finalize_signature(&mut self) -> Result<(), Error> {
        self.base.finalize_signature()
    }

    /// The challenge of this kernel, needed by the adaptor arithmetic.
    pub fn challenge(&self) -> Result<Scalar, Error> {
        self.base.challenge()
    }

    /// Assemble the withdrawal. Owner only; spends the shared commitment
    /// into the owner's destination coin.
    pub fn create_transaction(&mut self, wallet: &mut dyn Wallet) -> Result<Transaction, Error> {
        let coin = self
            .output_coin
            .ok_or(Error::Unknown("withdraw coin not created"))?;
        let proof = wallet.output_proof(&coin);

        Ok(Transaction {
            inputs: vec![Input {
                commitment: self.shared_input_commitment()?,
            }],
            outputs: vec![Output {
                commitment: crypto::commit(coin.amount, &coin.blinding),
                proof: RangeProof::Wallet(proof),
            }],
            kernel: *self.base.kernel()?,
            offset: self.base.total_offset()?,
        })
    }
}
