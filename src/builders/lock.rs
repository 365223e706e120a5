//! Builder of the native lock transaction, whose single significant output
//! is the commitment jointly blinded by the two parties. The native side
//! owner funds it and broadcasts it; the foreign side only co-signs and
//! co-proves.

use crate::crypto::{
    self, combine_proof_nonces, finalize_proof, proof_nonces_from_seed, proof_part2, proof_part3,
    MultiSigProof, Point, ProofNonces, ProofPartial, Scalar,
};
use crate::params::{ParameterId, ParameterStore, SubTxId};
use crate::swap::{Amount, Coin, Height};
use crate::syncer::Wallet;
use crate::transaction::{Input, Output, RangeProof, Transaction};
use crate::Error;

use super::BaseTxBuilder;

/// Minimal acceptable distance between the lock kernel's minimum and maximum
/// heights.
const MIN_KERNEL_WINDOW: Height = 60;

pub struct LockTxBuilder<'a> {
    base: BaseTxBuilder<'a>,
    is_owner: bool,
    input_coins: Vec<Coin>,
    change_coin: Option<Coin>,
    max_height: Option<Height>,
    shared_proof: Option<MultiSigProof>,
}

impl<'a> LockTxBuilder<'a> {
    pub fn new(store: &'a mut ParameterStore, amount: Amount, fee: Amount, is_owner: bool) -> Self {
        let mut builder = LockTxBuilder {
            base: BaseTxBuilder::new(store, SubTxId::NativeLockTx, amount, fee),
            is_owner,
            input_coins: Vec::new(),
            change_coin: None,
            max_height: None,
            shared_proof: None,
        };
        builder.load_initial_tx_params();
        builder
    }

    pub fn store(&self) -> &ParameterStore {
        self.base.store()
    }

    pub(crate) fn store_mut(&mut self) -> &mut ParameterStore {
        self.base.store_mut()
    }

    pub fn amount(&self) -> Amount {
        self.base.amount()
    }

    pub fn fee(&self) -> Amount {
        self.base.fee()
    }

    fn load_initial_tx_params(&mut self) {
        self.input_coins = self
            .base
            .store()
            .get_sub::<Vec<Coin>>(ParameterId::InputCoins, SubTxId::NativeLockTx)
            .unwrap_or_default();
        self.change_coin = self
            .base
            .store()
            .get_sub::<Coin>(ParameterId::ChangeCoin, SubTxId::NativeLockTx);
    }

    /// Whether input selection already happened on a previous turn.
    pub fn has_initial_tx_params(&self) -> bool {
        if self.is_owner {
            !self.input_coins.is_empty()
        } else {
            self.base
                .store()
                .get_sub::<Scalar>(ParameterId::Offset, SubTxId::NativeLockTx)
                .is_some()
        }
    }

    /// Owner only: pick utxos covering `amount + fee` and create the change
    /// coin. Selection is recorded so a restarted swap reuses it.
    pub fn select_inputs(&mut self, wallet: &mut dyn Wallet) -> Result<(), Error> {
        if !self.input_coins.is_empty() {
            return Ok(());
        }
        let target = self.amount() + self.fee();
        let coins = wallet.select_inputs(target).ok_or(Error::FailToStartSwap)?;
        let total: Amount = coins.iter().map(|coin| coin.amount).sum();
        debug_assert!(total >= target);
        let change = total - target;
        let change_coin = wallet.create_coin(change);

        self.base
            .store_mut()
            .set_sub(ParameterId::InputCoins, coins.clone(), SubTxId::NativeLockTx);
        self.base
            .store_mut()
            .set_sub(ParameterId::ChangeCoin, change_coin, SubTxId::NativeLockTx);
        self.base
            .store_mut()
            .set_sub(ParameterId::ChangeAmount, change, SubTxId::NativeLockTx);
        self.input_coins = coins;
        self.change_coin = Some(change_coin);
        Ok(())
    }

    pub fn generate_offset(&mut self) {
        self.base.generate_offset();
    }

    pub fn generate_nonce(&mut self) {
        self.base.generate_nonce();
    }

    /// Load or create this party's share of the shared output blinding.
    pub fn load_shared_parameters(&mut self) {
        if self
            .base
            .store()
            .get_sub::<Scalar>(ParameterId::SharedBlindingFactor, SubTxId::NativeLockTx)
            .is_none()
        {
            let share = crypto::random_scalar(&mut rand::rngs::OsRng);
            self.base.store_mut().set_sub(
                ParameterId::SharedBlindingFactor,
                share,
                SubTxId::NativeLockTx,
            );
        }
    }

    fn shared_blinding(&self) -> Result<Scalar, Error> {
        Ok(self
            .base
            .store()
            .get_required_sub::<Scalar>(ParameterId::SharedBlindingFactor, SubTxId::NativeLockTx)?)
    }

    pub fn public_shared_blinding_factor(&self) -> Result<Point, Error> {
        Ok(self.shared_blinding()? * crypto::blinding_generator())
    }

    fn peer_public_shared_blinding_factor(&self) -> Result<Point, Error> {
        Ok(self.base.store().get_required_sub::<Point>(
            ParameterId::PeerPublicSharedBlindingFactor,
            SubTxId::NativeLockTx,
        )?)
    }

    /// The shared output commitment, `C = b_mine·G + b_peer·G + v·H`.
    /// Requires the peer's public blinding share.
    pub fn shared_commitment(&self) -> Result<Point, Error> {
        Ok(self.public_shared_blinding_factor()?
            + self.peer_public_shared_blinding_factor()?
            + Scalar::from(self.amount()) * crypto::value_generator())
    }

    /// Realize the input commitments of the owner's selected coins.
    pub fn create_inputs(&self) -> Vec<Input> {
        self.input_coins
            .iter()
            .map(|coin| Input {
                commitment: crypto::commit(coin.amount, &coin.blinding),
            })
            .collect()
    }

    /// Compute and record this party's blinding excess. The owner subtracts
    /// its inputs and keeps the change and its shared blinding share; the
    /// peer only contributes its share.
    pub fn create_outputs(&mut self) -> Result<(), Error> {
        let offset = self.base.offset()?;
        let share = self.shared_blinding()?;
        let excess = if self.is_owner {
            let inputs: Scalar = self
                .input_coins
                .iter()
                .fold(Scalar::ZERO, |acc, coin| acc + coin.blinding);
            let change = self
                .change_coin
                .as_ref()
                .map(|coin| coin.blinding)
                .unwrap_or(Scalar::ZERO);
            change + share - inputs - offset
        } else {
            share - offset
        };
        self.base.set_excess(excess);
        Ok(())
    }

    /// Compute the lock kernel `MaxHeight` from the response window and the
    /// lifetime, validating a height announced by the peer against the same
    /// bound.
    pub fn update_max_height(&mut self) -> Result<Height, Error> {
        let response_height = self
            .base
            .store()
            .get_required::<Height>(ParameterId::PeerResponseHeight)?;
        let lifetime = self.base.store().get_required::<Height>(ParameterId::Lifetime)?;
        let min_height = self.min_height()?;
        let bound = response_height + lifetime;

        let max_height = match self
            .base
            .store()
            .get_sub::<Height>(ParameterId::PeerMaxHeight, SubTxId::NativeLockTx)
        {
            Some(peer_max) if peer_max > bound => return Err(Error::MaxHeightUnacceptable),
            Some(peer_max) => peer_max,
            None => bound,
        };
        if max_height < min_height + MIN_KERNEL_WINDOW {
            return Err(Error::MaxHeightUnacceptable);
        }

        self.max_height = Some(max_height);
        Ok(max_height)
    }

    /// Persist the computed kernel maximum height. Done by the owner when
    /// the swap was not started from the native side, so the expiry check
    /// uses the real kernel bound instead of the response height.
    pub fn save_max_height(&mut self) -> Result<(), Error> {
        let max_height = self.max_height()?;
        self.base
            .store_mut()
            .set_sub(ParameterId::MaxHeight, max_height, SubTxId::NativeLockTx);
        Ok(())
    }

    pub fn max_height(&self) -> Result<Height, Error> {
        self.max_height.ok_or(Error::Unknown("max height not set"))
    }

    pub fn min_height(&self) -> Result<Height, Error> {
        Ok(self
            .base
            .store()
            .get_required::<Height>(ParameterId::MinHeight)?)
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
        let max_height = self.max_height()?;
        self.base.create_kernel(min_height, max_height)
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

    fn proof_nonce_pair(&self) -> Result<(Scalar, Scalar), Error> {
        let seed = self
            .base
            .store()
            .get_required_sub::<Scalar>(ParameterId::Nonce, SubTxId::NativeLockTx)?;
        Ok(proof_nonces_from_seed(&seed))
    }

    /// This party's round two contribution, sent with the invitation or the
    /// confirmation.
    pub fn range_proof_part2(&self) -> Result<ProofNonces, Error> {
        let (tau1, tau2) = self.proof_nonce_pair()?;
        Ok(proof_part2(&tau1, &tau2))
    }

    fn combined_proof_nonces(&self) -> Result<ProofNonces, Error> {
        let peer = self.base.store().get_required_sub::<ProofNonces>(
            ParameterId::PeerSharedBulletProofPart2,
            SubTxId::NativeLockTx,
        )?;
        Ok(combine_proof_nonces(&self.range_proof_part2()?, &peer))
    }

    /// Round two of the shared proof: combine the nonce commitments of both
    /// parties. Requires the peer's contribution.
    pub fn create_shared_proof_part2(&mut self) -> Result<ProofNonces, Error> {
        self.combined_proof_nonces()
    }

    /// This party's round three contribution.
    pub fn range_proof_part3(&self) -> Result<ProofPartial, Error> {
        let (tau1, tau2) = self.proof_nonce_pair()?;
        let commitment = self.shared_commitment()?;
        let combined = self.combined_proof_nonces()?;
        Ok(proof_part3(
            &commitment,
            &combined,
            &tau1,
            &tau2,
            &self.shared_blinding()?,
        ))
    }

    /// Round three of the shared proof. The owner, holding both openings,
    /// finalizes the proof and verifies it against the lock amount.
    pub fn create_shared_proof_part3(&mut self) -> Result<(), Error> {
        let mine = self.range_proof_part3()?;
        if !self.is_owner {
            return Ok(());
        }
        let peer = self.base.store().get_required_sub::<ProofPartial>(
            ParameterId::PeerSharedBulletProofPart3,
            SubTxId::NativeLockTx,
        )?;
        let combined = self.combined_proof_nonces()?;
        let proof = finalize_proof(&combined, &mine, &peer);
        proof
            .verify(&self.shared_commitment()?, self.amount())
            .map_err(Error::Crypto)?;
        self.shared_proof = Some(proof);
        Ok(())
    }

    /// Assemble the full lock transaction. Owner only; requires a finalized
    /// kernel signature and the verified shared proof.
    pub fn create_transaction(&mut self, wallet: &mut dyn Wallet) -> Result<Transaction, Error> {
        let shared_proof = self
            .shared_proof
            .ok_or(Error::Unknown("shared proof not finalized"))?;
        let mut outputs = vec![Output {
            commitment: self.shared_commitment()?,
            proof: RangeProof::Shared(shared_proof),
        }];
        if let Some(change) = self.change_coin {
            let proof = wallet.output_proof(&change);
            outputs.push(Output {
                commitment: crypto::commit(change.amount, &change.blinding),
                proof: RangeProof::Wallet(proof),
            });
        }

        Ok(Transaction {
            inputs: self.create_inputs(),
            outputs,
            kernel: *self.base.kernel()?,
            offset: self.base.total_offset()?,
        })
    }
}
