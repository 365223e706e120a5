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

//! Builders for the three native chain sub-transactions. Builders are
//! stateless facades over the parameter store: every piece of randomness
//! they draw is persisted on first use, so a builder reconstructed after a
//! crash re-derives the exact same transaction.

use rand::rngs::OsRng;

use crate::crypto::{self, Point, Scalar, Signature};
use crate::params::{ParameterId, ParameterStore, SubTxId};
use crate::swap::{Amount, Height};
use crate::transaction::{KernelId, TxKernel};
use crate::Error;

pub mod lock;
pub mod withdraw;

pub use lock::LockTxBuilder;
pub use withdraw::SharedTxBuilder;

/// Signing state common to the lock and withdraw builders: one party's
/// offset, nonce and blinding excess for a single kernel, together with the
/// peer contributions read from the store.
pub(crate) struct BaseTxBuilder<'a> {
    store: &'a mut ParameterStore,
    sub_tx: SubTxId,
    amount: Amount,
    fee: Amount,
    kernel: Option<TxKernel>,
    partial: Option<Scalar>,
}

impl<'a> BaseTxBuilder<'a> {
    pub(crate) fn new(
        store: &'a mut ParameterStore,
        sub_tx: SubTxId,
        amount: Amount,
        fee: Amount,
    ) -> Self {
        BaseTxBuilder {
            store,
            sub_tx,
            amount,
            fee,
            kernel: None,
            partial: None,
        }
    }

    pub(crate) fn store(&self) -> &ParameterStore {
        self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut ParameterStore {
        self.store
    }

    pub(crate) fn sub_tx(&self) -> SubTxId {
        self.sub_tx
    }

    pub(crate) fn amount(&self) -> Amount {
        self.amount
    }

    pub(crate) fn fee(&self) -> Amount {
        self.fee
    }

    /// Load a persisted scalar, or draw and persist a fresh one.
    fn load_or_generate(&mut self, id: ParameterId) -> Scalar {
        match self.store.get_sub::<Scalar>(id, self.sub_tx) {
            Some(scalar) => scalar,
            None => {
                let scalar = crypto::random_scalar(&mut OsRng);
                self.store.set_sub(id, scalar, self.sub_tx);
                scalar
            }
        }
    }

    /// Kernel offset contributed by this party, bound to the swap.
    pub(crate) fn generate_offset(&mut self) -> Scalar {
        self.load_or_generate(ParameterId::Offset)
    }

    /// Secret signing nonce, bound to the swap.
    pub(crate) fn generate_nonce(&mut self) -> Scalar {
        self.load_or_generate(ParameterId::Nonce)
    }

    pub(crate) fn offset(&self) -> Result<Scalar, Error> {
        Ok(self
            .store
            .get_required_sub::<Scalar>(ParameterId::Offset, self.sub_tx)?)
    }

    fn nonce(&self) -> Result<Scalar, Error> {
        Ok(self
            .store
            .get_required_sub::<Scalar>(ParameterId::Nonce, self.sub_tx)?)
    }

    /// Store the blinding excess once the concrete builder computed it.
    pub(crate) fn set_excess(&mut self, excess: Scalar) {
        self.store
            .set_sub(ParameterId::BlindingExcess, excess, self.sub_tx);
    }

    pub(crate) fn excess(&self) -> Result<Scalar, Error> {
        Ok(self
            .store
            .get_required_sub::<Scalar>(ParameterId::BlindingExcess, self.sub_tx)?)
    }

    pub(crate) fn public_nonce(&self) -> Result<Point, Error> {
        Ok(self.nonce()? * crypto::blinding_generator())
    }

    pub(crate) fn public_excess(&self) -> Result<Point, Error> {
        Ok(self.excess()? * crypto::blinding_generator())
    }

    /// The peer's public excess and nonce, once its invitation or
    /// confirmation has been ingested.
    pub(crate) fn peer_public_excess_and_nonce(&self) -> Option<(Point, Point)> {
        let excess = self
            .store
            .get_sub::<Point>(ParameterId::PeerPublicExcess, self.sub_tx)?;
        let nonce = self
            .store
            .get_sub::<Point>(ParameterId::PeerPublicNonce, self.sub_tx)?;
        Some((excess, nonce))
    }

    /// Build the unsigned kernel over the combined public excess and persist
    /// its id, so the kernel can be tracked on-chain by either party even
    /// before the signature is aggregated.
    pub(crate) fn create_kernel(
        &mut self,
        min_height: Height,
        max_height: Height,
    ) -> Result<(), Error> {
        let (peer_excess, _) = self
            .peer_public_excess_and_nonce()
            .ok_or(crate::params::Error::MissingParameter(
                ParameterId::PeerPublicExcess,
            ))?;
        let excess = self.public_excess()? + peer_excess;
        let kernel = TxKernel::new(self.fee, min_height, max_height, excess);
        self.store
            .set_sub(ParameterId::KernelId, kernel.id(), self.sub_tx);
        self.kernel = Some(kernel);
        Ok(())
    }

    pub(crate) fn kernel(&self) -> Result<&TxKernel, Error> {
        self.kernel
            .as_ref()
            .ok_or(Error::Unknown("kernel not created"))
    }

    pub(crate) fn kernel_id(&self) -> Result<KernelId, Error> {
        Ok(self.kernel()?.id())
    }

    /// The challenge over the combined nonce and the kernel id.
    fn challenge(&self) -> Result<Scalar, Error> {
        let (_, peer_nonce) = self
            .peer_public_excess_and_nonce()
            .ok_or(crate::params::Error::MissingParameter(
                ParameterId::PeerPublicNonce,
            ))?;
        let nonce_total = self.public_nonce()? + peer_nonce;
        Ok(crypto::challenge(&nonce_total, self.kernel_id()?.as_bytes()))
    }

    /// Produce this party's partial signature over the kernel.
    pub(crate) fn sign_partial(&mut self) -> Result<(), Error> {
        let e = self.challenge()?;
        let nonce = self.nonce()?;
        let excess = self.excess()?;
        self.partial = Some(crypto::sign_partial(&nonce, &excess, &e));
        Ok(())
    }

    pub(crate) fn partial_signature(&self) -> Result<Scalar, Error> {
        self.partial.ok_or(Error::Unknown("partial not signed"))
    }

    pub(crate) fn peer_signature(&self) -> Option<Scalar> {
        self.store
            .get_sub::<Scalar>(ParameterId::PeerSignature, self.sub_tx)
    }

    /// Verify the peer partial against the peer's own public excess and
    /// nonce.
    pub(crate) fn is_peer_signature_valid(&self) -> Result<bool, Error> {
        let peer_sig = match self.peer_signature() {
            Some(sig) => sig,
            None => return Ok(false),
        };
        let (peer_excess, peer_nonce) = self
            .peer_public_excess_and_nonce()
            .ok_or(crate::params::Error::MissingParameter(
                ParameterId::PeerPublicExcess,
            ))?;
        let e = self.challenge()?;
        Ok(crypto::verify_partial(
            &peer_sig,
            &peer_nonce,
            &peer_excess,
            &e,
        ))
    }

    /// Aggregate both partials into the kernel signature and verify the
    /// complete kernel.
    pub(crate) fn finalize_signature(&mut self) -> Result<(), Error> {
        let peer_sig = self
            .peer_signature()
            .ok_or(crate::params::Error::MissingParameter(
                ParameterId::PeerSignature,
            ))?;
        let (_, peer_nonce) = self
            .peer_public_excess_and_nonce()
            .ok_or(crate::params::Error::MissingParameter(
                ParameterId::PeerPublicNonce,
            ))?;
        let signature = Signature {
            nonce_pub: self.public_nonce()? + peer_nonce,
            k: self.partial_signature()? + peer_sig,
        };
        let kernel = self.kernel.as_mut().ok_or(Error::Unknown("kernel not created"))?;
        kernel.signature = Some(signature);
        kernel.verify().map_err(crate::Error::Transaction)?;
        let kernel = *kernel;
        self.store.set_sub(ParameterId::Kernel, kernel, self.sub_tx);
        Ok(())
    }

    /// Combined kernel offset of the final transaction.
    pub(crate) fn total_offset(&self) -> Result<Scalar, Error> {
        let peer_offset = self
            .store
            .get_required_sub::<Scalar>(ParameterId::PeerOffset, self.sub_tx)?;
        Ok(self.offset()? + peer_offset)
    }
}
