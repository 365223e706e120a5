//! Native chain transaction model: inputs and outputs as Pedersen
//! commitments, the signature-bearing kernel with its height window, and the
//! validation performed before handing a transaction to the node gateway.

use sha2::{Digest, Sha256};
use thiserror::Error;

use std::io;

use crate::consensus::{self, Decodable, Encodable};
use crate::crypto::{self, MultiSigProof, Point, Scalar, Signature};
use crate::swap::{Amount, Height};

/// Transaction level errors raised by kernel and balance validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The kernel has no aggregated signature yet.
    #[error("Missing kernel signature")]
    MissingSignature,
    /// The kernel signature does not verify against the kernel excess.
    #[error("Invalid kernel signature")]
    InvalidKernelSignature,
    /// Commitments, kernel excess and offset do not balance.
    #[error("Transaction does not balance")]
    Imbalanced,
    /// The kernel height window does not contain the proposed height.
    #[error("Kernel height window violated")]
    HeightWindow,
}

fixed_hash::construct_fixed_hash!(
    /// Identifier of a kernel, the hash of everything the signature commits
    /// to. Used to track inclusion of a transaction on-chain.
    pub struct KernelId(32);
);

impl Encodable for KernelId {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(s)
    }
}

impl Decodable for KernelId {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        let bytes: [u8; 32] = Decodable::consensus_decode(d)?;
        Ok(Self::from_slice(&bytes))
    }
}

impl_strict_encoding!(KernelId);

/// A transaction input, spending a commitment present in the utxo set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Input {
    pub commitment: Point,
}

/// Range proof attached to an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeProof {
    /// Interactive proof over the jointly blinded output, checked by both
    /// parties during construction.
    Shared(MultiSigProof),
    /// Opaque proof produced by the owning wallet's prover for a single
    /// owner output.
    Wallet(Vec<u8>),
}

/// A transaction output, a commitment together with its range proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub commitment: Point,
    pub proof: RangeProof,
}

/// The signature bearing part of a native transaction. The kernel id commits
/// to the fee, the height window and the excess, not to the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxKernel {
    pub fee: Amount,
    pub min_height: Height,
    pub max_height: Height,
    pub excess: Point,
    pub signature: Option<Signature>,
}

impl TxKernel {
    pub fn new(fee: Amount, min_height: Height, max_height: Height, excess: Point) -> Self {
        TxKernel {
            fee,
            min_height,
            max_height,
            excess,
            signature: None,
        }
    }

    /// The kernel id, also the message signed by both parties.
    pub fn id(&self) -> KernelId {
        let mut hasher = Sha256::new();
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.min_height.to_le_bytes());
        hasher.update(self.max_height.to_le_bytes());
        hasher.update(self.excess.compress().as_bytes());
        KernelId::from_slice(&hasher.finalize())
    }

    /// Verify the aggregated signature against the kernel excess.
    pub fn verify(&self) -> Result<(), Error> {
        let signature = self.signature.ok_or(Error::MissingSignature)?;
        signature
            .verify(&self.excess, self.id().as_bytes())
            .map_err(|_| Error::InvalidKernelSignature)
    }
}

/// Context a transaction is validated against before broadcast.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    /// The height the transaction is proposed at.
    pub min_height: Height,
}

/// A native chain transaction with a single kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub kernel: TxKernel,
    pub offset: Scalar,
}

impl Transaction {
    /// Validate the kernel signature, the height window and the balance
    /// equation `ΣC_out − ΣC_in + fee·H = X + offset·G`. Range proofs of
    /// single owner outputs are the node's concern; the shared proof is
    /// checked by the builders at construction time where the committed
    /// value is known.
    pub fn validate(&self, context: &ValidationContext) -> Result<(), Error> {
        if context.min_height < self.kernel.min_height
            || context.min_height > self.kernel.max_height
        {
            return Err(Error::HeightWindow);
        }

        self.kernel.verify()?;

        let mut sum = Scalar::from(self.kernel.fee) * crypto::value_generator();
        for output in &self.outputs {
            sum = sum + output.commitment;
        }
        for input in &self.inputs {
            sum = sum - input.commitment;
        }
        let expected = self.kernel.excess + self.offset * crypto::blinding_generator();
        if sum == expected {
            Ok(())
        } else {
            Err(Error::Imbalanced)
        }
    }
}

impl Encodable for Input {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.commitment.consensus_encode(s)
    }
}

impl Decodable for Input {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Input {
            commitment: Decodable::consensus_decode(d)?,
        })
    }
}

impl Encodable for RangeProof {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        match self {
            RangeProof::Shared(proof) => {
                let len = 0x01u8.consensus_encode(s)?;
                Ok(len + proof.consensus_encode(s)?)
            }
            RangeProof::Wallet(bytes) => {
                let len = 0x02u8.consensus_encode(s)?;
                Ok(len + bytes.consensus_encode(s)?)
            }
        }
    }
}

impl Decodable for RangeProof {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        match Decodable::consensus_decode(d)? {
            0x01u8 => Ok(RangeProof::Shared(Decodable::consensus_decode(d)?)),
            0x02u8 => Ok(RangeProof::Wallet(Decodable::consensus_decode(d)?)),
            _ => Err(consensus::Error::UnknownType),
        }
    }
}

impl Encodable for Output {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let len = self.commitment.consensus_encode(s)?;
        Ok(len + self.proof.consensus_encode(s)?)
    }
}

impl Decodable for Output {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Output {
            commitment: Decodable::consensus_decode(d)?,
            proof: Decodable::consensus_decode(d)?,
        })
    }
}

impl Encodable for TxKernel {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.fee.consensus_encode(s)?;
        len += self.min_height.consensus_encode(s)?;
        len += self.max_height.consensus_encode(s)?;
        len += self.excess.consensus_encode(s)?;
        Ok(len + self.signature.consensus_encode(s)?)
    }
}

impl Decodable for TxKernel {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(TxKernel {
            fee: Decodable::consensus_decode(d)?,
            min_height: Decodable::consensus_decode(d)?,
            max_height: Decodable::consensus_decode(d)?,
            excess: Decodable::consensus_decode(d)?,
            signature: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(TxKernel);

impl Encodable for Transaction {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.inputs.consensus_encode(s)?;
        len += self.outputs.consensus_encode(s)?;
        len += self.kernel.consensus_encode(s)?;
        Ok(len + self.offset.consensus_encode(s)?)
    }
}

impl Decodable for Transaction {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Transaction {
            inputs: Decodable::consensus_decode(d)?,
            outputs: Decodable::consensus_decode(d)?,
            kernel: Decodable::consensus_decode(d)?,
            offset: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(Transaction);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};
    use crate::crypto::{challenge, commit, random_scalar, sign_partial};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn single_signer_tx(seed: u64, fee: Amount, min: Height, max: Height) -> Transaction {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let in_blind = random_scalar(&mut rng);
        let out_blind = random_scalar(&mut rng);
        let offset = random_scalar(&mut rng);
        let amount: Amount = 100;

        let excess = out_blind - in_blind - offset;
        let mut kernel = TxKernel::new(
            fee,
            min,
            max,
            excess * crypto::blinding_generator(),
        );

        let nonce = random_scalar(&mut rng);
        let nonce_pub = nonce * crypto::blinding_generator();
        let e = challenge(&nonce_pub, kernel.id().as_bytes());
        kernel.signature = Some(Signature {
            nonce_pub,
            k: sign_partial(&nonce, &excess, &e),
        });

        Transaction {
            inputs: vec![Input {
                commitment: commit(amount, &in_blind),
            }],
            outputs: vec![Output {
                commitment: commit(amount - fee, &out_blind),
                proof: RangeProof::Wallet(vec![0u8; 16]),
            }],
            kernel,
            offset,
        }
    }

    #[test]
    fn balanced_transaction_validates() {
        let tx = single_signer_tx(1, 2, 10, 100);
        assert!(tx.validate(&ValidationContext { min_height: 50 }).is_ok());
    }

    #[test]
    fn height_window_is_enforced() {
        let tx = single_signer_tx(2, 2, 10, 100);
        assert_eq!(
            tx.validate(&ValidationContext { min_height: 5 }),
            Err(Error::HeightWindow)
        );
        assert_eq!(
            tx.validate(&ValidationContext { min_height: 101 }),
            Err(Error::HeightWindow)
        );
    }

    #[test]
    fn tampered_output_fails_balance() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let mut tx = single_signer_tx(3, 2, 10, 100);
        tx.outputs[0].commitment = commit(1, &random_scalar(&mut rng));
        assert_eq!(
            tx.validate(&ValidationContext { min_height: 50 }),
            Err(Error::Imbalanced)
        );
    }

    #[test]
    fn kernel_roundtrip() {
        let tx = single_signer_tx(4, 2, 10, 100);
        let decoded: TxKernel = deserialize(&serialize(&tx.kernel)).unwrap();
        assert_eq!(decoded, tx.kernel);
        assert_eq!(decoded.id(), tx.kernel.id());
        let tx2: Transaction = deserialize(&serialize(&tx)).unwrap();
        assert_eq!(tx2, tx);
    }
}
