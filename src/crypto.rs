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

//! Cryptographic constructions of the native chain protocol: Pedersen
//! commitments, two-party Schnorr kernel signatures, the adaptor arithmetic
//! that links the two chains, and the three-round range proof held over the
//! shared output.
//!
//! The partial signature convention follows the native chain kernel rule
//! `R + e·X + σ·G = O`, i.e. a partial is `σ_i = −(n_i + e·x_i)`. An adapted
//! partial is `σ' = σ + s`; publishing the aggregate on-chain therefore
//! reveals `s` to anyone holding both true partials.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::CompressedRistretto;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};
use thiserror::Error;

use std::io;

use crate::consensus::{self, CanonicalBytes, Decodable, Encodable};
use crate::swap::Amount;

pub use curve25519_dalek::ristretto::RistrettoPoint as Point;
pub use curve25519_dalek::scalar::Scalar;

/// Errors when manipulating keys, signatures or proofs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Not a canonical compressed point.
    #[error("Invalid curve point")]
    InvalidPoint,
    /// Not a canonical scalar.
    #[error("Invalid scalar")]
    InvalidScalar,
    /// A partial or aggregated signature failed verification.
    #[error("Invalid signature")]
    InvalidSignature,
    /// A shared range proof failed verification.
    #[error("Invalid range proof")]
    InvalidRangeProof,
}

/// The blinding factor generator `G`.
pub fn blinding_generator() -> Point {
    RISTRETTO_BASEPOINT_POINT
}

/// The value generator `H`, derived nothing-up-my-sleeve from a domain tag.
pub fn value_generator() -> Point {
    Point::hash_from_bytes::<Sha512>(b"mw-swap-core/value-generator")
}

/// Pedersen commitment `C = b·G + v·H`.
pub fn commit(value: Amount, blinding: &Scalar) -> Point {
    blinding * blinding_generator() + Scalar::from(value) * value_generator()
}

/// Draw a uniformly random scalar.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut wide = [0u8; 64];
    rng.fill_bytes(&mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    Scalar::from_bytes_mod_order_wide(&hasher.finalize().into())
}

/// An aggregated kernel signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// The combined public nonce `R`.
    pub nonce_pub: Point,
    /// The combined signature scalar.
    pub k: Scalar,
}

impl Signature {
    /// Verify against the combined public excess and the signed message.
    pub fn verify(&self, excess: &Point, message: &[u8]) -> Result<(), Error> {
        let e = challenge(&self.nonce_pub, message);
        let zero = self.nonce_pub + e * excess + self.k * blinding_generator();
        if zero == Point::identity() {
            Ok(())
        } else {
            Err(Error::InvalidSignature)
        }
    }
}

/// The Fiat-Shamir challenge `e = H(R ‖ m)` binding the combined nonce to the
/// kernel message.
pub fn challenge(nonce_pub: &Point, message: &[u8]) -> Scalar {
    hash_to_scalar(&[nonce_pub.compress().as_bytes(), message])
}

/// Produce a partial signature `σ = −(n + e·x)` over the challenge `e`.
pub fn sign_partial(nonce: &Scalar, excess: &Scalar, e: &Scalar) -> Scalar {
    -(nonce + e * excess)
}

/// Check that a peer partial satisfies `R_peer + e·X_peer + σ·G = O`.
pub fn verify_partial(
    partial: &Scalar,
    peer_nonce_pub: &Point,
    peer_excess_pub: &Point,
    e: &Scalar,
) -> bool {
    peer_nonce_pub + e * peer_excess_pub + partial * blinding_generator() == Point::identity()
}

/// Adapt a partial signature with the swap secret, `σ' = σ + s`. The adapted
/// partial does not verify on its own; it becomes useful once the aggregate
/// built from the true partials is published.
pub fn adapt(partial: &Scalar, secret: &Scalar) -> Scalar {
    partial + secret
}

/// Recover the swap secret from the aggregated signature scalar published
/// on-chain, the local true partial and the peer's adapted partial:
/// `s = σ'_peer + σ_mine − k`.
pub fn extract_secret(kernel_k: &Scalar, my_partial: &Scalar, peer_adapted: &Scalar) -> Scalar {
    peer_adapted + my_partial - kernel_k
}

/// The public image `s·G` of the secret carried by an adapted partial,
/// derived from the signature equation: `σ'·G + e·X_peer + R_peer = s·G`.
pub fn secret_public_key(
    peer_adapted: &Scalar,
    peer_nonce_pub: &Point,
    peer_excess_pub: &Point,
    e: &Scalar,
) -> Point {
    peer_adapted * blinding_generator() + e * peer_excess_pub + peer_nonce_pub
}

impl Encodable for Signature {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let len = self.nonce_pub.consensus_encode(s)?;
        Ok(len + self.k.consensus_encode(s)?)
    }
}

impl Decodable for Signature {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(Signature {
            nonce_pub: Decodable::consensus_decode(d)?,
            k: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(Signature);

/// One party's nonce commitments for the second round of the shared range
/// proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofNonces {
    pub t1: Point,
    pub t2: Point,
}

/// One party's blinded opening for the third round of the shared range proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofPartial {
    pub tau_x: Scalar,
}

/// The finalized proof over the shared output. It certifies that the party
/// contributions open the blinding side of the commitment consistently; the
/// inner product rounds of the full proof are the curve library's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiSigProof {
    pub t1: Point,
    pub t2: Point,
    pub tau_x: Scalar,
}

/// Derive a party's proof nonce pair deterministically from its persisted
/// nonce seed, so the rounds survive a restart.
pub fn proof_nonces_from_seed(seed: &Scalar) -> (Scalar, Scalar) {
    let tau1 = hash_to_scalar(&[b"mw-swap-core/rangeproof/tau1", seed.as_bytes()]);
    let tau2 = hash_to_scalar(&[b"mw-swap-core/rangeproof/tau2", seed.as_bytes()]);
    (tau1, tau2)
}

fn proof_challenge_z(commitment: &Point) -> Scalar {
    hash_to_scalar(&[
        b"mw-swap-core/rangeproof/z",
        commitment.compress().as_bytes(),
    ])
}

fn proof_challenge_x(commitment: &Point, t1: &Point, t2: &Point) -> Scalar {
    hash_to_scalar(&[
        b"mw-swap-core/rangeproof/x",
        commitment.compress().as_bytes(),
        t1.compress().as_bytes(),
        t2.compress().as_bytes(),
    ])
}

/// Round two: commit to the proof nonces.
pub fn proof_part2(tau1: &Scalar, tau2: &Scalar) -> ProofNonces {
    ProofNonces {
        t1: tau1 * blinding_generator(),
        t2: tau2 * blinding_generator(),
    }
}

/// Combine both parties' round two contributions.
pub fn combine_proof_nonces(mine: &ProofNonces, peer: &ProofNonces) -> ProofNonces {
    ProofNonces {
        t1: mine.t1 + peer.t1,
        t2: mine.t2 + peer.t2,
    }
}

/// Round three: open the blinding share against the combined nonces,
/// `τx_i = τ1_i·x + τ2_i·x² + z²·b_i`.
pub fn proof_part3(
    commitment: &Point,
    combined: &ProofNonces,
    tau1: &Scalar,
    tau2: &Scalar,
    blinding_share: &Scalar,
) -> ProofPartial {
    let x = proof_challenge_x(commitment, &combined.t1, &combined.t2);
    let z = proof_challenge_z(commitment);
    ProofPartial {
        tau_x: tau1 * x + tau2 * x * x + z * z * blinding_share,
    }
}

/// Finalize the proof from the combined nonces and both openings.
pub fn finalize_proof(
    combined: &ProofNonces,
    mine: &ProofPartial,
    peer: &ProofPartial,
) -> MultiSigProof {
    MultiSigProof {
        t1: combined.t1,
        t2: combined.t2,
        tau_x: mine.tau_x + peer.tau_x,
    }
}

impl MultiSigProof {
    /// Verify `τx·G = x·T1 + x²·T2 + z²·(C − v·H)` against the committed
    /// value.
    pub fn verify(&self, commitment: &Point, value: Amount) -> Result<(), Error> {
        let x = proof_challenge_x(commitment, &self.t1, &self.t2);
        let z = proof_challenge_z(commitment);
        let blinded = commitment - Scalar::from(value) * value_generator();
        let lhs = self.tau_x * blinding_generator();
        let rhs = x * self.t1 + x * x * self.t2 + z * z * blinded;
        if lhs == rhs {
            Ok(())
        } else {
            Err(Error::InvalidRangeProof)
        }
    }
}

impl Encodable for ProofNonces {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let len = self.t1.consensus_encode(s)?;
        Ok(len + self.t2.consensus_encode(s)?)
    }
}

impl Decodable for ProofNonces {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(ProofNonces {
            t1: Decodable::consensus_decode(d)?,
            t2: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(ProofNonces);

impl Encodable for ProofPartial {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.tau_x.consensus_encode(s)
    }
}

impl Decodable for ProofPartial {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(ProofPartial {
            tau_x: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(ProofPartial);

impl Encodable for MultiSigProof {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        let mut len = self.t1.consensus_encode(s)?;
        len += self.t2.consensus_encode(s)?;
        Ok(len + self.tau_x.consensus_encode(s)?)
    }
}

impl Decodable for MultiSigProof {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        Ok(MultiSigProof {
            t1: Decodable::consensus_decode(d)?,
            t2: Decodable::consensus_decode(d)?,
            tau_x: Decodable::consensus_decode(d)?,
        })
    }
}

impl_strict_encoding!(MultiSigProof);

impl CanonicalBytes for Scalar {
    fn as_canonical_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, consensus::Error>
    where
        Self: Sized,
    {
        if bytes.len() != 32 {
            return Err(consensus::Error::ParseFailed("scalar must be 32 bytes"));
        }
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        Option::from(Scalar::from_canonical_bytes(buf))
            .ok_or(consensus::Error::new(Error::InvalidScalar))
    }
}

impl CanonicalBytes for Point {
    fn as_canonical_bytes(&self) -> Vec<u8> {
        self.compress().as_bytes().to_vec()
    }

    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, consensus::Error>
    where
        Self: Sized,
    {
        if bytes.len() != 32 {
            return Err(consensus::Error::ParseFailed("point must be 32 bytes"));
        }
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        CompressedRistretto(buf)
            .decompress()
            .ok_or(consensus::Error::new(Error::InvalidPoint))
    }
}

impl Encodable for Scalar {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.to_bytes().consensus_encode(s)
    }
}

impl Decodable for Scalar {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        let bytes: [u8; 32] = Decodable::consensus_decode(d)?;
        CanonicalBytes::from_canonical_bytes(&bytes)
    }
}

impl Encodable for Point {
    fn consensus_encode<W: io::Write>(&self, s: &mut W) -> Result<usize, io::Error> {
        self.compress().to_bytes().consensus_encode(s)
    }
}

impl Decodable for Point {
    fn consensus_decode<D: io::Read>(d: &mut D) -> Result<Self, consensus::Error> {
        let bytes: [u8; 32] = Decodable::consensus_decode(d)?;
        CanonicalBytes::from_canonical_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct PartyKeys {
        nonce: Scalar,
        excess: Scalar,
    }

    impl PartyKeys {
        fn nonce_pub(&self) -> Point {
            self.nonce * blinding_generator()
        }

        fn excess_pub(&self) -> Point {
            self.excess * blinding_generator()
        }
    }

    fn keys(rng: &mut ChaCha20Rng) -> PartyKeys {
        PartyKeys {
            nonce: random_scalar(rng),
            excess: random_scalar(rng),
        }
    }

    fn two_party_signature(
        rng: &mut ChaCha20Rng,
        message: &[u8],
    ) -> (PartyKeys, PartyKeys, Scalar, Scalar, Signature) {
        let a = keys(rng);
        let b = keys(rng);
        let nonce_total = a.nonce_pub() + b.nonce_pub();
        let e = challenge(&nonce_total, message);
        let sig_a = sign_partial(&a.nonce, &a.excess, &e);
        let sig_b = sign_partial(&b.nonce, &b.excess, &e);
        let sig = Signature {
            nonce_pub: nonce_total,
            k: sig_a + sig_b,
        };
        (a, b, sig_a, sig_b, sig)
    }

    #[test]
    fn aggregated_signature_verifies() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let message = b"kernel";
        let (a, b, _, _, sig) = two_party_signature(&mut rng, message);
        let excess_total = a.excess_pub() + b.excess_pub();
        assert!(sig.verify(&excess_total, message).is_ok());
        assert!(sig.verify(&a.excess_pub(), message).is_err());
    }

    #[test]
    fn partial_signature_verifies_against_party_keys() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let message = b"kernel";
        let (a, b, sig_a, sig_b, sig) = two_party_signature(&mut rng, message);
        let e = challenge(&sig.nonce_pub, message);
        assert!(verify_partial(&sig_a, &a.nonce_pub(), &a.excess_pub(), &e));
        assert!(verify_partial(&sig_b, &b.nonce_pub(), &b.excess_pub(), &e));
        assert!(!verify_partial(&sig_a, &b.nonce_pub(), &b.excess_pub(), &e));
    }

    #[test]
    fn secret_extraction_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let message = b"redeem kernel";
        let (a, b, sig_a, sig_b, sig) = two_party_signature(&mut rng, message);
        let secret = random_scalar(&mut rng);

        // The foreign side adapts its partial before sending it over.
        let adapted = adapt(&sig_b, &secret);
        let e = challenge(&sig.nonce_pub, message);
        assert_eq!(
            secret_public_key(&adapted, &b.nonce_pub(), &b.excess_pub(), &e),
            secret * blinding_generator()
        );
        let _ = a;

        // Publishing the true aggregate reveals the secret.
        assert_eq!(extract_secret(&sig.k, &sig_a, &adapted), secret);
    }

    #[test]
    fn shared_range_proof_three_rounds() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let value: Amount = 5_000_000;
        let share_a = random_scalar(&mut rng);
        let share_b = random_scalar(&mut rng);
        let commitment = commit(value, &(share_a + share_b));

        let seed_a = random_scalar(&mut rng);
        let seed_b = random_scalar(&mut rng);
        let (tau1_a, tau2_a) = proof_nonces_from_seed(&seed_a);
        let (tau1_b, tau2_b) = proof_nonces_from_seed(&seed_b);

        let part2_a = proof_part2(&tau1_a, &tau2_a);
        let part2_b = proof_part2(&tau1_b, &tau2_b);
        let combined = combine_proof_nonces(&part2_a, &part2_b);

        let part3_a = proof_part3(&commitment, &combined, &tau1_a, &tau2_a, &share_a);
        let part3_b = proof_part3(&commitment, &combined, &tau1_b, &tau2_b, &share_b);

        let proof = finalize_proof(&combined, &part3_a, &part3_b);
        assert!(proof.verify(&commitment, value).is_ok());
        assert!(proof.verify(&commitment, value + 1).is_err());
    }
}
