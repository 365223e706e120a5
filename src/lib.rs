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

//! Core engine of a cross-chain atomic swap between a confidential
//! MimbleWimble-style native chain and a Bitcoin-family foreign chain:
//!
//! - Interactive construction of the three native sub-transactions (Lock
//!   over a jointly blinded output, Redeem, Refund) with partial Schnorr
//!   signatures and a three-round shared range proof
//! - The adaptor-signature secret reveal tying the two chains atomically
//! - A crash-resumable state machine sequencing funding, redeem and refund
//!   across both chains, with rollback on every intermediate failure
//!
//! ## Collaborators
//! The wallet database, the native node gateway, the peer transport and the
//! foreign chain are external: the engine talks to them through the
//! [`syncer::Gateway`], [`syncer::Wallet`] and [`side::SecondSide`] traits.
//! A Bitcoin-family [`side::SecondSide`] implementation over an abstract
//! client is provided in the `bitcoin` module.

// Coding conventions
#![forbid(unsafe_code)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(unused_mut)]

#[macro_use]
extern crate amplify;

use thiserror::Error;

#[macro_use]
pub mod consensus;

pub mod bitcoin;
pub mod builders;
pub mod crypto;
pub mod messages;
pub mod params;
pub mod protocol;
pub mod role;
pub mod side;
pub mod swap;
pub mod syncer;
pub mod transaction;

/// A list of possible errors when executing a cross-chain atomic swap. Each
/// error can have multiple levels down to the component implementations.
#[derive(Error, Debug)]
pub enum Error {
    /// A consensus error during an encoding/decoding operation.
    #[error("Consensus error: {0}")]
    Consensus(#[from] consensus::Error),
    /// A parameter store error: absent or mistyped parameter.
    #[error("Parameter error: {0}")]
    Params(#[from] params::Error),
    /// A cryptographic error during key, signature or proof manipulation.
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] crypto::Error),
    /// A native transaction error.
    #[error("Transaction error: {0}")]
    Transaction(#[from] transaction::Error),
    /// A foreign side adapter error.
    #[error("Second side error: {0}")]
    Side(#[from] side::Error),
    /// The negotiated lock kernel window is unacceptable.
    #[error("Kernel maximum height is unacceptable")]
    MaxHeightUnacceptable,
    /// The swap cannot start, e.g. insufficient funds or own address used as
    /// the peer's.
    #[error("Failed to start the swap")]
    FailToStartSwap,
    /// Any error not part of this list.
    #[error("Unknown error: {0}")]
    Unknown(&'static str),
}

/// Result of a swap engine computation, wraps the crate level
/// [`enum@Error`] type.
pub type Res<T> = Result<T, Error>;
