//! Shared foundational types used across the REMU emulation toolchain.
//!
//! This crate provides interned identifiers, content hashing, the
//! arbitrary-width [`BitVec`] used for netlist constants and checkpoint
//! images, and the common internal error type.

#![warn(missing_docs)]

pub mod bitvec;
pub mod hash;
pub mod ident;
pub mod result;

pub use bitvec::{BitVec, ParseBitVecError};
pub use hash::ContentHash;
pub use ident::{Ident, Interner};
pub use result::{InternalError, RemuResult};
