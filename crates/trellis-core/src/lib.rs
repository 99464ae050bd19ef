//! Trellis Core - Foundational types for the Trellis asset generator
//!
//! This crate provides the types every other Trellis crate depends on:
//! - `TrellisError`, `ErrorKind` and the `Result` alias
//! - `ContentHash` - SHA-256 digests of generated artifacts
//! - `CancelToken` - cooperative cancellation for the batch loop

mod cancel;
mod error;
mod hash;

pub use cancel::CancelToken;
pub use error::{ErrorKind, Result, TrellisError};
pub use hash::ContentHash;
