//! Pure arithmetic and on-disk formats for content-addressed, chunked
//! dataset caches: chunk shape derivation, the immutable `.mref` reference
//! tree, and the mutable `.mrkl` verification state.
//!
//! This crate has no async runtime and no network client — it is the
//! dependency-free foundation `mafc-client` builds the fetch/verify engine
//! on top of.

pub mod codec;
mod error;
pub mod hash;
mod merkle_ref;
mod merkle_state;
pub mod shape;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{Error, Result};
pub use hash::Digest32;
pub use merkle_ref::MerkleRef;
pub use merkle_state::MerkleState;
pub use shape::MerkleShape;
