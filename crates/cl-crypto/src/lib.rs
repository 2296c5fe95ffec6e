//! Revision hashing for Changeline.
//!
//! Provides the domain-separated BLAKE3 [`RevisionHasher`] used to compute a
//! record's content revision, over a canonical encoding that is independent
//! of key order and sensitive to value types.
//!
//! Hashing is delegated to `blake3`; this crate only frames the input.

pub mod canonical;
pub mod hasher;

pub use canonical::CanonicalEncoder;
pub use hasher::{HasherError, RevisionHasher};
