//! Foundation types for Changeline.
//!
//! This crate provides the persisted shapes shared by every other Changeline
//! crate: the monotonic [`Checkpoint`], the per-record [`Change`] entry, and
//! the content-derived identifiers that tie them together.
//!
//! # Key Types
//!
//! - [`Revision`]: Hex-encoded content hash of a record's data
//! - [`ChangeId`]: Deterministic identifier derived from `(model name, model id)`
//! - [`Checkpoint`]: One point in a store's monotonic sequence
//! - [`Change`]: Tracked mutation state for one record
//! - [`ChangeKind`]: Create / update / delete classification of a change

pub mod change;
pub mod checkpoint;
pub mod error;
pub mod revision;

pub use change::{Change, ChangeKind};
pub use checkpoint::Checkpoint;
pub use error::TypeError;
pub use revision::{ChangeId, Revision};
