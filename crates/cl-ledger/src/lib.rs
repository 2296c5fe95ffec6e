//! Change tracking for Changeline.
//!
//! This crate turns record mutations into change entries. It provides:
//! - `CheckpointSequencer`, the monotonic checkpoint sequence of a store
//! - `ChangeLedger`, one change entry per tracked record with guarded writes
//! - `RectifyEngine`, which folds edits within a checkpoint into one change
//! - `TrackedModel` registrations and `KeyedLocks` for per-record serialization

pub mod checkpoint;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod model;
pub mod rectify;

pub use checkpoint::{CheckpointSequencer, DEFAULT_CHECKPOINT_COLLECTION};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{ApplyOutcome, ChangeLedger};
pub use locks::KeyedLocks;
pub use model::{RecordState, TrackedModel};
pub use rectify::{advance, RectifyEngine, RectifyOutcome};
