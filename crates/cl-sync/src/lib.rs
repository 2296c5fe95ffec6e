//! Replication between Changeline stores.
//!
//! A pass seals the source at a new checkpoint, pulls its changes since the
//! pair's watermark in chunks, diffs them against the target's own recent
//! changes, and applies what is safe. Records edited on both sides are
//! reported as conflicts and left for a `ConflictResolver`.

pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod diff;
pub mod error;
pub mod replica;
pub mod types;
pub mod watermark;

pub use config::ReplicationConfig;
pub use conflict::{Conflict, ConflictKind, ConflictResolver};
pub use coordinator::ReplicationCoordinator;
pub use diff::DiffEngine;
pub use error::{SyncError, SyncResult};
pub use replica::{LocalReplica, Replica};
pub use types::{BulkResult, DiffResult, ReplicateOptions, ReplicationReport, Update};
pub use watermark::{Watermark, WatermarkStore, DEFAULT_WATERMARK_COLLECTION};
