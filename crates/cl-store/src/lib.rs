//! Persistence collaborator for Changeline.
//!
//! The change-tracking core never talks to a database directly. It consumes
//! the narrow [`DataStore`] interface: id lookups, create/save/delete,
//! an atomic find-or-create, and filtered finds with `skip`/`limit`/`order`.
//!
//! # Storage Backends
//!
//! - [`InMemoryDataStore`] -- map-based store for tests, embedding, and the
//!   CLI (which persists it as a JSON snapshot)
//!
//! # Design Rules
//!
//! 1. Documents are plain JSON objects keyed by a string id.
//! 2. `find_or_create` is atomic; it is the only race-free way to seed rows.
//! 3. Paging is stable: without an explicit order, documents sort by id.
//! 4. All backend errors are propagated, never silently ignored.

pub mod document;
pub mod error;
pub mod filter;
pub mod memory;
pub mod traits;

pub use document::Document;
pub use error::{StoreError, StoreResult};
pub use filter::{compare_values, Condition, Cursor, Direction, Filter, Op, Order};
pub use memory::{InMemoryDataStore, StoreSnapshot};
pub use traits::DataStore;
