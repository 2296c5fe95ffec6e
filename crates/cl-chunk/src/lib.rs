//! Chunked transfer primitives for Changeline.
//!
//! Bulk reads and writes are split into bounded pages driven one at a time,
//! so a replication pass never needs the whole change set in one call:
//! - `upload_in_chunks` slices a list of items and processes each slice
//! - `download_in_chunks` pages a `Filter` by offset until a short page is returned
//! - `download_after_cursor` pages by position, for sets that change mid-read
//! - `ChunkResult` / `concat_results` fold per-chunk results together

pub mod result;
pub mod transfer;

pub use result::{concat_results, ChunkResult};
pub use transfer::{download_after_cursor, download_in_chunks, upload_in_chunks};
