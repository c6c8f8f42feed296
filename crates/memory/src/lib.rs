//! Memory compression for Planmind.
//!
//! Bounds the growth of a plan's semantic-memory vectors without losing
//! salient information:
//! - [`similarity`] — cosine similarity, duplicate grouping, greedy
//!   clustering.
//! - [`compressor`] — light (dedup) and full (cluster + summarize +
//!   archive) compression runs.
//! - [`scheduler`] — periodic sweep selection and manual triggers;
//!   submits jobs, never compresses inline.
//! - [`in_memory`] — a Vec-backed store for tests and ephemeral sessions.

pub mod compressor;
pub mod in_memory;
pub mod scheduler;
pub mod similarity;

pub use compressor::MemoryCompressor;
pub use in_memory::InMemoryStore;
pub use scheduler::{COMPRESSION_JOB_TYPE, CompressionScheduler};
pub use similarity::{cosine_similarity, find_clusters, find_duplicate_groups};
