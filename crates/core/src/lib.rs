//! # Planmind Core
//!
//! Domain types, traits, and error definitions for the Planmind memory
//! subsystem. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (vector store, embedder, summarizer, job
//! runner, read models) is defined as a trait here. Implementations live
//! outside this subsystem or in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod jobs;
pub mod llm;
pub mod memory;
pub mod message;
pub mod plan;
pub mod sources;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{EmbeddingError, Error, JobError, LlmError, Result, StoreError};
pub use jobs::{JobPriority, JobRunner};
pub use llm::{Embedder, Generation, GenerationOptions, Summarizer};
pub use memory::{
    CompressionMode, CompressionResult, Diagnostics, MemoryStats, MemoryVector, RefType,
    ScoredVector,
};
pub use message::{ChatMessage, Role};
pub use plan::{JobSummary, LastCompression, Plan, PlanActivity};
pub use sources::{JobsSource, MessagesSource, PlanSource};
pub use store::EmbeddingStore;
