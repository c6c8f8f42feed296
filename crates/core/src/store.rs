//! EmbeddingStore trait — the abstraction over vector persistence.
//!
//! The index/store internals live outside this subsystem. The compressor
//! and the embedding context builder only need the operations below.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::memory::{MemoryVector, ScoredVector};

/// The vector persistence seam.
///
/// All operations are plan-scoped and see only active (non-archived)
/// vectors unless stated otherwise.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Fetch active vectors for a plan that are at least `min_age_days` old,
    /// excluding the given IDs. `min_age_days == 0` returns all active
    /// vectors (modulo `exclude_ids`).
    async fn find_eligible(
        &self,
        plan_id: &str,
        min_age_days: u32,
        exclude_ids: &[String],
    ) -> Result<Vec<MemoryVector>, StoreError>;

    /// Soft-delete the given vectors, recording the actor. Never a hard
    /// delete.
    async fn bulk_archive(&self, ids: &[String], actor: &str) -> Result<(), StoreError>;

    /// Persist a new vector and return it as stored.
    async fn insert(&self, vector: MemoryVector) -> Result<MemoryVector, StoreError>;

    /// Count active vectors for a plan.
    async fn count_active(&self, plan_id: &str) -> Result<usize, StoreError>;

    /// Count archived vectors for a plan.
    async fn count_archived(&self, plan_id: &str) -> Result<usize, StoreError>;

    /// Plan-scoped similarity search over active vectors: top-`limit` hits
    /// at or above `min_similarity`, sorted by descending similarity.
    async fn search(
        &self,
        plan_id: &str,
        embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredVector>, StoreError>;
}
