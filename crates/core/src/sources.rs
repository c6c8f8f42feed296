//! Read-only source traits for context building and sweep selection.
//!
//! Messages, jobs, and plans are persisted and mutated elsewhere; the
//! context builders and the scheduler only ever read through these seams.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::ChatMessage;
use crate::plan::{JobSummary, Plan, PlanActivity};

/// Fetches recent conversation messages, newest last.
#[async_trait]
pub trait MessagesSource: Send + Sync {
    /// The `limit` most recent messages in chronological order.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError>;
}

/// Fetches recently completed background jobs, newest first.
#[async_trait]
pub trait JobsSource: Send + Sync {
    async fn recent_completed(
        &self,
        plan_id: &str,
        limit: usize,
    ) -> Result<Vec<JobSummary>, StoreError>;
}

/// Fetches plan metadata and the fleet-wide activity snapshot.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Resolve a plan by ID. Ownership checks happen behind this seam.
    async fn get(&self, plan_id: &str) -> Result<Option<Plan>, StoreError>;

    /// One activity row per plan that holds any memory vectors. Used by
    /// the scheduler's sweep selection.
    async fn activity_snapshot(&self) -> Result<Vec<PlanActivity>, StoreError>;
}
