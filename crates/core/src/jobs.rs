//! JobRunner trait — the seam to the external background job queue.
//!
//! The scheduler only submits jobs; enqueue/ack/retry mechanics and the
//! guarantee that runs for the same plan never overlap are the runner's
//! responsibility.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Queue priority for a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

/// The background job submission seam.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Submit a job and return its ID without waiting for completion.
    async fn submit(
        &self,
        plan_id: &str,
        user_id: &str,
        job_type: &str,
        params: serde_json::Value,
        priority: JobPriority,
    ) -> Result<String, JobError>;
}
