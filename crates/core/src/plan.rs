//! Plan read-model types.
//!
//! A plan is the tenant unit: every memory vector, conversation, and
//! background job is scoped to one plan. Plans are persisted elsewhere;
//! this subsystem reads them for context building and sweep selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::CompressionMode;

/// A plan as read from the plan source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan ID.
    pub id: String,

    /// Owning user ID.
    pub owner_id: String,

    /// Human-readable title.
    pub title: String,

    /// Free-form metadata (destination, dates, preferences, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Outcome of the most recent compression run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_compression: Option<LastCompression>,

    /// When the plan itself was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A record of the most recent compression run for a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastCompression {
    pub mode: CompressionMode,
    pub ratio: f32,
    pub at: DateTime<Utc>,
}

/// A one-line summary of a completed background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    /// Unique job ID.
    pub id: String,

    /// Short human-readable title ("Crawl restaurants near hotel").
    pub title: String,

    /// One-line outcome description, if the job produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    /// When the job finished.
    pub finished_at: DateTime<Utc>,
}

/// A sweep-selection snapshot row: one per plan with activity counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanActivity {
    pub plan_id: String,
    pub owner_id: String,

    /// Live (non-archived) memory vector count.
    pub active_vectors: usize,

    /// Most recent of: last message, last job activity, last plan update.
    pub last_activity_at: DateTime<Utc>,
}
