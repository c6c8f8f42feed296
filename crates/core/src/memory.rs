//! Memory vector domain types.
//!
//! A memory vector is a stored embedding plus its source text, scoped to one
//! plan. Vectors are created on content ingestion (externally) or by the
//! compressor (`RefType::CompressionSummary`). They are never hard-deleted:
//! the compressor only ever flips the archival fields, which keeps the
//! lifecycle auditable and reversible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// What kind of source content a memory vector was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    /// A conversation message.
    Message,
    /// A completed background job result.
    Job,
    /// An ingested document or note.
    Document,
    /// A summary produced by full compression.
    CompressionSummary,
}

impl std::fmt::Display for RefType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefType::Message => "message",
            RefType::Job => "job",
            RefType::Document => "document",
            RefType::CompressionSummary => "compression_summary",
        };
        write!(f, "{s}")
    }
}

/// A stored semantic-memory vector.
///
/// Invariant: embedding dimensionality is fixed per deployment. Archived
/// vectors are excluded from every search and compression pass unless
/// explicitly requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryVector {
    /// Unique ID for this vector.
    pub id: String,

    /// The plan (tenant) this vector belongs to.
    pub plan_id: String,

    /// The embedding.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,

    /// The source text the embedding was computed from.
    pub content: String,

    /// What kind of content this vector was derived from.
    pub ref_type: RefType,

    /// ID of the source row (message ID, job ID, ...), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,

    /// Soft-delete flag. Archived vectors are invisible to search and
    /// compression.
    #[serde(default)]
    pub archived: bool,

    /// When this vector was archived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,

    /// Who archived it (user ID or "system").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_by: Option<String>,

    /// When this vector was created.
    pub created_at: DateTime<Utc>,

    /// When this vector was last updated.
    pub updated_at: DateTime<Utc>,
}

impl MemoryVector {
    /// Create a new active vector with a fresh ID and current timestamps.
    pub fn new(
        plan_id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
        ref_type: RefType,
        ref_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            plan_id: plan_id.into(),
            embedding,
            content: content.into(),
            ref_type,
            ref_id,
            archived: false,
            archived_at: None,
            archived_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this vector is live (not archived).
    pub fn is_active(&self) -> bool {
        !self.archived
    }
}

/// A search hit: a vector plus its similarity to the query embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredVector {
    pub vector: MemoryVector,
    pub similarity: f32,
}

/// Which compression strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    /// Duplicate-only removal, no summarization.
    Light,
    /// Cluster, summarize, archive.
    Full,
}

impl std::fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionMode::Light => write!(f, "light"),
            CompressionMode::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for CompressionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(CompressionMode::Light),
            "full" => Ok(CompressionMode::Full),
            other => Err(Error::Validation(format!(
                "Invalid compression mode: '{other}' (expected 'light' or 'full')"
            ))),
        }
    }
}

/// The outcome of one compression run. Transient — reported, not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionResult {
    pub plan_id: String,
    pub mode: CompressionMode,
    pub before_count: usize,
    pub after_count: usize,
    /// `after / before`, 1.0 when nothing was compressed or the plan was empty.
    pub compression_ratio: f32,
    pub duplicates_removed: usize,
    pub clusters_merged: usize,
    pub embeddings_archived: usize,
    pub dry_run: bool,
    pub duration_ms: u64,
}

/// Read-only compression diagnostics for a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub plan_id: String,
    pub active: usize,
    pub archived: usize,
    /// Compression candidates after recency protection and the age cutoff.
    pub eligible: usize,
    /// Vectors excluded by the recency guard.
    pub protected: usize,
    pub duplicate_groups: usize,
    pub clusters: usize,
    /// Vectors a light run would archive.
    pub projected_light_removals: usize,
    /// Vectors a full run would archive.
    pub projected_full_archived: usize,
}

/// Per-plan memory counters shown in the plan context block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub active: usize,
    pub archived: usize,
    pub last_ratio: Option<f32>,
    pub last_mode: Option<CompressionMode>,
}
