//! Plan context — title, metadata, recent jobs, and memory counters.
//!
//! The plan itself is required; jobs and memory stats are best-effort and
//! degrade to omission. Trimming re-renders the block in stages of
//! decreasing value (drop stats, halve the job list, drop metadata) and
//! only hard-cuts the text as a last resort.

use std::sync::Arc;

use tracing::{debug, warn};

use planmind_config::ContextConfig;
use planmind_core::error::{Error, Result};
use planmind_core::memory::MemoryStats;
use planmind_core::plan::{JobSummary, Plan};
use planmind_core::sources::{JobsSource, PlanSource};
use planmind_core::store::EmbeddingStore;

use crate::token::{ContextResult, estimate_tokens, trim_to_limit};

/// Builds the plan section of a prompt.
pub struct PlanContextBuilder {
    plans: Arc<dyn PlanSource>,
    jobs: Arc<dyn JobsSource>,
    store: Arc<dyn EmbeddingStore>,
    config: ContextConfig,
}

impl PlanContextBuilder {
    pub fn new(
        plans: Arc<dyn PlanSource>,
        jobs: Arc<dyn JobsSource>,
        store: Arc<dyn EmbeddingStore>,
        config: ContextConfig,
    ) -> Self {
        Self {
            plans,
            jobs,
            store,
            config,
        }
    }

    /// Render the plan block.
    ///
    /// Fails if the plan cannot be resolved. Job history and memory
    /// counters that fail to load are logged and left out.
    pub async fn build(&self, plan_id: &str, budget: Option<usize>) -> Result<ContextResult> {
        let plan = self
            .plans
            .get(plan_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Plan {plan_id}")))?;

        let jobs = match self.jobs.recent_completed(plan_id, self.config.recent_jobs).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(plan_id = %plan_id, error = %e, "Job history unavailable, omitting from plan block");
                Vec::new()
            }
        };

        let stats = match self.memory_stats(&plan).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(plan_id = %plan_id, error = %e, "Memory counters unavailable, omitting from plan block");
                None
            }
        };

        let full = render(&plan, &jobs, stats.as_ref(), true);
        let result = match budget {
            Some(budget) if estimate_tokens(&full) > budget => {
                self.shrink(&plan, &jobs, budget)
            }
            _ => ContextResult::measured(full, false),
        };

        debug!(
            plan_id = %plan_id,
            tokens = result.token_count,
            truncated = result.truncated,
            "Plan block built"
        );
        Ok(result)
    }

    async fn memory_stats(&self, plan: &Plan) -> Result<MemoryStats> {
        let active = self.store.count_active(&plan.id).await?;
        let archived = self.store.count_archived(&plan.id).await?;
        Ok(MemoryStats {
            active,
            archived,
            last_ratio: plan.last_compression.as_ref().map(|c| c.ratio),
            last_mode: plan.last_compression.as_ref().map(|c| c.mode),
        })
    }

    /// Re-render with progressively less content until the block fits,
    /// measuring after every stage. Stage order: drop stats, halve the
    /// job list, drop metadata, hard trim.
    fn shrink(&self, plan: &Plan, jobs: &[JobSummary], budget: usize) -> ContextResult {
        let without_stats = render(plan, jobs, None, true);
        if estimate_tokens(&without_stats) <= budget {
            return ContextResult::measured(without_stats, true);
        }

        let halved = &jobs[..jobs.len() / 2];
        let fewer_jobs = render(plan, halved, None, true);
        if estimate_tokens(&fewer_jobs) <= budget {
            return ContextResult::measured(fewer_jobs, true);
        }

        let bare = render(plan, halved, None, false);
        if estimate_tokens(&bare) <= budget {
            return ContextResult::measured(bare, true);
        }

        let (cut, _) = trim_to_limit(&bare, budget);
        ContextResult::measured(cut, true)
    }
}

/// Render the block: header, title, metadata lines, job one-liners, and
/// the memory counter line.
fn render(
    plan: &Plan,
    jobs: &[JobSummary],
    stats: Option<&MemoryStats>,
    include_metadata: bool,
) -> String {
    let mut lines = vec!["[Plan]".to_string(), format!("Title: {}", plan.title)];

    if include_metadata {
        for (key, value) in &plan.metadata {
            lines.push(format!("{key}: {}", render_value(value)));
        }
    }

    if !jobs.is_empty() {
        lines.push("Recent jobs:".to_string());
        for job in jobs {
            match &job.outcome {
                Some(outcome) => lines.push(format!("- {}: {}", job.title, outcome)),
                None => lines.push(format!("- {}", job.title)),
            }
        }
    }

    if let Some(stats) = stats {
        let mut line = format!(
            "Memory: {} active, {} archived",
            stats.active, stats.archived
        );
        if let (Some(mode), Some(ratio)) = (stats.last_mode, stats.last_ratio) {
            line.push_str(&format!(
                " (last compression: {mode}, ratio {ratio:.2})"
            ));
        }
        lines.push(line);
    }

    lines.join("\n")
}

/// Metadata values render inline: strings without quotes, everything else
/// as compact JSON.
fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
