//! Compression scheduling — periodic sweeps and manual triggers.
//!
//! The scheduler only *selects* plans and submits background jobs; it never
//! runs compression itself. Two independent selection policies:
//! - light sweep: plans whose live vector count exceeds the archive
//!   threshold.
//! - full sweep: plans with no recent activity that still hold live
//!   vectors. Full submissions carry higher queue priority than light.
//!
//! One failed submission never aborts a sweep.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use planmind_core::error::{Error, Result};
use planmind_core::jobs::{JobPriority, JobRunner};
use planmind_core::memory::CompressionMode;
use planmind_core::sources::PlanSource;
use planmind_config::SchedulerConfig;

/// Job type submitted for every matched plan.
pub const COMPRESSION_JOB_TYPE: &str = "memory_compression";

/// Selects plans needing compression and submits one job per match.
#[derive(Clone)]
pub struct CompressionScheduler {
    plans: Arc<dyn PlanSource>,
    jobs: Arc<dyn JobRunner>,
    config: SchedulerConfig,
}

impl CompressionScheduler {
    pub fn new(
        plans: Arc<dyn PlanSource>,
        jobs: Arc<dyn JobRunner>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            plans,
            jobs,
            config,
        }
    }

    /// Submit a light compression job for every plan whose live vector
    /// count exceeds the archive threshold. Returns how many jobs were
    /// submitted.
    pub async fn light_sweep(&self) -> usize {
        let snapshot = match self.plans.activity_snapshot().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Activity snapshot failed, skipping light sweep");
                return 0;
            }
        };

        let mut submitted = 0;
        for row in snapshot {
            if row.active_vectors <= self.config.archive_threshold {
                continue;
            }
            if self
                .submit(&row.plan_id, &row.owner_id, CompressionMode::Light)
                .await
            {
                submitted += 1;
            }
        }

        if submitted > 0 {
            info!(submitted, "Light sweep submitted compression jobs");
        }
        submitted
    }

    /// Submit a full compression job for every inactive plan that still
    /// holds live vectors. Returns how many jobs were submitted.
    pub async fn full_sweep(&self) -> usize {
        let snapshot = match self.plans.activity_snapshot().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Activity snapshot failed, skipping full sweep");
                return 0;
            }
        };

        let cutoff = Utc::now() - Duration::days(self.config.inactivity_days as i64);
        let mut submitted = 0;
        for row in snapshot {
            if row.active_vectors == 0 || row.last_activity_at >= cutoff {
                continue;
            }
            if self
                .submit(&row.plan_id, &row.owner_id, CompressionMode::Full)
                .await
            {
                submitted += 1;
            }
        }

        if submitted > 0 {
            info!(submitted, "Full sweep submitted compression jobs");
        }
        submitted
    }

    /// Manually queue a compression job for one plan. The plan must
    /// resolve; mode defaults to light.
    pub async fn trigger(
        &self,
        plan_id: &str,
        mode: Option<CompressionMode>,
        user_id: Option<&str>,
    ) -> Result<String> {
        let plan = self
            .plans
            .get(plan_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Plan {plan_id}")))?;

        let mode = mode.unwrap_or(CompressionMode::Light);
        let user = user_id.unwrap_or(&plan.owner_id);
        let job_id = self
            .jobs
            .submit(
                plan_id,
                user,
                COMPRESSION_JOB_TYPE,
                serde_json::json!({ "mode": mode }),
                priority_for(mode),
            )
            .await?;

        info!(plan_id = %plan_id, mode = %mode, job_id = %job_id, "Manual compression trigger");
        Ok(job_id)
    }

    /// Start the background sweep loop. Runs both sweeps every tick and
    /// returns the join handle; drop or abort it to stop.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        let interval_secs = u64::from(self.config.sweep_interval_minutes) * 60;

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));

            loop {
                interval.tick().await;
                if !scheduler.config.enabled {
                    debug!("Scheduler disabled, skipping sweep tick");
                    continue;
                }
                let light = scheduler.light_sweep().await;
                let full = scheduler.full_sweep().await;
                debug!(light, full, "Sweep tick complete");
            }
        })
    }

    /// Submit one job, logging and swallowing failures so the sweep
    /// continues with the next plan.
    async fn submit(&self, plan_id: &str, owner_id: &str, mode: CompressionMode) -> bool {
        match self
            .jobs
            .submit(
                plan_id,
                owner_id,
                COMPRESSION_JOB_TYPE,
                serde_json::json!({ "mode": mode }),
                priority_for(mode),
            )
            .await
        {
            Ok(job_id) => {
                debug!(plan_id = %plan_id, mode = %mode, job_id = %job_id, "Compression job submitted");
                true
            }
            Err(e) => {
                warn!(plan_id = %plan_id, mode = %mode, error = %e, "Compression job submission failed, continuing");
                false
            }
        }
    }
}

/// Full runs reclaim more and target idle plans, so they queue ahead of
/// light ones.
fn priority_for(mode: CompressionMode) -> JobPriority {
    match mode {
        CompressionMode::Light => JobPriority::Normal,
        CompressionMode::Full => JobPriority::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mode_outranks_light() {
        assert!(priority_for(CompressionMode::Full) > priority_for(CompressionMode::Light));
    }
}
