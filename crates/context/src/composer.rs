//! Context composition — fan out to the three builders, merge under one
//! global token budget.
//!
//! The three builders run concurrently; a failing builder contributes
//! nothing and is recorded as omitted, never aborting the composition.
//! When the combined result exceeds the budget, blocks are trimmed in
//! fixed priority: embeddings first (absorbing ~60% of the overflow, then
//! the remainder, toward a floor), then the plan block, then the
//! conversation block as a last resort. Every step re-measures and stops
//! early once under budget. When the budget sits below the sum of the
//! floors, the embeddings and plan floors yield entirely; only the
//! conversation floor can hold the total above the budget.
//!
//! Prompt order is fixed: plan, embeddings, conversation — the most
//! salient content sits closest to the live turn.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use planmind_config::ContextConfig;
use planmind_core::error::{Error, Result};

use crate::conversation::ConversationContextBuilder;
use crate::embedding::EmbeddingContextBuilder;
use crate::plan::PlanContextBuilder;
use crate::token::{
    BudgetOverrides, ContextResult, estimate_tokens, split_budget, trim_to_limit,
    trim_to_limit_keep_tail,
};

/// Which sources to include in the composition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IncludeFlags {
    pub conversation: bool,
    pub plan: bool,
    pub embeddings: bool,
}

impl Default for IncludeFlags {
    fn default() -> Self {
        Self {
            conversation: true,
            plan: true,
            embeddings: true,
        }
    }
}

/// One context composition request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub plan_id: String,

    /// Conversation to pull recent messages from. `None` skips the
    /// conversation block.
    #[serde(default)]
    pub conversation_id: Option<String>,

    /// Query text driving semantic recall. `None` skips the embeddings
    /// block.
    #[serde(default)]
    pub query: Option<String>,

    /// Total token budget; falls back to the configured default.
    #[serde(default)]
    pub max_tokens: Option<usize>,

    /// Per-source budget caps. A capped source is trimmed by its own
    /// builder before the global pass runs.
    #[serde(default)]
    pub overrides: BudgetOverrides,

    #[serde(default)]
    pub include: IncludeFlags,
}

/// Per-source token counts in the final prompt.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContextBreakdown {
    pub conversation: usize,
    pub plan: usize,
    pub embeddings: usize,
}

/// The assembled prompt plus accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalContext {
    pub prompt: String,
    pub total_tokens: usize,
    pub breakdown: ContextBreakdown,

    /// Whether any block was trimmed or dropped to fit.
    pub truncated: bool,

    /// Sources whose builder failed and contributed nothing.
    pub sections_omitted: Vec<String>,
}

/// Fans out to the per-source builders and merges their output.
pub struct ContextComposer {
    conversation: ConversationContextBuilder,
    plan: PlanContextBuilder,
    embedding: EmbeddingContextBuilder,
    config: ContextConfig,
}

impl ContextComposer {
    pub fn new(
        conversation: ConversationContextBuilder,
        plan: PlanContextBuilder,
        embedding: EmbeddingContextBuilder,
        config: ContextConfig,
    ) -> Self {
        Self {
            conversation,
            plan,
            embedding,
            config,
        }
    }

    /// Compose the final prompt for one turn.
    pub async fn compose(&self, request: &ComposeRequest) -> Result<FinalContext> {
        if request.plan_id.trim().is_empty() {
            return Err(Error::Validation("plan_id must not be empty".into()));
        }

        let budget = request.max_tokens.unwrap_or(self.config.default_budget);
        let caps = split_budget(budget, &request.overrides);

        // Explicit overrides cap a source at its own builder; otherwise
        // sources build unbounded and the global pass below enforces fit.
        let conversation_cap = request.overrides.messages.map(|_| caps.messages);
        let plan_cap = request.overrides.plan.map(|_| caps.plan);
        let embeddings_cap = request.overrides.embeddings.map(|_| caps.embeddings);

        let (conversation, plan, embeddings) = tokio::join!(
            async {
                match (&request.conversation_id, request.include.conversation) {
                    (Some(id), true) => self.conversation.build(id, conversation_cap).await,
                    _ => Ok(ContextResult::empty()),
                }
            },
            async {
                if request.include.plan {
                    self.plan.build(&request.plan_id, plan_cap).await
                } else {
                    Ok(ContextResult::empty())
                }
            },
            async {
                if request.include.embeddings {
                    self.embedding
                        .build(&request.plan_id, request.query.as_deref(), embeddings_cap)
                        .await
                } else {
                    Ok(ContextResult::empty())
                }
            },
        );

        let mut omitted = Vec::new();
        let mut conversation = recover(conversation, "conversation", &mut omitted);
        let mut plan = recover(plan, "plan", &mut omitted);
        let mut embeddings = recover(embeddings, "embeddings", &mut omitted);

        let mut trimmed = self.fit(&mut conversation, &mut plan, &mut embeddings, budget);
        trimmed |= conversation.truncated || plan.truncated || embeddings.truncated;

        // Fixed order: plan, embeddings, conversation.
        let prompt = [&plan, &embeddings, &conversation]
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| r.formatted.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let breakdown = ContextBreakdown {
            conversation: conversation.token_count,
            plan: plan.token_count,
            embeddings: embeddings.token_count,
        };
        let total_tokens = breakdown.conversation + breakdown.plan + breakdown.embeddings;

        info!(
            plan_id = %request.plan_id,
            total_tokens,
            truncated = trimmed,
            omitted = omitted.len(),
            "Context composed"
        );

        Ok(FinalContext {
            prompt,
            total_tokens,
            breakdown,
            truncated: trimmed,
            sections_omitted: omitted,
        })
    }

    /// Global budget pass. Returns whether anything was trimmed.
    fn fit(
        &self,
        conversation: &mut ContextResult,
        plan: &mut ContextResult,
        embeddings: &mut ContextResult,
        budget: usize,
    ) -> bool {
        let total = |c: &ContextResult, p: &ContextResult, e: &ContextResult| {
            c.token_count + p.token_count + e.token_count
        };

        let mut overflow = total(conversation, plan, embeddings).saturating_sub(budget);
        if overflow == 0 {
            return false;
        }

        // 1a. Embeddings absorb ~60% of the overflow first.
        let target = embeddings
            .token_count
            .saturating_sub(overflow * 3 / 5)
            .max(self.config.embeddings_floor);
        trim_block(embeddings, target);
        overflow = total(conversation, plan, embeddings).saturating_sub(budget);
        if overflow == 0 {
            return true;
        }

        // 1b. Embeddings again, toward the floor, for the remainder.
        let target = embeddings
            .token_count
            .saturating_sub(overflow)
            .max(self.config.embeddings_floor);
        trim_block(embeddings, target);
        overflow = total(conversation, plan, embeddings).saturating_sub(budget);
        if overflow == 0 {
            return true;
        }

        // 2. Plan block toward its floor.
        let target = plan
            .token_count
            .saturating_sub(overflow)
            .max(self.config.plan_floor);
        trim_block(plan, target);
        overflow = total(conversation, plan, embeddings).saturating_sub(budget);
        if overflow == 0 {
            return true;
        }

        // 3. Conversation last, keeping the newest content.
        let target = conversation
            .token_count
            .saturating_sub(overflow)
            .max(self.config.conversation_floor);
        trim_conversation_block(conversation, target);
        overflow = total(conversation, plan, embeddings).saturating_sub(budget);
        if overflow == 0 {
            return true;
        }

        // 4. Floor-level trimming wasn't enough: the embeddings and plan
        // floors yield (down to nothing) so only the conversation floor can
        // hold the total above the budget.
        let target = embeddings.token_count.saturating_sub(overflow);
        trim_block(embeddings, target);
        overflow = total(conversation, plan, embeddings).saturating_sub(budget);
        if overflow == 0 {
            return true;
        }

        let target = plan.token_count.saturating_sub(overflow);
        trim_block(plan, target);
        true
    }
}

/// A failed builder contributes nothing; the failure is logged and the
/// section recorded as omitted.
fn recover(
    result: Result<ContextResult>,
    section: &str,
    omitted: &mut Vec<String>,
) -> ContextResult {
    match result {
        Ok(r) => r,
        Err(e) => {
            warn!(section = %section, error = %e, "Context builder failed, omitting section");
            omitted.push(section.to_string());
            ContextResult::empty()
        }
    }
}

/// Head-preserving trim for the plan and embeddings blocks. A zero target
/// drops the block entirely rather than leaving a bare ellipsis marker.
fn trim_block(block: &mut ContextResult, target: usize) {
    if block.token_count <= target {
        return;
    }
    if target == 0 {
        *block = ContextResult {
            truncated: true,
            ..ContextResult::empty()
        };
        return;
    }
    let (cut, _) = trim_to_limit(&block.formatted, target);
    *block = ContextResult::measured(cut, true);
}

/// Tail-preserving trim for the conversation block: the header line stays,
/// the oldest body content goes.
fn trim_conversation_block(block: &mut ContextResult, target: usize) {
    if block.token_count <= target {
        return;
    }
    match block.formatted.split_once('\n') {
        Some((header, body)) => {
            let body_budget = target.saturating_sub(estimate_tokens(header) + 1);
            let (cut, _) = trim_to_limit_keep_tail(body, body_budget);
            *block = ContextResult::measured(format!("{header}\n{cut}"), true);
        }
        None => {
            let (cut, _) = trim_to_limit_keep_tail(&block.formatted, target);
            *block = ContextResult::measured(cut, true);
        }
    }
}
