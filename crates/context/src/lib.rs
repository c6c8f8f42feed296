//! Token-budgeted context composition for Planmind.
//!
//! Assembles the prompt for one conversational turn from three sources,
//! each with local trimming, merged under one global budget:
//! - [`conversation`] — recent messages, long ones summarized.
//! - [`plan`] — plan title, metadata, recent jobs, memory counters.
//! - [`embedding`] — semantic recall driven by the turn's query text.
//! - [`composer`] — concurrent fan-out and priority-ordered trimming.
//! - [`token`] — the shared estimation and trimming primitives.

pub mod composer;
pub mod conversation;
pub mod embedding;
pub mod plan;
pub mod token;

pub use composer::{
    ComposeRequest, ContextBreakdown, ContextComposer, FinalContext, IncludeFlags,
};
pub use conversation::ConversationContextBuilder;
pub use embedding::EmbeddingContextBuilder;
pub use plan::PlanContextBuilder;
pub use token::{
    BudgetOverrides, ContextBudget, ContextResult, estimate_tokens, split_budget,
    trim_list_to_limit, trim_list_to_limit_keep_tail, trim_to_limit, trim_to_limit_keep_tail,
};
