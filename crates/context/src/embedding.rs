//! Embedding context — semantic search hits for the current query.
//!
//! Embeds the query text, searches the plan's live vectors, and renders
//! the hits as one line each with a match percentage and source kind.
//! No query means no block. Over budget, each hit gets an equal share of
//! the allocation; if trimming the contents isn't enough, the hit count
//! itself is cut down proportionally.

use std::sync::Arc;

use tracing::debug;

use planmind_config::ContextConfig;
use planmind_core::error::Result;
use planmind_core::llm::Embedder;
use planmind_core::memory::ScoredVector;
use planmind_core::store::EmbeddingStore;

use crate::token::{ContextResult, estimate_tokens, trim_to_limit};

/// Heading for the embeddings block.
const HEADER: &str = "[Relevant memory]";

/// Builds the semantic-recall section of a prompt.
pub struct EmbeddingContextBuilder {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn EmbeddingStore>,
    config: ContextConfig,
}

impl EmbeddingContextBuilder {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn EmbeddingStore>,
        config: ContextConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Render the embeddings block for one query.
    ///
    /// Embedding failures propagate; the composer decides whether to
    /// degrade. An absent or empty query yields an empty result.
    pub async fn build(
        &self,
        plan_id: &str,
        query: Option<&str>,
        budget: Option<usize>,
    ) -> Result<ContextResult> {
        let query = match query {
            Some(q) if !q.trim().is_empty() => q,
            _ => return Ok(ContextResult::empty()),
        };

        let embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = match embeddings.first() {
            Some(e) => e,
            None => return Ok(ContextResult::empty()),
        };

        let hits = self
            .store
            .search(
                plan_id,
                query_embedding,
                self.config.top_k,
                self.config.min_similarity,
            )
            .await?;

        if hits.is_empty() {
            return Ok(ContextResult::empty());
        }

        debug!(plan_id = %plan_id, hits = hits.len(), "Semantic search complete");

        let full = render(&hits, None);
        match budget {
            Some(budget) if estimate_tokens(&full) > budget => Ok(shrink(&hits, budget)),
            _ => Ok(ContextResult::measured(full, false)),
        }
    }
}

/// Render the block, optionally capping each hit's content at a per-hit
/// token share.
fn render(hits: &[ScoredVector], per_hit_tokens: Option<usize>) -> String {
    let mut lines = vec![HEADER.to_string()];
    for hit in hits {
        let content = match per_hit_tokens {
            Some(share) => trim_to_limit(&hit.vector.content, share).0,
            None => hit.vector.content.clone(),
        };
        lines.push(format!(
            "- [{:.0}% match, {}] {}",
            hit.similarity * 100.0,
            hit.vector.ref_type,
            content
        ));
    }
    lines.join("\n")
}

/// Fit the block to the budget: split it evenly across hits and trim each
/// hit's content; if the rendered whole still overshoots (line framing,
/// match labels), cut the hit count proportionally and finally hard trim.
fn shrink(hits: &[ScoredVector], budget: usize) -> ContextResult {
    let share = (budget / hits.len()).max(1);
    let trimmed = render(hits, Some(share));
    let actual = estimate_tokens(&trimmed);
    if actual <= budget {
        return ContextResult::measured(trimmed, true);
    }

    let keep = ((hits.len() * budget) / actual).max(1);
    let reduced = render(&hits[..keep], Some(share));
    if estimate_tokens(&reduced) <= budget {
        return ContextResult::measured(reduced, true);
    }

    let (cut, _) = trim_to_limit(&reduced, budget);
    ContextResult::measured(cut, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use planmind_core::error::{EmbeddingError, StoreError};
    use planmind_core::memory::{MemoryVector, RefType};

    struct FixedEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if self.fail {
                return Err(EmbeddingError::Failed("provider down".into()));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct FixedSearch(Vec<ScoredVector>);

    #[async_trait]
    impl EmbeddingStore for FixedSearch {
        async fn find_eligible(
            &self,
            _plan_id: &str,
            _min_age_days: u32,
            _exclude_ids: &[String],
        ) -> Result<Vec<MemoryVector>, StoreError> {
            Ok(Vec::new())
        }

        async fn bulk_archive(&self, _ids: &[String], _actor: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn insert(&self, vector: MemoryVector) -> Result<MemoryVector, StoreError> {
            Ok(vector)
        }

        async fn count_active(&self, _plan_id: &str) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn count_archived(&self, _plan_id: &str) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn search(
            &self,
            _plan_id: &str,
            _embedding: &[f32],
            limit: usize,
            _min_similarity: f32,
        ) -> Result<Vec<ScoredVector>, StoreError> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    fn hit(id: &str, content: &str, similarity: f32) -> ScoredVector {
        let now = Utc::now();
        ScoredVector {
            vector: MemoryVector {
                id: id.into(),
                plan_id: "plan_1".into(),
                embedding: vec![1.0, 0.0],
                content: content.into(),
                ref_type: RefType::Message,
                ref_id: None,
                archived: false,
                archived_at: None,
                archived_by: None,
                created_at: now,
                updated_at: now,
            },
            similarity,
        }
    }

    fn builder(hits: Vec<ScoredVector>, embed_fails: bool) -> EmbeddingContextBuilder {
        EmbeddingContextBuilder::new(
            Arc::new(FixedEmbedder { fail: embed_fails }),
            Arc::new(FixedSearch(hits)),
            ContextConfig::default(),
        )
    }

    #[tokio::test]
    async fn no_query_yields_empty_block() {
        let b = builder(vec![hit("a", "something", 0.9)], false);
        assert!(b.build("plan_1", None, None).await.unwrap().is_empty());
        assert!(b.build("plan_1", Some("  "), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn renders_hits_with_match_percentages() {
        let b = builder(
            vec![
                hit("a", "prefers window seats", 0.91),
                hit("b", "allergic to shellfish", 0.84),
            ],
            false,
        );

        let result = b.build("plan_1", Some("seating"), None).await.unwrap();
        assert!(result.formatted.starts_with("[Relevant memory]\n"));
        assert!(result.formatted.contains("- [91% match, message] prefers window seats"));
        assert!(result.formatted.contains("- [84% match, message] allergic to shellfish"));
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn no_hits_yields_empty_block() {
        let b = builder(vec![], false);
        let result = b.build("plan_1", Some("anything"), None).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn embed_failure_propagates() {
        let b = builder(vec![hit("a", "x", 0.9)], true);
        assert!(b.build("plan_1", Some("query"), None).await.is_err());
    }

    #[tokio::test]
    async fn over_budget_trims_each_hit() {
        let b = builder(
            vec![
                hit("a", &"alpha ".repeat(100), 0.95),
                hit("b", &"beta ".repeat(100), 0.90),
            ],
            false,
        );

        let result = b.build("plan_1", Some("query"), Some(30)).await.unwrap();
        assert!(result.truncated);
        assert!(result.token_count <= 30);
        // Both hits still represented after content trimming.
        assert!(result.formatted.contains("95% match"));
    }

    #[tokio::test]
    async fn tiny_budget_drops_hits() {
        let hits: Vec<ScoredVector> = (0..5)
            .map(|i| hit(&format!("h{i}"), &"words here ".repeat(60), 0.9 - i as f32 * 0.02))
            .collect();
        let b = builder(hits, false);

        let result = b.build("plan_1", Some("query"), Some(12)).await.unwrap();
        assert!(result.truncated);
        assert!(result.token_count <= 12);
    }
}
