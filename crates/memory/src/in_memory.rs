//! In-memory embedding store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use planmind_core::error::StoreError;
use planmind_core::memory::{MemoryVector, ScoredVector};
use planmind_core::store::EmbeddingStore;

use crate::compressor::age_cutoff;
use crate::similarity::cosine_similarity;

/// An embedding store that keeps vectors in a Vec.
/// Useful for tests and sessions where persistence isn't needed.
pub struct InMemoryStore {
    vectors: Arc<RwLock<Vec<MemoryVector>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            vectors: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed the store with pre-built vectors (test setup).
    pub async fn seed(&self, vectors: Vec<MemoryVector>) {
        self.vectors.write().await.extend(vectors);
    }

    /// Snapshot of every row, archived included (test assertions).
    pub async fn all(&self) -> Vec<MemoryVector> {
        self.vectors.read().await.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingStore for InMemoryStore {
    async fn find_eligible(
        &self,
        plan_id: &str,
        min_age_days: u32,
        exclude_ids: &[String],
    ) -> Result<Vec<MemoryVector>, StoreError> {
        let cutoff = age_cutoff(min_age_days);
        let vectors = self.vectors.read().await;
        Ok(vectors
            .iter()
            .filter(|v| {
                v.plan_id == plan_id
                    && v.is_active()
                    && v.created_at <= cutoff
                    && !exclude_ids.contains(&v.id)
            })
            .cloned()
            .collect())
    }

    async fn bulk_archive(&self, ids: &[String], actor: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut vectors = self.vectors.write().await;
        for v in vectors.iter_mut() {
            if ids.contains(&v.id) {
                v.archived = true;
                v.archived_at = Some(now);
                v.archived_by = Some(actor.to_string());
                v.updated_at = now;
            }
        }
        Ok(())
    }

    async fn insert(&self, mut vector: MemoryVector) -> Result<MemoryVector, StoreError> {
        if vector.id.is_empty() {
            vector.id = Uuid::new_v4().to_string();
        }
        self.vectors.write().await.push(vector.clone());
        Ok(vector)
    }

    async fn count_active(&self, plan_id: &str) -> Result<usize, StoreError> {
        let vectors = self.vectors.read().await;
        Ok(vectors
            .iter()
            .filter(|v| v.plan_id == plan_id && v.is_active())
            .count())
    }

    async fn count_archived(&self, plan_id: &str) -> Result<usize, StoreError> {
        let vectors = self.vectors.read().await;
        Ok(vectors
            .iter()
            .filter(|v| v.plan_id == plan_id && v.archived)
            .count())
    }

    async fn search(
        &self,
        plan_id: &str,
        embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredVector>, StoreError> {
        let vectors = self.vectors.read().await;
        let mut hits: Vec<ScoredVector> = vectors
            .iter()
            .filter(|v| v.plan_id == plan_id && v.is_active())
            .map(|v| ScoredVector {
                similarity: cosine_similarity(&v.embedding, embedding),
                vector: v.clone(),
            })
            .filter(|hit| hit.similarity >= min_similarity)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use planmind_core::memory::RefType;

    fn vector(id: &str, plan: &str, embedding: Vec<f32>, age_days: i64) -> MemoryVector {
        let at = Utc::now() - Duration::days(age_days);
        MemoryVector {
            id: id.into(),
            plan_id: plan.into(),
            embedding,
            content: format!("Content for {id}"),
            ref_type: RefType::Message,
            ref_id: None,
            archived: false,
            archived_at: None,
            archived_by: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn find_eligible_filters_age_and_exclusions() {
        let store = InMemoryStore::new();
        store
            .seed(vec![
                vector("old", "p1", vec![1.0], 30),
                vector("young", "p1", vec![1.0], 1),
                vector("excluded", "p1", vec![1.0], 30),
                vector("other_plan", "p2", vec![1.0], 30),
            ])
            .await;

        let eligible = store
            .find_eligible("p1", 7, &["excluded".to_string()])
            .await
            .unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, "old");
    }

    #[tokio::test]
    async fn archive_excludes_from_search_and_counts() {
        let store = InMemoryStore::new();
        store
            .seed(vec![
                vector("a", "p1", vec![1.0, 0.0], 10),
                vector("b", "p1", vec![1.0, 0.0], 10),
            ])
            .await;

        store.bulk_archive(&["a".to_string()], "tester").await.unwrap();

        assert_eq!(store.count_active("p1").await.unwrap(), 1);
        assert_eq!(store.count_archived("p1").await.unwrap(), 1);

        let hits = store.search("p1", &[1.0, 0.0], 10, 0.5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].vector.id, "b");

        let archived = store
            .all()
            .await
            .into_iter()
            .find(|v| v.id == "a")
            .unwrap();
        assert_eq!(archived.archived_by.as_deref(), Some("tester"));
        assert!(archived.archived_at.is_some());
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let store = InMemoryStore::new();
        store
            .seed(vec![
                vector("orthogonal", "p1", vec![0.0, 1.0], 10),
                vector("exact", "p1", vec![1.0, 0.0], 10),
                vector("close", "p1", vec![0.9, 0.1], 10),
            ])
            .await;

        let hits = store.search("p1", &[1.0, 0.0], 10, 0.5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].vector.id, "exact");
        assert_eq!(hits[1].vector.id, "close");
    }

    #[tokio::test]
    async fn insert_assigns_id_when_missing() {
        let store = InMemoryStore::new();
        let mut v = vector("", "p1", vec![1.0], 0);
        v.id = String::new();
        let stored = store.insert(v).await.unwrap();
        assert!(!stored.id.is_empty());
    }
}
