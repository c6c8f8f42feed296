//! Vector similarity, duplicate grouping, and greedy clustering.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Single-pass duplicate grouping
//! - Greedy seed-and-grow clustering in a stable, deterministic order
//!
//! Clustering is deliberately greedy and order-dependent (by creation time
//! ascending) rather than a principled algorithm like K-means: at per-plan
//! scale (hundreds to low thousands of vectors) determinism and
//! explainability beat global optimality, and there are no hyperparameters
//! to search.

use planmind_core::memory::MemoryVector;
use tracing::warn;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal.
/// Returns 0.0 if either vector is empty or zero-length. Mismatched
/// dimensions are logged and scored 0.0 so they can never be grouped.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.len() != b.len() {
        warn!(a_dim = a.len(), b_dim = b.len(), "Dimension mismatch in cosine similarity");
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Indices sorted by creation time ascending, ID as tie-break.
fn creation_order(vectors: &[MemoryVector]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..vectors.len()).collect();
    order.sort_by(|&a, &b| {
        vectors[a]
            .created_at
            .cmp(&vectors[b].created_at)
            .then_with(|| vectors[a].id.cmp(&vectors[b].id))
    });
    order
}

/// Group near-duplicate vectors in a single pass.
///
/// For each unprocessed vector (in creation order), collect every other
/// unprocessed vector at or above `threshold`, mark the whole group
/// processed, and emit it. Groups of size 1 are not duplicates and are
/// dropped. Each returned group is in creation order, oldest first.
pub fn find_duplicate_groups(vectors: &[MemoryVector], threshold: f32) -> Vec<Vec<MemoryVector>> {
    let order = creation_order(vectors);
    let mut processed = vec![false; vectors.len()];
    let mut groups = Vec::new();

    for (pos, &i) in order.iter().enumerate() {
        if processed[i] {
            continue;
        }
        processed[i] = true;

        let mut group = vec![i];
        for &j in &order[pos + 1..] {
            if processed[j] {
                continue;
            }
            let sim = cosine_similarity(&vectors[i].embedding, &vectors[j].embedding);
            if sim >= threshold {
                processed[j] = true;
                group.push(j);
            }
        }

        if group.len() > 1 {
            groups.push(group.into_iter().map(|k| vectors[k].clone()).collect());
        }
    }

    groups
}

/// Greedy seed-and-grow clustering in creation order.
///
/// For each unassigned seed, gather unassigned neighbors at or above
/// `threshold`, sorted by descending similarity, truncated to
/// `max_size - 1`. The cluster is accepted only if it has at least
/// `min_size` members; otherwise all members stay unassigned and may join
/// a later seed. A vector similarly close to two seeds joins the
/// earlier-processed one.
pub fn find_clusters(
    vectors: &[MemoryVector],
    threshold: f32,
    min_size: usize,
    max_size: usize,
) -> Vec<Vec<MemoryVector>> {
    let order = creation_order(vectors);
    let mut assigned = vec![false; vectors.len()];
    let mut clusters = Vec::new();

    for &seed in &order {
        if assigned[seed] {
            continue;
        }

        let mut neighbors: Vec<(usize, f32)> = order
            .iter()
            .filter(|&&j| j != seed && !assigned[j])
            .map(|&j| {
                (
                    j,
                    cosine_similarity(&vectors[seed].embedding, &vectors[j].embedding),
                )
            })
            .filter(|&(_, sim)| sim >= threshold)
            .collect();

        // Stable sort: creation order breaks similarity ties.
        neighbors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(max_size.saturating_sub(1));

        if 1 + neighbors.len() < min_size {
            continue;
        }

        assigned[seed] = true;
        let mut cluster = vec![vectors[seed].clone()];
        for (j, _) in neighbors {
            assigned[j] = true;
            cluster.push(vectors[j].clone());
        }
        clusters.push(cluster);
    }

    clusters
}
