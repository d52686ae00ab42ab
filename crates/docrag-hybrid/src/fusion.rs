//! Weighted fusion of keyword and vector rankings.
//!
//! Both engines report lower-is-better raw scores on unrelated scales. Each
//! side is min-max normalized to [0, 1] with 1.0 as best, then the two are
//! combined as a weighted sum over the union of candidates.

use std::cmp::Ordering;
use std::collections::HashMap;

use docrag_core::types::{ChunkId, ScoreTable, SearchResult};
use docrag_core::{Error, Result};

use crate::store::DualIndexStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub keyword: f32,
    pub vector: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { keyword: 0.5, vector: 0.5 }
    }
}

/// Normalized component scores of one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedScore {
    pub id: ChunkId,
    pub lexical: f32,
    pub vector: f32,
    pub combined: f32,
}

/// Rank-form BM25 (negative, lower is better) to [0, 1], best = 1.0.
pub fn normalize_lexical(raw: &ScoreTable) -> HashMap<ChunkId, f32> {
    let Some((min, max)) = raw.bounds() else { return HashMap::new() };
    let span = max - min;
    raw.iter()
        .map(|(id, s)| (id, if span > 0.0 { (max - s) / span } else { 1.0 }))
        .collect()
}

/// Cosine distance in [0, 2] to similarity `1 - d/2`, then min-max to [0, 1].
pub fn normalize_vector(raw: &ScoreTable) -> HashMap<ChunkId, f32> {
    let sims: Vec<(ChunkId, f32)> = raw.iter().map(|(id, d)| (id, 1.0 - d / 2.0)).collect();
    let Some((min, max)) = sims.iter().fold(None, |acc: Option<(f32, f32)>, &(_, s)| match acc {
        None => Some((s, s)),
        Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
    }) else {
        return HashMap::new();
    };
    let span = max - min;
    sims.into_iter()
        .map(|(id, s)| (id, if span > 0.0 { (s - min) / span } else { 1.0 }))
        .collect()
}

/// Combine both candidate sets and keep the best `top_k`.
///
/// An id seen by only one engine scores 0.0 on the other side. Ties on the
/// combined score go to the lower (earlier inserted) id.
pub fn fuse(lexical: &ScoreTable, vector: &ScoreTable, weights: FusionWeights, top_k: usize) -> Vec<FusedScore> {
    let lex = normalize_lexical(lexical);
    let vec = normalize_vector(vector);

    let mut fused: Vec<FusedScore> = lexical
        .ids()
        .chain(vector.ids().filter(|id| !lexical.contains(*id)))
        .map(|id| {
            let l = lex.get(&id).copied().unwrap_or(0.0);
            let v = vec.get(&id).copied().unwrap_or(0.0);
            FusedScore { id, lexical: l, vector: v, combined: weights.keyword * l + weights.vector * v }
        })
        .collect();
    fused.sort_by(compare_fused);
    fused.truncate(top_k);
    fused
}

fn compare_fused(a: &FusedScore, b: &FusedScore) -> Ordering {
    b.combined.total_cmp(&a.combined).then(a.id.cmp(&b.id))
}

/// Run both searches over `candidate_limit` candidates, fuse them, and attach
/// stored content to the top `top_k`.
pub fn rank(
    store: &DualIndexStore,
    query: &str,
    query_vector: &[f32],
    weights: FusionWeights,
    candidate_limit: usize,
    top_k: usize,
) -> Result<Vec<SearchResult>> {
    let lexical = store.search_lexical(query, candidate_limit)?;
    let vector = store.search_vector(query_vector, candidate_limit)?;
    let fused = fuse(&lexical, &vector, weights, top_k);
    tracing::debug!(lexical = lexical.len(), vector = vector.len(), kept = fused.len(), "fused candidates");
    if fused.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<ChunkId> = fused.iter().map(|f| f.id).collect();
    let mut records = store.get_metadata(&ids)?;
    fused
        .into_iter()
        .map(|f| {
            let record = records
                .remove(&f.id)
                .ok_or_else(|| Error::Consistency(format!("chunk {} is indexed but has no metadata row", f.id)))?;
            Ok(SearchResult {
                id: f.id,
                content: record.content,
                source_type: record.source_type,
                source_id: record.source_id,
                metadata: record.metadata,
                lexical_score: f.lexical,
                vector_score: f.vector,
                combined_score: f.combined,
            })
        })
        .collect()
}
