//! Min-max normalization and linear score fusion.
//!
//! Both sides are normalized over their own returned set only, so scores are
//! relative to one query and not comparable across queries.

use std::collections::HashMap;

use chunkdb_core::types::{FusionWeights, ScoredResult};
use chunkdb_text::LexicalHit;
use chunkdb_vector::VectorHit;

/// Rescale into `[0, 1]` by the set's own range; a flat set maps to all ones.
pub fn min_max(values: &[f32]) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    values
        .iter()
        .map(|v| if range > 0.0 && range.is_finite() { (v - min) / range } else { 1.0 })
        .collect()
}

/// Vector hits projected with their raw distance and `vector_score = 1 - norm(distance)`.
pub fn vector_results(hits: Vec<VectorHit>) -> Vec<ScoredResult> {
    let distances: Vec<f32> = hits.iter().map(|h| h.distance).collect();
    hits.into_iter()
        .zip(min_max(&distances))
        .map(|(hit, norm)| {
            let mut r = ScoredResult::new(hit.chunk);
            r.distance = Some(hit.distance);
            r.vector_score = Some(1.0 - norm);
            r
        })
        .collect()
}

pub fn bm25_results(hits: Vec<LexicalHit>) -> Vec<ScoredResult> {
    let raw: Vec<f32> = hits.iter().map(|h| h.score).collect();
    hits.into_iter()
        .zip(min_max(&raw))
        .map(|(hit, norm)| {
            let mut r = ScoredResult::new(hit.chunk);
            r.bm25_raw = Some(hit.score);
            r.bm25_score = Some(norm);
            r
        })
        .collect()
}

/// Merge both ranked lists by chunk id and order by weighted sum.
///
/// An empty side short-circuits: the other side is returned as ranked, with
/// only the score fields it produced itself. Otherwise a chunk missing from
/// one side scores 0 there. Ties keep first-seen order, vector side first.
pub fn fuse(vector: Vec<ScoredResult>, bm25: Vec<ScoredResult>, weights: FusionWeights, limit: usize) -> Vec<ScoredResult> {
    if bm25.is_empty() {
        return vector.into_iter().take(limit).collect();
    }
    if vector.is_empty() {
        return bm25.into_iter().take(limit).collect();
    }

    let mut merged: Vec<ScoredResult> = Vec::with_capacity(vector.len() + bm25.len());
    let mut position: HashMap<String, usize> = HashMap::new();
    for r in vector {
        position.insert(r.chunk.id.clone(), merged.len());
        merged.push(r);
    }
    for r in bm25 {
        match position.get(&r.chunk.id) {
            Some(&i) => {
                merged[i].bm25_raw = r.bm25_raw;
                merged[i].bm25_score = r.bm25_score;
            }
            None => {
                position.insert(r.chunk.id.clone(), merged.len());
                merged.push(r);
            }
        }
    }

    for r in &mut merged {
        let v = *r.vector_score.get_or_insert(0.0);
        let b = *r.bm25_score.get_or_insert(0.0);
        r.combined_score = Some(v * weights.vector + b * weights.bm25);
    }
    merged.sort_by(|a, b| b.combined_score.unwrap_or(0.0).total_cmp(&a.combined_score.unwrap_or(0.0)));
    merged.truncate(limit);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chunkdb_core::types::Chunk;

    fn chunk(id: &str) -> Chunk { Chunk { id: id.into(), content: id.into(), created_at: Utc::now(), metadata: Default::default() } }

    fn vhits(items: &[(&str, f32)]) -> Vec<ScoredResult> {
        vector_results(items.iter().map(|(id, d)| VectorHit { chunk: chunk(id), distance: *d }).collect())
    }

    fn bhits(items: &[(&str, f32)]) -> Vec<ScoredResult> {
        bm25_results(items.iter().map(|(id, s)| LexicalHit { chunk: chunk(id), score: *s }).collect())
    }

    #[test]
    fn min_max_handles_flat_and_spread_sets() {
        assert_eq!(min_max(&[]), Vec::<f32>::new());
        assert_eq!(min_max(&[3.0, 3.0]), vec![1.0, 1.0]);
        assert_eq!(min_max(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(min_max(&[-1.0, 1.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn vector_scores_are_bounded_and_closest_is_one() {
        let results = vhits(&[("a", 0.12), ("b", 0.40), ("c", 0.95), ("d", 0.40)]);
        for r in &results {
            let s = r.vector_score.unwrap();
            assert!((0.0..=1.0).contains(&s));
        }
        assert_eq!(results[0].vector_score, Some(1.0));
        assert_eq!(results[2].vector_score, Some(0.0));
        assert_eq!(results[0].distance, Some(0.12));
        assert!(results.iter().all(|r| r.bm25_score.is_none() && r.combined_score.is_none()));
    }

    #[test]
    fn single_vector_hit_scores_one() {
        assert_eq!(vhits(&[("only", 0.7)])[0].vector_score, Some(1.0));
    }

    #[test]
    fn empty_bm25_side_returns_vector_side_verbatim() {
        let vector = vhits(&[("a", 0.1), ("b", 0.2), ("c", 0.3)]);
        let fused = fuse(vector.clone(), Vec::new(), FusionWeights::default(), 2);
        assert_eq!(fused, vector[..2].to_vec());
        assert!(fused.iter().all(|r| r.bm25_score.is_none() && r.combined_score.is_none()));
    }

    #[test]
    fn empty_vector_side_returns_bm25_side_verbatim() {
        let bm25 = bhits(&[("x", 2.0), ("y", 1.0)]);
        let fused = fuse(Vec::new(), bm25.clone(), FusionWeights::default(), 5);
        assert_eq!(fused, bm25);
    }

    #[test]
    fn one_sided_documents_get_zero_on_the_other_side() {
        let fused = fuse(vhits(&[("a", 0.1), ("b", 0.5)]), bhits(&[("b", 3.0), ("z", 1.0)]), FusionWeights::new(0.7, 0.3), 10);
        let by_id = |id: &str| fused.iter().find(|r| r.id() == id).unwrap().clone();
        assert_eq!(fused.len(), 3);

        let a = by_id("a");
        assert_eq!((a.vector_score, a.bm25_score), (Some(1.0), Some(0.0)));
        assert!((a.combined_score.unwrap() - 0.7).abs() < 1e-6);

        let b = by_id("b");
        assert_eq!((b.vector_score, b.bm25_score), (Some(0.0), Some(1.0)));
        assert_eq!(b.distance, Some(0.5));
        assert_eq!(b.bm25_raw, Some(3.0));

        let z = by_id("z");
        assert_eq!((z.vector_score, z.bm25_score, z.distance), (Some(0.0), Some(0.0), None));
        assert!(fused.windows(2).all(|w| w[0].combined_score >= w[1].combined_score));
    }

    #[test]
    fn weights_are_not_renormalized() {
        let fused = fuse(vhits(&[("a", 0.1)]), bhits(&[("a", 1.0)]), FusionWeights::new(2.0, 1.0), 1);
        assert_eq!(fused[0].combined_score, Some(3.0));
    }

    #[test]
    fn better_vector_score_wins_on_equal_bm25() {
        for wv in [0.01f32, 0.5, 0.7, 3.0] {
            let fused = fuse(
                vhits(&[("b", 0.3), ("a", 0.1), ("c", 0.9)]),
                bhits(&[("a", 2.0), ("b", 2.0), ("c", 1.0)]),
                FusionWeights::new(wv, 0.3),
                3,
            );
            let pos = |id: &str| fused.iter().position(|r| r.id() == id).unwrap();
            let (a, b) = (&fused[pos("a")], &fused[pos("b")]);
            assert_eq!(a.bm25_score, b.bm25_score);
            assert!(a.vector_score > b.vector_score);
            assert!(a.combined_score > b.combined_score, "wv={wv}");
        }
    }

    #[test]
    fn ties_keep_merge_order() {
        let fused = fuse(vhits(&[("a", 0.5), ("b", 0.5)]), bhits(&[("b", 1.0), ("a", 1.0)]), FusionWeights::default(), 2);
        let ids: Vec<&str> = fused.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
