//! Okapi BM25 over store-provided term statistics.
//!
//! ```text
//! K(dl)  = k1 * (1 - b + b * dl / avgdl)
//! IDF(t) = ln((N - df_t + 0.5) / (df_t + 0.5))
//! score  = Σ IDF(t) * tf * (k1 + 1) / (tf + K(dl))
//! ```
//!
//! IDF is used unshifted, so a term present in more than half the corpus
//! contributes negatively. Documents without any query term never reach the
//! scorer; they are absent from the result rather than scored as zero.

use chunkdb_core::types::{Chunk, LexicalStats, TermMatch};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
	pub k1: f32,
	pub b: f32,
}

impl Default for Bm25Params {
	fn default() -> Self { Self { k1: 1.2, b: 0.75 } }
}

/// A document that matched at least one query term, with its raw BM25 score.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
	pub chunk: Chunk,
	pub score: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bm25Scorer {
	params: Bm25Params,
}

impl Bm25Scorer {
	pub fn new(params: Bm25Params) -> Self { Self { params } }

	pub fn idf(&self, total_docs: usize, doc_freq: usize) -> f32 {
		let n = total_docs as f32;
		let df = doc_freq as f32;
		((n - df + 0.5) / (df + 0.5)).ln()
	}

	pub fn score(&self, stats: &LexicalStats, doc: &TermMatch) -> f32 {
		let Bm25Params { k1, b } = self.params;
		let length_ratio = if stats.avg_doc_len > 0.0 { doc.doc_len as f32 / stats.avg_doc_len } else { 1.0 };
		let k = k1 * (1.0 - b + b * length_ratio);
		// Summed in query-term order so identical documents score bit-for-bit equal.
		stats
			.query_terms
			.iter()
			.filter_map(|term| doc.term_freqs.get(term).map(|&tf| (term, tf)))
			.filter(|&(_, tf)| tf > 0)
			.map(|(term, tf)| {
				let df = stats.doc_freqs.get(term).copied().unwrap_or(0);
				let tf = tf as f32;
				self.idf(stats.total_docs, df) * (tf * (k1 + 1.0)) / (tf + k)
			})
			.sum()
	}

	/// Top `limit` matches by descending score; ties keep store order.
	pub fn rank(&self, stats: LexicalStats, limit: usize) -> Vec<LexicalHit> {
		let mut hits: Vec<LexicalHit> = stats
			.matches
			.iter()
			.map(|m| LexicalHit { chunk: m.chunk.clone(), score: self.score(&stats, m) })
			.collect();
		hits.sort_by(|a, b| b.score.total_cmp(&a.score));
		hits.truncate(limit);
		debug!(matched = stats.matches.len(), returned = hits.len(), corpus = stats.total_docs, "bm25 ranked");
		hits
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Analyzer, DocTerms, LexicalStatsBuilder};
	use chrono::Utc;

	fn stats_for(corpus: &[&str], query: &str) -> LexicalStats {
		let analyzer = Analyzer::new();
		let mut builder = LexicalStatsBuilder::new(analyzer.query_terms(query));
		for (i, text) in corpus.iter().enumerate() {
			let chunk = Chunk { id: format!("d{i}"), content: text.to_string(), created_at: Utc::now(), metadata: Default::default() };
			builder.add(&DocTerms::from_text(&analyzer, text), &chunk);
		}
		builder.finish()
	}

	const CORPUS: [&str; 5] = ["rust rust memory", "python scripting", "rust systems", "java enterprise", "go concurrency"];

	#[test]
	fn matches_reference_formula() {
		let stats = stats_for(&CORPUS, "rust");
		let hits = Bm25Scorer::default().rank(stats, 10);
		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].chunk.id, "d0");
		// N=5, df=2, dl=3, avgdl=2.2
		assert!((hits[0].score - 0.41972).abs() < 1e-4, "score={}", hits[0].score);
	}

	#[test]
	fn idf_is_unshifted() {
		let scorer = Bm25Scorer::default();
		assert!((scorer.idf(5, 2) - 1.4f32.ln()).abs() < 1e-6);
		assert!(scorer.idf(5, 4) < 0.0);
	}

	#[test]
	fn non_matching_documents_are_excluded() {
		let stats = stats_for(&CORPUS, "python");
		let hits = Bm25Scorer::default().rank(stats, 10);
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].chunk.id, "d1");

		let none = Bm25Scorer::default().rank(stats_for(&CORPUS, "haskell"), 10);
		assert!(none.is_empty());
	}

	#[test]
	fn higher_term_frequency_never_lowers_score() {
		let scorer = Bm25Scorer::default();
		let stats = stats_for(&CORPUS, "rust");
		let mut doc = stats.matches[0].clone();
		let mut previous = scorer.score(&stats, &doc);
		for tf in 3..20 {
			doc.term_freqs.insert("rust".into(), tf);
			let current = scorer.score(&stats, &doc);
			assert!(current >= previous, "tf={tf}: {current} < {previous}");
			previous = current;
		}
	}

	#[test]
	fn rank_truncates_to_limit() {
		let stats = stats_for(&CORPUS, "rust python java");
		let hits = Bm25Scorer::default().rank(stats, 2);
		assert_eq!(hits.len(), 2);
		assert!(hits[0].score >= hits[1].score);
	}

	#[test]
	fn ties_keep_store_order() {
		let stats = stats_for(&["alpha beta", "alpha gamma", "delta", "epsilon", "zeta"], "alpha");
		let hits = Bm25Scorer::default().rank(stats, 10);
		let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
		assert_eq!(ids, vec!["d0", "d1"]);
	}

	#[test]
	fn identical_documents_tie_exactly_on_multi_term_queries() {
		let corpus = ["alpha beta gamma", "delta epsilon", "alpha beta gamma", "zeta eta", "theta iota", "kappa lambda"];
		let scorer = Bm25Scorer::default();
		for _ in 0..200 {
			let hits = scorer.rank(stats_for(&corpus, "gamma alpha beta"), 2);
			assert_eq!(hits[0].score.to_bits(), hits[1].score.to_bits());
			let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
			assert_eq!(ids, vec!["d0", "d2"]);
		}
	}
}
