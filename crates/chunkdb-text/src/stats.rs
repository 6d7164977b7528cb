//! Per-query term statistics collected over a corpus scan.

use std::collections::HashMap;

use chunkdb_core::types::{Chunk, LexicalStats, TermMatch};

use crate::analyzer::Analyzer;

/// Token count and term frequencies of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocTerms {
	pub len: usize,
	pub freqs: HashMap<String, usize>,
}

impl DocTerms {
	pub fn from_text(analyzer: &Analyzer, text: &str) -> Self {
		let tokens = analyzer.tokenize(text);
		let mut freqs = HashMap::new();
		for token in &tokens { *freqs.entry(token.clone()).or_insert(0) += 1; }
		Self { len: tokens.len(), freqs }
	}
}

/// Accumulates corpus-wide aggregates for one query while a store walks its rows.
///
/// Every document must be fed exactly once so `N`, `avgdl` and `df` describe
/// the whole corpus; only documents containing a query term are kept as matches.
pub struct LexicalStatsBuilder {
	query_terms: Vec<String>,
	total_docs: usize,
	total_len: usize,
	doc_freqs: HashMap<String, usize>,
	matches: Vec<TermMatch>,
}

impl LexicalStatsBuilder {
	pub fn new(query_terms: Vec<String>) -> Self {
		Self { query_terms, total_docs: 0, total_len: 0, doc_freqs: HashMap::new(), matches: Vec::new() }
	}

	pub fn add(&mut self, doc: &DocTerms, chunk: &Chunk) {
		self.total_docs += 1;
		self.total_len += doc.len;
		let mut term_freqs = HashMap::new();
		for term in &self.query_terms {
			if let Some(&tf) = doc.freqs.get(term) {
				*self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
				term_freqs.insert(term.clone(), tf);
			}
		}
		if !term_freqs.is_empty() {
			self.matches.push(TermMatch { chunk: chunk.clone(), doc_len: doc.len, term_freqs });
		}
	}

	pub fn finish(self) -> LexicalStats {
		let avg_doc_len = if self.total_docs == 0 { 0.0 } else { self.total_len as f32 / self.total_docs as f32 };
		LexicalStats {
			total_docs: self.total_docs,
			avg_doc_len,
			query_terms: self.query_terms,
			doc_freqs: self.doc_freqs,
			matches: self.matches,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	fn chunk(id: &str, content: &str) -> Chunk {
		Chunk { id: id.into(), content: content.into(), created_at: Utc::now(), metadata: Default::default() }
	}

	#[test]
	fn collects_corpus_aggregates() {
		let analyzer = Analyzer::new();
		let docs = [chunk("a", "quick quick fox"), chunk("b", "lazy dog"), chunk("c", "quick zebras jump")];
		let mut builder = LexicalStatsBuilder::new(analyzer.query_terms("quick jump"));
		for d in &docs { builder.add(&DocTerms::from_text(&analyzer, &d.content), d); }
		let stats = builder.finish();

		assert_eq!(stats.total_docs, 3);
		assert!((stats.avg_doc_len - 8.0 / 3.0).abs() < 1e-6);
		assert_eq!(stats.doc_freqs["quick"], 2);
		assert_eq!(stats.doc_freqs["jump"], 1);
		let ids: Vec<&str> = stats.matches.iter().map(|m| m.chunk.id.as_str()).collect();
		assert_eq!(ids, vec!["a", "c"]);
		assert_eq!(stats.matches[0].term_freqs["quick"], 2);
		assert_eq!(stats.matches[0].doc_len, 3);
	}

	#[test]
	fn empty_corpus_has_zero_average() {
		let stats = LexicalStatsBuilder::new(vec!["x".into()]).finish();
		assert_eq!(stats.total_docs, 0);
		assert_eq!(stats.avg_doc_len, 0.0);
		assert!(stats.matches.is_empty());
	}
}
