use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

pub const ANALYZER_NAME: &str = "text_with_stopwords";

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

/// Lowercasing, stop-word-removing tokenizer shared by documents and queries.
///
/// Document length for BM25 is the number of tokens this produces, so the
/// same analyzer must be used on both sides of a lexical query.
#[derive(Clone)]
pub struct Analyzer {
	inner: TextAnalyzer,
}

impl Default for Analyzer {
	fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for Analyzer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(ANALYZER_NAME) }
}

impl Analyzer {
	pub fn new() -> Self {
		let inner = TextAnalyzer::builder(SimpleTokenizer::default())
			.filter(LowerCaser)
			.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
			.build();
		Self { inner }
	}

	/// Register the pipeline on a tantivy index under [`ANALYZER_NAME`].
	pub fn register(&self, index: &tantivy::Index) {
		index.tokenizers().register(ANALYZER_NAME, self.inner.clone());
	}

	pub fn tokenize(&self, text: &str) -> Vec<String> {
		let mut analyzer = self.inner.clone();
		let mut stream = analyzer.token_stream(text);
		let mut tokens = Vec::new();
		while stream.advance() { tokens.push(stream.token().text.clone()); }
		tokens
	}

	/// Distinct query terms in first-seen order.
	pub fn query_terms(&self, query: &str) -> Vec<String> {
		let mut terms: Vec<String> = Vec::new();
		for token in self.tokenize(query) {
			if !terms.contains(&token) { terms.push(token); }
		}
		terms
	}
}
