use chrono::Utc;
use chunkdb_core::types::{keys, Chunk, ChunkingMethod, Metadata, Provenance, ScoredResult};
use chunkdb_core::Chunker;

const SAMPLES: [&str; 4] = [
    "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs.",
    "  leading and trailing  \n\n\n\nmiddle paragraph\n\nlast one.  ",
    "no delimiters at all",
    "a.b.c\n\nd.e",
];

#[test]
fn sentence_and_paragraph_chunks_cover_the_text() {
    let chunker = Chunker::default();
    for text in SAMPLES {
        for (method, delimiter) in [(ChunkingMethod::Sentence, "."), (ChunkingMethod::Paragraph, "\n\n")] {
            let chunks = chunker.chunk(text, method);
            assert!(chunks.iter().all(|c| !c.is_empty() && c.trim() == c), "{method}: {chunks:?}");
            let rebuilt: String = chunks.concat();
            let original: String = text.trim().split(delimiter).map(str::trim).collect();
            assert_eq!(rebuilt, original, "{method} lost text from {text:?}");
        }
    }
}

#[test]
fn fixed_chunks_stay_within_budget_unless_single_word() {
    let text = SAMPLES.join(" ").repeat(5) + " pneumonoultramicroscopicsilicovolcanoconiosis";
    for size in [1, 5, 12, 40, 500] {
        for chunk in Chunker::new(size).chunk(&text, ChunkingMethod::Fixed) {
            assert!(chunk.chars().count() <= size || !chunk.contains(' '), "size {size}: {chunk:?}");
        }
    }
}

#[test]
fn chunk_serializes_with_camel_case_keys() {
    let provenance = Provenance {
        chunk_index: 0,
        total_chunks: 1,
        chunking_method: ChunkingMethod::Fixed,
        embedding_model: "text-embedding-3-small".into(),
        created_at: Utc::now(),
    };
    let chunk = Chunk::new("abc:0", "Sphinx of black quartz", &provenance, &Metadata::new()).unwrap();
    let mut result = ScoredResult::new(chunk);
    result.vector_score = Some(1.0);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["id"], "abc:0");
    assert_eq!(json["vectorScore"], 1.0);
    assert!(json.get("createdAt").is_some());
    assert!(json.get("bm25Score").is_none());
    assert_eq!(json["metadata"][keys::CHUNKING_METHOD], "fixed");
    assert_eq!(json["metadata"][keys::TOTAL_CHUNKS], 1.0);
}
