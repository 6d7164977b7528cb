use anyhow::Result;
use chunkdb_core::types::{Chunk, ScoredResult};

fn score(label: &str, value: Option<f32>) -> Option<String> { value.map(|v| format!("{label}={v:.4}")) }

pub fn print_results(query: &str, results: &[ScoredResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results for \"{query}\"");
        return Ok(());
    }
    for (rank, r) in results.iter().enumerate() {
        let scores: Vec<String> = [
            score("combined", r.combined_score),
            score("vector", r.vector_score),
            score("distance", r.distance),
            score("bm25", r.bm25_score),
            score("bm25_raw", r.bm25_raw),
        ]
        .into_iter()
        .flatten()
        .collect();
        println!("{:>2}. [{}] {}", rank + 1, scores.join(" "), r.id());
        println!("    {}", r.content());
    }
    Ok(())
}

pub fn print_rows(rows: &[Chunk], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }
    for row in rows {
        println!("{}  {}  {}", row.id, row.created_at.to_rfc3339(), row.content);
    }
    Ok(())
}

pub fn print_chunks(chunks: &[String], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(chunks)?);
        return Ok(());
    }
    for (i, chunk) in chunks.iter().enumerate() {
        println!("[{i}] {chunk}");
    }
    Ok(())
}
