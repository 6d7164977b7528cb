//! Deterministic bag-of-words embedder that never leaves the process.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chunkdb_core::traits::Embedder;
use chunkdb_core::types::Vector;
use chunkdb_core::Result;
use twox_hash::XxHash64;

use crate::normalize::l2_normalize;

pub const HASHING_MODEL_ID: &str = "hashing-xxh64";

/// Feature-hashes lowercased words into `dim` buckets and L2-normalizes.
///
/// Texts sharing words land close together under cosine distance, which is
/// enough to exercise the full pipeline without a network provider.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_sync(&self, text: &str) -> Vector {
        let mut v = vec![0f32; self.dim];
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);
        for word in words {
            let mut hasher = XxHash64::with_seed(0);
            word.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str { HASHING_MODEL_ID }

    fn dim(&self) -> usize { self.dim }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vector>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}
