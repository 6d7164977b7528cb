//! Vector scorer: nearest neighbours for a query embedding.

use chunkdb_core::traits::CorpusStore;
use chunkdb_core::types::{Chunk, DistanceMetric, MetadataFilter};
use chunkdb_core::Result;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
	pub chunk: Chunk,
	pub distance: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct VectorScorer {
	metric: DistanceMetric,
}

impl VectorScorer {
	pub fn new(metric: DistanceMetric) -> Self { Self { metric } }

	pub fn metric(&self) -> DistanceMetric { self.metric }

	/// At most `limit` hits ascending by distance; equal distances keep store order.
	pub async fn nearest(
		&self,
		store: &dyn CorpusStore,
		query: &[f32],
		limit: usize,
		filter: Option<&MetadataFilter>,
	) -> Result<Vec<VectorHit>> {
		let mut hits: Vec<VectorHit> = store
			.vector_query(query, self.metric, limit, filter)
			.await?
			.into_iter()
			.map(|(chunk, distance)| VectorHit { chunk, distance })
			.collect();
		hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		hits.truncate(limit);
		debug!(metric = %self.metric, returned = hits.len(), "vector scored");
		Ok(hits)
	}
}
