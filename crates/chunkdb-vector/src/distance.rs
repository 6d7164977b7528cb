//! Distance functions under the "smaller is closer" convention.

use chunkdb_core::types::DistanceMetric;
use chunkdb_core::{Error, Result};

pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> Result<f32> {
	if a.len() != b.len() {
		return Err(Error::Validation(format!("vector dimension mismatch: {} vs {}", a.len(), b.len())));
	}
	Ok(match metric {
		DistanceMetric::Cosine => cosine_distance(a, b),
		DistanceMetric::Euclidean => euclidean_distance(a, b),
		DistanceMetric::InnerProduct => -dot(a, b),
	})
}

fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

/// `1 - cos(a, b)`; a zero vector is treated as orthogonal to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let na = dot(a, a).sqrt();
	let nb = dot(b, b).sqrt();
	if na == 0.0 || nb == 0.0 { return 1.0; }
	1.0 - dot(a, b) / (na * nb)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}
