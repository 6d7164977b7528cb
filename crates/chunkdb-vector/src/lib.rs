//! Corpus stores and the vector scorer.
//!
//! [`MemoryStore`] keeps everything in process; [`LanceStore`] persists chunks
//! in a LanceDB table laid out by a [`chunkdb_core::config::TableConfig`].

pub mod distance;
pub mod lance;
pub mod memory;
pub mod schema;
pub mod search;
pub mod table;

pub use lance::LanceStore;
pub use memory::MemoryStore;
pub use search::{VectorHit, VectorScorer};
