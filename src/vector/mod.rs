//! Vector storage: the `VectorStore` interface, an in-memory fallback, and
//! an optional `sqlite-vec`-backed persistent implementation.

mod memory;
#[cfg(feature = "embeddings")]
mod sqlite_vec;
mod traits;

pub use memory::{cosine_similarity, InMemoryVectorStore};
#[cfg(feature = "embeddings")]
pub use sqlite_vec::SqliteVecStore;
pub use traits::{clamp_k, SimilarityHit, VectorError, VectorResult, VectorStore, MAX_K};
