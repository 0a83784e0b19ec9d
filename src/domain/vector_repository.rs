use async_trait::async_trait;

use crate::domain::paragraph::{PointToUpsert, SearchHit};
use crate::error::RagResult;

/// Text to vector conversion. Implementations must return one vector per input,
/// in input order, each of length [`Embedder::dimension`].
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Creates the collection if it is absent. Never drops existing points.
    async fn ensure_collection(&self) -> RagResult<()>;

    /// Writes the points with freshly generated ids. Existing points are never
    /// replaced, so writing the same paragraph twice stores it twice.
    async fn upsert_points(&self, points: &[PointToUpsert]) -> RagResult<()>;

    /// Nearest neighbours of `query_vector` among points whose `docid` equals
    /// `docid` exactly, highest similarity first.
    async fn search(&self, query_vector: Vec<f32>, docid: &str, limit: usize) -> RagResult<Vec<SearchHit>>;

    /// Number of points stored under `docid`.
    async fn count_points(&self, docid: &str) -> RagResult<u64>;
}
