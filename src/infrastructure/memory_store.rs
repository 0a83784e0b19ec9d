use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{PointToUpsert, SearchHit, VectorRepository};
use crate::error::{RagError, RagResult};

/// Process-local [`VectorRepository`] with exact cosine scoring.
///
/// Behaves like a Qdrant collection configured with cosine distance: points are
/// append-only, search is filtered on `docid` before ranking.
pub struct InMemoryVectorRepository {
    vector_size: usize,
    points: Mutex<Vec<(Uuid, PointToUpsert)>>,
}

impl InMemoryVectorRepository {
    pub fn new(vector_size: usize) -> Self {
        Self {
            vector_size,
            points: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> RagResult<std::sync::MutexGuard<'_, Vec<(Uuid, PointToUpsert)>>> {
        self.points
            .lock()
            .map_err(|_| RagError::VectorStore("in-memory store lock poisoned".to_string()))
    }

    fn check_dimension(&self, len: usize) -> RagResult<()> {
        if len != self.vector_size {
            return Err(RagError::VectorStore(format!(
                "vector dimension ({}) does not match collection dimension ({})",
                len, self.vector_size
            )));
        }
        Ok(())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorRepository for InMemoryVectorRepository {
    async fn ensure_collection(&self) -> RagResult<()> {
        Ok(())
    }

    async fn upsert_points(&self, points: &[PointToUpsert]) -> RagResult<()> {
        for point in points {
            self.check_dimension(point.vector.len())?;
        }
        let mut stored = self.lock()?;
        stored.extend(points.iter().cloned().map(|p| (Uuid::new_v4(), p)));
        Ok(())
    }

    async fn search(&self, query_vector: Vec<f32>, docid: &str, limit: usize) -> RagResult<Vec<SearchHit>> {
        self.check_dimension(query_vector.len())?;
        let stored = self.lock()?;
        let mut hits: Vec<SearchHit> = stored
            .iter()
            .filter(|(_, p)| p.payload.docid == docid)
            .map(|(_, p)| SearchHit {
                text: p.payload.text.clone(),
                page_number: p.payload.page_number,
                line_number: p.payload.line_number,
                score: cosine_similarity(&query_vector, &p.vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count_points(&self, docid: &str) -> RagResult<u64> {
        let stored = self.lock()?;
        Ok(stored.iter().filter(|(_, p)| p.payload.docid == docid).count() as u64)
    }
}
