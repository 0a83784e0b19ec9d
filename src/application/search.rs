use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{Embedder, ParagraphSearch, SearchHit, VectorRepository};
use crate::error::{RagError, RagResult};

/// Embeds a query and asks the vector store for the closest paragraphs of one document.
pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    vector_db: Arc<dyn VectorRepository>,
}

impl QueryEngine {
    pub fn new(embedder: Arc<dyn Embedder>, vector_db: Arc<dyn VectorRepository>) -> Self {
        Self { embedder, vector_db }
    }

    async fn search_inner(&self, query_text: &str, docid: &str, top_k: usize) -> RagResult<Vec<SearchHit>> {
        let query_vector = self
            .embedder
            .embed(&[query_text])?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("no vector produced for query".to_string()))?;
        self.vector_db.search(query_vector, docid, top_k).await
    }
}

#[async_trait]
impl ParagraphSearch for QueryEngine {
    /// At most `top_k` hits whose docid equals `docid` exactly, highest score first.
    async fn search_paragraphs(&self, query_text: &str, docid: &str, top_k: usize) -> RagResult<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        log::debug!("Searching '{}' for: {}", docid, query_text);
        match self.search_inner(query_text, docid, top_k).await {
            Ok(hits) => {
                log::info!("Found {} paragraphs in '{}'.", hits.len(), docid);
                Ok(hits)
            }
            Err(e) => {
                log::error!("Search in '{}' failed: {}", docid, e);
                Err(RagError::Search {
                    docid: docid.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }
}
