pub mod agent;
pub mod indexer;
pub mod search;

use std::sync::Arc;

use crate::domain::{Embedder, ParagraphExtractor, VectorRepository};

pub use agent::{build_prompt, RagAgent, RetrievalSettings};
pub use indexer::{PdfIndexer, DEFAULT_BATCH_SIZE};
pub use search::QueryEngine;

/// Everything the server and CLI need once startup has finished.
///
/// `agent` is absent when no LLM endpoint is configured; indexing and search
/// still work without it.
pub struct RagServices {
    pub indexer: PdfIndexer,
    pub search: Arc<QueryEngine>,
    pub vector_db: Arc<dyn VectorRepository>,
    pub agent: Option<RagAgent>,
}

impl RagServices {
    pub fn new(
        extractor: Arc<dyn ParagraphExtractor>,
        embedder: Arc<dyn Embedder>,
        vector_db: Arc<dyn VectorRepository>,
        batch_size: usize,
    ) -> Self {
        Self {
            indexer: PdfIndexer::new(extractor, embedder.clone(), vector_db.clone(), batch_size),
            search: Arc::new(QueryEngine::new(embedder, vector_db.clone())),
            vector_db,
            agent: None,
        }
    }

    pub fn with_agent(mut self, agent: RagAgent) -> Self {
        self.agent = Some(agent);
        self
    }
}
