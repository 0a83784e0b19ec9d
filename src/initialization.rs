use std::sync::{Arc, Mutex};

use crate::application::{RagAgent, RagServices, RetrievalSettings};
use crate::config::{AgentConfig, RagConfig};
use crate::domain::{Embedder, ParagraphSearch, VectorRepository};
use crate::error::{RagError, RagResult};
use crate::infrastructure::docker::ensure_qdrant_via_docker;
use crate::infrastructure::{
    ChatTransport, EmbeddingGenerator, HttpChatTransport, LlmAnswerGenerator, LlmQueryDecomposer,
    PdfParagraphExtractor, VectorDb,
};

/// Shared slot the server reads from; `None` until background startup finishes.
pub type ServiceState = Arc<Mutex<Option<Arc<RagServices>>>>;

/// Wires the LLM stages for the configured provider.
pub fn build_agent(cfg: &AgentConfig, search: Arc<dyn ParagraphSearch>) -> RagResult<RagAgent> {
    let transport: Arc<dyn ChatTransport> = Arc::new(HttpChatTransport::new(cfg)?);
    let decomposer = LlmQueryDecomposer::new(transport.clone(), cfg.temperature);
    let answerer = LlmAnswerGenerator::new(transport, search, cfg.temperature, cfg.tool_call_limit);
    Ok(RagAgent::new(
        Arc::new(decomposer),
        Arc::new(answerer),
        RetrievalSettings::from(cfg),
    ))
}

/// Connects to Qdrant, loads the embedding model and assembles the services.
pub async fn build_services(config: &RagConfig) -> RagResult<RagServices> {
    let store = &config.vector_store;
    if store.ensure_docker {
        if let Err(e) = ensure_qdrant_via_docker().await {
            log::error!("Qdrant check/start failed: {}", e);
        }
    }

    let vector_db = VectorDb::from_url(&store.url, store.collection.clone(), store.vector_size)?;
    vector_db.ensure_collection().await?;
    let vector_db: Arc<dyn VectorRepository> = Arc::new(vector_db);

    let cache_dir = config.embedding.cache_dir.clone();
    let embedder = tokio::task::spawn_blocking(move || EmbeddingGenerator::minilm(cache_dir))
        .await
        .map_err(|e| RagError::Embedding(format!("model loading task failed: {}", e)))??;
    if embedder.dimension() as u64 != store.vector_size {
        return Err(RagError::Config(format!(
            "embedding model produces {} dimensions but vector_store.vector_size is {}",
            embedder.dimension(),
            store.vector_size
        )));
    }
    let embedder: Arc<dyn Embedder> = Arc::new(embedder);

    let services = RagServices::new(
        Arc::new(PdfParagraphExtractor::new()),
        embedder,
        vector_db,
        config.indexer.batch_size,
    );

    match build_agent(&config.agent, services.search.clone()) {
        Ok(agent) => Ok(services.with_agent(agent)),
        Err(e) => {
            log::warn!("Question answering disabled: {}", e);
            Ok(services)
        }
    }
}

/// Performs all the heavy initialization in the background.
pub async fn initialize_background_services(config: Arc<RagConfig>, service_state: ServiceState) -> RagResult<()> {
    let services = build_services(&config).await?;

    let mut state = service_state
        .lock()
        .map_err(|_| RagError::Config("service state lock poisoned".to_string()))?;
    *state = Some(Arc::new(services));
    log::info!("PDF services are now initialized and available.");
    Ok(())
}
