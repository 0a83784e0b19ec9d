pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod initialization;
pub mod server;

/// Re-export necessary items for the binaries and tests
pub use application::{PdfIndexer, QueryEngine, RagAgent, RagServices, RetrievalSettings};
pub use config::{load_config, RagConfig};
pub use domain::{
    AgentResponse, Embedder, ParagraphRecord, ParagraphSearch, RetrievalOutcome, SearchHit, VectorRepository,
    NO_ANSWER_RESPONSE,
};
pub use error::{RagError, RagResult};
pub use infrastructure::vector_db::{qdrant_client, VectorDb};
pub use infrastructure::{EmbeddingGenerator, InMemoryVectorRepository, PdfParagraphExtractor};
