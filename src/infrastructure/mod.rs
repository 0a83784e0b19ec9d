pub mod docker;
pub mod embedding;
pub mod llm;
pub mod memory_store;
pub mod pdf;
pub mod vector_db;

// Re-export key types for easier access from the application layer
pub use embedding::EmbeddingGenerator;
pub use llm::{ChatTransport, HttpChatTransport, LlmAnswerGenerator, LlmQueryDecomposer};
pub use memory_store::InMemoryVectorRepository;
pub use pdf::PdfParagraphExtractor;
pub use vector_db::VectorDb;
