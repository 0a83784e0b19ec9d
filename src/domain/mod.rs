pub mod agent;
pub mod paragraph;
pub mod vector_repository;

pub use agent::{
    AgentResponse, AnswerDraft, AnswerGenerator, DecomposedQuery, ParagraphExtractor, ParagraphSearch,
    QueryDecomposer, RetrievalOutcome, NO_ANSWER_RESPONSE,
};
pub use paragraph::{docid_from_path, IndexReport, ParagraphPayload, ParagraphRecord, PointToUpsert, SearchHit};
pub use vector_repository::{Embedder, VectorRepository};
