use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::paragraph::{ParagraphRecord, SearchHit};
use crate::error::RagResult;

/// Returned when no attempt produced a usable answer.
pub const NO_ANSWER_RESPONSE: &str = "Sorry I could not find any relevant information.";

/// Output of the decomposition stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecomposedQuery {
    pub query: String,
    pub confidence: f32,
}

/// Structured output of the answer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerDraft {
    pub response: String,
    pub confidence: f32,
    pub retry: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub query: String,
    pub response: String,
    pub confidence: f32,
    pub retry: bool,
}

impl AgentResponse {
    pub fn no_answer(query: &str) -> Self {
        Self {
            query: query.to_string(),
            response: NO_ANSWER_RESPONSE.to_string(),
            confidence: 0.0,
            retry: false,
        }
    }
}

/// Result of a retrieval run that reached the end of the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    Answered(AgentResponse),
    /// The final attempt produced an empty response; carries the fixed fallback.
    NoAnswer(AgentResponse),
}

impl RetrievalOutcome {
    pub fn into_response(self) -> AgentResponse {
        match self {
            RetrievalOutcome::Answered(r) | RetrievalOutcome::NoAnswer(r) => r,
        }
    }
}

pub trait ParagraphExtractor: Send + Sync {
    /// Paragraphs in reading order. An empty vector means the document has no
    /// text; unreadable documents are errors.
    fn extract(&self, path: &Path) -> RagResult<Vec<ParagraphRecord>>;
}

/// Similarity search scoped to one document; exposed to the answer stage as a tool.
#[async_trait]
pub trait ParagraphSearch: Send + Sync {
    async fn search_paragraphs(&self, query_text: &str, docid: &str, top_k: usize) -> RagResult<Vec<SearchHit>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryDecomposer: Send + Sync {
    async fn decompose(&self, query: &str) -> RagResult<DecomposedQuery>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Any paragraph search made while answering is scoped to `docid`.
    async fn answer(&self, prompt: &str, docid: &str) -> RagResult<AnswerDraft>;
}
