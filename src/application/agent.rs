use std::sync::Arc;

use crate::config::{AgentConfig, DecompositionSeed};
use crate::domain::{AgentResponse, AnswerDraft, AnswerGenerator, QueryDecomposer, RetrievalOutcome};
use crate::error::RagResult;

/// Loop bounds and defaults for [`RagAgent::retrieve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalSettings {
    /// Total number of decompose/answer attempts; at least one is always made.
    pub max_retries: u32,
    pub top_k: usize,
    pub seed: DecompositionSeed,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            top_k: 5,
            seed: DecompositionSeed::Original,
        }
    }
}

impl From<&AgentConfig> for RetrievalSettings {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            top_k: cfg.top_k,
            seed: cfg.decomposition_seed,
        }
    }
}

/// Instruction handed to the answer stage for one attempt.
pub fn build_prompt(pdf_name: &str, query: &str, top_k: usize) -> String {
    format!(
        "Retrieve the most relevant paragraphs from the PDF document '{}' based on the query: '{}' \
         for the top {} paragraphs.\n\
         Use only those paragraphs to answer the query, and give enough context for the answer to stand on its own.",
        pdf_name, query, top_k
    )
}

/// Rewrites the question, answers it against one document, and retries while
/// the answer stage asks for it.
pub struct RagAgent {
    decomposer: Arc<dyn QueryDecomposer>,
    answerer: Arc<dyn AnswerGenerator>,
    settings: RetrievalSettings,
}

impl std::fmt::Debug for RagAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagAgent")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RagAgent {
    pub fn new(
        decomposer: Arc<dyn QueryDecomposer>,
        answerer: Arc<dyn AnswerGenerator>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            decomposer,
            answerer,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub async fn retrieve(
        &self,
        query_text: &str,
        pdf_name: &str,
        top_k: Option<usize>,
    ) -> RagResult<RetrievalOutcome> {
        let top_k = top_k.unwrap_or(self.settings.top_k);
        let max_attempts = self.settings.max_retries.max(1);
        let mut seed = query_text.to_string();
        let mut attempt = 0;

        let (rewritten, draft): (String, AnswerDraft) = loop {
            attempt += 1;
            log::info!("Attempt {}/{} for query: {}", attempt, max_attempts, seed);

            let decomposed = self.decomposer.decompose(&seed).await?;
            log::info!(
                "Decomposed query (confidence {:.2}): {}",
                decomposed.confidence,
                decomposed.query
            );

            let prompt = build_prompt(pdf_name, &decomposed.query, top_k);
            let draft = self.answerer.answer(&prompt, pdf_name).await?;
            log::debug!("Answer draft: {:?}", draft);

            if !draft.retry {
                break (decomposed.query, draft);
            }
            if attempt >= max_attempts {
                log::warn!("Giving up on '{}' after {} attempts.", query_text, attempt);
                break (decomposed.query, draft);
            }
            if self.settings.seed == DecompositionSeed::Previous {
                seed = decomposed.query;
            }
        };

        if draft.response.is_empty() {
            log::info!("No answer found in '{}' for: {}", pdf_name, query_text);
            return Ok(RetrievalOutcome::NoAnswer(AgentResponse::no_answer(query_text)));
        }

        Ok(RetrievalOutcome::Answered(AgentResponse {
            query: rewritten,
            response: draft.response,
            confidence: draft.confidence,
            retry: draft.retry,
        }))
    }

    /// Like [`retrieve`](Self::retrieve), but every failure collapses into the
    /// fixed "no information" response. The error is still logged.
    pub async fn retrieve_or_sentinel(&self, query_text: &str, pdf_name: &str, top_k: Option<usize>) -> AgentResponse {
        match self.retrieve(query_text, pdf_name, top_k).await {
            Ok(outcome) => outcome.into_response(),
            Err(e) => {
                log::error!("Retrieval over '{}' failed: {}", pdf_name, e);
                AgentResponse::no_answer(query_text)
            }
        }
    }
}
