mod common;

use async_trait::async_trait;
use pdf_rag::application::{PdfIndexer, QueryEngine, RagAgent, RetrievalSettings};
use pdf_rag::config::DecompositionSeed;
use pdf_rag::domain::{AnswerDraft, AnswerGenerator, DecomposedQuery, QueryDecomposer};
use pdf_rag::{
    AgentResponse, InMemoryVectorRepository, ParagraphSearch, PdfParagraphExtractor, RagResult, RetrievalOutcome,
    VectorRepository,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use common::{write_pdf, VocabularyEmbedder, VOCABULARY};

struct Pipeline {
    _dir: TempDir,
    dir: PathBuf,
    repo: Arc<InMemoryVectorRepository>,
    indexer: PdfIndexer,
    search: Arc<QueryEngine>,
}

fn pipeline() -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_path_buf();
    let repo = Arc::new(InMemoryVectorRepository::new(VOCABULARY.len()));
    let embedder = Arc::new(VocabularyEmbedder);
    Pipeline {
        _dir: dir,
        dir: path,
        repo: repo.clone(),
        indexer: PdfIndexer::new(Arc::new(PdfParagraphExtractor::new()), embedder.clone(), repo.clone(), 40),
        search: Arc::new(QueryEngine::new(embedder, repo)),
    }
}

impl Pipeline {
    fn loan_pdf(&self) -> PathBuf {
        let path = self.dir.join("loan.pdf");
        write_pdf(
            &path,
            &[&[("Loan amount is $10,000", 700)], &[("Interest rate is 5%", 700)]],
        );
        path
    }

    fn lease_pdf(&self) -> PathBuf {
        let path = self.dir.join("lease.pdf");
        write_pdf(
            &path,
            &[&[("Monthly rent is $1,200", 720), ("Late rent incurs a penalty", 500)]],
        );
        path
    }
}

#[tokio::test]
async fn interest_question_finds_page_two() -> RagResult<()> {
    let p = pipeline();
    let report = p.indexer.index_pdf(&p.loan_pdf()).await?;
    assert_eq!(report.docid, "loan");
    assert_eq!(report.points, 2);

    let hits = p.search.search_paragraphs("interest rate", "loan", 1).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "Interest rate is 5%");
    assert_eq!(hits[0].page_number, 2);
    assert_eq!(hits[0].line_number, 1);
    Ok(())
}

#[tokio::test]
async fn search_never_crosses_documents() -> RagResult<()> {
    let p = pipeline();
    p.indexer.index_pdf(&p.loan_pdf()).await?;
    p.indexer.index_pdf(&p.lease_pdf()).await?;

    let hits = p.search.search_paragraphs("loan interest rate", "lease", 10).await?;
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.text.contains("rent")));

    let hits = p.search.search_paragraphs("rent penalty", "loan", 10).await?;
    assert!(hits.iter().all(|h| !h.text.contains("rent")));
    Ok(())
}

#[tokio::test]
async fn reindexing_adds_a_second_copy() -> RagResult<()> {
    let p = pipeline();
    let path = p.loan_pdf();
    p.indexer.index_pdf(&path).await?;
    p.indexer.index_pdf(&path).await?;

    assert_eq!(p.repo.count_points("loan").await?, 4);
    let hits = p.search.search_paragraphs("interest rate", "loan", 2).await?;
    assert_eq!(hits[0].text, hits[1].text);
    Ok(())
}

/// Passes the question through and counts calls.
#[derive(Default)]
struct EchoDecomposer {
    calls: AtomicUsize,
}

#[async_trait]
impl QueryDecomposer for EchoDecomposer {
    async fn decompose(&self, query: &str) -> RagResult<DecomposedQuery> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DecomposedQuery {
            query: query.to_string(),
            confidence: 1.0,
        })
    }
}

/// Answers with the best paragraph of the document, asking for a retry when nothing matches.
struct TopHitAnswerer {
    search: Arc<dyn ParagraphSearch>,
}

#[async_trait]
impl AnswerGenerator for TopHitAnswerer {
    async fn answer(&self, prompt: &str, docid: &str) -> RagResult<AnswerDraft> {
        let hits = self.search.search_paragraphs(prompt, docid, 1).await?;
        Ok(match hits.into_iter().find(|h| h.score > 0.0) {
            Some(hit) => AnswerDraft {
                response: hit.text,
                confidence: hit.score,
                retry: false,
            },
            None => AnswerDraft {
                response: String::new(),
                confidence: 0.0,
                retry: true,
            },
        })
    }
}

fn agent(p: &Pipeline, decomposer: Arc<EchoDecomposer>) -> RagAgent {
    let answerer = TopHitAnswerer {
        search: p.search.clone(),
    };
    RagAgent::new(
        decomposer,
        Arc::new(answerer),
        RetrievalSettings {
            max_retries: 3,
            top_k: 5,
            seed: DecompositionSeed::Original,
        },
    )
}

#[tokio::test]
async fn agent_answers_from_the_indexed_document() -> RagResult<()> {
    let p = pipeline();
    p.indexer.index_pdf(&p.loan_pdf()).await?;
    let decomposer = Arc::new(EchoDecomposer::default());

    let outcome = agent(&p, decomposer.clone())
        .retrieve("What is the interest rate?", "loan", None)
        .await?;

    let RetrievalOutcome::Answered(response) = outcome else {
        panic!("expected an answer, got {:?}", outcome);
    };
    assert_eq!(response.response, "Interest rate is 5%");
    assert!(!response.retry);
    assert_eq!(decomposer.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn agent_gives_up_on_a_document_that_was_never_indexed() -> RagResult<()> {
    let p = pipeline();
    p.indexer.index_pdf(&p.loan_pdf()).await?;
    let decomposer = Arc::new(EchoDecomposer::default());

    let outcome = agent(&p, decomposer.clone())
        .retrieve("What is the interest rate?", "missing", None)
        .await?;

    assert_eq!(
        outcome,
        RetrievalOutcome::NoAnswer(AgentResponse::no_answer("What is the interest rate?"))
    );
    assert_eq!(decomposer.calls.load(Ordering::SeqCst), 3);
    Ok(())
}
