use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::{
    docid_from_path, Embedder, IndexReport, ParagraphExtractor, ParagraphRecord, PointToUpsert, VectorRepository,
};
use crate::error::{RagError, RagResult};

pub const DEFAULT_BATCH_SIZE: usize = 40;

/// Extracts paragraphs from PDFs and writes them, embedded, to the vector store.
///
/// Indexing is additive: a document indexed twice is stored twice.
pub struct PdfIndexer {
    extractor: Arc<dyn ParagraphExtractor>,
    embedder: Arc<dyn Embedder>,
    vector_db: Arc<dyn VectorRepository>,
    batch_size: usize,
}

impl PdfIndexer {
    pub fn new(
        extractor: Arc<dyn ParagraphExtractor>,
        embedder: Arc<dyn Embedder>,
        vector_db: Arc<dyn VectorRepository>,
        batch_size: usize,
    ) -> Self {
        Self {
            extractor,
            embedder,
            vector_db,
            batch_size: batch_size.max(1),
        }
    }

    /// Reads the PDF on a blocking thread.
    pub async fn extract_paragraphs(&self, path: &Path) -> RagResult<Vec<ParagraphRecord>> {
        let extractor = self.extractor.clone();
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || extractor.extract(&owned))
            .await
            .map_err(|e| RagError::Extraction {
                path: path.to_path_buf(),
                reason: format!("extraction task failed: {}", e),
            })?
    }

    /// Embeds and upserts `records` in order, `batch_size` at a time.
    ///
    /// Batches already written stay written when a later one fails; the error
    /// reports how many paragraphs were committed.
    pub async fn index_paragraphs(&self, records: &[ParagraphRecord], docid: &str) -> RagResult<IndexReport> {
        let total = records.len();
        let mut committed = 0;
        let mut batches = 0;

        for batch in records.chunks(self.batch_size) {
            if let Err(e) = self.index_batch(batch, docid).await {
                log::error!(
                    "Indexing '{}' failed after {}/{} paragraphs: {}",
                    docid,
                    committed,
                    total,
                    e
                );
                return Err(RagError::PartialIndex {
                    docid: docid.to_string(),
                    committed,
                    total,
                    source: Box::new(e),
                });
            }
            committed += batch.len();
            batches += 1;
        }

        log::info!(
            "Indexed {} paragraphs under docid='{}' in batches of {}.",
            total,
            docid,
            self.batch_size
        );
        Ok(IndexReport {
            docid: docid.to_string(),
            points: committed,
            batches,
        })
    }

    async fn index_batch(&self, batch: &[ParagraphRecord], docid: &str) -> RagResult<()> {
        let texts: Vec<&str> = batch.iter().map(|r| r.text.as_str()).collect();
        let vectors = self.embedder.embed(&texts)?;
        if vectors.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "expected {} vectors, got {}",
                batch.len(),
                vectors.len()
            )));
        }
        let points: Vec<PointToUpsert> = batch
            .iter()
            .zip(vectors)
            .map(|(record, vector)| PointToUpsert::new(record, docid, vector))
            .collect();
        self.vector_db.upsert_points(&points).await
    }

    /// Extracts and indexes one PDF under the docid derived from its file stem.
    pub async fn index_pdf(&self, path: &Path) -> RagResult<IndexReport> {
        let docid = docid_from_path(path)?;
        let records = self.extract_paragraphs(path).await?;
        if records.is_empty() {
            log::warn!("No text found in {}; nothing indexed.", path.display());
        }
        self.index_paragraphs(&records, &docid).await
    }
}
