use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RagError, RagResult};

/// A non-empty text block read from a PDF page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphRecord {
    pub text: String,
    /// 1-based page number.
    pub page: u32,
    /// 1-based position among the non-empty blocks of `page`, top to bottom.
    pub line: u32,
}

/// Payload stored next to each vector in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphPayload {
    pub text: String,
    pub page_number: u32,
    pub line_number: u32,
    pub docid: String,
}

/// A paragraph with its embedding, ready to be written to the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointToUpsert {
    pub vector: Vec<f32>,
    pub payload: ParagraphPayload,
}

impl PointToUpsert {
    pub fn new(record: &ParagraphRecord, docid: &str, vector: Vec<f32>) -> Self {
        Self {
            vector,
            payload: ParagraphPayload {
                text: record.text.clone(),
                page_number: record.page,
                line_number: record.line,
                docid: docid.to_string(),
            },
        }
    }
}

/// A paragraph returned by similarity search, best match first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub page_number: u32,
    pub line_number: u32,
    pub score: f32,
}

/// Summary of a successful indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub docid: String,
    pub points: usize,
    pub batches: usize,
}

/// Derives the document identifier from a file path: its stem.
///
/// `uploaded/Facility Agreement [2024].pdf` becomes `Facility Agreement [2024]`.
pub fn docid_from_path(path: &Path) -> RagResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RagError::Extraction {
            path: path.to_path_buf(),
            reason: "path has no UTF-8 file stem to use as document id".to_string(),
        })
}
