#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_rag::{Embedder, RagResult};
use std::path::Path;

/// Writes a PDF with one text object per block; each block is (text, baseline y).
pub fn write_pdf(path: &Path, pages: &[&[(&str, i64)]]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for blocks in pages {
        let mut operations = Vec::new();
        for (text, y) in blocks.iter() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
            operations.push(Operation::new("Td", vec![50.into(), (*y).into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Counts occurrences of a fixed vocabulary; words outside it are ignored.
pub struct VocabularyEmbedder;

pub const VOCABULARY: [&str; 7] = ["loan", "amount", "interest", "rate", "lease", "rent", "penalty"];

impl Embedder for VocabularyEmbedder {
    fn embed(&self, texts: &[&str]) -> RagResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let words: Vec<String> = text
                    .split(|c: char| !c.is_alphanumeric())
                    .map(str::to_lowercase)
                    .collect();
                VOCABULARY
                    .iter()
                    .map(|v| words.iter().filter(|w| w.as_str() == *v).count() as f32)
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }
}
