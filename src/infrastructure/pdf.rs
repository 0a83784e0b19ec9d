//! Paragraph extraction from PDF files using lopdf.
//!
//! A "block" is one PDF text object (`BT` .. `ET`). Blocks are ordered by the
//! vertical position of their first line, top of the page first.

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use crate::domain::{ParagraphExtractor, ParagraphRecord};
use crate::error::{RagError, RagResult};

/// Text of one PDF text object and the highest baseline it was drawn on.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    /// Baseline y in PDF user space; larger is closer to the top of the page.
    pub top: f32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParagraphExtractor;

impl PdfParagraphExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_from_document(&self, doc: &Document) -> lopdf::Result<Vec<ParagraphRecord>> {
        let mut pages = Vec::new();
        // get_pages is keyed by 1-based page number, already in order.
        for (page_number, page_id) in doc.get_pages() {
            pages.push((page_number, page_blocks(doc, page_id)?));
        }
        Ok(paragraphs_from_pages(pages))
    }
}

impl ParagraphExtractor for PdfParagraphExtractor {
    fn extract(&self, path: &Path) -> RagResult<Vec<ParagraphRecord>> {
        let started = Instant::now();
        let to_error = |e: lopdf::Error| RagError::Extraction {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let doc = Document::load(path).map_err(to_error)?;
        let records = self.extract_from_document(&doc).map_err(to_error)?;

        log::info!(
            "Extracted {} paragraphs from {} in {:.2} seconds.",
            records.len(),
            path.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(records)
    }
}

/// Turns per-page blocks into records: pages ascending, blocks top to bottom,
/// whitespace-only blocks dropped, `line` counting the kept blocks from 1.
pub fn paragraphs_from_pages(mut pages: Vec<(u32, Vec<TextBlock>)>) -> Vec<ParagraphRecord> {
    pages.sort_by_key(|(page, _)| *page);

    let mut records = Vec::new();
    for (page, mut blocks) in pages {
        // Stable: blocks on the same baseline keep content-stream order.
        blocks.sort_by(|a, b| b.top.total_cmp(&a.top));
        let mut line = 0;
        for block in blocks {
            let text = block.text.trim();
            if text.is_empty() {
                continue;
            }
            line += 1;
            records.push(ParagraphRecord {
                text: text.to_string(),
                page,
                line,
            });
        }
    }
    records
}

#[derive(Debug, Default)]
struct TextCursor {
    line_y: f32,
    leading: f32,
}

fn number(obj: Option<&Object>) -> f32 {
    match obj {
        Some(Object::Integer(i)) => *i as f32,
        Some(Object::Real(r)) => *r as f32,
        _ => 0.0,
    }
}

fn push_text(block: &mut TextBlock, encoding: Option<&str>, operands: &[Object], line_y: f32) {
    let before = block.text.len();
    for operand in operands {
        match operand {
            Object::String(bytes, _) => block.text.push_str(&Document::decode_text(encoding, bytes)),
            Object::Array(items) => push_text(block, encoding, items, line_y),
            // Large negative kerning inside TJ is how most producers encode a space.
            Object::Integer(i) if *i < -100 => block.text.push(' '),
            Object::Real(r) if (*r as f32) < -100.0 => block.text.push(' '),
            _ => {}
        }
    }
    if block.text.len() > before {
        block.top = block.top.max(line_y);
    }
}

fn break_line(block: &mut TextBlock) {
    if !block.text.is_empty() && !block.text.ends_with(char::is_whitespace) {
        block.text.push('\n');
    }
}

fn page_blocks(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<TextBlock>> {
    let encodings: BTreeMap<Vec<u8>, &str> = doc
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect();
    let content = Content::decode(&doc.get_page_content(page_id)?)?;

    let mut blocks = Vec::new();
    let mut current: Option<TextBlock> = None;
    let mut cursor = TextCursor::default();
    let mut encoding: Option<&str> = None;

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => {
                cursor.line_y = 0.0;
                current = Some(TextBlock {
                    text: String::new(),
                    top: f32::MIN,
                });
            }
            "ET" => blocks.extend(current.take()),
            "Tf" => {
                encoding = operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .and_then(|name| encodings.get(name).copied());
            }
            "TL" => cursor.leading = number(operands.first()),
            "Tm" => cursor.line_y = number(operands.get(5)),
            "Td" | "TD" => {
                let ty = number(operands.get(1));
                if op.operator == "TD" {
                    cursor.leading = -ty;
                }
                cursor.line_y += ty;
                if let Some(block) = current.as_mut() {
                    if ty != 0.0 {
                        break_line(block);
                    } else if !block.text.is_empty() && !block.text.ends_with(' ') {
                        block.text.push(' ');
                    }
                }
            }
            "T*" => {
                cursor.line_y -= cursor.leading;
                if let Some(block) = current.as_mut() {
                    break_line(block);
                }
            }
            "Tj" | "TJ" => {
                if let Some(block) = current.as_mut() {
                    push_text(block, encoding, operands, cursor.line_y);
                }
            }
            "'" | "\"" => {
                cursor.line_y -= cursor.leading;
                if let Some(block) = current.as_mut() {
                    break_line(block);
                    // `"` carries word and character spacing before the string.
                    let text = if op.operator == "'" { operands.first() } else { operands.get(2) };
                    push_text(block, encoding, text.map(std::slice::from_ref).unwrap_or(&[]), cursor.line_y);
                }
            }
            _ => {}
        }
    }
    // An unterminated text object still carries text.
    blocks.extend(current);
    Ok(blocks)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};
    use tempfile::tempdir;

    /// One entry per page; each block is (text, baseline y).
    pub(crate) fn build_pdf(pages: &[&[(&str, i64)]]) -> Document {
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
                operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                operations.push(Operation::new("Td", vec![72.into(), (*y).into()]));
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
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn block(text: &str, top: f32) -> TextBlock {
        TextBlock { text: text.to_string(), top }
    }

    #[test]
    fn blocks_are_sorted_top_to_bottom_and_numbered() {
        let pages = vec![(1, vec![block("bottom", 100.0), block("top", 700.0), block("middle", 400.0)])];
        let records = paragraphs_from_pages(pages);
        let texts: Vec<_> = records.iter().map(|r| (r.text.as_str(), r.line)).collect();
        assert_eq!(texts, vec![("top", 1), ("middle", 2), ("bottom", 3)]);
    }

    #[test]
    fn blank_blocks_are_dropped_and_not_counted() {
        let pages = vec![(1, vec![block("first", 700.0), block("   \n\t", 650.0), block("second", 600.0)])];
        let records = paragraphs_from_pages(pages);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text, "second");
        assert_eq!(records[1].line, 2);
    }

    #[test]
    fn pages_precede_later_pages_and_restart_numbering() {
        let pages = vec![
            (2, vec![block("page two", 700.0)]),
            (1, vec![block("page one b", 300.0), block("page one a", 600.0)]),
        ];
        let records = paragraphs_from_pages(pages);
        let order: Vec<_> = records.iter().map(|r| (r.page, r.line, r.text.as_str())).collect();
        assert_eq!(
            order,
            vec![(1, 1, "page one a"), (1, 2, "page one b"), (2, 1, "page two")]
        );
    }

    #[test]
    fn text_is_trimmed() {
        let records = paragraphs_from_pages(vec![(1, vec![block("  padded \n", 10.0)])]);
        assert_eq!(records[0].text, "padded");
    }

    #[test]
    fn extracts_paragraphs_from_generated_pdf() -> RagResult<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loan.pdf");
        let mut doc = build_pdf(&[
            &[("Repayment schedule", 300), ("Loan amount is $10,000", 700)],
            &[("Interest rate is 5%", 650)],
        ]);
        doc.save(&path).unwrap();

        let records = PdfParagraphExtractor::new().extract(&path)?;
        assert_eq!(
            records,
            vec![
                ParagraphRecord { text: "Loan amount is $10,000".into(), page: 1, line: 1 },
                ParagraphRecord { text: "Repayment schedule".into(), page: 1, line: 2 },
                ParagraphRecord { text: "Interest rate is 5%".into(), page: 2, line: 1 },
            ]
        );
        Ok(())
    }

    #[test]
    fn document_without_text_yields_no_paragraphs() -> RagResult<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blank.pdf");
        build_pdf(&[&[], &[]]).save(&path).unwrap();

        assert!(PdfParagraphExtractor::new().extract(&path)?.is_empty());
        Ok(())
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"definitely not a pdf").unwrap();

        let err = PdfParagraphExtractor::new().extract(&path).unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = PdfParagraphExtractor::new()
            .extract(Path::new("/nonexistent/file.pdf"))
            .unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }
}
