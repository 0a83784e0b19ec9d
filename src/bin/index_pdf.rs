//! Indexes PDF files into the configured Qdrant collection.
//!
//! Usage: `index_pdf [FILE_OR_DIR]...`. Directories are walked recursively for
//! `*.pdf`. Without arguments the configured upload directory is indexed.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use pdf_rag::config;
use pdf_rag::initialization::build_services;

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn collect_pdfs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
                if entry.file_type().is_file() && is_pdf(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            bail!("No such file or directory: {}", input.display());
        }
    }
    Ok(files)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = config::load_config()?;
    let mut inputs: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        match &config.indexer.upload_dir {
            Some(dir) => inputs.push(dir.clone()),
            None => bail!("Usage: index_pdf [FILE_OR_DIR]..."),
        }
    }

    let files = collect_pdfs(&inputs)?;
    if files.is_empty() {
        log::warn!("No PDF files found in {:?}", inputs);
        return Ok(());
    }

    let services = build_services(&config).await?;
    let mut failed = 0;
    for file in &files {
        match services.indexer.index_pdf(file).await {
            Ok(report) => println!(
                "{}: {} paragraphs in {} batches (docid '{}')",
                file.display(),
                report.points,
                report.batches,
                report.docid
            ),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", file.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} files failed to index", failed, files.len());
    }
    Ok(())
}
