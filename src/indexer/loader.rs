// SPDX-License-Identifier: MIT OR Apache-2.0

//! Corpus loader using the ignore crate (same walker as ripgrep)

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extensions decoded directly as UTF-8 text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv"];

/// Extension handled by the optional PDF extractor.
const PDF_EXTENSION: &str = "pdf";

/// Text read from one corpus file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub text: String,
    /// File name of the source, without its directory.
    pub source_id: String,
}

/// How a file is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

/// Classify a path by its extension, case-insensitively.
pub fn detect_kind(path: &Path) -> Option<DocumentKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::Text)
    } else if ext == PDF_EXTENSION {
        Some(DocumentKind::Pdf)
    } else {
        None
    }
}

/// Walks a corpus directory and reads every supported file.
pub struct DocumentLoader {
    root: PathBuf,
}

impl DocumentLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load all readable documents.
    ///
    /// A missing directory and unreadable files are logged, never fatal.
    pub fn load(&self) -> Vec<RawDocument> {
        if !self.root.is_dir() {
            warn!(
                "corpus directory '{}' not found; returning no documents",
                self.root.display()
            );
            return Vec::new();
        }

        let mut docs = Vec::new();
        for path in self.list_files() {
            let Some(kind) = detect_kind(&path) else {
                continue;
            };

            match read_document(&path, kind) {
                Ok(Some(text)) if !text.trim().is_empty() => docs.push(RawDocument {
                    text,
                    source_id: source_id(&path),
                }),
                Ok(_) => debug!("skipping empty document {}", path.display()),
                Err(err) => warn!("failed to load {}: {:#}", path.display(), err),
            }
        }

        info!(
            "loaded {} documents from '{}'",
            docs.len(),
            self.root.display()
        );
        docs
    }

    /// List candidate files in walk order; hidden entries are skipped.
    pub fn list_files(&self) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        walker
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("failed to walk corpus entry: {}", err);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .collect()
    }
}

/// Read one file. `Ok(None)` means the kind is unsupported in this build.
fn read_document(path: &Path, kind: DocumentKind) -> Result<Option<String>> {
    match kind {
        DocumentKind::Text => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display())),
        DocumentKind::Pdf => read_pdf(path),
    }
}

#[cfg(feature = "pdf")]
fn read_pdf(path: &Path) -> Result<Option<String>> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .with_context(|| format!("Failed to extract text from PDF {}", path.display()))?;
    Ok(Some(pages.join("\n")))
}

#[cfg(not(feature = "pdf"))]
fn read_pdf(path: &Path) -> Result<Option<String>> {
    warn!(
        "PDF support not compiled in (enable the `pdf` feature); skipping '{}'",
        path.display()
    );
    Ok(None)
}

fn source_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
