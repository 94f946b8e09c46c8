use crate::error::PipelineError;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use std::fs;
use std::panic;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Represents a document with its content and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// The actual text content of the document
    pub content: String,
    /// Path of the file the document was read from
    pub source: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Create a new document from a file path
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();

        // Detect MIME type
        let mime = from_path(path).first_or_octet_stream();
        let mime_type = mime.to_string();
        debug!("Detected MIME type for {}: {}", path.display(), mime_type);

        let content = read_document_content(path, &mime_type)?;

        Ok(Document {
            content,
            source: path.display().to_string(),
            mime_type,
        })
    }
}

/// Recursively load every non-hidden file under `dir`.
///
/// Files that cannot be read as text are skipped with a warning; only a
/// missing or unreadable root directory fails the load.
pub fn load_corpus<P: AsRef<Path>>(dir: P) -> Result<Vec<Document>, PipelineError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(PipelineError::Load(anyhow::anyhow!(
            "corpus directory not found: {}",
            dir.display()
        )));
    }

    let mut documents = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(PipelineError::Load(anyhow::Error::new(err).context(
                    format!("failed to read corpus directory {}", dir.display()),
                )));
            }
            Err(err) => {
                warn!("Skipping unreadable corpus entry: {}", err);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match Document::from_file(entry.path()) {
            Ok(document) => documents.push(document),
            Err(err) => warn!("Skipping {}: {:#}", entry.path().display(), err),
        }
    }

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Read content from a document based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    match mime_type {
        // Handle PDF documents
        mime if mime.starts_with("application/pdf") => {
            info!("Processing PDF document: {}", path.display());
            let content = extract_pdf_text(path)
                .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

            // PDF extraction can sometimes include excessive whitespace
            let cleaned_content = normalize_whitespace(&content);

            if cleaned_content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(cleaned_content)
        }

        // Anything else must decode as UTF-8 text
        _ => {
            debug!("Processing text document: {}", path.display());
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            String::from_utf8(bytes).map_err(|_| {
                anyhow::anyhow!(
                    "Unsupported document format: {} is not valid UTF-8 text",
                    mime_type
                )
            })
        }
    }
}

/// `pdf_extract` panics on some malformed files; report those as errors
fn extract_pdf_text(path: &Path) -> Result<String> {
    match panic::catch_unwind(|| extract_text(path)) {
        Ok(result) => Ok(result?),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            Err(anyhow::anyhow!("PDF parser panicked: {}", reason))
        }
    }
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    normalized.trim().to_string()
}
