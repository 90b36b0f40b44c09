use crate::error::{ErrorKind, KbError};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, skip_serializing_none, DisplayFromStr};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_MAX_CHARS_PER_CHUNK: usize = 50_000;
pub const DEFAULT_OVERLAP_PAGES: u32 = 1;
pub const DEFAULT_CONTEXT_CHARS: usize = 200;
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// A contiguous, inclusive page range sized to fit a character budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_number: u32,
    pub start_page: u32,
    pub end_page: u32,
    pub estimated_chars: usize,
}

impl Chunk {
    pub fn page_count(&self) -> u32 {
        self.end_page - self.start_page + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPlan {
    pub pdf_path: String,
    pub total_pages: u32,
    pub max_chars_per_chunk: usize,
    pub overlap_pages: u32,
    pub total_chunks: usize,
    pub chunks: Vec<Chunk>,
}

/// Inclusive 1-based page range, rendered as `start-end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtractionResult {
    pub pdf_path: String,
    pub total_pages: u32,
    #[serde_as(as = "DisplayFromStr")]
    pub pages_requested: PageRange,
    pub pages_processed: u32,
    pub text_length_chars: usize,
    pub text: String,
    pub truncated: bool,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchMatch {
    pub page: u32,
    pub context: String,
    /// Character offset of the match within the page text.
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchReport {
    pub pdf_path: String,
    pub query: String,
    pub total_matches: usize,
    pub matches: Vec<SearchMatch>,
    pub truncated: bool,
}

/// Document-level facts reported by a [`crate::MetadataSource`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub file_size_bytes: u64,
    pub page_count: u32,
    pub is_encrypted: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfMetadata {
    pub file_path: String,
    pub file_size_bytes: u64,
    pub file_size_mb: f64,
    pub page_count: u32,
    pub is_encrypted: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

impl PdfMetadata {
    pub fn from_info(file_path: String, info: DocumentInfo) -> Self {
        Self {
            file_path,
            file_size_mb: bytes_to_mb(info.file_size_bytes),
            file_size_bytes: info.file_size_bytes,
            page_count: info.page_count,
            is_encrypted: info.is_encrypted,
            title: info.title,
            author: info.author,
            subject: info.subject,
            creator: info.creator,
        }
    }
}

/// Megabytes rounded to two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// Result of one public operation: the payload, or an error kind and message.
///
/// Serializes untagged so failures keep the `{"error": ...}` wire shape.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ToolOutcome<T> {
    Success(T),
    Failure { error: String, kind: ErrorKind },
}

impl<T> ToolOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolOutcome::Success(_) => None,
            ToolOutcome::Failure { error, .. } => Some(error),
        }
    }
}

impl<T> From<Result<T, KbError>> for ToolOutcome<T> {
    fn from(value: Result<T, KbError>) -> Self {
        match value {
            Ok(payload) => ToolOutcome::Success(payload),
            Err(error) => ToolOutcome::Failure {
                kind: error.kind(),
                error: error.to_string(),
            },
        }
    }
}

/// Settings for a batch run over a document library.
#[derive(Debug, Clone)]
pub struct KbConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Explicit document list; when `None` PDFs are discovered in `input_dir`.
    pub documents: Option<Vec<PathBuf>>,
    pub recursive: bool,
    pub max_chars_per_chunk: usize,
    pub overlap_pages: u32,
    pub workers: usize,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("extracted"),
            documents: None,
            recursive: false,
            max_chars_per_chunk: DEFAULT_MAX_CHARS_PER_CHUNK,
            overlap_pages: 0,
            workers: 1,
        }
    }
}
