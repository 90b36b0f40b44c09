pub mod chunking;
pub mod error;
pub mod extraction;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod search;
pub mod toolkit;
pub mod traits;

#[cfg(test)]
pub(crate) mod fixtures;

pub use chunking::{plan_chunks, plan_from_lengths, ChunkingConfig};
pub use error::{ErrorKind, KbError};
pub use extraction::{extract_pages, resolve_range, ExtractedText};
pub use extractor::{LopdfDocument, LopdfOpener, MemoryDocument, MemoryOpener};
pub use ingest::{
    discover_pdf_files, process_document, process_library, DocumentOutcome, DocumentReport,
    ExtractedDocument, ProcessingSummary,
};
pub use models::{
    Chunk, ChunkPlan, DocumentInfo, ExtractionResult, KbConfig, PageRange, PdfMetadata,
    SearchMatch, SearchReport, ToolOutcome, DEFAULT_CONTEXT_CHARS, DEFAULT_MAX_CHARS_PER_CHUNK,
    DEFAULT_MAX_RESULTS, DEFAULT_OVERLAP_PAGES,
};
pub use search::{search_pages, SearchOptions};
pub use toolkit::PdfToolkit;
pub use traits::{DocumentOpener, MetadataSource, PageTextSource};
