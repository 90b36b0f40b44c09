use crate::chunking::{plan_chunks, ChunkingConfig};
use crate::extraction::{extract_pages, resolve_range, truncation_note};
use crate::extractor::LopdfOpener;
use crate::search::{search_pages, SearchOptions};
use crate::traits::{DocumentOpener, MetadataSource, PageTextSource};
use crate::{ChunkPlan, ExtractionResult, KbError, PdfMetadata, SearchReport};
use std::path::{Path, PathBuf};

/// The four document operations.
///
/// Every call opens its own handle and drops it before returning.
#[derive(Debug, Clone, Default)]
pub struct PdfToolkit<O = LopdfOpener> {
    opener: O,
}

impl PdfToolkit<LopdfOpener> {
    pub fn lopdf() -> Self {
        Self::new(LopdfOpener)
    }
}

impl<O: DocumentOpener> PdfToolkit<O> {
    pub fn new(opener: O) -> Self {
        Self { opener }
    }

    pub fn metadata(&self, path: &Path) -> Result<PdfMetadata, KbError> {
        let document = self.opener.open(path)?;
        Ok(PdfMetadata::from_info(
            absolute_display(path),
            document.document_info(),
        ))
    }

    pub fn extract_text(
        &self,
        path: &Path,
        start_page: u32,
        end_page: Option<u32>,
        max_chars: Option<usize>,
    ) -> Result<ExtractionResult, KbError> {
        let document = self.opener.open(path)?;
        let total_pages = document.page_count();
        let range = resolve_range(total_pages, start_page, end_page)?;
        let extracted = extract_pages(&document, range, max_chars)?;

        let note = match (extracted.truncated, max_chars) {
            (true, Some(budget)) => Some(truncation_note(budget)),
            _ => None,
        };

        Ok(ExtractionResult {
            pdf_path: absolute_display(path),
            total_pages,
            pages_requested: range,
            pages_processed: extracted.pages_processed,
            text_length_chars: extracted.text_length_chars,
            text: extracted.text,
            truncated: extracted.truncated,
            note,
        })
    }

    pub fn search(
        &self,
        path: &Path,
        query: &str,
        context_chars: usize,
        max_results: usize,
    ) -> Result<SearchReport, KbError> {
        let document = self.opener.open(path)?;
        let found = search_pages(
            &document,
            query,
            SearchOptions {
                context_chars,
                max_results,
            },
        )?;

        Ok(SearchReport {
            pdf_path: absolute_display(path),
            query: query.to_string(),
            total_matches: found.matches.len(),
            matches: found.matches,
            truncated: found.truncated,
        })
    }

    pub fn plan_chunks(
        &self,
        path: &Path,
        max_chars_per_chunk: usize,
        overlap_pages: u32,
    ) -> Result<ChunkPlan, KbError> {
        let document = self.opener.open(path)?;
        let chunks = plan_chunks(
            &document,
            ChunkingConfig {
                max_chars_per_chunk,
                overlap_pages,
            },
        )?;

        Ok(ChunkPlan {
            pdf_path: absolute_display(path),
            total_pages: document.page_count(),
            max_chars_per_chunk,
            overlap_pages,
            total_chunks: chunks.len(),
            chunks,
        })
    }
}

fn absolute_display(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| PathBuf::from(path))
    };
    absolute.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{MemoryDocument, MemoryOpener};
    use crate::fixtures::write_pdf;
    use crate::{ErrorKind, ToolOutcome};
    use tempfile::tempdir;

    fn toolkit() -> PdfToolkit<MemoryOpener> {
        let mut opener = MemoryOpener::default();
        let mut pages = vec!["x".repeat(6_000); 5];
        pages.extend(vec!["y".repeat(1_000); 5]);
        opener.insert("/kb/book.pdf", MemoryDocument::new(pages).with_title("Book"));
        opener.insert(
            "/kb/notes.pdf",
            MemoryDocument::new(["intro", "body", "the needle is here", "outro"]),
        );
        PdfToolkit::new(opener)
    }

    #[test]
    fn plan_reports_summary_fields() {
        let plan = toolkit()
            .plan_chunks(Path::new("/kb/book.pdf"), 10_000, 0)
            .unwrap();

        assert_eq!(plan.pdf_path, "/kb/book.pdf");
        assert_eq!(plan.total_pages, 10);
        assert_eq!(plan.total_chunks, 6);
        assert_eq!(plan.chunks[5].start_page, 6);
        assert_eq!(plan.chunks[5].end_page, 10);
    }

    #[test]
    fn chunked_extraction_matches_full_extraction() {
        let toolkit = toolkit();
        let path = Path::new("/kb/book.pdf");
        let plan = toolkit.plan_chunks(path, 10_000, 0).unwrap();
        let full = toolkit.extract_text(path, 1, None, None).unwrap();

        let chunked_chars = plan
            .chunks
            .iter()
            .map(|chunk| {
                toolkit
                    .extract_text(path, chunk.start_page, Some(chunk.end_page), None)
                    .unwrap()
                    .text_length_chars
            })
            .sum::<usize>();

        assert_eq!(chunked_chars, full.text_length_chars);
        assert_eq!(full.text_length_chars, 35_000);
    }

    #[test]
    fn truncated_extraction_carries_note() {
        let result = toolkit()
            .extract_text(Path::new("/kb/notes.pdf"), 2, Some(3), Some(6))
            .unwrap();

        assert_eq!(result.pages_requested.to_string(), "2-3");
        assert!(result.truncated);
        assert_eq!(result.text_length_chars, 6);
        assert!(result.note.unwrap().contains("truncated at 6 characters"));
    }

    #[test]
    fn invalid_start_page_is_a_range_error() {
        let toolkit = toolkit();
        for start in [0, 5] {
            let error = toolkit
                .extract_text(Path::new("/kb/notes.pdf"), start, None, None)
                .unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidRange);
        }
    }

    #[test]
    fn search_finds_known_offset() {
        let report = toolkit()
            .search(Path::new("/kb/notes.pdf"), "NEEDLE", 200, 50)
            .unwrap();

        assert_eq!(report.total_matches, 1);
        assert_eq!(report.matches[0].page, 3);
        assert_eq!(report.matches[0].position, 4);
        assert_eq!(report.query, "NEEDLE");
    }

    #[test]
    fn missing_documents_fail_every_operation_with_not_found() {
        let toolkit = toolkit();
        let path = Path::new("/kb/absent.pdf");

        let outcomes: Vec<ToolOutcome<serde_json::Value>> = vec![
            toolkit.metadata(path).map(|v| serde_json::json!(v)).into(),
            toolkit
                .extract_text(path, 1, None, None)
                .map(|v| serde_json::json!(v))
                .into(),
            toolkit.search(path, "x", 10, 5).map(|v| serde_json::json!(v)).into(),
            toolkit
                .plan_chunks(path, 100, 1)
                .map(|v| serde_json::json!(v))
                .into(),
        ];

        for outcome in outcomes {
            assert!(matches!(
                outcome,
                ToolOutcome::Failure {
                    kind: ErrorKind::NotFound,
                    ..
                }
            ));
        }
    }

    #[test]
    fn metadata_from_pdf_on_disk() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("slides.pdf");
        write_pdf(&path, &["one", "two"], Some("Evasion Slides"))?;

        let metadata = PdfToolkit::lopdf().metadata(&path)?;
        assert_eq!(metadata.page_count, 2);
        assert_eq!(metadata.title.as_deref(), Some("Evasion Slides"));
        assert!(metadata.file_size_bytes > 0);
        assert_eq!(metadata.file_path, path.display().to_string());

        let missing = PdfToolkit::lopdf()
            .metadata(&dir.path().join("nope.pdf"))
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        Ok(())
    }
}
