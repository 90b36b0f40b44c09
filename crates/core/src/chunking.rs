use crate::error::KbError;
use crate::models::Chunk;
use crate::traits::PageTextSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars_per_chunk: usize,
    pub overlap_pages: u32,
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), KbError> {
        if self.max_chars_per_chunk == 0 {
            return Err(KbError::InvalidArgument(
                "max_chars_per_chunk must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Character count of every page, in page order.
pub fn page_lengths<S: PageTextSource + ?Sized>(source: &S) -> Result<Vec<usize>, KbError> {
    (1..=source.page_count())
        .map(|page| source.page_text(page).map(|text| text.chars().count()))
        .collect()
}

pub fn plan_chunks<S: PageTextSource + ?Sized>(
    source: &S,
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, KbError> {
    config.validate()?;
    let lengths = page_lengths(source)?;
    Ok(plan_from_lengths(&lengths, config))
}

/// Greedy forward scan over page lengths.
///
/// A chunk grows while the next page still fits in the budget; its first
/// page is always taken, so an oversized page becomes a chunk of its own.
/// The next chunk restarts `overlap_pages` before the previous end, unless
/// that would not move past the previous start.
pub fn plan_from_lengths(lengths: &[usize], config: ChunkingConfig) -> Vec<Chunk> {
    let total_pages = lengths.len() as u32;
    let mut chunks = Vec::new();
    let mut current_page = 1u32;
    let mut chunk_number = 1u32;

    while current_page <= total_pages {
        let mut estimated_chars = 0usize;
        let mut end_page = current_page;

        for page in current_page..=total_pages {
            let chars = lengths[(page - 1) as usize];
            if page > current_page && estimated_chars + chars > config.max_chars_per_chunk {
                break;
            }
            estimated_chars += chars;
            end_page = page;
        }

        chunks.push(Chunk {
            chunk_number,
            start_page: current_page,
            end_page,
            estimated_chars,
        });

        let span = end_page - current_page + 1;
        current_page = if config.overlap_pages >= span {
            end_page + 1
        } else {
            end_page + 1 - config.overlap_pages
        };
        chunk_number += 1;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::MemoryDocument;

    fn config(max_chars_per_chunk: usize, overlap_pages: u32) -> ChunkingConfig {
        ChunkingConfig {
            max_chars_per_chunk,
            overlap_pages,
        }
    }

    fn ranges(chunks: &[Chunk]) -> Vec<(u32, u32)> {
        chunks
            .iter()
            .map(|chunk| (chunk.start_page, chunk.end_page))
            .collect()
    }

    fn assert_covers(chunks: &[Chunk], total_pages: u32) {
        let mut covered = vec![false; total_pages as usize];
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_number, index as u32 + 1);
            assert!(chunk.start_page <= chunk.end_page);
            assert!(chunk.end_page <= total_pages);
            for page in chunk.start_page..=chunk.end_page {
                covered[(page - 1) as usize] = true;
            }
        }
        assert!(covered.into_iter().all(|page| page));
    }

    #[test]
    fn heavy_pages_split_and_light_tail_merges() {
        let lengths = [6_000, 6_000, 6_000, 6_000, 6_000, 1_000, 1_000, 1_000, 1_000, 1_000];
        let chunks = plan_from_lengths(&lengths, config(10_000, 0));

        assert_eq!(
            ranges(&chunks),
            vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 10)]
        );
        assert_eq!(chunks[5].estimated_chars, 5_000);
        assert_eq!(chunks[5].chunk_number, 6);
    }

    #[test]
    fn oversized_pages_become_single_page_chunks() {
        let lengths = [500, 40_000, 40_000, 200];
        let chunks = plan_from_lengths(&lengths, config(1_000, 0));

        assert_eq!(ranges(&chunks), vec![(1, 1), (2, 2), (3, 3), (4, 4)]);
        assert_eq!(chunks[1].estimated_chars, 40_000);
    }

    #[test]
    fn overlap_repeats_boundary_pages() {
        let lengths = [100; 10];
        let chunks = plan_from_lengths(&lengths, config(400, 1));

        assert_eq!(ranges(&chunks), vec![(1, 4), (4, 7), (7, 10), (10, 10)]);
        assert_covers(&chunks, 10);
    }

    #[test]
    fn overlap_at_least_chunk_length_still_advances() {
        let lengths = [100; 6];
        let chunks = plan_from_lengths(&lengths, config(200, 5));

        assert_eq!(ranges(&chunks), vec![(1, 2), (3, 4), (5, 6)]);

        let single_pages = plan_from_lengths(&[900; 4], config(500, 1));
        assert_eq!(ranges(&single_pages), vec![(1, 1), (2, 2), (3, 3), (4, 4)]);
    }

    #[test]
    fn overlap_after_last_page_adds_trailing_chunk() {
        let chunks = plan_from_lengths(&[10, 20, 30], config(50_000, 1));
        assert_eq!(ranges(&chunks), vec![(1, 3), (3, 3)]);
        assert_eq!(chunks[0].estimated_chars, 60);
        assert_eq!(chunks[1].estimated_chars, 30);
        assert_eq!(chunks[1].chunk_number, 2);

        let without_overlap = plan_from_lengths(&[10, 20, 30], config(50_000, 0));
        assert_eq!(ranges(&without_overlap), vec![(1, 3)]);
    }

    #[test]
    fn empty_document_has_no_chunks() {
        assert!(plan_from_lengths(&[], config(100, 1)).is_empty());
    }

    #[test]
    fn blank_pages_are_absorbed() {
        let chunks = plan_from_lengths(&[0, 0, 300, 0, 300], config(300, 0));
        assert_eq!(ranges(&chunks), vec![(1, 4), (5, 5)]);
    }

    #[test]
    fn budget_holds_for_every_multi_page_chunk() {
        let lengths = (0..60)
            .map(|page| (page * 7_919 % 3_000) + 10)
            .collect::<Vec<usize>>();

        for max_chars in [1, 50, 999, 3_000, 7_500, 100_000] {
            for overlap in 0..4 {
                let chunks = plan_from_lengths(&lengths, config(max_chars, overlap));
                assert_covers(&chunks, lengths.len() as u32);
                for chunk in &chunks {
                    assert!(chunk.estimated_chars <= max_chars || chunk.page_count() == 1);
                }
                for pair in chunks.windows(2) {
                    assert!(pair[1].start_page > pair[0].start_page);
                    assert!(pair[0].end_page + 1 - pair[1].start_page <= overlap);
                }
            }
        }
    }

    #[test]
    fn plan_counts_characters_not_bytes() {
        let document = MemoryDocument::new(["ééééé", "abcde", "xyz"]);
        let chunks = plan_chunks(&document, config(10, 0)).unwrap();

        assert_eq!(ranges(&chunks), vec![(1, 2), (3, 3)]);
        assert_eq!(chunks[0].estimated_chars, 10);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let document = MemoryDocument::new(["page"]);
        let error = plan_chunks(&document, config(0, 0)).unwrap_err();
        assert!(matches!(error, KbError::InvalidArgument(_)));
    }
}
