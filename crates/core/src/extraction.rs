use crate::error::KbError;
use crate::models::PageRange;
use crate::traits::PageTextSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub pages_processed: u32,
    /// Page content characters, markers excluded.
    pub text_length_chars: usize,
    pub truncated: bool,
}

/// Checks `start_page` and clamps `end_page` to the document.
pub fn resolve_range(
    total_pages: u32,
    start_page: u32,
    end_page: Option<u32>,
) -> Result<PageRange, KbError> {
    if start_page < 1 || start_page > total_pages {
        return Err(KbError::InvalidRange(format!(
            "Invalid start_page: {start_page}. PDF has {total_pages} pages."
        )));
    }

    let end = end_page.map_or(total_pages, |end| end.min(total_pages));
    if end < start_page {
        return Err(KbError::InvalidRange(format!(
            "end_page {end} is before start_page {start_page}"
        )));
    }

    Ok(PageRange {
        start: start_page,
        end,
    })
}

pub fn page_marker(page: u32, partial: bool) -> String {
    if partial {
        format!("--- Page {page} (partial) ---")
    } else {
        format!("--- Page {page} ---")
    }
}

pub fn truncation_note(max_chars: usize) -> String {
    format!(
        "Text truncated at {max_chars} characters. Use smaller page ranges or increase max_chars."
    )
}

/// Concatenates marked page blocks over `range`.
///
/// With a budget, the page that would overflow it is cut to fill the
/// remainder exactly and extraction stops there.
pub fn extract_pages<S: PageTextSource + ?Sized>(
    source: &S,
    range: PageRange,
    max_chars: Option<usize>,
) -> Result<ExtractedText, KbError> {
    if max_chars == Some(0) {
        return Err(KbError::InvalidArgument(
            "max_chars must be positive".to_string(),
        ));
    }

    let mut blocks = Vec::new();
    let mut total_chars = 0usize;
    let mut pages_processed = 0u32;
    let mut truncated = false;

    for page in range.start..=range.end {
        let page_text = source.page_text(page)?;
        let chars = page_text.chars().count();

        if let Some(budget) = max_chars {
            if total_chars + chars > budget {
                let remaining = budget - total_chars;
                let partial = page_text.chars().take(remaining).collect::<String>();
                blocks.push(format!("{}\n{partial}", page_marker(page, true)));
                total_chars += remaining;
                pages_processed += 1;
                truncated = true;
                break;
            }
        }

        blocks.push(format!("{}\n{page_text}", page_marker(page, false)));
        total_chars += chars;
        pages_processed += 1;
    }

    Ok(ExtractedText {
        text: blocks.join("\n\n"),
        pages_processed,
        text_length_chars: total_chars,
        truncated,
    })
}
