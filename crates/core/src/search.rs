use crate::error::KbError;
use crate::models::SearchMatch;
use crate::traits::PageTextSource;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub context_chars: usize,
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMatches {
    pub matches: Vec<SearchMatch>,
    pub truncated: bool,
}

/// Case-insensitive search, page by page in ascending order.
///
/// Matches never span pages. Each scan resumes one character after the
/// previous match start, so overlapping occurrences are all reported.
pub fn search_pages<S: PageTextSource + ?Sized>(
    source: &S,
    query: &str,
    options: SearchOptions,
) -> Result<PageMatches, KbError> {
    if query.is_empty() {
        return Err(KbError::InvalidQuery("query must not be empty".to_string()));
    }
    if options.max_results == 0 {
        return Err(KbError::InvalidArgument(
            "max_results must be positive".to_string(),
        ));
    }

    let needle = fold_case(query);
    let mut matches = Vec::new();

    'pages: for page in 1..=source.page_count() {
        let text = source.page_text(page)?.chars().collect::<Vec<char>>();
        let haystack = text.iter().copied().map(fold_char).collect::<Vec<char>>();

        let mut from = 0usize;
        while let Some(position) = find_from(&haystack, &needle, from) {
            matches.push(SearchMatch {
                page,
                context: context_around(&text, position, needle.len(), options.context_chars),
                position,
            });

            if matches.len() >= options.max_results {
                break 'pages;
            }
            from = position + 1;
        }
    }

    let truncated = matches.len() >= options.max_results;
    Ok(PageMatches { matches, truncated })
}

/// Lowercases one character to one character so offsets stay aligned.
fn fold_char(value: char) -> char {
    value.to_lowercase().next().unwrap_or(value)
}

fn fold_case(text: &str) -> Vec<char> {
    text.chars().map(fold_char).collect()
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len())
        .find(|&start| haystack[start..start + needle.len()] == *needle)
}

fn context_around(text: &[char], position: usize, length: usize, context_chars: usize) -> String {
    let start = position.saturating_sub(context_chars);
    let end = position
        .saturating_add(length)
        .saturating_add(context_chars)
        .min(text.len());

    let mut context = String::new();
    if start > 0 {
        context.push_str(ELLIPSIS);
    }
    context.extend(&text[start..end]);
    if end < text.len() {
        context.push_str(ELLIPSIS);
    }
    context
}
