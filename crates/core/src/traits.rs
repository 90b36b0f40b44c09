use crate::{DocumentInfo, KbError};
use std::path::Path;

/// Plain text of an opened document, one page at a time.
pub trait PageTextSource {
    fn page_count(&self) -> u32;

    /// Text of a 1-based page. Pages without extractable text yield `""`.
    fn page_text(&self, page: u32) -> Result<String, KbError>;
}

pub trait MetadataSource {
    fn document_info(&self) -> DocumentInfo;
}

/// Opens a document handle for the duration of one operation.
pub trait DocumentOpener {
    type Document: PageTextSource + MetadataSource;

    fn open(&self, path: &Path) -> Result<Self::Document, KbError>;
}
