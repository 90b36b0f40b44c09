use crate::error::KbError;
use crate::models::DocumentInfo;
use crate::traits::{DocumentOpener, MetadataSource, PageTextSource};
use lopdf::{Dictionary, Document};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Opens PDFs from disk with `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfOpener;

pub struct LopdfDocument {
    document: Document,
    page_count: u32,
    file_size_bytes: u64,
}

impl DocumentOpener for LopdfOpener {
    type Document = LopdfDocument;

    fn open(&self, path: &Path) -> Result<LopdfDocument, KbError> {
        if !path.is_file() {
            return Err(KbError::NotFound(path.display().to_string()));
        }

        let file_size_bytes = fs::metadata(path)?.len();
        let document =
            Document::load(path).map_err(|error| KbError::Read(error.to_string()))?;
        let page_count = document.get_pages().len() as u32;

        Ok(LopdfDocument {
            document,
            page_count,
            file_size_bytes,
        })
    }
}

impl PageTextSource for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_text(&self, page: u32) -> Result<String, KbError> {
        check_page(page, self.page_count)?;
        self.document
            .extract_text(&[page])
            .map_err(|error| KbError::Read(format!("page {page}: {error}")))
    }
}

impl MetadataSource for LopdfDocument {
    fn document_info(&self) -> DocumentInfo {
        let info = info_dictionary(&self.document);
        let field = |key: &[u8]| info.and_then(|dict| info_string(dict, key));

        DocumentInfo {
            file_size_bytes: self.file_size_bytes,
            page_count: self.page_count,
            is_encrypted: self.document.is_encrypted(),
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
        }
    }
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    let info = document.trailer.get(b"Info").ok()?;
    match info.as_reference() {
        Ok(id) => document.get_object(id).ok()?.as_dict().ok(),
        Err(_) => info.as_dict().ok(),
    }
}

fn info_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let raw = dict.get(key).ok()?.as_str().ok()?;
    let value = decode_pdf_string(raw);
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Decodes a PDF text string: UTF-16BE when it carries a BOM, else UTF-8 or Latin-1.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE_u8, 0xFF][..]) {
        let units = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| byte as char).collect(),
    }
}

fn check_page(page: u32, page_count: u32) -> Result<(), KbError> {
    if page == 0 || page > page_count {
        return Err(KbError::InvalidRange(format!(
            "page {page} out of bounds. PDF has {page_count} pages."
        )));
    }
    Ok(())
}

/// Page text already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    pages: Vec<String>,
    info: DocumentInfo,
}

impl MemoryDocument {
    pub fn new<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        let pages = pages.into_iter().map(Into::into).collect::<Vec<String>>();
        let info = DocumentInfo {
            file_size_bytes: pages.iter().map(|page| page.len() as u64).sum(),
            page_count: pages.len() as u32,
            ..DocumentInfo::default()
        };
        Self { pages, info }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.info.title = Some(title.into());
        self
    }
}

impl PageTextSource for MemoryDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&self, page: u32) -> Result<String, KbError> {
        check_page(page, self.page_count())?;
        Ok(self.pages[(page - 1) as usize].clone())
    }
}

impl MetadataSource for MemoryDocument {
    fn document_info(&self) -> DocumentInfo {
        self.info.clone()
    }
}

/// Serves [`MemoryDocument`]s by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    documents: HashMap<PathBuf, MemoryDocument>,
}

impl MemoryOpener {
    pub fn insert(&mut self, path: impl Into<PathBuf>, document: MemoryDocument) {
        self.documents.insert(path.into(), document);
    }
}

impl DocumentOpener for MemoryOpener {
    type Document = MemoryDocument;

    fn open(&self, path: &Path) -> Result<MemoryDocument, KbError> {
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| KbError::NotFound(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_pdf;
    use tempfile::tempdir;

    #[test]
    fn utf16_info_strings_are_decoded() {
        let bytes = [0xFE, 0xFF, 0x00, 0x45, 0x00, 0x44, 0x00, 0x52];
        assert_eq!(decode_pdf_string(&bytes), "EDR");
        assert_eq!(decode_pdf_string(b"Plain"), "Plain");
        assert_eq!(decode_pdf_string(&[0x43, 0x61, 0x66, 0xE9]), "Café");
    }

    #[test]
    fn missing_file_is_not_found() {
        let error = LopdfOpener.open(Path::new("/nonexistent/book.pdf")).err().unwrap();
        assert!(matches!(error, KbError::NotFound(_)));
    }

    #[test]
    fn garbage_bytes_are_a_read_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let error = LopdfOpener.open(&path).err().unwrap();
        assert!(matches!(error, KbError::Read(_)));
        Ok(())
    }

    #[test]
    fn lopdf_document_exposes_pages_and_info() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("guide.pdf");
        write_pdf(&path, &["Hello World", "", "Kernel callbacks"], Some("Lab Guide"))?;

        let document = LopdfOpener.open(&path)?;
        assert_eq!(document.page_count(), 3);
        assert!(document.page_text(1)?.contains("Hello World"));
        assert!(document.page_text(2)?.trim().is_empty());
        assert!(document.page_text(3)?.contains("Kernel callbacks"));
        assert!(matches!(document.page_text(4), Err(KbError::InvalidRange(_))));

        let info = document.document_info();
        assert_eq!(info.page_count, 3);
        assert_eq!(info.title.as_deref(), Some("Lab Guide"));
        assert_eq!(info.author, None);
        assert!(!info.is_encrypted);
        assert_eq!(info.file_size_bytes, fs::metadata(&path)?.len());
        Ok(())
    }

    #[test]
    fn memory_opener_reports_unknown_paths() {
        let mut opener = MemoryOpener::default();
        opener.insert("/kb/a.pdf", MemoryDocument::new(["one", "two"]));

        let document = opener.open(Path::new("/kb/a.pdf")).unwrap();
        assert_eq!(document.page_count(), 2);
        assert_eq!(document.page_text(2).unwrap(), "two");
        assert!(matches!(
            opener.open(Path::new("/kb/b.pdf")),
            Err(KbError::NotFound(_))
        ));
    }
}
