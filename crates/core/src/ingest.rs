use crate::traits::DocumentOpener;
use crate::{KbConfig, KbError, PdfMetadata, PdfToolkit};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const SUMMARY_FILE: &str = "processing_summary.json";
pub const PROGRESS_FILE: &str = "processing_progress.json";
pub const INDEX_FILE: &str = "INDEX.md";

pub fn discover_pdf_files(folder: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(folder);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, KbError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid name pattern"));

/// File stem made safe for output names.
pub fn safe_name(path: &Path) -> Result<String, KbError> {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace(['(', ')'], ""))
        .ok_or_else(|| {
            KbError::InvalidArgument(format!("path has no file name: {}", path.display()))
        })?;

    Ok(UNSAFE_NAME_CHARS.replace_all(&stem, "_").into_owned())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtractedDocument {
    pub pages: u32,
    pub size_mb: f64,
    pub total_chars: usize,
    pub checksum: String,
    pub text_file: PathBuf,
    pub metadata_file: PathBuf,
    pub total_chunks: usize,
    pub failed_chunks: usize,
    pub processing_time: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Success(ExtractedDocument),
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentReport {
    pub file: PathBuf,
    pub name: String,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

impl DocumentReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DocumentOutcome::Success(_))
    }

    pub fn total_chars(&self) -> usize {
        match &self.outcome {
            DocumentOutcome::Success(document) => document.total_chars,
            DocumentOutcome::Failed { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub timestamp: String,
    pub total_pdfs: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_chars: usize,
    pub total_time: f64,
    pub workers: usize,
    pub results: Vec<DocumentReport>,
}

#[derive(Serialize)]
struct Progress<'a> {
    completed: usize,
    total: usize,
    results: &'a [DocumentReport],
}

/// Metadata, plan, chunk-by-chunk extraction, then the `.txt` and sidecar files.
///
/// Never fails: errors end up in the report so one bad document does not stop a run.
pub fn process_document<O: DocumentOpener>(
    toolkit: &PdfToolkit<O>,
    path: &Path,
    config: &KbConfig,
) -> DocumentReport {
    let started = Instant::now();
    let name = display_name(path);

    let outcome = match extract_document(toolkit, path, &name, config) {
        Ok(mut document) => {
            document.processing_time = round2(started.elapsed().as_secs_f64());
            info!(
                path = %path.display(),
                pages = document.pages,
                chunks = document.total_chunks,
                chars = document.total_chars,
                "document extracted"
            );
            DocumentOutcome::Success(document)
        }
        Err(error) => {
            warn!(path = %path.display(), reason = %error, "document failed");
            DocumentOutcome::Failed {
                error: error.to_string(),
            }
        }
    };

    DocumentReport {
        file: path.to_path_buf(),
        name,
        outcome,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn extract_document<O: DocumentOpener>(
    toolkit: &PdfToolkit<O>,
    path: &Path,
    name: &str,
    config: &KbConfig,
) -> Result<ExtractedDocument, KbError> {
    let metadata = toolkit.metadata(path)?;
    let plan = toolkit.plan_chunks(path, config.max_chars_per_chunk, config.overlap_pages)?;

    let stem = safe_name(path)?;
    let text_file = config.output_dir.join(format!("{stem}.txt"));
    let metadata_file = config.output_dir.join(format!("{stem}_metadata.json"));

    let mut parts = Vec::with_capacity(plan.chunks.len());
    let mut total_chars = 0usize;
    let mut failed_chunks = 0usize;

    for chunk in &plan.chunks {
        match toolkit.extract_text(path, chunk.start_page, Some(chunk.end_page), None) {
            Ok(extracted) => {
                debug!(
                    chunk = chunk.chunk_number,
                    of = plan.total_chunks,
                    chars = extracted.text_length_chars,
                    "chunk extracted"
                );
                total_chars += extracted.text_length_chars;
                parts.push(extracted.text);
            }
            Err(error) => {
                warn!(chunk = chunk.chunk_number, reason = %error, "chunk failed");
                failed_chunks += 1;
            }
        }
    }

    let mut body = text_header(name, &metadata);
    body.push_str(&parts.join("\n\n"));
    fs::write(&text_file, body)?;
    fs::write(&metadata_file, serde_json::to_string_pretty(&metadata)?)?;

    Ok(ExtractedDocument {
        pages: metadata.page_count,
        size_mb: metadata.file_size_mb,
        total_chars,
        checksum: digest_file(path)?,
        text_file,
        metadata_file,
        total_chunks: plan.total_chunks,
        failed_chunks,
        processing_time: 0.0,
    })
}

pub fn text_header(name: &str, metadata: &PdfMetadata) -> String {
    let mut header = String::new();
    let _ = writeln!(header, "# {name}");
    let _ = writeln!(header, "# Pages: {}", metadata.page_count);
    let _ = writeln!(header, "# Size: {} MB", metadata.file_size_mb);
    if let Some(title) = &metadata.title {
        let _ = writeln!(header, "# Title: {title}");
    }
    if let Some(author) = &metadata.author {
        let _ = writeln!(header, "# Author: {author}");
    }
    let _ = write!(header, "\n{}\n\n", "=".repeat(80));
    header
}

/// Runs every document with at most `config.workers` in flight, then writes
/// the summary and the markdown index.
pub async fn process_library<O>(
    toolkit: PdfToolkit<O>,
    config: &KbConfig,
) -> Result<ProcessingSummary, KbError>
where
    O: DocumentOpener + Send + Sync + 'static,
{
    let documents = match &config.documents {
        Some(documents) => documents.clone(),
        None => discover_pdf_files(&config.input_dir, config.recursive),
    };

    if documents.is_empty() {
        return Err(KbError::InvalidArgument(format!(
            "no pdf files found in {}",
            config.input_dir.display()
        )));
    }

    tokio::fs::create_dir_all(&config.output_dir).await?;

    let started = Instant::now();
    let total = documents.len();
    let workers = config.workers.clamp(1, total);
    info!(total, workers, output = %config.output_dir.display(), "processing library");

    let toolkit = Arc::new(toolkit);
    let shared_config = Arc::new(config.clone());
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();
    let mut in_flight: HashMap<Id, (usize, PathBuf)> = HashMap::with_capacity(workers);
    let mut reports: Vec<(usize, DocumentReport)> = Vec::with_capacity(total);

    for (index, path) in documents.into_iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|error| KbError::Worker(error.to_string()))?;
        let task_toolkit = Arc::clone(&toolkit);
        let task_config = Arc::clone(&shared_config);
        let task_path = path.clone();

        info!(document = index + 1, total, path = %path.display(), "queued");
        let handle = tasks.spawn_blocking(move || {
            let report = process_document(&*task_toolkit, &task_path, &task_config);
            drop(permit);
            (index, report)
        });
        in_flight.insert(handle.id(), (index, path));

        while let Some(joined) = tasks.try_join_next_with_id() {
            reports.push(settle(joined, &mut in_flight)?);
            write_progress(&config.output_dir, total, &reports).await?;
        }
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        reports.push(settle(joined, &mut in_flight)?);
        write_progress(&config.output_dir, total, &reports).await?;
    }

    reports.sort_by_key(|(index, _)| *index);
    let results = reports
        .into_iter()
        .map(|(_, report)| report)
        .collect::<Vec<_>>();

    let successful = results.iter().filter(|report| report.is_success()).count();
    let summary = ProcessingSummary {
        timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        total_pdfs: total,
        successful,
        failed: total - successful,
        total_chars: results.iter().map(DocumentReport::total_chars).sum(),
        total_time: round2(started.elapsed().as_secs_f64()),
        workers,
        results,
    };

    tokio::fs::write(
        config.output_dir.join(SUMMARY_FILE),
        serde_json::to_string_pretty(&summary)?,
    )
    .await?;
    tokio::fs::write(config.output_dir.join(INDEX_FILE), render_index(&summary)).await?;

    info!(
        successful = summary.successful,
        failed = summary.failed,
        chars = summary.total_chars,
        seconds = summary.total_time,
        "processing complete"
    );

    Ok(summary)
}

/// Turns a finished task into its report. A panicked task becomes a failed
/// report for the document it was working on.
fn settle(
    joined: Result<(Id, (usize, DocumentReport)), JoinError>,
    in_flight: &mut HashMap<Id, (usize, PathBuf)>,
) -> Result<(usize, DocumentReport), KbError> {
    match joined {
        Ok((id, finished)) => {
            in_flight.remove(&id);
            Ok(finished)
        }
        Err(error) => {
            let (index, path) = in_flight
                .remove(&error.id())
                .ok_or_else(|| KbError::Worker(error.to_string()))?;
            warn!(path = %path.display(), reason = %error, "document worker died");
            Ok((
                index,
                DocumentReport {
                    name: display_name(&path),
                    file: path,
                    outcome: DocumentOutcome::Failed {
                        error: format!("extraction aborted: {error}"),
                    },
                },
            ))
        }
    }
}

async fn write_progress(
    output_dir: &Path,
    total: usize,
    reports: &[(usize, DocumentReport)],
) -> Result<(), KbError> {
    let results = reports
        .iter()
        .map(|(_, report)| report.clone())
        .collect::<Vec<_>>();
    let progress = Progress {
        completed: results.len(),
        total,
        results: &results,
    };
    tokio::fs::write(
        output_dir.join(PROGRESS_FILE),
        serde_json::to_string_pretty(&progress)?,
    )
    .await?;
    Ok(())
}

pub fn render_index(summary: &ProcessingSummary) -> String {
    let mut index = String::new();
    let _ = writeln!(index, "# Knowledge Base - Extracted PDFs\n");
    let _ = writeln!(index, "Generated: {}\n", summary.timestamp);
    let _ = writeln!(index, "## Summary");
    let _ = writeln!(index, "- **Total PDFs:** {}", summary.total_pdfs);
    let _ = writeln!(index, "- **Successful:** {}", summary.successful);
    let _ = writeln!(index, "- **Failed:** {}", summary.failed);
    let _ = writeln!(
        index,
        "- **Total Characters:** {}",
        group_thousands(summary.total_chars)
    );
    let _ = writeln!(index, "- **Workers:** {}", summary.workers);
    let _ = writeln!(
        index,
        "- **Processing Time:** {:.1} seconds\n",
        summary.total_time
    );
    let _ = writeln!(index, "## Documents\n");

    for report in &summary.results {
        match &report.outcome {
            DocumentOutcome::Success(document) => {
                let text_file = document
                    .text_file
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default();
                let _ = writeln!(index, "### ✅ {}", report.name);
                let _ = writeln!(index, "- **Pages:** {}", document.pages);
                let _ = writeln!(index, "- **Size:** {} MB", document.size_mb);
                let _ = writeln!(
                    index,
                    "- **Characters:** {}",
                    group_thousands(document.total_chars)
                );
                if document.failed_chunks > 0 {
                    let _ = writeln!(index, "- **Failed Chunks:** {}", document.failed_chunks);
                }
                let _ = writeln!(index, "- **Text File:** [{text_file}]({text_file})");
                let _ = writeln!(
                    index,
                    "- **Processing Time:** {}s\n",
                    document.processing_time
                );
            }
            DocumentOutcome::Failed { error } => {
                let _ = writeln!(index, "### ❌ {}", report.name);
                let _ = writeln!(index, "- **Error:** {error}\n");
            }
        }
    }

    index
}

fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
