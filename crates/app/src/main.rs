mod server;
mod transport;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pdf_kb_core::{
    process_document, process_library, DocumentOutcome, KbConfig, PdfToolkit, ToolOutcome,
    DEFAULT_CONTEXT_CHARS, DEFAULT_MAX_CHARS_PER_CHUNK, DEFAULT_MAX_RESULTS,
    DEFAULT_OVERLAP_PAGES,
};
use serde::Serialize;
use server::ToolServer;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use transport::LineTransport;

#[derive(Parser)]
#[command(name = "pdf-kb", version, about = "Chunked PDF extraction and search")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print page count, file size and document info.
    Metadata {
        pdf_path: PathBuf,
    },
    /// Extract the text of a page range.
    Extract {
        pdf_path: PathBuf,
        /// First page (1-indexed).
        #[arg(long, default_value_t = 1)]
        start_page: u32,
        /// Last page, inclusive. Defaults to the end of the document.
        #[arg(long)]
        end_page: Option<u32>,
        /// Stop after this many characters of page text.
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Case-insensitive search with surrounding context.
    Search {
        pdf_path: PathBuf,
        query: String,
        #[arg(long, default_value_t = DEFAULT_CONTEXT_CHARS)]
        context_chars: usize,
        #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,
    },
    /// Plan page-range chunks under a character budget.
    Chunks {
        pdf_path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_CHARS_PER_CHUNK)]
        max_chars_per_chunk: usize,
        #[arg(long, default_value_t = DEFAULT_OVERLAP_PAGES)]
        overlap_pages: u32,
    },
    /// Extract one PDF into the output directory.
    Process {
        pdf_path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Extract every PDF of a library and write the summary and index.
    Batch {
        /// Folder holding the PDFs.
        #[arg(long, env = "PDF_KB_INPUT_DIR", default_value = ".")]
        input_dir: PathBuf,
        /// Explicit documents; replaces discovery in the input folder.
        #[arg(long = "document")]
        documents: Vec<PathBuf>,
        /// Descend into subfolders when discovering PDFs.
        #[arg(long, env = "PDF_KB_RECURSIVE", default_value_t = false)]
        recursive: bool,
        /// Documents processed at the same time.
        #[arg(long, env = "PDF_KB_WORKERS", default_value_t = 1)]
        workers: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Serve the PDF tools as line-delimited JSON-RPC on stdin/stdout.
    Serve,
}

#[derive(Args)]
struct OutputArgs {
    /// Where text files, sidecars and the index are written.
    #[arg(long, env = "PDF_KB_OUTPUT_DIR", default_value = "extracted")]
    output_dir: PathBuf,
    #[arg(long, env = "PDF_KB_MAX_CHARS_PER_CHUNK", default_value_t = DEFAULT_MAX_CHARS_PER_CHUNK)]
    max_chars_per_chunk: usize,
    /// Overlap between extraction chunks. Non-zero values repeat pages in the text file.
    #[arg(long, env = "PDF_KB_OVERLAP_PAGES", default_value_t = 0)]
    overlap_pages: u32,
}

impl OutputArgs {
    fn into_config(self) -> KbConfig {
        KbConfig {
            output_dir: self.output_dir,
            max_chars_per_chunk: self.max_chars_per_chunk,
            overlap_pages: self.overlap_pages,
            ..KbConfig::default()
        }
    }
}

/// Prints an operation outcome as JSON and reports whether it succeeded.
fn print_outcome<T: Serialize>(outcome: ToolOutcome<T>) -> anyhow::Result<bool> {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.is_success())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let toolkit = PdfToolkit::lopdf();

    let succeeded = match cli.command {
        Command::Metadata { pdf_path } => print_outcome(toolkit.metadata(&pdf_path).into())?,
        Command::Extract {
            pdf_path,
            start_page,
            end_page,
            max_chars,
        } => print_outcome(
            toolkit
                .extract_text(&pdf_path, start_page, end_page, max_chars)
                .into(),
        )?,
        Command::Search {
            pdf_path,
            query,
            context_chars,
            max_results,
        } => print_outcome(
            toolkit
                .search(&pdf_path, &query, context_chars, max_results)
                .into(),
        )?,
        Command::Chunks {
            pdf_path,
            max_chars_per_chunk,
            overlap_pages,
        } => print_outcome(
            toolkit
                .plan_chunks(&pdf_path, max_chars_per_chunk, overlap_pages)
                .into(),
        )?,
        Command::Process { pdf_path, output } => {
            let config = output.into_config();
            tokio::fs::create_dir_all(&config.output_dir).await?;

            let report =
                tokio::task::spawn_blocking(move || process_document(&toolkit, &pdf_path, &config))
                    .await?;

            match &report.outcome {
                DocumentOutcome::Success(document) => {
                    println!(
                        "{}: {} pages, {} chunks, {} chars -> {}",
                        report.name,
                        document.pages,
                        document.total_chunks,
                        document.total_chars,
                        document.text_file.display()
                    );
                    true
                }
                DocumentOutcome::Failed { error } => {
                    println!("{}: FAILED: {error}", report.name);
                    false
                }
            }
        }
        Command::Batch {
            input_dir,
            documents,
            recursive,
            workers,
            output,
        } => {
            let config = KbConfig {
                input_dir,
                documents: (!documents.is_empty()).then_some(documents),
                recursive,
                workers,
                ..output.into_config()
            };
            info!(started_at = %Utc::now().to_rfc3339(), "batch run");

            let summary = process_library(toolkit, &config).await?;
            if summary.failed > 0 {
                warn!(failed = summary.failed, "some documents could not be extracted");
            }
            println!(
                "{}/{} documents extracted, {} chars in {:.1}s -> {}",
                summary.successful,
                summary.total_pdfs,
                summary.total_chars,
                summary.total_time,
                config.output_dir.display()
            );
            true
        }
        Command::Serve => {
            ToolServer::new(toolkit).run(LineTransport::stdio()).await?;
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
