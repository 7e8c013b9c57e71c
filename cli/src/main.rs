//! docingest CLI - run the ingestion pipeline over local files

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use docingest::parser::read_slides;
use docingest::{
    detect_image, detect_pdf, Capabilities, IngestBatch, IngestInput, IngestOptions, Ingestor,
    InputKind, InputStatus, LibreOfficeConverter, PagedDocument, PdfDocument, PopplerRasterizer,
};

#[derive(Parser)]
#[command(name = "docingest")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Turn documents into content units for indexing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest files as one batch and print the content units as JSON
    Ingest {
        /// Input files
        #[arg(value_name = "FILE", required = true)]
        inputs: Vec<PathBuf>,

        /// Collection identifier stamped on every unit
        #[arg(short, long)]
        collection: String,

        /// Item identifier stamped on every unit
        #[arg(short, long)]
        item: String,

        /// Treat every input as this kind instead of guessing from the extension
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Directory for per-batch working storage
        #[arg(long, value_name = "DIR", env = "DOCINGEST_WORK_DIR")]
        work_dir: Option<PathBuf>,

        /// Per table/image/slide ceiling in seconds
        #[arg(long, default_value = "20")]
        timeout: u64,

        /// Slide deck conversion ceiling in seconds
        #[arg(long, default_value = "120")]
        conversion_timeout: u64,

        /// Also drop page text overlapping extracted images
        #[arg(long)]
        suppress_image_text: bool,

        /// Parse pages on a single thread
        #[arg(long)]
        sequential: bool,

        /// pdftoppm executable
        #[arg(long, value_name = "PATH", env = "DOCINGEST_PDFTOPPM", default_value = "pdftoppm")]
        pdftoppm: PathBuf,

        /// LibreOffice executable
        #[arg(long, value_name = "PATH", env = "DOCINGEST_LIBREOFFICE", default_value = "libreoffice")]
        libreoffice: PathBuf,
    },

    /// Show what the pipeline sees in a file
    Info {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum KindArg {
    /// Raster image
    Image,
    /// PDF document
    Pdf,
    /// Slide deck
    Slides,
    /// Anything else
    Other,
}

impl From<KindArg> for InputKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Image => InputKind::Image,
            KindArg::Pdf => InputKind::Pdf,
            KindArg::Slides => InputKind::SlideDeck,
            KindArg::Other => InputKind::Other,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Ingest {
            inputs,
            collection,
            item,
            kind,
            output,
            compact,
            work_dir,
            timeout,
            conversion_timeout,
            suppress_image_text,
            sequential,
            pdftoppm,
            libreoffice,
        } => {
            let mut options = IngestOptions::new()
                .with_item_timeout(Duration::from_secs(timeout))
                .with_conversion_timeout(Duration::from_secs(conversion_timeout))
                .with_image_suppression(suppress_image_text)
                .with_parallel(!sequential);
            if let Some(dir) = work_dir {
                options = options.with_working_root(dir);
            }
            let caps = Capabilities::default()
                .with_rasterizer(PopplerRasterizer::new(pdftoppm))
                .with_converter(LibreOfficeConverter::new(libreoffice));

            cmd_ingest(
                &inputs,
                &collection,
                &item,
                kind,
                output.as_deref(),
                compact,
                options,
                caps,
            )
            .await
        }
        Commands::Info { input } => cmd_info(&input),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_ingest(
    inputs: &[PathBuf],
    collection: &str,
    item: &str,
    kind: Option<KindArg>,
    output: Option<&Path>,
    compact: bool,
    options: IngestOptions,
    caps: Capabilities,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut batch = IngestBatch::new(collection, item);
    for path in inputs {
        let mut input = IngestInput::from_path(path)?;
        if let Some(kind) = kind {
            input.kind = kind.into();
        }
        batch = batch.with_input(input);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Ingesting {} files...", inputs.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let ingestor = Ingestor::builder()
        .with_options(options)
        .with_capabilities(caps)
        .build();
    let outcome = ingestor.ingest(batch).await;
    spinner.finish_and_clear();
    let outcome = outcome?;

    let json = if compact {
        serde_json::to_string(&outcome.units)?
    } else {
        serde_json::to_string_pretty(&outcome.units)?
    };
    if let Some(path) = output {
        fs::write(path, &json)?;
        eprintln!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    eprintln!("\n{}", "Inputs".cyan().bold());
    for report in &outcome.reports {
        match &report.status {
            InputStatus::Completed { units } => {
                eprintln!("  {} {} ({} units)", "✓".green(), report.filename, units)
            }
            InputStatus::Empty => eprintln!("  {} {} (no content)", "∅".yellow(), report.filename),
            InputStatus::Failed { reason } => {
                eprintln!("  {} {}: {}", "✗".red(), report.filename, reason.red())
            }
        }
        for skipped in &report.skipped {
            eprintln!(
                "    {} {}: {}",
                "skipped".dimmed(),
                skipped.source,
                skipped.reason.dimmed()
            );
        }
    }
    eprintln!(
        "{} {} units from {}/{} inputs",
        "Total:".bold(),
        outcome.units.len(),
        outcome.succeeded(),
        outcome.reports.len()
    );

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let kind = InputKind::from_filename(&input.to_string_lossy());

    println!("{}", "Input Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Kind".bold(), kind);
    println!("{}: {} bytes", "Size".bold(), data.len());

    match kind {
        InputKind::Pdf => {
            let format = detect_pdf(&data)?;
            let doc = PdfDocument::from_bytes(&data)?;
            println!("{}: {}", "Format".bold(), format);
            println!("{}: {}", "Pages".bold(), doc.page_count());
        }
        InputKind::SlideDeck => match read_slides(&data) {
            Ok(slides) => {
                let with_notes = slides.iter().filter(|s| !s.notes.is_empty()).count();
                println!("{}: {}", "Slides".bold(), slides.len());
                println!("{}: {}", "With notes".bold(), with_notes);
            }
            Err(e) => println!("{}: {}", "Slides".bold(), e.to_string().yellow()),
        },
        InputKind::Image => {
            let format = detect_image(&data)?;
            println!("{}: {:?}", "Format".bold(), format);
        }
        InputKind::Other => {}
    }

    Ok(())
}
