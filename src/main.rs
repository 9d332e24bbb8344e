use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use doctext::config::log_filter;
use doctext::{DocumentConverter, DocumentKind, EpubTextExtractor, PdfTextExtractor, Settings};

#[derive(Debug, Parser)]
#[command(author, version, about = "Convert EPUB and PDF documents to plain text")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a file, or every EPUB/PDF under a directory
    Convert(ConvertArgs),
    /// Print document metadata as JSON
    Info(InfoArgs),
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// Input file or directory
    input: PathBuf,
    /// Output directory
    #[arg(short, long)]
    output: PathBuf,
    /// Write every output into the output directory, ignoring subdirectories
    #[arg(long)]
    flat: bool,
    /// Re-convert files whose output already exists
    #[arg(long)]
    overwrite: bool,
    /// Path to settings JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log filter, e.g. "debug" or "doctext=trace"
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Args)]
struct InfoArgs {
    /// EPUB or PDF file
    file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings are read before the subscriber exists, so their log_level can seed it
    let settings = match &cli.command {
        Commands::Convert(args) => match &args.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("Failed to load settings: {:?}", path))?,
            None => Settings::default(),
        },
        Commands::Info(_) => Settings::default(),
    };

    let level = match &cli.command {
        Commands::Convert(args) => args.log_level.clone(),
        Commands::Info(_) => None,
    }
    .unwrap_or_else(|| settings.log_level.clone());

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| log_filter(&level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Convert(args) => convert_command(args, settings),
        Commands::Info(args) => info_command(args),
    }
}

fn convert_command(args: ConvertArgs, mut settings: Settings) -> Result<()> {
    if args.flat {
        settings.preserve_structure = false;
    }
    if args.overwrite {
        settings.skip_existing = false;
    }
    info!("Settings: {}", settings);

    let mut converter = DocumentConverter::from_settings(&settings)
        .context("Failed to initialize document converter")?;

    let progress = |percent: u8, message: &str| info!("[{:>3}%] {}", percent, message);

    let success = if args.input.is_dir() {
        converter.convert_directory(&args.input, &args.output, &progress)
    } else {
        converter.convert_file(&args.input, &args.output, &progress)
    };

    println!("{}", converter.stats());

    if let Some(config_path) = &args.config {
        // --flat and --overwrite apply to this run only
        let mut persisted = Settings::load_or_default(config_path);
        persisted.last_input_path = Some(args.input.clone());
        persisted.last_output_path = Some(args.output.clone());
        if let Err(e) = persisted.save(config_path) {
            warn!("Could not save settings to {:?}: {}", config_path, e);
        }
    }

    if !success {
        bail!("Conversion of {:?} failed", args.input);
    }

    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    let json = match DocumentKind::from_path(&args.file) {
        Some(DocumentKind::Epub) => {
            let metadata = EpubTextExtractor::new().get_metadata(&args.file);
            serde_json::to_string_pretty(&metadata)?
        }
        Some(DocumentKind::Pdf) => {
            let extractor = PdfTextExtractor::new().context("Failed to initialize PDF extractor")?;
            serde_json::to_string_pretty(&extractor.get_metadata(&args.file))?
        }
        None => bail!("Unsupported file type: {}", display_name(&args.file)),
    };

    println!("{}", json);
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
