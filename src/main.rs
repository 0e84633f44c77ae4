//! pathagar - ePub catalog ingestion

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use pathagar::{
    CatalogStore, Config, ImportSummary, Importer, InMemoryCatalog, LocalFileStore, Reconciler,
    ReplaceStrategy, ResyncSummary, StorageStrategy, find_epubs, read_metadata,
};

#[derive(Parser)]
#[command(name = "pathagar")]
#[command(version, about = "Import ePub files into a book catalog", long_about = None)]
#[command(after_help = "EXAMPLES:
    pathagar add ~/Books                    Import every ePub under ~/Books
    pathagar add --link new/*.epub          Import as links to the original files
    pathagar resync -r always-link ~/Books  Point records at moved files
    pathagar info book.epub                 Show book metadata")]
struct Cli {
    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = "pathagar.toml")]
    config: PathBuf,

    /// Root directory for stored books and covers
    #[arg(long, value_name = "DIR")]
    media_root: Option<PathBuf>,

    /// Catalog file
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import ePub files, or directories containing them
    Add {
        /// Store links to the files instead of copies
        #[arg(short, long)]
        link: bool,

        /// Import files even when their path is already catalogued
        #[arg(short, long)]
        ignore_original_path: bool,

        #[arg(value_name = "ITEM", required = true)]
        items: Vec<PathBuf>,
    },

    /// Match files to catalog records by content and update their paths
    Resync {
        /// When to replace the stored file
        #[arg(short, long, value_enum)]
        replace_strategy: Option<ReplaceStrategy>,

        #[arg(value_name = "ITEM", required = true)]
        items: Vec<PathBuf>,
    },

    /// Show the metadata of an ePub without importing it
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> pathagar::Result<ExitCode> {
    let mut config = Config::load(&cli.config)?;
    if let Some(root) = cli.media_root {
        config = config.with_media_root(root);
    }
    if let Some(catalog) = cli.catalog {
        config = config.with_catalog_path(catalog);
    }

    match cli.command {
        Command::Add {
            link,
            ignore_original_path,
            items,
        } => {
            if link {
                config = config.with_storage(StorageStrategy::Link);
            }
            if ignore_original_path {
                config = config.with_skip_known_paths(false);
            }
            add(&config, &items)
        }
        Command::Resync {
            replace_strategy,
            items,
        } => {
            if let Some(strategy) = replace_strategy {
                config = config.with_replace_strategy(strategy);
            }
            resync(&config, &items)
        }
        Command::Info { file } => {
            show_info(&file)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn add(config: &Config, items: &[PathBuf]) -> pathagar::Result<ExitCode> {
    let mut catalog = InMemoryCatalog::load(&config.catalog_path)?;
    let known = if config.skip_known_paths {
        Some(&catalog as &dyn CatalogStore)
    } else {
        None
    };
    let paths = find_epubs(items, known)?;
    if paths.is_empty() {
        error!("no new .epub files found");
        return Ok(ExitCode::FAILURE);
    }

    let mut files = LocalFileStore::new(&config.media_root);
    let summary: ImportSummary =
        Importer::new(&mut catalog, &mut files, config.import_options()).import_many(&paths);
    catalog.save(&config.catalog_path)?;

    info!("catalog saved to {}", config.catalog_path.display());
    log_failures(summary.failed);
    Ok(ExitCode::SUCCESS)
}

fn resync(config: &Config, items: &[PathBuf]) -> pathagar::Result<ExitCode> {
    let paths = find_epubs(items, None)?;
    if paths.is_empty() {
        error!("no .epub files found");
        return Ok(ExitCode::FAILURE);
    }

    let mut catalog = InMemoryCatalog::load(&config.catalog_path)?;
    let mut files = LocalFileStore::new(&config.media_root);
    let summary: ResyncSummary =
        Reconciler::new(&mut catalog, &mut files, config.replace_strategy).resync_many(&paths);
    catalog.save(&config.catalog_path)?;

    info!("catalog saved to {}", config.catalog_path.display());
    log_failures(summary.failed);
    Ok(ExitCode::SUCCESS)
}

fn log_failures(failed: usize) {
    if failed > 0 {
        error!("{failed} files could not be processed, see the log above");
    }
}

fn show_info(path: &Path) -> pathagar::Result<()> {
    let meta = read_metadata(path)?;

    println!("File: {}", path.display());
    println!("Title: {}", meta.display_title());
    if !meta.creators.is_empty() {
        println!("Authors: {}", meta.creators.join(", "));
    }
    if let Some(ref language) = meta.language_code {
        println!("Language: {language}");
    }
    if !meta.publishers.is_empty() {
        println!("Publishers: {}", meta.publishers.join(", "));
    }
    if let Some(ref date) = meta.date {
        println!("Date: {date}");
    }
    if let Some(ref identifier) = meta.identifier
        && let Some(ref value) = identifier.value
    {
        println!("Identifier: {value}");
    }
    if !meta.subjects.is_empty() {
        println!("Subjects: {}", meta.subjects.join(", "));
    }
    if let Some(ref cover) = meta.cover_reference {
        println!("Cover: {cover}");
    }
    if let Some(ref summary) = meta.summary {
        let summary = summary.trim();
        if summary.chars().count() > 200 {
            let short: String = summary.chars().take(200).collect();
            println!("Summary: {short}...");
        } else {
            println!("Summary: {summary}");
        }
    }

    Ok(())
}
