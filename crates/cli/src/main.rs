//! Command-line interface for bulk archive extraction.
//!
//! Extracts every ZIP archive under a directory in the background, removes
//! archives that are verifiably extracted, and inspects single archives.

use bulk_extractor::{
    format_size, ArchiveInfo, CleanupReport, CleanupStatus, Config, ConflictPolicy,
    CreateRequest, OperationRegistry, OperationSnapshot, OperationStatus, PathSandbox,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {pos} archives {wide_msg}";
const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}";

#[derive(Parser)]
#[command(name = "bulk-extract")]
#[command(version, about = "Extract every ZIP archive under a directory", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `UNZIP_*` environment configuration.
#[derive(Args)]
struct GlobalArgs {
    /// Only allow paths under this directory (default: home directory)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Disable the path sandbox
    #[arg(long, global = true)]
    allow_any_path: bool,

    /// Directory for operation logs
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Worker pool size for parallel extraction
    #[arg(long, global = true)]
    max_workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract all archives under a directory
    Extract {
        /// Directory to search for archives
        dir: PathBuf,

        /// Only look at the top level of the directory
        #[arg(long)]
        no_recursive: bool,

        /// Extract several archives at once
        #[arg(long)]
        parallel: bool,

        /// What to do when the destination exists: skip, overwrite, suffix
        #[arg(long, default_value = "skip")]
        policy: ConflictPolicy,

        /// Delete each archive once its extraction verifies
        #[arg(long)]
        delete_after: bool,

        /// Output the final operation as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete archives that are already fully extracted
    Cleanup {
        /// Directory to search for archives
        dir: PathBuf,

        /// Only look at the top level of the directory
        #[arg(long)]
        no_recursive: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether an archive is fully extracted
    Verify {
        /// Archive file to check
        archive: PathBuf,
    },

    /// Probe archive metadata
    Probe {
        /// Archive file to probe
        archive: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match load_config(&cli.global) {
        Ok(config) => match cli.command {
            Commands::Extract {
                dir,
                no_recursive,
                parallel,
                policy,
                delete_after,
                json,
            } => {
                let request = CreateRequest {
                    root: dir,
                    policy,
                    recursive: !no_recursive,
                    parallel,
                    delete_after,
                };
                handle_extract(&config, request, json).await
            }
            Commands::Cleanup {
                dir,
                no_recursive,
                json,
            } => handle_cleanup(&config, dir, !no_recursive, json),
            Commands::Verify { archive } => handle_verify(&config, archive),
            Commands::Probe { archive, json } => handle_probe(&config, archive, json),
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(global: &GlobalArgs) -> Result<Config, bulk_extractor::ConfigError> {
    let mut config = Config::from_env()?;
    if let Some(base_dir) = &global.base_dir {
        config.base_dir = Some(base_dir.clone());
    }
    if global.allow_any_path {
        config.allow_any_path = true;
    }
    if let Some(log_dir) = &global.log_dir {
        config.log_dir = log_dir.clone();
    }
    if let Some(max_workers) = global.max_workers {
        config.max_workers = max_workers;
    }
    config.resolve_log_dir()?;
    config.validate()?;
    debug!(?config, "configuration loaded");
    Ok(config)
}

async fn handle_extract(
    config: &Config,
    request: CreateRequest,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = OperationRegistry::new(config)?;
    let id = registry.create(request)?;

    let pb = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(style(SPINNER_TEMPLATE));
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut has_length = false;
    let snapshot = loop {
        let snapshot = registry
            .get(&id)
            .ok_or_else(|| format!("Operation {id} is no longer tracked"))?;

        if let (Some(total), false) = (snapshot.total, has_length) {
            pb.set_style(style(BAR_TEMPLATE));
            pb.set_length(total);
            has_length = true;
        }
        pb.set_position(snapshot.stats.found);
        if let Some(current) = &snapshot.current {
            pb.set_message(current.display().to_string());
        }

        if snapshot.is_terminal() {
            pb.finish_and_clear();
            break snapshot;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_operation(&snapshot);
    }

    if snapshot.status == OperationStatus::Error {
        return Err(snapshot
            .message
            .unwrap_or_else(|| "Operation failed".to_string())
            .into());
    }
    Ok(())
}

fn style(template: &str) -> ProgressStyle {
    match ProgressStyle::with_template(template) {
        Ok(style) => style.progress_chars("#>-"),
        Err(_) => ProgressStyle::default_spinner(),
    }
}

fn print_operation(snapshot: &OperationSnapshot) {
    for result in &snapshot.results {
        let relative = result
            .archive
            .strip_prefix(&snapshot.root)
            .unwrap_or(&result.archive);
        println!(
            "{:<5} {} - {}",
            result.status_label(),
            relative.display(),
            result.message
        );
        if let Some(delete) = &result.delete {
            println!("      delete: {}", delete.message);
        }
    }

    let stats = &snapshot.stats;
    println!();
    if let Some(message) = &snapshot.message {
        println!("{message}");
    }
    println!(
        "Found: {}  Extracted: {}  Skipped: {}  Failed: {}",
        stats.found, stats.success, stats.skipped, stats.failed
    );
    println!(
        "Files: {}  Size: {}",
        stats.total_files,
        format_size(stats.total_size)
    );
    if snapshot.delete_after {
        println!(
            "Deleted: {}  Delete failed: {}  Freed: {}",
            stats.deleted,
            stats.delete_failed,
            format_size(stats.freed_size)
        );
    }
    println!("Operation: {}", snapshot.id);
    println!("Log: {}", snapshot.log_path.display());
}

fn handle_cleanup(
    config: &Config,
    dir: PathBuf,
    recursive: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let sandbox = PathSandbox::from_config(config)?;
    let report = bulk_extractor::cleanup(&dir, recursive, &sandbox, &config.log_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_cleanup(&report);
    }
    Ok(())
}

fn print_cleanup(report: &CleanupReport) {
    if let Some(message) = &report.message {
        println!("{message}");
        return;
    }

    for item in &report.items {
        let label = match item.status {
            CleanupStatus::Deleted => "OK",
            CleanupStatus::Skipped => "SKIP",
            CleanupStatus::Error => "ERROR",
        };
        let relative = item.archive.strip_prefix(&report.root).unwrap_or(&item.archive);
        println!("{:<5} {} - {}", label, relative.display(), item.message);
    }

    let stats = &report.stats;
    println!();
    println!(
        "Found: {}  Deleted: {}  Skipped: {}  Failed: {}",
        stats.found, stats.deleted, stats.skipped, stats.failed
    );
    println!("Freed: {}", format_size(stats.freed_size));
    println!("Operation: {}", report.id);
    if let Some(log_path) = &report.log_path {
        println!("Log: {}", log_path.display());
    }
}

fn handle_verify(config: &Config, archive: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let archive = PathSandbox::from_config(config)?.confine(&archive)?;
    let verification = bulk_extractor::verify(&archive);

    println!("Archive: {}", verification.archive.display());
    println!("Size: {}", format_size(verification.archive_size));
    println!("Extracted: {}", if verification.extracted { "yes" } else { "no" });
    println!("Can delete: {}", if verification.can_delete { "yes" } else { "no" });
    println!("{}", verification.message);
    Ok(())
}

fn handle_probe(
    config: &Config,
    archive: PathBuf,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let archive = PathSandbox::from_config(config)?.confine(&archive)?;
    let info = bulk_extractor::probe(&archive)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_probe(&info);
    }
    Ok(())
}

fn print_probe(info: &ArchiveInfo) {
    for entry in &info.entries {
        let kind = if entry.is_symlink {
            "link"
        } else if entry.is_directory {
            "dir"
        } else {
            "file"
        };
        println!("{:<5} {:>12} {}", kind, entry.size, entry.name);
    }
    println!();
    println!("Entries: {}  Files: {}", info.entries.len(), info.file_count());
    println!(
        "Compressed: {}  Uncompressed: {}",
        format_size(info.compressed_bytes),
        format_size(info.uncompressed_total)
    );
}
