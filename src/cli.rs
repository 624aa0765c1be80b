use crate::{
    catalog::{Catalog, Resolution},
    config::AppConfig,
    relocate::{self, RelocateOptions, RelocationReport},
};
use anyhow::{Context, Result};
use clap::{builder::NonEmptyStringValueParser, Parser};
use std::{path::PathBuf, process::ExitCode};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Move an installed Epic Games Store game, and all of its DLC, to a new
/// location and update the launcher's manifests to match.
#[derive(Debug, Parser)]
#[command(name = "egs-mover", version)]
pub struct Cli {
    /// Part of the game's display name (case-insensitive)
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    pub name: String,

    /// Directory the game folder is moved into
    pub destination: PathBuf,

    /// Launcher manifest directory (defaults to the launcher's own location)
    #[arg(long, env = "EGS_MOVER_MANIFEST_DIR", value_name = "DIR")]
    pub manifest_dir: Option<PathBuf>,

    /// Config file to read instead of the per-user one
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Copy only; leave the original install directory in place
    #[arg(long)]
    pub skip_delete: bool,

    /// Show what would move without touching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print diagnostic output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Moved,
    NotFound,
    Ambiguous,
}

impl Outcome {
    fn code(self) -> u8 {
        match self {
            Outcome::Moved => 0,
            Outcome::NotFound => 2,
            Outcome::Ambiguous => 3,
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(&cli) {
        Ok(outcome) => ExitCode::from(outcome.code()),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(cli: &Cli) -> Result<Outcome> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let manifest_dir = config.resolve_manifest_dir(cli.manifest_dir.as_deref())?;
    let catalog = Catalog::load(&manifest_dir).context("build application catalog")?;
    if catalog.is_empty() {
        warn!(dir = %manifest_dir.display(), "no manifests found");
    } else {
        info!(count = catalog.len(), dir = %manifest_dir.display(), "manifests loaded");
    }

    let matched = match catalog.resolve(&cli.name) {
        Resolution::NotFound => {
            println!("No installed game matches \"{}\".", cli.name);
            return Ok(Outcome::NotFound);
        }
        Resolution::MultipleFound(matches) => {
            println!(
                "\"{}\" matches {} installed games; be more specific:",
                cli.name,
                matches.len()
            );
            for record in matches {
                println!("  {}", record.display_name);
            }
            return Ok(Outcome::Ambiguous);
        }
        Resolution::Found(record) => record,
    };

    let options = RelocateOptions {
        destination_root: cli.destination.clone(),
        skip_delete: cli.skip_delete || config.skip_delete,
        dry_run: cli.dry_run,
    };
    let report = relocate::relocate_group(&catalog, matched, &options)
        .with_context(|| format!("move {}", matched.display_name))?;
    print_report(&report, options.dry_run);
    Ok(Outcome::Moved)
}

fn print_report(report: &RelocationReport, dry_run: bool) {
    for member in &report.members {
        info!(app = %member.identity, "group member");
        println!("{}: {}", member.kind_label(), member.display_name);
    }

    if dry_run {
        println!(
            "Would move {} -> {}",
            report.source.display(),
            report.destination.display()
        );
        return;
    }

    let (files, bytes) = report
        .copy
        .map(|copy| (copy.files, copy.bytes))
        .unwrap_or_default();
    let verb = if report.source_deleted { "Moved" } else { "Copied" };
    println!(
        "{verb} {} -> {} ({files} files, {})",
        report.source.display(),
        report.destination.display(),
        format_bytes(bytes)
    );
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
