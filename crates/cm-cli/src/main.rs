//! CLI entry point for the content migration engine.
//!
//! This binary inspects what migration runs left behind: persisted
//! manifests and the configuration they ran with. Runs themselves are
//! embedded in the host application through `cm-engine`.
//!
//! # Usage
//!
//! ```bash
//! cm-migrate [OPTIONS] <COMMAND>
//!
//! # Per-content-type progress of a run
//! cm-migrate summary runs/manifest.json
//!
//! # Everything that failed
//! cm-migrate errors runs/manifest.json
//!
//! # Entry listing as CSV
//! cm-migrate report runs/manifest.json --format csv --output entries.csv
//!
//! # Validate and print the effective configuration
//! cm-migrate config --file migration.json
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand, ValueEnum};
use cm_core::{Config, ContentType};
use cm_engine::{ManifestDocument, ManifestEntry, MigrationManifest, StatsSnapshot};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Inspect content migration manifests and configuration.
#[derive(Parser)]
#[command(name = "cm-migrate", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Display per-content-type status counts of a manifest.
    Summary {
        /// Path to the manifest file.
        manifest: Utf8PathBuf,
    },

    /// List run-level and per-entry errors of a manifest.
    Errors {
        /// Path to the manifest file.
        manifest: Utf8PathBuf,
    },

    /// Generate an entry report from a manifest.
    Report {
        /// Path to the manifest file.
        manifest: Utf8PathBuf,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,
    },

    /// Validate and print the effective configuration.
    Config {
        /// Configuration file (defaults are used if not specified).
        #[arg(short, long, env = "CM_MIGRATE_CONFIG")]
        file: Option<Utf8PathBuf>,
    },
}

/// Report output format.
#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    /// JSON format.
    Json,
    /// CSV format.
    Csv,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(level)
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Loads a manifest document, naming the file in the error.
fn load_manifest(path: &Utf8Path) -> color_eyre::Result<ManifestDocument> {
    let document = ManifestDocument::load(path)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load manifest {}: {}", path, e))?;
    info!(
        %path,
        migration_id = %document.migration_id,
        entries = document.entry_count(),
        "Loaded manifest"
    );
    Ok(document)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Prints per-content-type status counts and overall progress.
fn run_summary(path: &Utf8Path) -> color_eyre::Result<()> {
    let document = load_manifest(path)?;
    let manifest = MigrationManifest::from_document(&document);

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    writeln!(handle)?;
    writeln!(handle, "Migration Summary")?;
    writeln!(handle, "=================")?;
    writeln!(handle)?;
    writeln!(handle, "Plan:      {}", document.plan_id)?;
    writeln!(handle, "Migration: {}", document.migration_id)?;
    writeln!(handle)?;
    writeln!(
        handle,
        "{:<14} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Content type", "Total", "Migrated", "Skipped", "Errors", "Canceled", "Pending"
    )?;
    for (content_type, stats) in manifest.summary_by_type() {
        write_stats_row(&mut handle, content_type.label(), &stats)?;
    }

    let total = manifest.summary();
    write_stats_row(&mut handle, "All", &total)?;
    writeln!(handle)?;
    writeln!(handle, "Migration progress: {:.1}%", total.progress_percent())?;
    writeln!(handle, "Run-level errors:   {}", document.errors.len())?;
    Ok(())
}

fn write_stats_row(handle: &mut impl Write, label: &str, stats: &StatsSnapshot) -> std::io::Result<()> {
    writeln!(
        handle,
        "{:<14} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        label,
        stats.total,
        stats.migrated,
        stats.skipped,
        stats.errors,
        stats.canceled,
        stats.pending
    )
}

/// Prints run-level errors, then every entry that carries errors.
fn run_errors(path: &Utf8Path) -> color_eyre::Result<()> {
    let document = load_manifest(path)?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    writeln!(handle, "Run-level errors ({}):", document.errors.len())?;
    for error in &document.errors {
        writeln!(handle, "  [{}] {}", error.kind, error.message)?;
    }

    for (content_type, entries) in &document.partitions {
        let failed: Vec<&ManifestEntry> = entries.iter().filter(|e| !e.errors().is_empty()).collect();
        if failed.is_empty() {
            continue;
        }
        writeln!(handle)?;
        writeln!(handle, "{} ({}):", content_type.label(), failed.len())?;
        for entry in failed {
            writeln!(handle, "  {} ({})", entry.source().location, entry.status().label())?;
            for error in entry.errors() {
                writeln!(handle, "    [{}] {}", error.kind, error.message)?;
            }
        }
    }
    Ok(())
}

/// Generates an entry report in the specified format.
fn run_report(
    path: &Utf8Path,
    format: ReportFormat,
    output: Option<&Utf8Path>,
) -> color_eyre::Result<()> {
    let document = load_manifest(path)?;

    let content = match format {
        ReportFormat::Json => generate_json_report(&document)?,
        ReportFormat::Csv => generate_csv_report(&document),
    };

    if let Some(output_path) = output {
        std::fs::write(output_path.as_std_path(), &content)?;
        info!(path = %output_path, "Report written");
    } else {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        write!(handle, "{content}")?;
    }

    Ok(())
}

/// Validates the configuration and prints it as JSON.
fn run_config(file: Option<&Utf8Path>) -> color_eyre::Result<()> {
    let config = match file {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.validate()?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", serde_json::to_string_pretty(&config)?)?;
    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// One row of the entry report.
#[derive(serde::Serialize)]
struct ReportEntry<'a> {
    content_type: ContentType,
    #[serde(flatten)]
    entry: &'a ManifestEntry,
}

/// Generates a JSON report.
fn generate_json_report(document: &ManifestDocument) -> color_eyre::Result<String> {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Report<'a> {
        plan_id: Uuid,
        migration_id: Uuid,
        summary: StatsSnapshot,
        entries: Vec<ReportEntry<'a>>,
    }

    let manifest = MigrationManifest::from_document(document);
    let entries = document
        .partitions
        .iter()
        .flat_map(|(&content_type, entries)| {
            entries.iter().map(move |entry| ReportEntry {
                content_type,
                entry,
            })
        })
        .collect();

    let report = Report {
        plan_id: document.plan_id,
        migration_id: document.migration_id,
        summary: manifest.summary(),
        entries,
    };
    serde_json::to_string_pretty(&report)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize JSON: {}", e))
}

/// Generates a CSV report.
fn generate_csv_report(document: &ManifestDocument) -> String {
    use std::fmt::Write;

    let mut output = String::from(
        "content_type,source_id,source_location,mapped_location,destination_id,destination_location,status,error_count\n",
    );

    for (content_type, entries) in &document.partitions {
        for entry in entries {
            let source = entry.source();
            let (destination_id, destination_location) = entry
                .destination()
                .map(|d| (d.id.to_string(), escape_csv(&d.location.to_string())))
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "{},{},{},{},{},{},{},{}",
                content_type.identifier(),
                source.id,
                escape_csv(&source.location.to_string()),
                escape_csv(&entry.mapped_location().to_string()),
                destination_id,
                destination_location,
                entry.status().label(),
                entry.errors().len()
            );
        }
    }

    output
}

/// Escapes a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_owned()
    }
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Route to appropriate command
    match &cli.command {
        Commands::Summary { manifest } => run_summary(manifest),
        Commands::Errors { manifest } => run_errors(manifest),
        Commands::Report {
            manifest,
            format,
            output,
        } => run_report(manifest, *format, output.as_deref()),
        Commands::Config { file } => run_config(file.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use cm_core::{ContentId, ContentLocation, ContentReference};
    use cm_engine::manifest::ManifestError;

    use super::*;

    fn document() -> ManifestDocument {
        let manifest = MigrationManifest::with_ids(Uuid::from_u128(1), Uuid::from_u128(2));
        let partition = manifest.partition(ContentType::Project);

        let finance = partition.get_or_create(&ContentReference::from_location(
            ContentId::new(Uuid::from_u128(10)),
            ContentLocation::from_path("Finance"),
        ));
        finance.set_migrated(ContentReference::from_location(
            ContentId::new(Uuid::from_u128(20)),
            ContentLocation::from_path("Imported/Finance"),
        ));

        let sales = partition.get_or_create(&ContentReference::from_location(
            ContentId::new(Uuid::from_u128(11)),
            ContentLocation::from_path("Sales, EMEA"),
        ));
        sales.update(|entry| {
            entry.set_failed([ManifestError::new("item", "name already taken")]);
        });

        manifest.to_document()
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("Finance"), "Finance");
        assert_eq!(escape_csv("Sales, EMEA"), "\"Sales, EMEA\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_report_lists_every_entry() {
        let csv = generate_csv_report(&document());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("content_type,"));
        assert!(lines[0].contains(",destination_id,destination_location,"));
        assert!(lines[1].starts_with("project,"));
        assert!(lines[1].contains(",Imported/Finance,"));
        // Entries without a destination leave both destination columns empty.
        assert!(lines[2].contains(",,,"));
        assert!(lines[2].contains("\"Sales, EMEA\""));
        assert!(lines[2].ends_with(",1"));
    }

    #[test]
    fn test_json_report_includes_summary() {
        let json = generate_json_report(&document()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["summary"]["total"], 2);
        assert_eq!(value["summary"]["migrated"], 1);
        assert_eq!(value["entries"].as_array().unwrap().len(), 2);
        assert_eq!(value["entries"][0]["content_type"], "project");
    }
}
