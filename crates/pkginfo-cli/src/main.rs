//! pkginfo - Package settings report
//!
//! Loads a device package settings document, aggregates packages, owner
//! identities and permissions, and prints a text or JSON report.

mod config;
mod report;

use anyhow::Result;
use clap::Parser;
use pkginfo_core::{PackageDatabase, Severity};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pkginfo")]
#[command(about = "Summarize installed packages, user ids and permissions from packages.xml")]
#[command(version)]
struct Args {
    /// Package settings document (overrides the config file)
    input: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, default_value = "pkginfo.toml")]
    config: PathBuf,

    /// Output format (text, json)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Log level (trace, debug, info, warn, error; overrides the config file)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before logging starts; its load message is reported below
    let config_found = args.config.exists();
    let mut config = config::load_config(&args.config)?;
    if let Some(log_level) = args.log_level {
        config.output.log_level = log_level;
    }

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&config.output.log_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("pkginfo v{}", env!("CARGO_PKG_VERSION"));
    info!(
        path = %args.config.display(),
        found = config_found,
        level = %config.output.log_level,
        "Configuration resolved"
    );

    if let Some(input) = args.input {
        config.input.path = input.display().to_string();
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }

    let section = read_section(Path::new(&config.input.path))?;
    let result = PackageDatabase::load_section(section.as_deref());

    if config.output.diagnostics {
        for diagnostic in &result.diagnostics {
            let label = match diagnostic.severity() {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            eprintln!("{}[{}]: {}", label, diagnostic.level(), diagnostic);
        }
    }

    match config.output.format {
        OutputFormat::Text => print!("{}", report::render_text(&result.database)?),
        OutputFormat::Json => {
            let value = report::render_json(&result.database, &result.diagnostics);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

/// Map a level name to a tracing level; unknown names fall back to warn
fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

/// Read the document; a file that does not exist is a missing section, not an error
fn read_section(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            info!(path = %path.display(), bytes = content.len(), "Read package settings");
            Ok(Some(content))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
