//! `dashctl`: replay a command script against a dashboard document
//!
//! Events are written to stdout as JSON lines; logs go to stderr.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dash_commands::{Command, Dispatcher, DispatcherConfig};
use dash_core::DashboardState;
use dash_filters::{Catalog, CatalogData};
use dash_persist::DocumentFormat;

#[derive(Parser, Debug)]
#[command(name = "dashctl", about = "Replay dashboard commands against a persisted document")]
struct Args {
    /// Dashboard document, in either schema
    document: PathBuf,

    /// Catalog metadata (display forms, date datasets, insights)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// JSON array of commands to dispatch in order
    #[arg(long)]
    script: Option<PathBuf>,

    /// Dispatcher configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective filters of every widget on the active tab at the end
    #[arg(long)]
    resolve: bool,

    /// Write the resulting document here
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Schema of the written document; defaults to the schema that was read
    #[arg(long, value_enum)]
    format: Option<Format>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Fluid,
    Sections,
}

impl From<Format> for DocumentFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Fluid => DocumentFormat::Fluid,
            Format::Sections => DocumentFormat::Sections,
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {} from {}", what, path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {} in {}", what, path.display()))
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    let (dashboard, read_format) = dash_persist::load(&args.document)
        .with_context(|| format!("Failed to load dashboard document {}", args.document.display()))?;
    info!("Loaded '{}' ({} document)", dashboard.title, read_format);

    let catalog = match &args.catalog {
        Some(path) => Catalog::from(read_json::<CatalogData>(path, "catalog")?),
        None => Catalog::new(),
    };
    let config = match &args.config {
        Some(path) => read_json::<DispatcherConfig>(path, "dispatcher config")?,
        None => DispatcherConfig::default(),
    };
    let commands: Vec<Command> = match &args.script {
        Some(path) => read_json(path, "command script")?,
        None => Vec::new(),
    };

    let mut dispatcher =
        Dispatcher::new(DashboardState::new(dashboard), catalog, config).context("Dashboard failed validation")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let total = commands.len();
    let mut rejected = 0usize;
    for (position, command) in commands.into_iter().enumerate() {
        let kind = command.kind();
        let outcome = dispatcher
            .dispatch(command)
            .with_context(|| format!("Command #{} ({}) hit a fault", position + 1, kind))?;
        if outcome.is_rejected() {
            rejected += 1;
        }
        for event in &outcome.events {
            writeln!(out, "{}", serde_json::to_string(event)?)?;
        }
    }
    info!("Dispatched {} command(s), {} rejected or stale", total, rejected);

    if args.resolve {
        print_effective_filters(&dispatcher, &mut out)?;
    }

    if let Some(path) = &args.output {
        let format = args.format.map(DocumentFormat::from).unwrap_or(read_format);
        dash_persist::save(path, &dispatcher.state().dashboard, format)
            .with_context(|| format!("Failed to save document to {}", path.display()))?;
    }
    Ok(())
}

fn print_effective_filters(dispatcher: &Dispatcher, out: &mut impl Write) -> Result<()> {
    let layout = &dispatcher.state().dashboard.active_tab().layout;
    for target in layout.filter_targets() {
        let line = match dispatcher.effective_filters(target.local_id) {
            Some(Ok(resolution)) => serde_json::json!({
                "widget": target.local_id,
                "filters": resolution.filters,
                "warnings": resolution.warnings,
            }),
            Some(Err(err)) => serde_json::json!({
                "widget": target.local_id,
                "error": err.to_string(),
            }),
            None => continue,
        };
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "dashctl",
            "dashboard.json",
            "--script",
            "edits.json",
            "--format",
            "sections",
            "-o",
            "out.json",
        ])
        .unwrap();
        assert_eq!(args.document, PathBuf::from("dashboard.json"));
        assert_eq!(args.script, Some(PathBuf::from("edits.json")));
        assert_eq!(args.format.map(DocumentFormat::from), Some(DocumentFormat::Sections));
        assert!(!args.resolve);
    }
}
