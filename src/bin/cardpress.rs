use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use cardpress::{BatchOrchestrator, BatchSettings, Configurable, FailurePolicy, Palette, PaperFormat, Record};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cardpress", version, about = "Render identity cards to a print-ready PDF")]
struct Cli {
    /// Records JSON (array of records).
    #[arg(long)]
    records: PathBuf,

    /// Palette JSON (`{"primary": .., "secondary": .., "accent": ..}`).
    #[arg(long)]
    palette: PathBuf,

    /// Paper format.
    #[arg(long, value_enum, default_value_t = PaperFormat::Letter)]
    format: PaperFormat,

    /// Output directory.
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// Output file name, without extension.
    #[arg(long)]
    name: String,

    /// Batch settings JSON.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Organization name, overrides the settings file.
    #[arg(long)]
    organization: Option<String>,

    /// Failure policy, overrides the settings file.
    #[arg(long, value_enum)]
    on_failure: Option<FailurePolicy>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let records: Vec<Record> = read_json(&cli.records, "records")?;
    let palette: Palette = read_json(&cli.palette, "palette")?;
    let settings = batch_settings(&cli)?;

    let mut orchestrator = BatchOrchestrator::new(BatchSettings::default(), &cli.output);
    orchestrator.apply_settings(&settings);

    let outcome = orchestrator
        .run(&records, &palette, cli.format, &cli.name)
        .await
        .with_context(|| format!("render batch '{}'", cli.name))?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Settings file (or defaults) with command-line overrides applied.
fn batch_settings(cli: &Cli) -> anyhow::Result<BatchSettings> {
    let mut settings = match &cli.settings {
        Some(path) => read_json(path, "settings")?,
        None => BatchSettings::default(),
    };
    if let Some(name) = &cli.organization {
        settings.organization_name = name.clone();
    }
    if let Some(policy) = cli.on_failure {
        settings.failure_policy = policy;
    }
    Ok(settings)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("open {what} '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {what} JSON"))
}
