use anyhow::{Context, Result};
use clap::Parser;
use netstitch::cli::{Cli, OutputFormat};
use netstitch::{
    render_text, ActivitySnapshot, AnalysisConfig, ProcessorRegistry, SignatureTable,
};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Config file first, then command-line overrides
fn load_config(args: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml(path)?,
        None => AnalysisConfig::default(),
    };

    if !args.kinds.is_empty() {
        config.kinds = args.kinds.clone();
    }
    if args.include_raw {
        config.include_raw = true;
    }
    if let Some(layout) = args.function_layout {
        config.function_layout = layout;
    }
    if let Some(path) = &args.signatures {
        config.signatures = Some(path.clone());
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(&args)?;
    let table = match &config.signatures {
        Some(path) => SignatureTable::from_toml(path)?,
        None => SignatureTable::default_table()?,
    };
    let options = config.process_options()?;

    let snapshot = ActivitySnapshot::from_file(&args.snapshot)?;
    tracing::debug!(activities = snapshot.len(), "loaded snapshot");

    let registry = ProcessorRegistry::new(&config.kinds, table, options);
    let merged = registry.process(&snapshot)?;

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&merged)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&merged)
                .context("Failed to serialize operations")?;
            println!("{}", json);
        }
    }

    Ok(())
}
