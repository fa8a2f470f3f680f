mod args;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fu_generate::{DataLayout, GenerateError};
use fu_units::{FlowRegistry, PathLayout, UnitsError};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::args::{UsageError, parse_convert_args};

#[derive(Parser)]
#[command(name = "fu-cli")]
#[command(about = "FlowUnits CLI - unit conversion for energy and commodity flows", long_about = None)]
struct Cli {
    /// Definitions directory (defaults to the bundled one)
    #[arg(long, global = true, env = "FLOWUNITS_DEFS")]
    defs: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a quantity: from <source> to <target> [--context <id>] [--json]
    Convert {
        /// Words of the conversion request; `--defs` must come before them
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
        words: Vec<String>,
    },
    /// Regenerate the definition files
    Generate {
        /// Output directory (defaults to <defs>/generated)
        path: Option<PathBuf>,
        /// Input data directory
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Print the units synthesized from a flow property table
    Flow {
        /// Path to a `property,value` CSV file
        csv: PathBuf,
        /// Flow id (defaults to the file stem)
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("usage: {0}")]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Units(#[from] UnitsError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Usage(_) => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}

type CliResult<T> = Result<T, CliError>;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let layout = cli.defs.map(PathLayout::new).unwrap_or_else(PathLayout::bundled);

    let result = match cli.command {
        Commands::Convert { words } => cmd_convert(layout, &words),
        Commands::Generate { path, data } => cmd_generate(layout, path, data),
        Commands::Flow { csv, id } => cmd_flow(layout, &csv, id),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

fn cmd_convert(layout: PathLayout, words: &[String]) -> CliResult<()> {
    let request = parse_convert_args(words)?;

    let flows: Vec<&str> = fu_generate::flows::SUPPORTED_FLOWS
        .into_iter()
        .filter(|id| layout.flow_file(id).is_file())
        .collect();
    let mut registry = FlowRegistry::bootstrap(layout)?;
    registry.define_flows(flows.iter().copied())?;
    debug!(flows = ?flows, "registry ready");

    let quantity = registry.convert_str(
        &request.source,
        &request.target,
        request.context.as_deref(),
    )?;
    let display = registry.format_quantity(&quantity)?;

    if request.json {
        let value = serde_json::json!({
            "source": request.source,
            "target": request.target,
            "context": request.context,
            "magnitude": quantity.magnitude,
            "display": display,
        });
        println!("{value}");
    } else {
        println!("{display}");
    }
    Ok(())
}

fn cmd_generate(layout: PathLayout, path: Option<PathBuf>, data: Option<PathBuf>) -> CliResult<()> {
    let out = path.unwrap_or_else(|| layout.generated());
    let data = data.map(DataLayout::new).unwrap_or_else(DataLayout::bundled);
    let registry = FlowRegistry::with_static(layout)?;

    let written = fu_generate::generate_all(&data, &registry, &out)?;
    println!("✓ Wrote {} files to {}", written.len(), out.display());
    Ok(())
}

fn cmd_flow(layout: PathLayout, csv: &Path, id: Option<String>) -> CliResult<()> {
    let id = match id {
        Some(id) => id,
        None => csv
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| UsageError(format!("cannot derive a flow id from {}", csv.display())))?,
    };
    let spec = fu_generate::flows::read_flow_spec(csv)?;
    let registry = FlowRegistry::with_static(layout)?;
    let block = registry.generate_flow_definitions(&id, &spec)?;
    print!("{block}");
    Ok(())
}
