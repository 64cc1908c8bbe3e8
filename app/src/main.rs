//! `raidemo`: fetch intranet pages, chat over them, and evaluate canned answers.
//!
//! ## Commands
//!
//! - `prep`: fetch and cache every configured source
//! - `chat`: interactive question answering over the cached text
//! - `eval`: run groundedness and harmful-content evaluation over the scenario file
//! - `validate-scenarios`: check the scenario file without calling any service

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rai_core::config::AppConfig;
use tracing::Level;

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "raidemo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grounded chat and safety evaluation demo", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Project directory; relative config paths resolve against it
    #[arg(long, global = true, env = "RAIDEMO_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and cache all configured sources
    Prep,

    /// Ask questions about the cached sources
    Chat,

    /// Run groundedness and harmful-content evaluations
    Eval,

    /// Load the scenario file and list its queries
    ValidateScenarios {
        /// Scenario file (default: SCENARIOS_PATH or the bundled scenarios)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn load_config(base_dir: &Path) -> Result<AppConfig> {
    AppConfig::from_env(base_dir).context("Failed to load configuration")
}

/// `--verbose` wins over the configured `LOG_LEVEL`.
fn log_level(verbose: bool, configured: Option<&str>) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    configured.and_then(telemetry::parse_level).unwrap_or(Level::INFO)
}

/// Load configuration, then start logging at its level.
fn start(base_dir: &Path, verbose: bool, json: bool) -> Result<AppConfig> {
    let cfg = load_config(base_dir)?;
    telemetry::init_tracing(json, log_level(verbose, Some(cfg.log_level.as_str())));
    Ok(cfg)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::from_path(cli.base_dir.join(".env")).ok();

    match cli.command {
        Commands::Prep => commands::prep(&start(&cli.base_dir, cli.verbose, cli.json)?),
        Commands::Chat => commands::chat(&start(&cli.base_dir, cli.verbose, cli.json)?),
        Commands::Eval => commands::eval(&start(&cli.base_dir, cli.verbose, cli.json)?),
        Commands::ValidateScenarios { path } => {
            telemetry::init_tracing(cli.json, log_level(cli.verbose, None));
            let path = path.unwrap_or_else(|| {
                std::env::var("SCENARIOS_PATH")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(rai_core::config::DEFAULT_SCENARIOS_PATH))
            });
            let path = if path.is_absolute() {
                path
            } else {
                cli.base_dir.join(path)
            };
            commands::validate_scenarios(&path)
        }
    }
}
