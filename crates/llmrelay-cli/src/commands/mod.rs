//! CLI command definitions and dispatch.

pub mod config;
pub mod generate;
pub mod health;
pub mod init;
pub mod stats;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use llmrelay_core::{BackendStatus, RouterConfig};

const BANNER: &str = r#"
   llmrelay
   One prompt, many backends, ordered failover.
"#;

/// llmrelay CLI: multi-backend LLM routing.
#[derive(Parser)]
#[command(
    name = "llmrelay",
    version,
    about = "Route prompts across LLM backends with ordered failover",
    long_about = BANNER,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Router configuration file (TOML).
    #[arg(long, short, global = true, env = "LLMRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Show router logs on stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a prompt through the failover chain.
    Generate(generate::GenerateArgs),

    /// Probe every configured backend once.
    Health(health::HealthArgs),

    /// Show per-backend status and counters.
    Stats(stats::StatsArgs),

    /// Run the periodic health monitor until Ctrl-C.
    Watch(watch::WatchArgs),

    /// Inspect and validate configuration.
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Write a starter configuration file.
    Init(init::InitArgs),
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Execute the CLI command.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let opts = GlobalOpts {
        config_path: cli.config,
        output: cli.output,
        verbose: cli.verbose,
    };
    match cli.command {
        Commands::Generate(args) => generate::execute(&opts, args).await,
        Commands::Health(args) => health::execute(&opts, args).await,
        Commands::Stats(args) => stats::execute(&opts, args).await,
        Commands::Watch(args) => watch::execute(&opts, args).await,
        Commands::Config(cmd) => config::execute(&opts, cmd).await,
        Commands::Init(args) => init::execute(&opts, args).await,
    }
}

/// Global options shared by every command.
pub struct GlobalOpts {
    pub config_path: Option<PathBuf>,
    pub output: OutputFormat,
    pub verbose: bool,
}

impl GlobalOpts {
    pub fn json(&self) -> bool {
        self.output == OutputFormat::Json
    }

    /// Load the configuration and install logging.
    ///
    /// Lookup order: `--config` / `LLMRELAY_CONFIG`, then
    /// `~/.llmrelay/config.toml`, then the `*_API_KEY` environment variables.
    pub fn load_config(&self) -> anyhow::Result<RouterConfig> {
        let mut config = match &self.config_path {
            Some(path) => read_config(path)?,
            None => match RouterConfig::default_path().filter(|p| p.exists()) {
                Some(path) => read_config(&path)?,
                None => RouterConfig::from_env(),
            },
        };

        if config.telemetry.filter.is_none() {
            let filter = if self.verbose {
                "info,llmrelay_core=debug"
            } else {
                "warn"
            };
            config.telemetry.filter = Some(filter.into());
        }
        llmrelay_core::telemetry::init_telemetry(&config.telemetry)?;

        Ok(config)
    }
}

fn read_config(path: &Path) -> anyhow::Result<RouterConfig> {
    RouterConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Status marker used in text output.
pub fn status_badge(status: BackendStatus) -> String {
    match status {
        BackendStatus::Healthy => format!("🟢 {status}"),
        BackendStatus::Degraded => format!("🟡 {status}").yellow().to_string(),
        BackendStatus::RateLimited => format!("🟠 {status}").yellow().to_string(),
        BackendStatus::Unavailable => format!("🔴 {status}").red().to_string(),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
