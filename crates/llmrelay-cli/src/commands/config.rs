//! `llmrelay config`: inspect and validate configuration.

use clap::{Args, Subcommand};
use colored::Colorize;
use llmrelay_core::config::PRESET_NAMES;
use llmrelay_core::{BackendRegistry, RouterConfig};

use super::GlobalOpts;

const REDACTED: &str = "***";

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (API keys redacted).
    Show,
    /// Validate the configuration and check every backend's credential.
    Check,
    /// Print a named preset configuration.
    Preset(PresetArgs),
}

#[derive(Args)]
pub struct PresetArgs {
    /// Preset name; omit to list the available presets.
    pub name: Option<String>,
}

pub async fn execute(opts: &GlobalOpts, cmd: ConfigCommands) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => show(opts),
        ConfigCommands::Check => check(opts),
        ConfigCommands::Preset(args) => preset(opts, args),
    }
}

fn show(opts: &GlobalOpts) -> anyhow::Result<()> {
    let config = redacted(opts.load_config()?);
    if opts.json() {
        return super::print_json(&config);
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn check(opts: &GlobalOpts) -> anyhow::Result<()> {
    let config = opts.load_config()?;
    let registry = BackendRegistry::default();

    if let Err(e) = config.validate() {
        println!("  {} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }

    println!("\n  🔧 Backends:\n");
    let mut problems = 0;
    for backend in &config.backends {
        let name = backend.display_name();
        if !backend.enabled {
            println!("  {:<20} {}", name, "⚪ disabled".dimmed());
            continue;
        }
        if !registry.kinds().contains(&backend.kind.to_lowercase().as_str()) {
            problems += 1;
            println!(
                "  {:<20} {} unsupported type '{}'",
                name,
                "✗".red().bold(),
                backend.kind
            );
            continue;
        }
        match backend.resolve_credential(|var| std::env::var(var).ok()) {
            Ok(Some(_)) => println!(
                "  {:<20} {} priority {}",
                name,
                "✓".green().bold(),
                backend.priority
            ),
            Ok(None) => println!(
                "  {:<20} {} no API key, will be skipped",
                name,
                "⚠".yellow().bold()
            ),
            Err(e) => {
                problems += 1;
                println!("  {:<20} {} {}", name, "✗".red().bold(), e);
            }
        }
    }

    match registry.resolve(&config) {
        Ok(adapters) => {
            let order: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
            println!("\n  {} Failover order: {}", "→".dimmed(), order.join(" → ").cyan());
        }
        Err(e) => {
            println!("\n  {} {}", "✗".red().bold(), e);
            problems += 1;
        }
    }

    if problems > 0 {
        std::process::exit(1);
    }
    println!("  {} Configuration OK", "✓".green().bold());
    Ok(())
}

fn preset(opts: &GlobalOpts, args: PresetArgs) -> anyhow::Result<()> {
    let Some(name) = args.name else {
        if opts.json() {
            return super::print_json(&PRESET_NAMES);
        }
        println!("\n  Available presets:\n");
        for name in PRESET_NAMES {
            println!("    {} {}", "•".dimmed(), name.cyan());
        }
        return Ok(());
    };

    let config = RouterConfig::preset(&name)?;
    if opts.json() {
        return super::print_json(&config);
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}

/// Replace inline API keys so the config can be shared safely.
fn redacted(mut config: RouterConfig) -> RouterConfig {
    for backend in &mut config.backends {
        if backend.api_key.is_some() {
            backend.api_key = Some(REDACTED.into());
        }
    }
    config
}
