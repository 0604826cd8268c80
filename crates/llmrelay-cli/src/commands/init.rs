//! `llmrelay init`: write a starter configuration.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use colored::Colorize;
use llmrelay_core::RouterConfig;

use super::GlobalOpts;

#[derive(Args)]
pub struct InitArgs {
    /// Destination (defaults to `--config`, then ~/.llmrelay/config.toml).
    pub path: Option<PathBuf>,

    /// Preset to start from.
    #[arg(long, short, default_value = "multi-provider")]
    pub preset: String,

    /// Overwrite an existing file without asking.
    #[arg(long)]
    pub force: bool,
}

const HEADER: &str = "\
# llmrelay router configuration
#
# Backends are tried in descending `priority`. Keys may be given inline
# with `api_key` or read from the environment with `api_key_env`.
# `llmrelay config check` validates this file.

";

pub async fn execute(opts: &GlobalOpts, args: InitArgs) -> anyhow::Result<()> {
    let path = args
        .path
        .or_else(|| opts.config_path.clone())
        .or_else(RouterConfig::default_path)
        .context("cannot determine a config location; pass a path")?;

    if path.exists() && !args.force {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!("  Overwrite {}?", path.display()))
            .default(false)
            .interact()?;
        if !confirm {
            println!("  {} Cancelled.", "→".dimmed());
            return Ok(());
        }
    }

    let config = RouterConfig::preset(&args.preset)?;
    let body = format!("{HEADER}{}", config.to_toml_string()?);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!();
    println!(
        "  {} Created {} from preset {}",
        "✓".green().bold(),
        path.display().to_string().cyan(),
        args.preset.bold()
    );
    println!();
    println!("  Next steps:");
    println!("    1. Export the API keys named by each `api_key_env`");
    println!("    2. Run {} to verify", "llmrelay config check".green());
    println!(
        "    3. Run {} to send a prompt",
        "llmrelay generate \"Hello\"".green()
    );
    println!();
    Ok(())
}
