//! `llmrelay health`: probe backends once.

use std::collections::BTreeMap;

use clap::Args;
use colored::Colorize;
use llmrelay_core::Router;

use super::GlobalOpts;

#[derive(Args)]
pub struct HealthArgs {
    /// Only probe these backends (default: all).
    pub backends: Vec<String>,
}

pub async fn execute(opts: &GlobalOpts, args: HealthArgs) -> anyhow::Result<()> {
    let config = opts.load_config()?;
    let router = Router::from_config(&config)?;

    let results: BTreeMap<String, bool> = if args.backends.is_empty() {
        router.health_check_all().await
    } else {
        let mut results = BTreeMap::new();
        for name in &args.backends {
            match router.health_check(name).await {
                Some(healthy) => {
                    results.insert(name.clone(), healthy);
                }
                None => anyhow::bail!("unknown backend '{name}'"),
            }
        }
        results
    };

    if opts.json() {
        return super::print_json(&results);
    }

    println!("\n  🩺 Backend health:\n");
    for backend in router.backends() {
        let Some(healthy) = results.get(backend.name()) else {
            continue;
        };
        let marker = if *healthy {
            "🟢 ok".green().to_string()
        } else {
            "🔴 failed".red().to_string()
        };
        println!(
            "  {:<24} {:<12} {}",
            backend.name().bold(),
            marker,
            backend.default_model().dimmed()
        );
    }
    let healthy = results.values().filter(|ok| **ok).count();
    println!(
        "\n  {} {}/{} backend(s) healthy",
        "→".dimmed(),
        healthy,
        results.len()
    );
    Ok(())
}
