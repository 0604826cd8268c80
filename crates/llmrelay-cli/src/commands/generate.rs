//! `llmrelay generate`: send one prompt through the failover chain.

use std::io::Read;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use colored::Colorize;
use llmrelay_core::{Router, RouterError};

use super::GlobalOpts;

#[derive(Args)]
pub struct GenerateArgs {
    /// Prompt text; `-` reads it from stdin.
    pub prompt: String,

    /// Model override, applied to whichever backend serves the request.
    #[arg(long, short)]
    pub model: Option<String>,

    /// Completion token limit.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[arg(long, short)]
    pub temperature: Option<f32>,

    /// Extra provider parameter as KEY=VALUE (VALUE parsed as JSON if possible).
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

pub async fn execute(opts: &GlobalOpts, args: GenerateArgs) -> anyhow::Result<()> {
    let config = opts.load_config()?;
    let router = Router::from_config(&config)?;

    let prompt = if args.prompt == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read prompt from stdin")?;
        buf
    } else {
        args.prompt
    };

    let mut request = router.request(prompt);
    if let Some(model) = args.model {
        request = request.model(model);
    }
    if let Some(max_tokens) = args.max_tokens {
        request = request.max_tokens(max_tokens);
    }
    if let Some(temperature) = args.temperature {
        request = request.temperature(temperature);
    }
    for param in &args.params {
        let (key, value) = parse_param(param)?;
        request = request.extra(key, value);
    }

    let spinner = (!opts.json()).then(|| {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_message("generating...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = router.generate(&request).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }

    match result {
        Ok(generation) => {
            if opts.json() {
                super::print_json(&generation)?;
            } else {
                println!("{}", generation.text);
                eprintln!("\n  {} via {}", "→".dimmed(), generation.backend.cyan());
            }
            Ok(())
        }
        Err(RouterError::AllBackendsFailed { failures }) if !opts.json() => {
            eprintln!("  {} All backends failed:", "✗".red().bold());
            for failure in &failures {
                eprintln!(
                    "    {} {}: {}",
                    "•".dimmed(),
                    failure.backend.bold(),
                    failure.message.dimmed()
                );
            }
            if failures.is_empty() {
                eprintln!("    {} no backend was eligible", "•".dimmed());
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Split `KEY=VALUE`; values that are not valid JSON become strings.
fn parse_param(raw: &str) -> anyhow::Result<(String, serde_json::Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("invalid parameter '{raw}', expected KEY=VALUE"))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}
