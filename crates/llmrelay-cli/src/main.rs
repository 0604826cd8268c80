//! llmrelay CLI: route prompts across LLM backends from the terminal.
//!
//! `llmrelay` loads a router configuration, sends prompts through the
//! failover chain and reports backend health.

mod commands;

use clap::Parser;
use commands::{execute, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    execute(cli).await
}
