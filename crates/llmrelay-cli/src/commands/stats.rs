//! `llmrelay stats`: per-backend status and counters.

use clap::Args;
use colored::Colorize;
use llmrelay_core::{BackendStats, Router};

use super::{status_badge, GlobalOpts};

#[derive(Args)]
pub struct StatsArgs {
    /// Run one probe cycle before reporting.
    #[arg(long)]
    pub probe: bool,
}

pub async fn execute(opts: &GlobalOpts, args: StatsArgs) -> anyhow::Result<()> {
    let config = opts.load_config()?;
    let router = Router::from_config(&config)?;
    if args.probe {
        router.health_check_all().await;
    }

    let stats = router.provider_stats();
    if opts.json() {
        return super::print_json(&stats);
    }
    print_table(&stats);
    if let Some(at) = router.last_health_check() {
        println!(
            "\n  {} last probe {}",
            "→".dimmed(),
            at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

pub fn print_table(stats: &[BackendStats]) {
    println!(
        "\n  {:<20} {:<18} {:>8} {:>8} {:>8} {:>6}",
        "BACKEND".bold(),
        "STATUS".bold(),
        "TOTAL".bold(),
        "OK".bold(),
        "RATE".bold(),
        "FAILS".bold()
    );
    println!("  {}", "─".repeat(74).dimmed());
    for s in stats {
        println!(
            "  {:<20} {:<18} {:>8} {:>8} {:>7.1}% {:>6}",
            s.name,
            status_badge(s.status),
            s.total_requests,
            s.successful_requests,
            s.success_rate * 100.0,
            s.consecutive_failures
        );
    }
}
