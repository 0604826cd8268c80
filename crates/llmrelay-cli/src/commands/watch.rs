//! `llmrelay watch`: run the health monitor in the foreground.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use colored::Colorize;
use llmrelay_core::Router;

use super::GlobalOpts;

#[derive(Args)]
pub struct WatchArgs {
    /// Override the probe interval, in seconds.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Skip the initial probe cycle.
    #[arg(long)]
    pub no_initial: bool,
}

pub async fn execute(opts: &GlobalOpts, args: WatchArgs) -> anyhow::Result<()> {
    let mut config = opts.load_config()?;
    if let Some(secs) = args.interval {
        config.health_check_interval_secs = secs;
    }
    let router = Arc::new(Router::from_config(&config)?);

    if !opts.json() {
        println!(
            "\n  👀 Watching {} backend(s) every {}s (Ctrl-C to stop)",
            router.backends().len(),
            router.health_check_interval().as_secs()
        );
    }

    if !args.no_initial {
        router.health_check_all().await;
        report(opts, &router);
    }
    let mut reported = router.last_health_check();

    let monitor = router.spawn_health_monitor();
    let mut poll = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = poll.tick() => {
                let latest = router.last_health_check();
                if latest != reported {
                    reported = latest;
                    report(opts, &router);
                }
            }
        }
    }

    monitor.abort();
    if !opts.json() {
        println!("\n  {} Stopped.", "→".dimmed());
    }
    Ok(())
}

fn report(opts: &GlobalOpts, router: &Router) {
    let stats = router.provider_stats();
    if opts.json() {
        // One JSON document per line so the stream can be piped.
        println!(
            "{}",
            serde_json::json!({
                "checked_at": router.last_health_check(),
                "backends": stats,
            })
        );
        return;
    }
    if let Some(at) = router.last_health_check() {
        println!("\n  {} {}", "⏱".dimmed(), at.format("%H:%M:%S").to_string().dimmed());
    }
    super::stats::print_table(&stats);
}
