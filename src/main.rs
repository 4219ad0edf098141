use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use quotefolio::cli::formatters;
use quotefolio::cli::{Cli, Commands};
use quotefolio::config::{self, Config};
use quotefolio::pricing;
use quotefolio::scheduler::RefreshScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quotefolio=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let path = match cli.config {
        Some(ref path) => path.clone(),
        None => config::default_path()
            .ok_or_else(|| anyhow!("cannot determine config directory, pass --config"))?,
    };

    match cli.command {
        Commands::Init { force } => handle_init(&path, force),
        Commands::Show => handle_show(&path, cli.json).await,
        Commands::Watch { interval } => handle_watch(&path, interval, cli.json).await,
    }
}

fn handle_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, config::SAMPLE_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!(
        "{} Wrote sample portfolio to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

fn load(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

async fn handle_show(path: &Path, json: bool) -> Result<()> {
    let config = load(path)?;
    if config.holdings.is_empty() {
        print!("{}", formatters::format_empty_portfolio());
        return Ok(());
    }

    let holdings = config.holdings()?;
    let scheduler_config = config.scheduler_config();
    let source =
        pricing::default_source(&scheduler_config.fetch).context("failed to build quote source")?;
    let scheduler = RefreshScheduler::new(source, holdings, scheduler_config);

    info!("Fetching quotes for {} holdings", config.holdings.len());
    let snapshot = scheduler
        .refresh_now()
        .await
        .context("failed to value portfolio")?;

    if json {
        println!(
            "{}",
            formatters::format_snapshot_json(&snapshot, Some(&scheduler.status()))
        );
    } else {
        print!(
            "{}",
            formatters::format_snapshot_table(&snapshot, &config.sectors)
        );
    }
    Ok(())
}

async fn handle_watch(path: &Path, interval: Option<u64>, json: bool) -> Result<()> {
    let config = load(path)?;
    if config.holdings.is_empty() {
        print!("{}", formatters::format_empty_portfolio());
        return Ok(());
    }

    let mut scheduler_config = config.scheduler_config();
    if let Some(secs) = interval {
        if secs == 0 {
            bail!("--interval must be positive");
        }
        scheduler_config.interval = Duration::from_secs(secs);
    }

    let every = scheduler_config.interval.as_secs();
    let holdings = config.holdings()?;
    let source =
        pricing::default_source(&scheduler_config.fetch).context("failed to build quote source")?;
    let scheduler = RefreshScheduler::new(source, holdings, scheduler_config);
    let mut passes = scheduler.subscribe();

    if !json {
        eprintln!(
            "{} Refreshing every {}s. Press Enter to refresh now, Ctrl-C to quit.",
            "ℹ".blue().bold(),
            every
        );
    }
    scheduler.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = passes.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&scheduler, &config.sectors, json);
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => {
                        debug!("Manual refresh requested");
                        scheduler.request_refresh();
                    }
                    Ok(None) | Err(_) => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}

fn render(scheduler: &RefreshScheduler, sectors: &[String], json: bool) {
    let status = scheduler.status();
    let snapshot = scheduler.current_snapshot();

    if json {
        if let Some(snapshot) = snapshot {
            println!("{}", formatters::format_snapshot_json(&snapshot, Some(&status)));
        }
        return;
    }

    if status.is_stale() {
        eprint!("{}", formatters::format_stale_notice(&status));
        return;
    }

    if let Some(snapshot) = snapshot {
        print!("{}", formatters::format_snapshot_table(&snapshot, sectors));
    }
}
