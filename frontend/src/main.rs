// frontend/src/main.rs

use airsync_frontend::sync::{Filter, SummaryBoard, ViewState};
use airsync_frontend::{ClientConfig, Dashboard, DashboardHandle, SyncError, logging};
use airsync_shared::DATE_FORMAT;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Terminal overview of node telemetry: live stream or one historical day.
#[derive(Debug, Parser)]
#[command(name = "airsync", version)]
struct Args {
    /// TOML config file (defaults to ./airsync.toml or $AIRSYNC_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Service base URL, e.g. http://localhost:3000
    #[arg(long)]
    base_url: Option<String>,

    /// Initial node (must be in the configured node list)
    #[arg(long)]
    node: Option<String>,

    /// Initial date (YYYY-MM-DD); omit for live mode
    #[arg(long)]
    date: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, SyncError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| SyncError::InvalidDate(raw.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ClientConfig::load_or_default(args.config.as_deref())?;
    if let Some(url) = args.base_url {
        config.set_base_url(url);
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    logging::init(&config.log_level);
    config.validate()?;

    let node = args.node.unwrap_or_else(|| config.default_node.clone());
    let initial = match args.date.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Filter::historical(node, parse_date(raw)?),
        _ => Filter::live(node),
    };

    tracing::info!(
        "[CONFIG] service {} (push {}), nodes {:?}, poll every {} ms",
        config.base_url,
        config.ws_url(),
        config.nodes,
        config.poll_interval_ms
    );

    let handle = Dashboard::from_config(config).spawn(initial)?;
    let view_printer = tokio::spawn(print_view(handle.view.clone()));
    let summary_printer = tokio::spawn(print_summary(handle.summary.clone()));

    println!("commands: node <id> | date <YYYY-MM-DD> | live | reset | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match handle_line(&handle, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("error: {e}"),
                }
            }
        }
    }

    handle.shutdown().await;
    view_printer.abort();
    summary_printer.abort();
    Ok(())
}

/// Returns `Ok(false)` when the user asked to quit.
async fn handle_line(handle: &DashboardHandle, line: &str) -> Result<bool, SyncError> {
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };

    match cmd {
        "" => {}
        "node" => handle.select_node(arg).await?,
        "date" if arg.is_empty() => handle.select_date(None).await?,
        "date" => handle.select_date(Some(parse_date(arg)?)).await?,
        "live" => handle.select_date(None).await?,
        "reset" => handle.reset().await?,
        "nodes" => println!("{}", handle.nodes().join(", ")),
        "quit" | "exit" => return Ok(false),
        other => println!("unknown command '{other}'"),
    }
    Ok(true)
}

async fn print_view(mut rx: watch::Receiver<ViewState>) {
    loop {
        println!("{}", render_view(&rx.borrow_and_update()));
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn print_summary(mut rx: watch::Receiver<SummaryBoard>) {
    loop {
        {
            let board = rx.borrow_and_update();
            let shown = board.shown();
            println!(
                "[{}] temperature {} | humidity {} | co2 {}",
                board.node_id,
                shown.temperature_label(),
                shown.humidity_label(),
                shown.co2_label()
            );
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

fn render_view(state: &ViewState) -> String {
    if state.loading {
        return format!("[{}] Fetching data for selected filters...", state.filter);
    }
    let readings = state.visible_readings();
    match readings.last() {
        None => format!("[{}] Waiting for data...", state.filter),
        Some(last) => format!(
            "[{}] {} readings, last at {}: {}°C {}% {} ppm",
            state.filter,
            readings.len(),
            last.timestamp.format("%H:%M:%S"),
            last.temperature,
            last.humidity,
            last.co2
        ),
    }
}
