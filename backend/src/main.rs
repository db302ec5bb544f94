// main.rs

use airsync_backend::simulator::simulate;
use airsync_backend::{AppState, web};
use axum::Router;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "airsync-backend", version)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Known sensor nodes (used by the simulator)
    #[arg(long, value_delimiter = ',', default_value = "ESP32-1,ESP32-2")]
    nodes: Vec<String>,

    /// Readings kept in memory
    #[arg(long, default_value_t = 50_000)]
    capacity: usize,

    /// Max readings returned by the recent-data endpoint
    #[arg(long, default_value_t = 500)]
    recent_limit: usize,

    /// Produce simulated readings every N ms
    #[arg(long)]
    simulate_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    // --- Shared state ---
    let state = Arc::new(AppState::new(args.capacity, args.recent_limit));

    // --- Background tasks ---
    if let Some(ms) = args.simulate_ms {
        let _sim = tokio::spawn(simulate(
            state.clone(),
            args.nodes.clone(),
            Duration::from_millis(ms.max(1)),
        ));
    }

    // --- Webserver ---
    let app: Router = web::router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!("[API] listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("[API] shutting down");
        })
        .await?;
    Ok(())
}
