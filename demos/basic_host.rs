//! Basic widget host against a simulated collector.
//!
//! Demonstrates:
//! - Building a host with the viewers, urgency and analytics widgets
//! - Receiving `join`, `activity` and `leave` on the collector side
//! - Broadcasting `stats` and watching the widgets re-render
//! - Graceful stop with a final activity flush
//!
//! Usage:
//!   cargo run --example basic_host
//!   cargo run --example basic_host -- --debug
//!   cargo run --example basic_host -- --server=wss://collector.example.com/ws

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use livepulse::testing::MockTransport;
use livepulse::{
    ContainerRef, MemoryContainer, PageSignal, Result, Visibility, WidgetConfig, WidgetHost,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    server: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            server: args
                .iter()
                .find_map(|a| a.strip_prefix("--server=").map(str::to_string)),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "livepulse=debug" } else { "livepulse=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    let outcome = match args.server {
        Some(server) => run_live(&server).await,
        None => run_simulated().await,
    };

    if let Err(e) = outcome {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

fn widgets() -> Vec<WidgetConfig> {
    vec![
        WidgetConfig::new("viewers").with_options(json!({ "minViewers": 2 })),
        WidgetConfig::new("urgency").with_options(json!({ "threshold": 8 })),
        WidgetConfig::new("analytics"),
    ]
}

fn print_container(container: &MemoryContainer) {
    for node in container.nodes() {
        let content = container.content(&node).unwrap_or_default();
        println!("    [{node}] {content}");
    }
}

// ============================================================================
// Simulated Collector
// ============================================================================

async fn run_simulated() -> Result<()> {
    println!("=== Basic Host (simulated collector) ===\n");

    let transport = MockTransport::new();
    let container = MemoryContainer::shared("sidebar");

    println!("[1] Building host...");
    let host = WidgetHost::builder()
        .server_url("ws://collector.local/ws")
        .website_id("demo-site")
        .widgets(widgets())
        .transport(transport.clone())
        .container(Arc::clone(&container) as ContainerRef)
        .build()?;
    println!("    Client: {}\n", host.connection().client_id());

    println!("[2] Starting...");
    host.start().await;
    let mut server = transport.next_server().await;
    if let Some(join) = server.recv_json().await {
        println!("    Collector received: {join}\n");
    }

    println!("[3] Broadcasting stats...");
    for active_users in [1, 4, 12] {
        server.send_json(&json!({
            "type": "stats",
            "websiteId": "demo-site",
            "activeUsers": active_users,
            "totalClicks": active_users * 7,
            "avgScrollPercentage": 48.5,
            "avgTimeOnPage": 73.0
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        println!("    activeUsers = {active_users}");
        print_container(&container);
    }
    println!();

    println!("[4] Simulating page activity...");
    host.record(PageSignal::Click);
    host.record(PageSignal::scroll(640.0, 1600.0));
    host.record(PageSignal::Click);
    host.record(PageSignal::Visibility(Visibility::Hidden));
    if let Some(activity) = server.recv_json().await {
        println!("    Collector received: {activity}\n");
    }
    host.record(PageSignal::Visibility(Visibility::Visible));

    println!("[5] Stopping...");
    host.stop().await;
    while let Some(message) = server.recv_json().await {
        println!("    Collector received: {message}");
    }
    println!("    Widgets left mounted: {}\n", container.nodes().len());

    println!("=== Done ===");
    Ok(())
}

// ============================================================================
// Live Collector
// ============================================================================

async fn run_live(server_url: &str) -> Result<()> {
    println!("=== Basic Host (live collector) ===\n");
    println!("    Server: {server_url}\n");

    let container = MemoryContainer::shared("sidebar");
    let host = WidgetHost::builder()
        .server_url(server_url)
        .website_id("demo-site")
        .widgets(widgets())
        .container(Arc::clone(&container) as ContainerRef)
        .build()?;

    host.start().await;
    println!("    State: {}", host.connection().state());
    println!("    Press Ctrl+C to stop\n");

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                println!("    State: {}", host.connection().state());
                print_container(&container);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    host.stop().await;
    println!("\n=== Done ===");
    Ok(())
}
