//! Echo round trip against a running analysis backend.
//!
//! Demonstrates:
//! - Building a client from a page URL
//! - Listening for echoed signals and action status
//! - Surviving a backend restart through reconnect
//!
//! Usage:
//!   cargo run --example echo_client
//!   cargo run --example echo_client -- --debug
//!   cargo run --example echo_client -- --page http://localhost:5000/parameters/index.html

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};
use signalbus::{Client, ConnectionState, Result};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_PAGE: &str = "http://localhost:5000/parameters/index.html";

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    page: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let page = args
            .iter()
            .position(|a| a == "--page")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .unwrap_or_else(|| DEFAULT_PAGE.to_string());

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            page,
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "signalbus=debug"
    } else {
        "signalbus=info"
    };

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

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Echo Client ===\n");

    let client = Client::builder()
        .page_url(&args.page)
        .on_error(|message| match message {
            Some(message) => println!("[Status] {message}"),
            None => println!("[Status] connected"),
        })
        .request_arg("data", "requestargtest")
        .build()?;

    println!("[Setup] Socket URL: {}", client.url());

    client.on("test_fn", |load: &Value| println!("[Echo]   test_fn {load}"));
    client.on("test_action_ack", |_: &Value| println!("[Echo]   test_action acknowledged"));
    client.on_data("cli_args", |args: &Value| println!("[Data]   cli_args {args}"));

    client.wait_for_state(ConnectionState::Open).await?;
    println!("[Setup] Open, session {:?}\n", client.session_id());

    client.send("test_fn", json!([1, 2]))?;
    client.send("test_fn", "")?;
    client.send("test_fn", Value::Null)?;

    client.send_action("test_action", json!({}), |status: &Value| {
        println!("[Action] {status}");
    })?;

    println!("\nPress Ctrl+C to exit. Restart the backend to watch the reconnect.");
    let _ = tokio::signal::ctrl_c().await;

    client.disconnect()?;
    client.shutdown();
    Ok(())
}
