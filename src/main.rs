//! campusdesk session check - the authenticated-session core of the
//! campusdesk support dashboard.
//!
//! Wires the credential store, renewal client, and session guard together
//! and reports whether the stored session is currently usable. The
//! dashboard shell embeds the same guard in front of every protected view.

mod api;
mod auth;
mod config;
mod notify;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::HttpRenewalClient;
use auth::{FileTokenStore, Render, SessionGuard, TokenStore};
use config::Config;
use notify::TracingNotifier;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Set up logging with environment-based filter
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("campusdesk session check starting");

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    let store = FileTokenStore::open(config.token_dir()?)?;
    let store = Arc::new(Mutex::new(store));

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--clear" {
        store.lock().await.clear()?;
        println!("credential store cleared");
        return Ok(());
    }

    let base_url = std::env::var("CAMPUSDESK_API_URL")
        .unwrap_or_else(|_| config.api_base_url.clone());
    let renewal = HttpRenewalClient::new(base_url)?;

    let guard = SessionGuard::new(store, renewal, TracingNotifier, config.sign_in_route.clone());

    let generation = guard.mount().await;
    guard.resolve(generation).await;

    match guard.render().await {
        Render::Content => {
            println!("authorized");
            Ok(())
        }
        Render::Redirect(_) => {
            if let Some(route) = guard.take_redirect().await {
                println!("unauthorized - sign in at {route}");
            }
            std::process::exit(1);
        }
        Render::Loading => {
            // resolve() always lands on a terminal state for a live mount
            println!("unresolved");
            std::process::exit(2);
        }
    }
}
