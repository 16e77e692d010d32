//! `taskmaster-server`: in-memory TaskMaster REST server.
//!
//! # Usage
//!
//! ```bash
//! # Default address 0.0.0.0:8000, accepting the token `dev-token`
//! cargo run --bin taskmaster-server
//!
//! # Custom address and two users
//! cargo run --bin taskmaster-server -- --bind 127.0.0.1:9000 --token alice --token bob
//! ```

use std::sync::Arc;

use clap::Parser;
use taskmaster_server::api::{self, ApiState};
use taskmaster_server::config::{ServerCliArgs, ServerConfig};

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        users = config.tokens.len(),
        "starting taskmaster server"
    );

    let state = Arc::new(ApiState::new(&config.tokens));

    match api::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "taskmaster server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start taskmaster server");
            std::process::exit(1);
        }
    }
}
