//! Mock users API
//!
//! Serves generated users on both listing contracts:
//! - `GET /api/users` with filters, sort and paging
//! - `GET /api/users/paginated`
//! - `GET|PATCH /api/users/{id}`
//!
//! Usage: `cargo run --example mock_server [config.yaml]`
//! Logging follows `RUST_LOG` (default `info,tower_http=debug`).

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use userdeck::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => DeckConfig::from_yaml_file(&path)?,
        None => DeckConfig::default(),
    };

    println!(
        "🚀 Mock users API on http://{}/api ({} users)",
        config.server.bind_address(),
        config.server.record_count
    );

    MockServerBuilder::from_config(&config)
        .serve(&config.server.bind_address())
        .await
}
