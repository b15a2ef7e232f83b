// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Sample data API server
//!
//! Serves the shipped components and exits with the code emitted by the
//! lifecycle: the signal number on SIGHUP, SIGINT or SIGTERM, 1 when startup
//! or the serve loop failed.

use anyhow::Result;
use api::{Server, ServerConfig, components::catalog};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    std::panic::set_hook(Box::new(|panic| {
        error!(%panic, "unhandled panic");
    }));

    info!("Starting sample data API server");

    let config = ServerConfig::from_env()?;

    let server = match Server::new(config, &catalog()).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to assemble server");
            std::process::exit(1);
        }
    };
    let lifecycle = std::sync::Arc::clone(server.lifecycle());

    // NOTE: the `#[tokio::main]` task does not run a worker future, we must spawn
    let code = match tokio::spawn(async move { server.run().await }).await? {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "server failed to start");
            lifecycle.exit_code().unwrap_or(1)
        }
    };

    info!(exit_code = code, "exiting");
    std::process::exit(code);
}
