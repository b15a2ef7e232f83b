// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0
#![allow(dead_code)]

//! Test fixtures for the API server
//!
//! A mocked seed endpoint, test-only components and helpers to start a server
//! on an OS-assigned port.

pub mod components;
pub mod seed;

use std::{net::SocketAddr, sync::Arc};

use api::{Catalog, Lifecycle, Server, ServerConfig};

/// Start a server built from `catalog`
pub async fn start(config: ServerConfig, catalog: &Catalog) -> (SocketAddr, Arc<Lifecycle>) {
    Server::new(config, catalog)
        .await
        .expect("Failed to create server")
        .run_for_testing()
        .await
        .expect("Failed to start test server")
}
