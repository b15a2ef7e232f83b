// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Convention-driven HTTP API server
//!
//! Components (injectables, middlewares and services) are picked from a
//! catalog by name or location glob and loaded in dependency order. Services
//! document their operations with `utoipa`; the merged document decides the
//! routes, each bound to a service method and a middleware chain, and drives
//! request validation.
//!
//! # Module Structure
//!
//! - [`config`]: Layered configuration with environment overrides
//! - [`dependencies`]: Component catalog and ordered loading with injection
//! - [`middleware`]: Middleware registry and the built-in `STANDARD` group
//! - [`service`]: Service trait and method resolution
//! - [`openapi`]: Document synthesis, route binding and documentation endpoints
//! - [`validator`]: Request validation against the document
//! - [`routes`]: Router assembly and request dispatch
//! - [`server`]: Lifecycle state machine, startup and coordinated shutdown
//! - [`components`]: Components shipped with the server
//! - [`error`]: Startup errors and client error envelopes

pub mod components;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod extractors;
pub mod helpers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod service;
pub mod services;
pub mod state;
pub mod validator;

pub use config::{Environment, ServerConfig};
pub use dependencies::{Catalog, ComponentFactory, Context, Instance};
pub use error::{ApiError, ServerError, ServerResult};
pub use helpers::{RequestHelper, ResponseHelper};
pub use middleware::{Middleware, MiddlewareError};
pub use server::{Lifecycle, Server, ShutdownCause};
pub use service::{RouteSpec, Service, ServiceError};
pub use shared_types::{GenericError, ServerStatus, SuccessfulResponse};
pub use state::ServerState;
