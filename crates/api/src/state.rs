// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server state management module
//!
//! Shared, read-only state handed to every request: the configuration, the
//! synthesized API definition and its precompiled request validator.

use std::sync::Arc;

use crate::{config::ServerConfig, openapi::ApiDefinition, validator::RequestValidator};

/// Shared application state
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Synthesized document and bound routes
    definition: Arc<ApiDefinition>,
    /// Request checks compiled from the document
    validator: Arc<RequestValidator>,
}

impl ServerState {
    /// Create new server state
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `definition` - Synthesized API definition
    /// * `validator` - Validator compiled from `definition`
    pub fn new(
        config: Arc<ServerConfig>,
        definition: Arc<ApiDefinition>,
        validator: Arc<RequestValidator>,
    ) -> Self {
        Self {
            config,
            definition,
            validator,
        }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Synthesized API definition
    pub fn definition(&self) -> &ApiDefinition {
        &self.definition
    }

    /// Request validator
    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }
}
