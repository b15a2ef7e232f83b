// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Middleware registry
//!
//! A middleware is a named group of operations. Routes reference operations
//! as `<Middleware>.<operation>` and run them in declaration order before the
//! request is validated. The built-in `STANDARD` group is always registered.

use std::{collections::BTreeMap, fmt, sync::Arc};

use axum::http::{HeaderValue, StatusCode, header};
use futures::future::BoxFuture;
use shared_types::GenericError;
use thiserror::Error;
use tracing::debug;

use crate::{
    extractors::{parse_cookies, parse_form_body, parse_json_body},
    helpers::{RequestHelper, ResponseHelper},
    service::{ResolveError, split_reference},
};

/// Name of the built-in middleware group
pub const STANDARD: &str = "STANDARD";

/// Result of one middleware operation
pub type MiddlewareResult = Result<(), MiddlewareError>;

/// Errors raised by middleware operations
#[derive(Debug, Error)]
pub enum MiddlewareError {
    /// The request body could not be parsed
    #[error("Invalid request body: {message}")]
    InvalidBody {
        /// Parser message with hint
        message: String,
    },

    /// The request body exceeds the accepted size
    #[error("request body too large: {size} bytes (max: {limit} bytes)")]
    PayloadTooLarge {
        /// Received size
        size: usize,
        /// Accepted size
        limit: usize,
    },

    /// The middleware has no such operation
    #[error("Middleware {middleware} has no operation {operation}")]
    UnknownOperation {
        /// Middleware name
        middleware: String,
        /// Requested operation
        operation: String,
    },

    /// Any other failure
    #[error("{message}")]
    Failed {
        /// Failure description
        message: String,
    },
}

impl MiddlewareError {
    /// HTTP status answered for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnknownOperation { .. } | Self::Failed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Envelope answered for this error
    pub fn to_generic_error(&self) -> GenericError {
        let code = match self {
            Self::InvalidBody { .. } => "InvalidBody",
            Self::PayloadTooLarge { .. } => "PayloadTooLarge",
            Self::UnknownOperation { .. } | Self::Failed { .. } => "InternalServerError",
        };
        GenericError::new(code, self.to_string())
    }
}

/// A named group of request/response adapters
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Registered name
    fn name(&self) -> &str;

    /// Operations routes may reference
    fn operations(&self) -> &[&'static str];

    /// Run `operation` against the request
    ///
    /// An operation may send a response through `response`; the remaining
    /// chain is then skipped and that response is answered.
    fn call<'a>(
        &'a self,
        operation: &'a str,
        request: &'a mut RequestHelper,
        response: &'a mut ResponseHelper,
    ) -> BoxFuture<'a, MiddlewareResult>;
}

/// Built-in `STANDARD` group: `cors`, `json`, `url` and `cookie`
#[derive(Debug, Default, Clone, Copy)]
pub struct Standard;

impl Middleware for Standard {
    fn name(&self) -> &str {
        STANDARD
    }

    fn operations(&self) -> &[&'static str] {
        &["cors", "json", "url", "cookie"]
    }

    fn call<'a>(
        &'a self,
        operation: &'a str,
        request: &'a mut RequestHelper,
        response: &'a mut ResponseHelper,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(run_standard(operation, request, response))
    }
}

async fn run_standard(
    operation: &str,
    request: &mut RequestHelper,
    response: &mut ResponseHelper,
) -> MiddlewareResult {
    match operation {
        "cors" => {
            response.set_header(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }
        "json" => {
            if let Some(payload) = parse_json_body(request.headers(), request.raw_body())? {
                request.set_payload(payload);
            }
        }
        "url" => {
            if let Some(payload) = parse_form_body(request.headers(), request.raw_body())? {
                request.set_payload(payload);
            }
        }
        "cookie" => {
            let cookies = parse_cookies(request.headers());
            request.set_cookies(cookies);
        }
        other => {
            return Err(MiddlewareError::UnknownOperation {
                middleware: STANDARD.to_string(),
                operation: other.to_string(),
            });
        }
    }
    Ok(())
}

/// An operation bound to its middleware, resolved once at startup
#[derive(Debug, Clone)]
pub struct MiddlewareRef {
    middleware: Arc<dyn Middleware>,
    operation: String,
}

impl MiddlewareRef {
    /// `<Middleware>.<operation>` form of this reference
    pub fn reference(&self) -> String {
        format!("{}.{}", self.middleware.name(), self.operation)
    }

    /// Run the referenced operation
    ///
    /// # Errors
    ///
    /// Returns the operation's `MiddlewareError`.
    pub async fn run(
        &self,
        request: &mut RequestHelper,
        response: &mut ResponseHelper,
    ) -> MiddlewareResult {
        debug!(middleware = %self.reference(), "running middleware");
        self.middleware
            .call(&self.operation, request, response)
            .await
    }
}

/// Loaded middlewares keyed by name
#[derive(Debug, Clone, Default)]
pub struct MiddlewareRegistry {
    middlewares: BTreeMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    /// Create a registry holding only the `STANDARD` group
    pub fn with_standard() -> Self {
        let mut registry = Self::default();
        registry.insert(STANDARD, Arc::new(Standard));
        registry
    }

    /// Register `middleware` under `name`, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
        self.middlewares.insert(name.into(), middleware);
    }

    /// Middleware registered under exactly `name`
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Middleware>> {
        self.middlewares.get(name)
    }

    /// Registered names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.middlewares.keys().map(String::as_str)
    }

    /// Resolve a `<Middleware>.<operation>` reference
    pub(crate) fn resolve(&self, reference: &str) -> Result<MiddlewareRef, ResolveError> {
        let (name, operation) = split_reference(reference).ok_or(ResolveError::Malformed)?;
        let middleware = self.get(name).ok_or(ResolveError::UnknownComponent)?;
        if !middleware.operations().iter().any(|op| *op == operation) {
            return Err(ResolveError::UnknownMember);
        }
        Ok(MiddlewareRef {
            middleware: Arc::clone(middleware),
            operation: operation.to_string(),
        })
    }
}
