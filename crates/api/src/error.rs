// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error handling module
//!
//! Startup errors (`ServerError`, `LoadError`, `DefinitionError`) abort the
//! process before it listens. Request errors (`ApiError`) are mapped to the
//! `GenericError` envelope with the matching HTTP status.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use shared_types::GenericError;
use thiserror::Error;

use crate::{middleware::MiddlewareError, service::ServiceError};

/// Comprehensive error types for server operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Network binding errors
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        /// Socket address that failed to bind
        address: SocketAddr,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server startup errors
    #[error("Server startup failed: {source}")]
    Startup {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The serve loop stopped with an error after listening
    #[error("Server error: {source}")]
    Serve {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Starting the server failed; every concurrent caller shares this outcome
    #[error(transparent)]
    Start(Arc<ServerError>),

    /// A component could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The API definition is inconsistent with the loaded components
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// A spawned server task panicked or was cancelled
    #[error("Task join error: {source}")]
    TaskJoin {
        /// Underlying tokio join error
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Convenient From implementations for common async error types
impl From<tokio::task::JoinError> for ServerError {
    fn from(source: tokio::task::JoinError) -> Self {
        Self::TaskJoin { source }
    }
}

/// Errors raised while locating and instantiating components
#[derive(Error, Debug)]
pub enum LoadError {
    /// A declared dependency was not loaded before the component needing it
    #[error(
        "Failed to load Injectable ({missing_injectable_name}), make sure this is loaded. This may require changing the order in which the injectables are loaded."
    )]
    FailedToLoadInjectable {
        /// Name of the missing dependency
        missing_injectable_name: String,
    },

    /// A component requested by name is not registered
    #[error("Component {name} is not registered as a {kind}")]
    ComponentNotFound {
        /// Requested component name
        name: String,
        /// Kind the component was requested as
        kind: &'static str,
    },

    /// A location pattern is not a valid glob
    #[error("Invalid location pattern {pattern}: {source}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Underlying glob error
        #[source]
        source: glob::PatternError,
    },

    /// A constructor asked for a dependency it did not declare
    #[error("Component requested undeclared dependency {name}")]
    UndeclaredDependency {
        /// Requested name
        name: String,
    },

    /// A dependency exists but is not of the requested type
    #[error("Dependency {name} is not a {expected}")]
    UnexpectedType {
        /// Requested name
        name: String,
        /// Requested Rust type
        expected: &'static str,
    },

    /// A factory produced an instance of another kind than it is registered as
    #[error("Component {name} was registered as a {expected} but built a {actual}")]
    KindMismatch {
        /// Component name
        name: String,
        /// Registered kind
        expected: &'static str,
        /// Built kind
        actual: &'static str,
    },

    /// A constructor failed
    #[error("Failed to construct {name}: {message}")]
    Construct {
        /// Component name
        name: String,
        /// Error reported by the constructor
        message: String,
    },
}

/// Errors raised while binding the API definition to the loaded components
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// A documented operation does not name the service method handling it
    #[error(
        "`{method} {path}` was defined in the Open API Definition but did not specify a serviceMethod property under the method definition."
    )]
    MissingServiceMethod {
        /// HTTP method
        method: Method,
        /// Documented path
        path: String,
    },

    /// A service method reference is not `<ServiceName>.<ServiceMethod>`
    #[error(
        "`{method} {path}` has serviceMethod {reference} which is not of the form <ServiceName>.<ServiceMethod>"
    )]
    MalformedServiceMethod {
        /// HTTP method
        method: Method,
        /// Documented path
        path: String,
        /// Offending reference
        reference: String,
    },

    /// The referenced service is not loaded
    #[error("`{method} {path}` references service {service} which was not loaded")]
    UnknownService {
        /// HTTP method
        method: Method,
        /// Documented path
        path: String,
        /// Service name
        service: String,
    },

    /// The referenced service does not expose the method
    #[error("`{method} {path}` references method {service}.{service_method} which does not exist")]
    UnknownServiceMethod {
        /// HTTP method
        method: Method,
        /// Documented path
        path: String,
        /// Service name
        service: String,
        /// Method name
        service_method: String,
    },

    /// A middleware reference is not `<MiddlewareName>.<operation>`
    #[error(
        "`{method} {path}` has middleware {reference} which is not of the form <MiddlewareName>.<operation>"
    )]
    MalformedMiddleware {
        /// HTTP method
        method: Method,
        /// Documented path
        path: String,
        /// Offending reference
        reference: String,
    },

    /// The referenced middleware or operation is not loaded
    #[error("`{method} {path}` references middleware {reference} which was not loaded")]
    UnknownMiddleware {
        /// HTTP method
        method: Method,
        /// Documented path
        path: String,
        /// Offending reference
        reference: String,
    },

    /// A service declares a route that is missing from its documentation
    #[error("`{method} {path}` is routed to {service} but is not documented")]
    UndocumentedRoute {
        /// HTTP method
        method: Method,
        /// Declared path
        path: String,
        /// Declaring service
        service: String,
    },

    /// Two services declare the same route
    #[error("`{method} {path}` is declared more than once")]
    DuplicateRoute {
        /// HTTP method
        method: Method,
        /// Declared path
        path: String,
    },

    /// A path template cannot be expressed as router captures
    #[error("Path template {path} is not supported: {reason}")]
    UnsupportedPathTemplate {
        /// Documented path
        path: String,
        /// Why the template was rejected
        reason: &'static str,
    },

    /// The router cannot dispatch the documented method
    #[error("`{method} {path}` uses a method the router does not support")]
    UnsupportedMethod {
        /// HTTP method
        method: Method,
        /// Documented path
        path: String,
    },

    /// A schema in the document does not compile
    #[error("Invalid schema for {location} of `{method} {path}`: {message}")]
    InvalidSchema {
        /// HTTP method
        method: Method,
        /// Documented path
        path: String,
        /// Body or parameter the schema belongs to
        location: String,
        /// Compilation error
        message: String,
    },

    /// The generated document could not be serialized
    #[error("Failed to serialize the API definition: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One failed check of request validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Part of the request: `body`, `path`, `query`, `header` or `cookie`
    pub location: String,
    /// Parameter name, absent for the body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// What failed
    pub message: String,
}

/// Errors answered to a client
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request does not match the documented schemas
    #[error("Request validation failed")]
    Validation {
        /// Every failed check
        issues: Vec<ValidationIssue>,
        /// Method and path of the request
        request: Value,
    },

    /// A middleware rejected the request
    #[error(transparent)]
    Middleware(MiddlewareError),

    /// The service method failed
    #[error("{source}")]
    Service {
        /// Service failure
        source: ServiceError,
        /// Method and path of the request
        request: Value,
    },

    /// A handler stage panicked
    #[error("Internal server error: {message}")]
    Internal {
        /// Panic payload or failure description
        message: String,
    },

    /// No route matches the request
    #[error("Cannot {method} {path}")]
    NotFound {
        /// HTTP method
        method: Method,
        /// Request path
        path: String,
    },

    /// The documentation challenge did not match
    #[error("unauthorized access")]
    Unauthorized,

    /// The request body could not be read
    #[error("Failed to read request body: {message}")]
    Body {
        /// Reason
        message: String,
    },

    /// The request body exceeds the buffered size
    #[error("request body too large (max: {limit} bytes)")]
    PayloadTooLarge {
        /// Accepted size
        limit: usize,
    },
}

impl ApiError {
    /// HTTP status answered for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Service { .. } | Self::Body { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Middleware(e) => e.status_code(),
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Envelope answered for this error
    pub fn to_generic_error(&self) -> GenericError {
        match self {
            Self::Validation { issues, request } => {
                GenericError::new("ValidationError", self.to_string()).with_details(json!({
                    "errors": issues,
                    "request": request,
                }))
            }
            Self::Middleware(e) => e.to_generic_error(),
            Self::Service { source, request } => source.to_generic_error(request),
            Self::Internal { .. } => GenericError::new("InternalServerError", self.to_string()),
            Self::NotFound { .. } => GenericError::new("NotFound", self.to_string()),
            Self::Unauthorized => GenericError::new("Unauthorized", self.to_string()),
            Self::Body { .. } => GenericError::new("BadRequest", self.to_string()),
            Self::PayloadTooLarge { .. } => GenericError::new("PayloadTooLarge", self.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_generic_error())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_service_method_message() {
        let error = DefinitionError::MissingServiceMethod {
            method: Method::GET,
            path: "/data".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "`GET /data` was defined in the Open API Definition but did not specify a serviceMethod property under the method definition."
        );
    }

    #[test]
    fn failed_to_load_injectable_message() {
        let error = LoadError::FailedToLoadInjectable {
            missing_injectable_name: "sampleStore".to_string(),
        };
        assert!(
            error
                .to_string()
                .starts_with("Failed to load Injectable (sampleStore), make sure this is loaded.")
        );
    }

    #[test]
    fn unauthorized_envelope() {
        let error = ApiError::Unauthorized;
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            serde_json::to_value(error.to_generic_error()).unwrap(),
            json!({"errorCode": "Unauthorized", "errorMsg": "unauthorized access"})
        );
    }

    #[test]
    fn validation_envelope_lists_issues() {
        let error = ApiError::Validation {
            issues: vec![ValidationIssue {
                location: "query".to_string(),
                name: Some("page".to_string()),
                message: "is required".to_string(),
            }],
            request: json!({"method": "GET", "path": "/data"}),
        };
        let body = serde_json::to_value(error.to_generic_error()).unwrap();

        assert_eq!(body["errorCode"], "ValidationError");
        assert_eq!(body["errorDetails"]["errors"][0]["name"], "page");
        assert_eq!(body["errorDetails"]["request"]["path"], "/data");
    }

    #[tokio::test]
    async fn panicked_task_is_a_join_error() {
        let join_error = tokio::spawn(async { panic!("boom") }).await.unwrap_err();

        let error = ServerError::from(join_error);

        assert!(matches!(&error, ServerError::TaskJoin { source } if source.is_panic()));
        assert!(error.to_string().starts_with("Task join error"));
    }

    #[test]
    fn not_found_status() {
        let error = ApiError::NotFound {
            method: Method::DELETE,
            path: "/nope".to_string(),
        };
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_generic_error().error_msg, "Cannot DELETE /nope");
    }
}
