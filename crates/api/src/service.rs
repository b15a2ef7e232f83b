// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Service components
//!
//! A service documents its operations with utoipa and declares, per documented
//! operation, the `<Service>.<method>` handling it together with the
//! middleware chain to run first.

use std::{collections::BTreeMap, fmt, sync::Arc};

use axum::http::Method;
use futures::future::BoxFuture;
use sample_data::{SeedError, StoreError};
use serde_json::{Value, json};
use shared_types::GenericError;
use thiserror::Error;
use tracing::debug;

use crate::helpers::{RequestHelper, ResponseHelper};

/// Result of a service method
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised by service methods
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request is well formed but cannot be served
    #[error("{message}")]
    BadRequest {
        /// Reason
        message: String,
    },

    /// The sample data store failed
    #[error("Failed to access sample data: {0}")]
    Store(#[from] StoreError),

    /// Seeding failed
    #[error("Failed to seed sample data: {0}")]
    Seed(#[from] SeedError),

    /// The result could not be encoded
    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),

    /// The service has no such method
    #[error("Service {service} has no method {method}")]
    UnknownMethod {
        /// Service name
        service: String,
        /// Requested method
        method: String,
    },

    /// The service method panicked
    #[error("Service method panicked: {message}")]
    Panicked {
        /// Panic payload
        message: String,
    },
}

impl ServiceError {
    /// Short machine-readable code answered as `errorCode`
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BadRequest",
            Self::Store(_) => "StoreError",
            Self::Seed(_) => "SeedError",
            Self::Encode(_) => "EncodeError",
            Self::UnknownMethod { .. } => "UnknownServiceMethod",
            Self::Panicked { .. } => "ServiceError",
        }
    }

    /// Envelope answered for this error, with the request in the details
    pub fn to_generic_error(&self, request: &Value) -> GenericError {
        GenericError::new(self.error_code(), self.to_string()).with_details(json!({
            "request": request,
        }))
    }
}

/// Routing declaration for one documented operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    /// HTTP method
    pub method: Method,
    /// Documented path template
    pub path: String,
    /// `<Service>.<method>` handling the operation
    pub service_method: Option<String>,
    /// `<Middleware>.<operation>` references run before the service method
    pub service_middlewares: Vec<String>,
}

impl RouteSpec {
    /// Declare `method path` without a handler yet
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            service_method: None,
            service_middlewares: Vec::new(),
        }
    }

    /// Set the handling service method
    #[must_use]
    pub fn service_method(mut self, reference: impl Into<String>) -> Self {
        self.service_method = Some(reference.into());
        self
    }

    /// Append a middleware operation to the chain
    #[must_use]
    pub fn middleware(mut self, reference: impl Into<String>) -> Self {
        self.service_middlewares.push(reference.into());
        self
    }
}

/// A component exposing documented HTTP operations
pub trait Service: Send + Sync + fmt::Debug {
    /// Registered name
    fn name(&self) -> &str;

    /// Documentation of every operation of the service
    fn openapi(&self) -> utoipa::openapi::OpenApi;

    /// Routing declaration of every documented operation
    fn routes(&self) -> Vec<RouteSpec>;

    /// Methods routes may reference
    fn methods(&self) -> &[&'static str];

    /// Run `method`
    ///
    /// `Ok(None)` means the method produced no value. A method may also send
    /// its own response through `response`, which then takes precedence.
    fn call<'a>(
        &'a self,
        method: &'a str,
        request: &'a RequestHelper,
        response: &'a mut ResponseHelper,
    ) -> BoxFuture<'a, ServiceResult<Option<Value>>>;

    /// Work started once the server is listening
    fn on_listening(&self) -> Option<BoxFuture<'static, ()>> {
        None
    }
}

/// Why a `<Component>.<member>` reference could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolveError {
    /// Not exactly two non-empty dot-separated parts
    Malformed,
    /// No component registered under that name
    UnknownComponent,
    /// The component has no such member
    UnknownMember,
}

/// Split `<Component>.<member>` into its two non-empty parts
pub(crate) fn split_reference(reference: &str) -> Option<(&str, &str)> {
    let mut parts = reference.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(component), Some(member), None) if !component.is_empty() && !member.is_empty() => {
            Some((component, member))
        }
        _ => None,
    }
}

/// A service method resolved once at startup
#[derive(Debug, Clone)]
pub struct ServiceMethodRef {
    service: Arc<dyn Service>,
    method: String,
}

impl ServiceMethodRef {
    /// `<Service>.<method>` form of this reference
    pub fn reference(&self) -> String {
        format!("{}.{}", self.service.name(), self.method)
    }

    /// Invoke the referenced method
    ///
    /// # Errors
    ///
    /// Returns the method's `ServiceError`.
    pub async fn call(
        &self,
        request: &RequestHelper,
        response: &mut ResponseHelper,
    ) -> ServiceResult<Option<Value>> {
        debug!(service_method = %self.reference(), "invoking service method");
        self.service.call(&self.method, request, response).await
    }
}

/// Loaded services keyed by name
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    /// Register `service` under `name`, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, service: Arc<dyn Service>) {
        self.services.insert(name.into(), service);
    }

    /// Service registered under exactly `name`
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Service>> {
        self.services.get(name)
    }

    /// Number of loaded services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is loaded
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Loaded services with their names
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Service>)> {
        self.services.iter().map(|(name, s)| (name.as_str(), s))
    }

    /// Resolve a `<Service>.<method>` reference
    pub(crate) fn resolve(&self, reference: &str) -> Result<ServiceMethodRef, ResolveError> {
        let (name, method) = split_reference(reference).ok_or(ResolveError::Malformed)?;
        let service = self.get(name).ok_or(ResolveError::UnknownComponent)?;
        if !service.methods().iter().any(|m| *m == method) {
            return Err(ResolveError::UnknownMember);
        }
        Ok(ServiceMethodRef {
            service: Arc::clone(service),
            method: method.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use utoipa::openapi::OpenApiBuilder;

    use super::*;

    #[derive(Debug)]
    struct Echo;

    impl Service for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn openapi(&self) -> utoipa::openapi::OpenApi {
            OpenApiBuilder::new().build()
        }

        fn routes(&self) -> Vec<RouteSpec> {
            Vec::new()
        }

        fn methods(&self) -> &[&'static str] {
            &["echo"]
        }

        fn call<'a>(
            &'a self,
            _method: &'a str,
            request: &'a RequestHelper,
            _response: &'a mut ResponseHelper,
        ) -> BoxFuture<'a, ServiceResult<Option<Value>>> {
            Box::pin(async move { Ok(Some(Value::String(request.path().to_string()))) })
        }
    }

    #[test]
    fn references_need_exactly_two_parts() {
        assert_eq!(split_reference("InsertData.fetch"), Some(("InsertData", "fetch")));
        assert_eq!(split_reference("InsertData"), None);
        assert_eq!(split_reference("a.b.c"), None);
        assert_eq!(split_reference(".fetch"), None);
        assert_eq!(split_reference("InsertData."), None);
    }

    #[test]
    fn route_spec_builder() {
        let spec = RouteSpec::new(Method::POST, "/data")
            .service_method("InsertData.createNewData")
            .middleware("STANDARD.json");

        assert_eq!(spec.service_method.as_deref(), Some("InsertData.createNewData"));
        assert_eq!(spec.service_middlewares, ["STANDARD.json"]);
    }

    #[tokio::test]
    async fn resolves_and_calls() {
        let mut registry = ServiceRegistry::default();
        registry.insert("Echo", Arc::new(Echo));

        let target = registry.resolve("Echo.echo").unwrap();
        assert_eq!(target.reference(), "Echo.echo");

        let request = RequestHelper::new(Method::GET, "/hello", "/hello");
        let mut response = ResponseHelper::new();
        let value = target.call(&request, &mut response).await.unwrap();
        assert_eq!(value, Some(Value::String("/hello".to_string())));

        assert!(matches!(
            registry.resolve("Echo.shout"),
            Err(ResolveError::UnknownMember)
        ));
        assert!(matches!(
            registry.resolve("Other.echo"),
            Err(ResolveError::UnknownComponent)
        ));
    }

    #[test]
    fn error_envelope_carries_request() {
        let error = ServiceError::BadRequest {
            message: "page must be a number".to_string(),
        };
        let envelope = error.to_generic_error(&json!({"method": "GET", "path": "/data"}));

        assert_eq!(envelope.error_code, "BadRequest");
        assert_eq!(envelope.error_msg, "page must be a number");
        assert_eq!(
            envelope.error_details,
            Some(json!({"request": {"method": "GET", "path": "/data"}}))
        );
    }
}
