// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Request and response helpers handed to middlewares and services
//!
//! Middlewares receive both helpers mutably: they may rewrite headers, set the
//! parsed payload or send a response themselves. Services read the request
//! through a shared borrow and may still send a response directly.

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, RawPathParams, Request},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use shared_types::GenericError;
use tracing::warn;

use crate::error::ApiError;

/// Upper bound on buffered request bodies, above the JSON payload limit
pub(crate) const MAX_REQUEST_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Read-side view of an incoming request
#[derive(Debug, Clone)]
pub struct RequestHelper {
    method: Method,
    path: String,
    route: String,
    path_params: HashMap<String, String>,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
    payload: Option<Value>,
    cookies: HashMap<String, String>,
}

impl RequestHelper {
    /// Create a helper for `method path` matched against the documented `route`
    pub fn new(method: Method, path: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            route: route.into(),
            path_params: HashMap::new(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            payload: None,
            cookies: HashMap::new(),
        }
    }

    /// Set the captured path parameters
    #[must_use]
    pub fn with_path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    /// Set the query string parameters
    #[must_use]
    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Set the request headers
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the raw request body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Buffer an axum request matched against the documented `route`
    pub(crate) async fn from_request(request: Request, route: &str) -> Result<Self, ApiError> {
        let (mut parts, body) = request.into_parts();

        let path_params = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(params) => params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(_) => HashMap::new(),
        };

        let helper = Self::new(parts.method.clone(), parts.uri.path(), route)
            .with_path_params(path_params)
            .with_query(parse_query(parts.uri.query()))
            .with_headers(parts.headers.clone());

        // The limit comes from the router's `DefaultBodyLimit`
        let body = Bytes::from_request(Request::from_parts(parts, body), &())
            .await
            .map_err(|rejection| {
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    ApiError::PayloadTooLarge {
                        limit: MAX_REQUEST_BODY_SIZE,
                    }
                } else {
                    ApiError::Body {
                        message: rejection.body_text(),
                    }
                }
            })?;

        Ok(helper.with_body(body))
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path as received
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Documented path template the request matched
    pub fn route(&self) -> &str {
        &self.route
    }

    /// One captured path parameter
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Every captured path parameter
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// One query string parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Every query string parameter
    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// One header as text, if present and valid ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Replace or add a header
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Raw request body
    pub fn raw_body(&self) -> &Bytes {
        &self.body
    }

    /// Body parsed by a body middleware
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Set the parsed body
    pub fn set_payload(&mut self, payload: Value) {
        self.payload = Some(payload);
    }

    /// Cookies parsed by the cookie middleware
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    /// One parsed cookie
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Set the parsed cookies
    pub fn set_cookies(&mut self, cookies: HashMap<String, String>) {
        self.cookies = cookies;
    }

    /// Method and path, attached to error details
    pub fn describe(&self) -> Value {
        json!({
            "method": self.method.as_str(),
            "path": self.path,
        })
    }
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .unwrap_or_default()
        .into_iter()
        .collect()
}

/// Write-side of a request: pending headers and, once sent, the response
#[derive(Debug, Default)]
pub struct ResponseHelper {
    headers: HeaderMap,
    sent: Option<Response>,
}

impl ResponseHelper {
    /// Create an empty response helper
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a response has been sent
    pub fn is_sent(&self) -> bool {
        self.sent.is_some()
    }

    /// Add a header to whatever response ends up being answered
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Pending headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Send `body` as JSON with `status`
    ///
    /// Only the first response is kept; later attempts are logged and
    /// ignored. Returns whether this call sent the response.
    pub fn send<T: Serialize>(&mut self, status: StatusCode, body: &T) -> bool {
        if self.is_sent() {
            warn!(%status, "response already sent, ignoring");
            return false;
        }
        self.sent = Some((status, Json(body)).into_response());
        true
    }

    /// Send `body` with 200
    pub fn ok<T: Serialize>(&mut self, body: &T) -> bool {
        self.send(StatusCode::OK, body)
    }

    /// Send an error envelope with `status`
    pub fn respond_with_error(&mut self, status: StatusCode, error: &GenericError) -> bool {
        self.send(status, error)
    }

    /// Send an error envelope with 400
    pub fn bad_request(&mut self, error: &GenericError) -> bool {
        self.respond_with_error(StatusCode::BAD_REQUEST, error)
    }

    /// Send a `NotFound` envelope with 404
    pub fn not_found(&mut self, message: impl Into<String>) -> bool {
        self.respond_with_error(
            StatusCode::NOT_FOUND,
            &GenericError::new("NotFound", message),
        )
    }

    pub(crate) fn take_sent(&mut self) -> Option<Response> {
        self.sent.take()
    }

    /// Apply the pending headers to `response` without overriding its own
    pub(crate) fn finish(self, mut response: Response) -> Response {
        for (name, value) in &self.headers {
            if !response.headers().contains_key(name) {
                response.headers_mut().insert(name.clone(), value.clone());
            }
        }
        response
    }
}
