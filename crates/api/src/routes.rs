// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Routes module
//!
//! Builds the router from the bound operations of the API definition plus the
//! documentation endpoints. Unmatched requests fall back to a `NotFound`
//! envelope.

pub mod handlers;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    routing::{MethodFilter, MethodRouter, get},
};
use handlers::{dispatch, not_found};

use crate::{
    error::DefinitionError,
    helpers::MAX_REQUEST_BODY_SIZE,
    openapi::{openapi_spec, swagger_ui},
    state::ServerState,
};

/// Check a documented path template against the router's capture syntax
///
/// Every `{name}` must occupy a whole segment; the template is returned as is.
///
/// # Errors
///
/// Returns `DefinitionError::UnsupportedPathTemplate` otherwise.
pub fn normalize_route_path(path: &str) -> Result<String, DefinitionError> {
    let unsupported = |reason| DefinitionError::UnsupportedPathTemplate {
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(unsupported("path must start with '/'"));
    }

    for segment in path.split('/').skip(1) {
        if segment.starts_with([':', '*']) {
            return Err(unsupported("segments cannot start with ':' or '*'"));
        }
        if !segment.contains(['{', '}']) {
            continue;
        }
        let name = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| unsupported("placeholders must occupy a whole segment"))?;
        if name.is_empty() || name.contains(['{', '}']) {
            return Err(unsupported("placeholder name is invalid"));
        }
        if name.starts_with('*') {
            return Err(unsupported("wildcard placeholders are not supported"));
        }
    }

    Ok(path.to_string())
}

/// Template with placeholder names erased, two paths with the same shape
/// cannot be routed together
fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| if segment.starts_with('{') { "{}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// Paths registered so far, checked the way the router would reject them
#[derive(Debug, Default)]
struct RouteShapes {
    /// Shapes owned by the documentation endpoints
    reserved: BTreeSet<String>,
    /// Registered path of each shape
    paths: BTreeMap<String, String>,
    /// Capture used under each shaped prefix
    captures: BTreeMap<String, String>,
}

impl RouteShapes {
    fn reserve(&mut self, path: &str) {
        self.reserved.insert(path_shape(path));
        self.record_captures(path);
    }

    fn insert(&mut self, path: &str) -> Result<(), &'static str> {
        let shape = path_shape(path);
        if self.reserved.contains(&shape) {
            return Err("overlaps a documentation endpoint");
        }
        if let Some(existing) = self.paths.get(&shape)
            && existing != path
        {
            return Err("conflicts with another documented path");
        }
        if !self.record_captures(path) {
            return Err("names a capture differently than a path sharing its prefix");
        }
        self.paths.insert(shape, path.to_string());
        Ok(())
    }

    fn record_captures(&mut self, path: &str) -> bool {
        let mut prefix = String::new();
        for segment in path.split('/').skip(1) {
            prefix.push('/');
            if segment.starts_with('{') {
                let capture = self
                    .captures
                    .entry(prefix.clone())
                    .or_insert_with(|| segment.to_string());
                if capture != segment {
                    return false;
                }
                prefix.push_str("{}");
            } else {
                prefix.push_str(segment);
            }
        }
        true
    }
}

const DOCS_JSON_PATH: &str = "/swagger/{challenge}/api-docs.json";
const DOCS_UI_PATH: &str = "/swagger/{challenge}/api-docs";

/// Create application routes from the bound operations
///
/// # Errors
///
/// Returns `DefinitionError` for a path template or method the router cannot
/// express.
pub fn create_routes(state: &ServerState) -> Result<Router<ServerState>, DefinitionError> {
    // Documentation endpoints, gated by the challenge segment
    let docs_routes = Router::new()
        .route(DOCS_JSON_PATH, get(openapi_spec))
        .route(DOCS_UI_PATH, get(swagger_ui));

    let mut shapes = RouteShapes::default();
    shapes.reserve(DOCS_JSON_PATH);
    shapes.reserve(DOCS_UI_PATH);
    let mut method_routers: BTreeMap<String, MethodRouter<ServerState>> = BTreeMap::new();

    for route in state.definition().routes() {
        let path = normalize_route_path(route.path())?;

        if let Err(reason) = shapes.insert(&path) {
            return Err(DefinitionError::UnsupportedPathTemplate { path, reason });
        }

        let filter = MethodFilter::try_from(route.method().clone()).map_err(|_| {
            DefinitionError::UnsupportedMethod {
                method: route.method().clone(),
                path: path.clone(),
            }
        })?;

        let entry = Arc::new(route.clone());
        let handler = move |State(state): State<ServerState>, request: Request| {
            dispatch(state, Arc::clone(&entry), request)
        };

        let method_router = method_routers
            .remove(&path)
            .unwrap_or_else(MethodRouter::new);
        method_routers.insert(path, method_router.on(filter, handler));
    }

    let api_routes = method_routers
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            router.route(&path, method_router.fallback(not_found))
        });

    Ok(Router::new()
        .merge(docs_routes)
        .merge(api_routes.layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE)))
        .fallback(not_found))
}
