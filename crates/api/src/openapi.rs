// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `OpenAPI` documentation module
//!
//! The document is synthesized once at startup from the documentation of every
//! loaded service. Each documented operation is bound to the service method and
//! middleware chain its service declared for it. The document is served as JSON
//! and through `Swagger UI`, both behind the configured challenge segment.

use std::{collections::BTreeMap, fmt};

use axum::{
    Json,
    extract::{Path, State},
    http::Method,
    response::Html,
};
use serde_json::Value;
use tracing::{debug, warn};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, OpenIdConnect, SecurityScheme},
};

use crate::{
    error::{ApiError, DefinitionError},
    middleware::{MiddlewareRef, MiddlewareRegistry},
    service::{ResolveError, RouteSpec, ServiceMethodRef, ServiceRegistry},
    state::ServerState,
};

/// Discovery document of the `openIdConnect` scheme
pub const OPENID_CONFIGURATION_URL: &str = "/.well-known/openid-configuration";

/// Root document every service document is merged into
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecuritySchemes),
    security(("openIdConnect" = []), ("accessToken" = []))
)]
struct BaseDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "openIdConnect",
            SecurityScheme::OpenIdConnect(OpenIdConnect::new(OPENID_CONFIGURATION_URL)),
        );
        components.add_security_scheme(
            "accessToken",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// A documented operation bound to its handler
#[derive(Debug, Clone)]
pub struct RouteEntry {
    method: Method,
    path: String,
    target: ServiceMethodRef,
    middlewares: Vec<MiddlewareRef>,
}

impl RouteEntry {
    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Documented path template
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Service method answering the operation
    pub fn target(&self) -> &ServiceMethodRef {
        &self.target
    }

    /// Middleware chain, in execution order
    pub fn middlewares(&self) -> &[MiddlewareRef] {
        &self.middlewares
    }
}

/// The synthesized document and the routes bound from it
#[derive(Clone)]
pub struct ApiDefinition {
    document: utoipa::openapi::OpenApi,
    json: Value,
    routes: Vec<RouteEntry>,
}

impl fmt::Debug for ApiDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiDefinition")
            .field("title", &self.document.info.title)
            .field("version", &self.document.info.version)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl ApiDefinition {
    /// Merge every service document and bind each documented operation
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError` when an operation names no service method,
    /// references a component or member that is not loaded, or when a service
    /// declares a route it does not document.
    pub fn synthesize(
        services: &ServiceRegistry,
        middlewares: &MiddlewareRegistry,
    ) -> Result<Self, DefinitionError> {
        let mut document = BaseDoc::openapi();
        let mut declared: BTreeMap<(String, String), (String, RouteSpec)> = BTreeMap::new();

        for (name, service) in services.iter() {
            document.merge(service.openapi());
            for spec in service.routes() {
                let key = (spec.path.clone(), spec.method.as_str().to_owned());
                if declared.contains_key(&key) {
                    return Err(DefinitionError::DuplicateRoute {
                        method: spec.method,
                        path: spec.path,
                    });
                }
                declared.insert(key, (name.to_string(), spec));
            }
        }

        let json = serde_json::to_value(&document)?;
        let mut routes = Vec::new();

        let paths = json.get("paths").and_then(Value::as_object);
        for (path, item) in paths.into_iter().flatten() {
            let Some(item) = item.as_object() else {
                continue;
            };
            for key in item.keys() {
                let Some(method) = operation_method(key) else {
                    continue;
                };
                let spec = declared
                    .remove(&(path.clone(), method.as_str().to_owned()))
                    .map(|(_, spec)| spec);
                routes.push(bind(method, path, spec, services, middlewares)?);
            }
        }

        if let Some(((path, _), (service, spec))) = declared.into_iter().next() {
            return Err(DefinitionError::UndocumentedRoute {
                method: spec.method,
                path,
                service,
            });
        }

        Ok(Self {
            document,
            json,
            routes,
        })
    }

    /// The merged document
    pub fn document(&self) -> &utoipa::openapi::OpenApi {
        &self.document
    }

    /// The merged document as JSON
    pub fn document_json(&self) -> &Value {
        &self.json
    }

    /// Bound operations
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }
}

/// HTTP method of a path item key, `None` for non-operation keys
pub(crate) fn operation_method(key: &str) -> Option<Method> {
    match key {
        "get" => Some(Method::GET),
        "put" => Some(Method::PUT),
        "post" => Some(Method::POST),
        "delete" => Some(Method::DELETE),
        "options" => Some(Method::OPTIONS),
        "head" => Some(Method::HEAD),
        "patch" => Some(Method::PATCH),
        "trace" => Some(Method::TRACE),
        _ => None,
    }
}

fn bind(
    method: Method,
    path: &str,
    spec: Option<RouteSpec>,
    services: &ServiceRegistry,
    middlewares: &MiddlewareRegistry,
) -> Result<RouteEntry, DefinitionError> {
    let Some((spec, reference)) = spec.and_then(|s| s.service_method.clone().map(|r| (s, r)))
    else {
        return Err(DefinitionError::MissingServiceMethod {
            method,
            path: path.to_string(),
        });
    };

    let target = services.resolve(&reference).map_err(|e| {
        let (service, service_method) = reference.split_once('.').unwrap_or((reference.as_str(), ""));
        match e {
            ResolveError::Malformed => DefinitionError::MalformedServiceMethod {
                method: method.clone(),
                path: path.to_string(),
                reference: reference.clone(),
            },
            ResolveError::UnknownComponent => DefinitionError::UnknownService {
                method: method.clone(),
                path: path.to_string(),
                service: service.to_string(),
            },
            ResolveError::UnknownMember => DefinitionError::UnknownServiceMethod {
                method: method.clone(),
                path: path.to_string(),
                service: service.to_string(),
                service_method: service_method.to_string(),
            },
        }
    })?;

    let chain = spec
        .service_middlewares
        .iter()
        .map(|reference| {
            middlewares.resolve(reference).map_err(|e| match e {
                ResolveError::Malformed => DefinitionError::MalformedMiddleware {
                    method: method.clone(),
                    path: path.to_string(),
                    reference: reference.clone(),
                },
                ResolveError::UnknownComponent | ResolveError::UnknownMember => {
                    DefinitionError::UnknownMiddleware {
                        method: method.clone(),
                        path: path.to_string(),
                        reference: reference.clone(),
                    }
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(%method, path, service_method = %target.reference(), middlewares = chain.len(), "route bound");

    Ok(RouteEntry {
        method,
        path: path.to_string(),
        target,
        middlewares: chain,
    })
}

fn check_challenge(state: &ServerState, challenge: &str) -> Result<(), ApiError> {
    if challenge == state.config().docs.challenge {
        Ok(())
    } else {
        warn!("documentation requested with a wrong challenge");
        Err(ApiError::Unauthorized)
    }
}

/// `OpenAPI` specification endpoint
///
/// # Errors
///
/// Returns `ApiError::Unauthorized` when `challenge` does not match.
pub async fn openapi_spec(
    State(state): State<ServerState>,
    Path(challenge): Path<String>,
) -> Result<Json<Value>, ApiError> {
    check_challenge(&state, &challenge)?;
    Ok(Json(state.definition().document_json().clone()))
}

/// Swagger UI endpoint
///
/// # Errors
///
/// Returns `ApiError::Unauthorized` when `challenge` does not match.
pub async fn swagger_ui(
    State(state): State<ServerState>,
    Path(challenge): Path<String>,
) -> Result<Html<&'static str>, ApiError> {
    check_challenge(&state, &challenge)?;
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css" />
    <style>
        html { box-sizing: border-box; overflow: -moz-scrollbars-vertical; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin:0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: 'api-docs.json',
                dom_id: '#swagger-ui',
                deepLinking: true,
                filter: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                plugins: [
                    SwaggerUIBundle.plugins.DownloadUrl
                ],
                layout: "StandaloneLayout"
            });
        }
    </script>
</body>
</html>
"#;
    Ok(Html(html))
}
