// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Test-only services and middlewares

use api::{
    Catalog, ComponentFactory, Context, GenericError, Instance, Middleware, MiddlewareError,
    RequestHelper, ResponseHelper, RouteSpec, Service, ServiceError,
    dependencies::LoadResult,
    middleware::MiddlewareResult,
    service::ServiceResult,
};
use axum::http::{Method, StatusCode};
use futures::{FutureExt, future::BoxFuture};
use serde_json::{Value, json};
use utoipa::OpenApi;

#[utoipa::path(get, path = "/quirky/panic", responses((status = 200, description = "Never answers")))]
fn quirky_panic() {}

#[utoipa::path(get, path = "/quirky/own", responses((status = 202, description = "Answered by the service")))]
fn quirky_own() {}

#[utoipa::path(get, path = "/quirky/plain", responses((status = 200, description = "Plain value")))]
fn quirky_plain() {}

#[utoipa::path(get, path = "/quirky/gated", responses((status = 403, description = "Gate closed")))]
fn quirky_gated() {}

#[utoipa::path(get, path = "/quirky/exploding", responses((status = 500, description = "Middleware panics")))]
fn quirky_exploding() {}

#[utoipa::path(get, path = "/quirky/failing", responses((status = 500, description = "Middleware fails")))]
fn quirky_failing() {}

#[utoipa::path(
    get,
    path = "/quirky/items/{id}",
    params(("id" = i64, Path, description = "Item id")),
    responses((status = 200, description = "The id"))
)]
fn quirky_item() {}

#[derive(OpenApi)]
#[openapi(paths(
    quirky_panic,
    quirky_own,
    quirky_plain,
    quirky_gated,
    quirky_exploding,
    quirky_failing,
    quirky_item
))]
struct QuirkyDoc;

/// Service whose methods misbehave on purpose
#[derive(Debug)]
pub struct Quirky;

impl Service for Quirky {
    fn name(&self) -> &str {
        "Quirky"
    }

    fn openapi(&self) -> utoipa::openapi::OpenApi {
        QuirkyDoc::openapi()
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![
            RouteSpec::new(Method::GET, "/quirky/panic").service_method("Quirky.panic"),
            RouteSpec::new(Method::GET, "/quirky/own").service_method("Quirky.sendsOwn"),
            RouteSpec::new(Method::GET, "/quirky/plain")
                .service_method("Quirky.plain")
                .middleware("STANDARD.cors"),
            RouteSpec::new(Method::GET, "/quirky/gated")
                .service_method("Quirky.plain")
                .middleware("Gate.deny")
                .middleware("Gate.explode"),
            RouteSpec::new(Method::GET, "/quirky/exploding")
                .service_method("Quirky.plain")
                .middleware("Gate.explode"),
            RouteSpec::new(Method::GET, "/quirky/failing")
                .service_method("Quirky.plain")
                .middleware("Gate.fail"),
            RouteSpec::new(Method::GET, "/quirky/items/{id}").service_method("Quirky.echoId"),
        ]
    }

    fn methods(&self) -> &[&'static str] {
        &["panic", "sendsOwn", "plain", "echoId"]
    }

    fn call<'a>(
        &'a self,
        method: &'a str,
        request: &'a RequestHelper,
        response: &'a mut ResponseHelper,
    ) -> BoxFuture<'a, ServiceResult<Option<Value>>> {
        async move {
            match method {
                "panic" => panic!("service exploded"),
                "sendsOwn" => {
                    response.send(StatusCode::ACCEPTED, &json!({"own": true}));
                    Err(ServiceError::BadRequest {
                        message: "ignored once a response was sent".to_string(),
                    })
                }
                "plain" => Ok(Some(json!("plain text"))),
                "echoId" => Ok(Some(json!({"id": request.path_param("id")}))),
                other => Err(ServiceError::UnknownMethod {
                    service: "Quirky".to_string(),
                    method: other.to_string(),
                }),
            }
        }
        .boxed()
    }
}

/// Middleware that answers, panics or fails depending on the operation
#[derive(Debug)]
pub struct Gate;

impl Middleware for Gate {
    fn name(&self) -> &str {
        "Gate"
    }

    fn operations(&self) -> &[&'static str] {
        &["deny", "explode", "fail"]
    }

    fn call<'a>(
        &'a self,
        operation: &'a str,
        _request: &'a mut RequestHelper,
        response: &'a mut ResponseHelper,
    ) -> BoxFuture<'a, MiddlewareResult> {
        async move {
            match operation {
                "deny" => {
                    response.send(
                        StatusCode::FORBIDDEN,
                        &GenericError::new("Forbidden", "gate closed"),
                    );
                    Ok(())
                }
                "explode" => panic!("middleware exploded"),
                _ => Err(MiddlewareError::Failed {
                    message: "gate broke".to_string(),
                }),
            }
        }
        .boxed()
    }
}

#[utoipa::path(get, path = "/broken", responses((status = 200, description = "Never bound")))]
fn broken() {}

#[derive(OpenApi)]
#[openapi(paths(broken))]
struct BrokenDoc;

/// Service documenting an operation without naming its service method
#[derive(Debug)]
pub struct Broken;

impl Service for Broken {
    fn name(&self) -> &str {
        "Broken"
    }

    fn openapi(&self) -> utoipa::openapi::OpenApi {
        BrokenDoc::openapi()
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![RouteSpec::new(Method::GET, "/broken")]
    }

    fn methods(&self) -> &[&'static str] {
        &[]
    }

    fn call<'a>(
        &'a self,
        _method: &'a str,
        _request: &'a RequestHelper,
        _response: &'a mut ResponseHelper,
    ) -> BoxFuture<'a, ServiceResult<Option<Value>>> {
        async { Ok(None) }.boxed()
    }
}

#[utoipa::path(
    get,
    path = "/swagger/{challenge}/api-docs.json",
    params(("challenge" = String, Path, description = "Shadowed challenge")),
    responses((status = 200, description = "Never bound"))
)]
fn shadowing_docs() {}

#[derive(OpenApi)]
#[openapi(paths(shadowing_docs))]
struct ShadowDoc;

/// Service documenting a path already served by the documentation endpoints
#[derive(Debug)]
pub struct Shadow;

impl Service for Shadow {
    fn name(&self) -> &str {
        "Shadow"
    }

    fn openapi(&self) -> utoipa::openapi::OpenApi {
        ShadowDoc::openapi()
    }

    fn routes(&self) -> Vec<RouteSpec> {
        vec![
            RouteSpec::new(Method::GET, "/swagger/{challenge}/api-docs.json")
                .service_method("Shadow.docs"),
        ]
    }

    fn methods(&self) -> &[&'static str] {
        &["docs"]
    }

    fn call<'a>(
        &'a self,
        _method: &'a str,
        _request: &'a RequestHelper,
        _response: &'a mut ResponseHelper,
    ) -> BoxFuture<'a, ServiceResult<Option<Value>>> {
        async { Ok(None) }.boxed()
    }
}

/// Service without routes whose listening hook panics
#[derive(Debug)]
pub struct Hooked;

impl Service for Hooked {
    fn name(&self) -> &str {
        "Hooked"
    }

    fn openapi(&self) -> utoipa::openapi::OpenApi {
        utoipa::openapi::OpenApi::default()
    }

    fn routes(&self) -> Vec<RouteSpec> {
        Vec::new()
    }

    fn methods(&self) -> &[&'static str] {
        &[]
    }

    fn call<'a>(
        &'a self,
        _method: &'a str,
        _request: &'a RequestHelper,
        _response: &'a mut ResponseHelper,
    ) -> BoxFuture<'a, ServiceResult<Option<Value>>> {
        async { Ok(None) }.boxed()
    }

    fn on_listening(&self) -> Option<BoxFuture<'static, ()>> {
        Some(async { panic!("listening hook exploded") }.boxed())
    }
}

fn build_quirky(_context: &Context) -> BoxFuture<'_, LoadResult<Instance>> {
    async { Ok(Instance::service(Quirky)) }.boxed()
}

fn build_gate(_context: &Context) -> BoxFuture<'_, LoadResult<Instance>> {
    async { Ok(Instance::middleware(Gate)) }.boxed()
}

fn build_broken(_context: &Context) -> BoxFuture<'_, LoadResult<Instance>> {
    async { Ok(Instance::service(Broken)) }.boxed()
}

/// `Quirky` with the `Gate` middleware
pub fn quirky_catalog() -> Catalog {
    Catalog::new()
        .register(ComponentFactory::middleware(
            "Gate",
            "tests/gate.middleware",
            &[],
            build_gate,
        ))
        .register(ComponentFactory::service(
            "Quirky",
            "tests/quirky.service",
            &[],
            build_quirky,
        ))
}

fn build_hooked(_context: &Context) -> BoxFuture<'_, LoadResult<Instance>> {
    async { Ok(Instance::service(Hooked)) }.boxed()
}

/// A catalog whose only service panics once the server listens
pub fn hooked_catalog() -> Catalog {
    Catalog::new().register(ComponentFactory::service(
        "Hooked",
        "tests/hooked.service",
        &[],
        build_hooked,
    ))
}

fn build_shadow(_context: &Context) -> BoxFuture<'_, LoadResult<Instance>> {
    async { Ok(Instance::service(Shadow)) }.boxed()
}

/// A catalog whose only service overlaps the documentation endpoints
pub fn shadow_catalog() -> Catalog {
    Catalog::new().register(ComponentFactory::service(
        "Shadow",
        "tests/shadow.service",
        &[],
        build_shadow,
    ))
}

/// A catalog whose only service cannot be bound
pub fn broken_catalog() -> Catalog {
    Catalog::new().register(ComponentFactory::service(
        "Broken",
        "tests/broken.service",
        &[],
        build_broken,
    ))
}
