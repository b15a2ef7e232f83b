// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP request handlers module
//!
//! Every bound operation is answered by [`dispatch`]: run the middleware
//! chain, validate against the document, invoke the service method and wrap
//! its result in the success envelope. A response sent by a middleware or by
//! the service method always takes precedence.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use axum::{
    Json,
    extract::Request,
    http::{Method, Uri},
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::{
    error::ApiError,
    helpers::{RequestHelper, ResponseHelper},
    middleware::MiddlewareResult,
    openapi::RouteEntry,
    service::ServiceError,
    state::ServerState,
};

/// Answer a request matched to `route`
pub async fn dispatch(state: ServerState, route: Arc<RouteEntry>, request: Request) -> Response {
    let mut request = match RequestHelper::from_request(request, route.path()).await {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "failed to buffer request");
            return e.into_response();
        }
    };
    let mut response = ResponseHelper::new();

    let chain = AssertUnwindSafe(run_middlewares(&route, &mut request, &mut response))
        .catch_unwind()
        .await;
    match chain {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(error = %e, route = route.path(), "middleware rejected request");
            return response.finish(ApiError::Middleware(e).into_response());
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%message, route = route.path(), "middleware panicked");
            return response.finish(ApiError::Internal { message }.into_response());
        }
    }
    if let Some(sent) = response.take_sent() {
        debug!(route = route.path(), "middleware answered the request");
        return response.finish(sent);
    }

    let validation = panic::catch_unwind(AssertUnwindSafe(|| {
        state
            .validator()
            .validate(route.method(), route.path(), &request)
    }));
    match validation {
        Ok(Ok(())) => {}
        Ok(Err(issues)) => {
            debug!(issues = issues.len(), route = route.path(), "request failed validation");
            let e = ApiError::Validation {
                issues,
                request: request.describe(),
            };
            return response.finish(e.into_response());
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%message, route = route.path(), "validation panicked");
            return response.finish(ApiError::Internal { message }.into_response());
        }
    }

    let outcome = AssertUnwindSafe(route.target().call(&request, &mut response))
        .catch_unwind()
        .await;
    if let Some(sent) = response.take_sent() {
        return response.finish(sent);
    }

    let answer = match outcome {
        Ok(Ok(value)) => Json(success_envelope(value, &request)).into_response(),
        Ok(Err(source)) => {
            warn!(error = %source, service_method = %route.target().reference(), "service method failed");
            ApiError::Service {
                source,
                request: request.describe(),
            }
            .into_response()
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%message, service_method = %route.target().reference(), "service method panicked");
            ApiError::Service {
                source: ServiceError::Panicked { message },
                request: request.describe(),
            }
            .into_response()
        }
    };
    response.finish(answer)
}

/// Run the route's middlewares in order, stopping once one sent a response
async fn run_middlewares(
    route: &RouteEntry,
    request: &mut RequestHelper,
    response: &mut ResponseHelper,
) -> MiddlewareResult {
    for middleware in route.middlewares() {
        middleware.run(request, response).await?;
        if response.is_sent() {
            break;
        }
    }
    Ok(())
}

/// Wrap a service result in `{status, msg, data?}`
///
/// Objects keep their own `status` and `msg`; other values become `data`.
pub fn success_envelope(value: Option<Value>, request: &RequestHelper) -> Value {
    let msg = format!("{} request to {} succeeded.", request.method(), request.path());
    match value {
        Some(Value::Object(mut object)) => {
            object.entry("msg").or_insert(Value::String(msg));
            object.entry("status").or_insert(Value::Bool(true));
            Value::Object(object)
        }
        None | Some(Value::Null) => json!({ "status": true, "msg": msg }),
        Some(data) => json!({ "status": true, "msg": msg, "data": data }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fallback for requests matching no route
pub async fn not_found(method: Method, uri: Uri) -> Response {
    debug!(%method, %uri, "no route matched");
    ApiError::NotFound {
        method,
        path: uri.path().to_string(),
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RequestHelper {
        RequestHelper::new(Method::GET, "/data", "/data")
    }

    #[test]
    fn objects_get_defaults() {
        let body = success_envelope(Some(json!({"count": 2})), &request());
        assert_eq!(
            body,
            json!({"count": 2, "status": true, "msg": "GET request to /data succeeded."})
        );
    }

    #[test]
    fn objects_keep_their_own_fields() {
        let body = success_envelope(
            Some(json!({"status": false, "msg": "partial", "data": {}})),
            &request(),
        );
        assert_eq!(body, json!({"status": false, "msg": "partial", "data": {}}));
    }

    #[test]
    fn other_values_become_data() {
        let body = success_envelope(Some(json!([1, 2])), &request());
        assert_eq!(
            body,
            json!({"status": true, "msg": "GET request to /data succeeded.", "data": [1, 2]})
        );
    }

    #[test]
    fn no_value_has_no_data() {
        let expected = json!({"status": true, "msg": "GET request to /data succeeded."});
        assert_eq!(success_envelope(None, &request()), expected);
        assert_eq!(success_envelope(Some(Value::Null), &request()), expected);
    }

    #[test]
    fn panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
