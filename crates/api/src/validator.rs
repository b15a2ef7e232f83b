// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Request validation against the synthesized document
//!
//! Schemas are compiled once per operation. `#/components/schemas/*`
//! references resolve against the document's components, which are embedded
//! next to every compiled schema.

use std::{collections::HashMap, fmt};

use axum::http::Method;
use jsonschema::Validator;
use serde_json::{Map, Value, json};

use crate::{
    error::{DefinitionError, ValidationIssue},
    helpers::RequestHelper,
    openapi::operation_method,
};

const BODY: &str = "body";

struct BodyCheck {
    required: bool,
    validator: Validator,
}

struct ParameterCheck {
    name: String,
    location: String,
    required: bool,
    schema_type: Option<String>,
    validator: Option<Validator>,
}

#[derive(Default)]
struct OperationCheck {
    body: Option<BodyCheck>,
    parameters: Vec<ParameterCheck>,
}

/// Precompiled request checks of every documented operation
pub struct RequestValidator {
    operations: HashMap<(Method, String), OperationCheck>,
}

impl fmt::Debug for RequestValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestValidator")
            .field("operations", &self.operations.len())
            .finish()
    }
}

impl RequestValidator {
    /// Compile the checks of every operation in `document`
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::InvalidSchema` for a schema that does not
    /// compile.
    pub fn new(document: &Value) -> Result<Self, DefinitionError> {
        let components = document
            .pointer("/components/schemas")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let mut operations = HashMap::new();

        let paths = document.get("paths").and_then(Value::as_object);
        for (path, item) in paths.into_iter().flatten() {
            let Some(item) = item.as_object() else {
                continue;
            };
            for (key, operation) in item {
                let Some(method) = operation_method(key) else {
                    continue;
                };
                if !operation.is_object() {
                    continue;
                }
                let compiler = Compiler {
                    method: &method,
                    path,
                    components: &components,
                };
                let check = compiler.operation(operation)?;
                operations.insert((method, path.clone()), check);
            }
        }

        Ok(Self { operations })
    }

    /// Check `request` against the operation documented as `method path`
    ///
    /// Operations without documentation pass.
    ///
    /// # Errors
    ///
    /// Returns every failed check.
    pub fn validate(
        &self,
        method: &Method,
        path: &str,
        request: &RequestHelper,
    ) -> Result<(), Vec<ValidationIssue>> {
        let Some(check) = self.operations.get(&(method.clone(), path.to_string())) else {
            return Ok(());
        };
        let mut issues = Vec::new();

        if let Some(body) = &check.body {
            validate_body(body, request, &mut issues);
        }

        for parameter in &check.parameters {
            validate_parameter(parameter, request, &mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

struct Compiler<'a> {
    method: &'a Method,
    path: &'a str,
    components: &'a Value,
}

impl Compiler<'_> {
    fn operation(&self, operation: &Value) -> Result<OperationCheck, DefinitionError> {
        let mut check = OperationCheck::default();

        if let Some(request_body) = operation.get("requestBody") {
            let content = request_body.get("content").and_then(Value::as_object);
            let schema = content.and_then(|content| {
                content
                    .get("application/json")
                    .or_else(|| content.values().next())
                    .and_then(|media| media.get("schema"))
            });
            if let Some(schema) = schema {
                check.body = Some(BodyCheck {
                    required: request_body
                        .get("required")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    validator: self.compile(BODY, schema)?,
                });
            }
        }

        let parameters = operation.get("parameters").and_then(Value::as_array);
        for parameter in parameters.into_iter().flatten() {
            let (Some(name), Some(location)) = (
                parameter.get("name").and_then(Value::as_str),
                parameter.get("in").and_then(Value::as_str),
            ) else {
                continue;
            };
            let schema = parameter.get("schema");
            let validator = schema
                .map(|schema| self.compile(&format!("{location} parameter {name}"), schema))
                .transpose()?;

            check.parameters.push(ParameterCheck {
                name: name.to_string(),
                location: location.to_string(),
                // Path parameters are always required
                required: location == "path"
                    || parameter
                        .get("required")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                schema_type: schema.and_then(schema_type),
                validator,
            });
        }

        Ok(check)
    }

    fn compile(&self, location: &str, schema: &Value) -> Result<Validator, DefinitionError> {
        let rooted = json!({
            "allOf": [schema],
            "components": { "schemas": self.components },
        });
        jsonschema::validator_for(&rooted).map_err(|e| DefinitionError::InvalidSchema {
            method: self.method.clone(),
            path: self.path.to_string(),
            location: location.to_string(),
            message: e.to_string(),
        })
    }
}

/// Primitive type a parameter schema declares, ignoring `null`
fn schema_type(schema: &Value) -> Option<String> {
    match schema.get("type")? {
        Value::String(t) => Some(t.clone()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(str::to_string),
        _ => None,
    }
}

/// Convert a raw parameter string to the JSON type its schema expects
///
/// Values that do not parse stay strings so the schema reports the mismatch.
fn coerce(raw: &str, schema_type: Option<&str>) -> Value {
    let coerced = match schema_type {
        Some("integer") => raw.parse::<i64>().ok().map(Value::from),
        Some("number") => raw.parse::<f64>().ok().map(Value::from),
        Some("boolean") => raw.parse::<bool>().ok().map(Value::from),
        Some("array") => Some(Value::Array(
            raw.split(',').map(|v| Value::String(v.to_string())).collect(),
        )),
        _ => None,
    };
    coerced.unwrap_or_else(|| Value::String(raw.to_string()))
}

fn validate_body(check: &BodyCheck, request: &RequestHelper, issues: &mut Vec<ValidationIssue>) {
    let parsed;
    let payload = match request.payload() {
        Some(payload) => Some(payload),
        None if request.raw_body().is_empty() => None,
        None => match serde_json::from_slice::<Value>(request.raw_body()) {
            Ok(value) => {
                parsed = value;
                Some(&parsed)
            }
            Err(e) => {
                issues.push(ValidationIssue {
                    location: BODY.to_string(),
                    name: None,
                    message: format!("request body is not valid JSON: {e}"),
                });
                return;
            }
        },
    };

    match payload {
        Some(payload) => {
            issues.extend(check.validator.iter_errors(payload).map(|e| ValidationIssue {
                location: BODY.to_string(),
                name: None,
                message: e.to_string(),
            }));
        }
        None if check.required => issues.push(ValidationIssue {
            location: BODY.to_string(),
            name: None,
            message: "request body is required".to_string(),
        }),
        None => {}
    }
}

fn validate_parameter(
    check: &ParameterCheck,
    request: &RequestHelper,
    issues: &mut Vec<ValidationIssue>,
) {
    let raw = match check.location.as_str() {
        "path" => request.path_param(&check.name),
        "query" => request.query_param(&check.name),
        "header" => request.header(&check.name),
        "cookie" => request.cookie(&check.name),
        _ => return,
    };

    let Some(raw) = raw else {
        if check.required {
            issues.push(ValidationIssue {
                location: check.location.clone(),
                name: Some(check.name.clone()),
                message: "is required".to_string(),
            });
        }
        return;
    };

    if let Some(validator) = &check.validator {
        let value = coerce(raw, check.schema_type.as_deref());
        issues.extend(validator.iter_errors(&value).map(|e| ValidationIssue {
            location: check.location.clone(),
            name: Some(check.name.clone()),
            message: e.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::{HeaderMap, HeaderValue};

    use super::*;

    fn document() -> Value {
        json!({
            "openapi": "3.1.0",
            "paths": {
                "/items/{id}": {
                    "get": {
                        "parameters": [
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}},
                            {"name": "page", "in": "query", "schema": {"type": "string"}},
                            {"name": "x-tenant", "in": "header", "required": true, "schema": {"type": "string"}}
                        ]
                    },
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {"schema": {"$ref": "#/components/schemas/Item"}}
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Item": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {"name": {"type": "string"}}
                    }
                }
            }
        })
    }

    fn get_item(id: &str, tenant: Option<&'static str>) -> RequestHelper {
        let mut headers = HeaderMap::new();
        if let Some(tenant) = tenant {
            headers.insert("x-tenant", HeaderValue::from_static(tenant));
        }
        RequestHelper::new(Method::GET, format!("/items/{id}"), "/items/{id}")
            .with_path_params(HashMap::from([("id".to_string(), id.to_string())]))
            .with_headers(headers)
    }

    #[test]
    fn accepts_valid_parameters() {
        let validator = RequestValidator::new(&document()).unwrap();
        let request = get_item("7", Some("acme"));

        assert!(validator.validate(&Method::GET, "/items/{id}", &request).is_ok());
    }

    #[test]
    fn collects_every_parameter_failure() {
        let validator = RequestValidator::new(&document()).unwrap();
        let request = get_item("seven", None);

        let issues = validator
            .validate(&Method::GET, "/items/{id}", &request)
            .unwrap_err();

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].location, "path");
        assert_eq!(issues[0].name.as_deref(), Some("id"));
        assert_eq!(issues[1].location, "header");
        assert_eq!(issues[1].message, "is required");
    }

    #[test]
    fn body_resolves_component_references() {
        let validator = RequestValidator::new(&document()).unwrap();

        let mut request = RequestHelper::new(Method::POST, "/items/1", "/items/{id}")
            .with_path_params(HashMap::from([("id".to_string(), "1".to_string())]));
        request.set_payload(json!({"name": "widget"}));
        assert!(validator.validate(&Method::POST, "/items/{id}", &request).is_ok());

        request.set_payload(json!({"name": 3}));
        let issues = validator
            .validate(&Method::POST, "/items/{id}", &request)
            .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location, "body");
    }

    #[test]
    fn missing_required_body() {
        let validator = RequestValidator::new(&document()).unwrap();
        let request = RequestHelper::new(Method::POST, "/items/1", "/items/{id}")
            .with_path_params(HashMap::from([("id".to_string(), "1".to_string())]));

        let issues = validator
            .validate(&Method::POST, "/items/{id}", &request)
            .unwrap_err();

        assert_eq!(issues[0].message, "request body is required");
    }

    #[test]
    fn unparsed_body_is_read_as_json() {
        let validator = RequestValidator::new(&document()).unwrap();
        let request = RequestHelper::new(Method::POST, "/items/1", "/items/{id}")
            .with_path_params(HashMap::from([("id".to_string(), "1".to_string())]))
            .with_body(r#"{"name": "widget"}"#);

        assert!(validator.validate(&Method::POST, "/items/{id}", &request).is_ok());
    }

    #[test]
    fn undocumented_operations_pass() {
        let validator = RequestValidator::new(&document()).unwrap();
        let request = RequestHelper::new(Method::DELETE, "/items/1", "/items/{id}");

        assert!(validator.validate(&Method::DELETE, "/items/{id}", &request).is_ok());
    }

    #[test]
    fn coercion_follows_schema_type() {
        assert_eq!(coerce("42", Some("integer")), json!(42));
        assert_eq!(coerce("4.5", Some("number")), json!(4.5));
        assert_eq!(coerce("true", Some("boolean")), json!(true));
        assert_eq!(coerce("a,b", Some("array")), json!(["a", "b"]));
        assert_eq!(coerce("x", Some("integer")), json!("x"));
        assert_eq!(coerce("2", None), json!("2"));
    }

    #[test]
    fn invalid_schema_fails() {
        let document = json!({
            "paths": {
                "/bad": {
                    "get": {
                        "parameters": [
                            {"name": "q", "in": "query", "schema": {"type": 12}}
                        ]
                    }
                }
            }
        });

        let error = RequestValidator::new(&document).unwrap_err();
        assert!(matches!(error, DefinitionError::InvalidSchema { .. }));
    }
}
