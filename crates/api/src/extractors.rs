// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Body and cookie parsers used by the built-in middlewares
//!
//! JSON failures carry the line and column of the syntax error together with
//! a hint on the likely cause.

use std::collections::HashMap;

use axum::http::{HeaderMap, header};
use serde_json::{Map, Value};

use crate::middleware::MiddlewareError;

mod error_hints {
    pub const MISSING_COMMA: &str =
        "check for missing or extra commas between object properties or array elements";
    pub const MISSING_BRACE: &str = "check for missing closing brace '}' for JSON object";
    pub const MISSING_BRACKET: &str = "check for missing closing bracket ']' for JSON array";
    pub const MISSING_QUOTES: &str =
        "check for missing or improperly escaped quotes around string values";
    pub const CONTROL_CHARS: &str = "JSON contains invalid control characters that must be escaped";
    pub const EXPECTED_VALUE: &str =
        "expected a valid JSON value (string, number, boolean, null, object, or array)";
    pub const DEFAULT_SYNTAX: &str = "check JSON formatting and structure";
    pub const TRUNCATED_JSON: &str =
        "unexpected end of JSON input, request appears to be truncated";
}

/// Largest JSON body accepted by the `json` operation
pub const MAX_JSON_PAYLOAD_SIZE: usize = 1024 * 1024; // 1MB limit

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Parse a JSON request body
///
/// Returns `Ok(None)` for a non-JSON content type; bodies without a content
/// type are parsed as JSON. An empty body parses as an empty object.
///
/// # Errors
///
/// Returns `MiddlewareError::PayloadTooLarge` above [`MAX_JSON_PAYLOAD_SIZE`]
/// and `MiddlewareError::InvalidBody` with a syntax hint for malformed JSON.
pub fn parse_json_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Option<Value>, MiddlewareError> {
    if let Some(content_type) = content_type(headers)
        && !is_json_content_type(content_type)
    {
        return Ok(None);
    }

    if bytes.is_empty() {
        return Ok(Some(Value::Object(Map::new())));
    }

    if bytes.len() > MAX_JSON_PAYLOAD_SIZE {
        return Err(MiddlewareError::PayloadTooLarge {
            size: bytes.len(),
            limit: MAX_JSON_PAYLOAD_SIZE,
        });
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            let message = if err.is_eof() {
                error_hints::TRUNCATED_JSON.to_string()
            } else if err.is_syntax() {
                format!(
                    "invalid JSON syntax at line {}, column {}: {}",
                    err.line(),
                    err.column(),
                    get_json_syntax_hint(&err)
                )
            } else {
                format!("JSON parsing error: {err}")
            };
            Err(MiddlewareError::InvalidBody { message })
        }
    }
}

/// Provides helpful hints for JSON syntax errors
fn get_json_syntax_hint(err: &serde_json::Error) -> &'static str {
    let err_msg = err.to_string();

    if err_msg.contains("expected ','") || err_msg.contains("trailing comma") {
        error_hints::MISSING_COMMA
    } else if err_msg.contains("expected '}'") {
        error_hints::MISSING_BRACE
    } else if err_msg.contains("expected ']'") {
        error_hints::MISSING_BRACKET
    } else if err_msg.contains("expected '\"'") {
        error_hints::MISSING_QUOTES
    } else if err_msg.contains("control character") {
        error_hints::CONTROL_CHARS
    } else if err_msg.contains("expected value") {
        error_hints::EXPECTED_VALUE
    } else {
        error_hints::DEFAULT_SYNTAX
    }
}

/// Parse an `application/x-www-form-urlencoded` body into an object of strings
///
/// Returns `Ok(None)` for any other content type or an empty body.
///
/// # Errors
///
/// Returns `MiddlewareError::InvalidBody` if the body is not valid form data.
pub fn parse_form_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Option<Value>, MiddlewareError> {
    let is_form = content_type(headers).is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
    });
    if !is_form || bytes.is_empty() {
        return Ok(None);
    }

    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(bytes).map_err(|e| MiddlewareError::InvalidBody {
            message: format!("invalid form body: {e}"),
        })?;

    let object: Map<String, Value> = pairs
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect();
    Ok(Some(Value::Object(object)))
}

/// Parse every `Cookie` header into a name to value map
///
/// The first occurrence of a name wins; surrounding double quotes are removed.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                cookies
                    .entry(name.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }
    cookies
}
