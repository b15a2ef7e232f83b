// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! JSON response envelopes
//!
//! Every successful response carries `status` and `msg`; every error response
//! carries `errorCode` and `errorMsg` with optional `errorDetails`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Success envelope returned by service methods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SuccessfulResponse {
    /// A success message to be used by the client
    pub msg: String,
    /// A boolean value with response data status
    #[schema(example = true)]
    pub status: bool,
    /// Payload of the response, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<Value>,
}

impl SuccessfulResponse {
    /// Create a successful envelope without payload
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            status: true,
            data: None,
        }
    }

    /// Attach a payload to the envelope
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Error envelope returned for every failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenericError {
    /// A string that quickly identifies the error
    #[schema(example = "ValidationError")]
    pub error_code: String,
    /// A message that further identifies the error
    pub error_msg: String,
    /// Additional information that can help troubleshoot the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub error_details: Option<Value>,
}

impl GenericError {
    /// Create an error envelope without details
    pub fn new(error_code: impl Into<String>, error_msg: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            error_msg: error_msg.into(),
            error_details: None,
        }
    }

    /// Attach troubleshooting details
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.error_details = Some(details);
        self
    }
}
