// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Sample data row type

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single record of the `sampleData` table
///
/// The JSON shape matches the remote seed collection, so the same type is used
/// to decode the seed payload and to answer page queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataRow {
    /// Record identifier, used for ordering
    #[schema(example = 1)]
    pub id: i64,
    /// Identifier of the post the record belongs to
    #[schema(example = 1)]
    pub post_id: i64,
    /// Record title
    #[schema(example = "id labore ex et quam laborum")]
    pub name: String,
    /// Author email
    #[schema(example = "Eliseo@gardner.biz")]
    pub email: String,
    /// Record body text
    pub body: String,
}

impl DataRow {
    /// Create a new row
    pub fn new(
        id: i64,
        post_id: i64,
        name: impl Into<String>,
        email: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id,
            post_id,
            name: name.into(),
            email: email.into(),
            body: body.into(),
        }
    }
}
