// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Remote seeding of the sample data table
//!
//! The seed collection is fetched with a single GET request and every record is
//! inserted concurrently. The routine waits for every insert to settle; insert
//! failures are counted, never propagated.

use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use shared_types::DataRow;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::store::{InsertOutcome, SampleStore};

/// Collection fetched when no other seed URL is configured
pub const DEFAULT_SEED_URL: &str = "https://jsonplaceholder.typicode.com/comments";

/// Errors raised while fetching the seed collection
#[derive(Debug, Error)]
pub enum SeedError {
    /// The configured URL is not valid
    #[error("Invalid seed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status
    #[error("Seed endpoint answered with status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// The remote payload is not a collection of rows
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Summary of a seeding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Records returned by the remote collection
    pub fetched: usize,
    /// Records written to the store
    pub inserted: usize,
    /// Records whose insert failed and was swallowed
    pub skipped: usize,
}

/// Client fetching the remote seed collection
#[derive(Debug, Clone)]
pub struct SeedClient {
    client: Client,
    url: Url,
}

impl SeedClient {
    /// Create a new seed client for `url`
    ///
    /// # Errors
    ///
    /// Returns `SeedError::InvalidUrl` if the URL cannot be parsed.
    pub fn new(url: &str) -> Result<Self, SeedError> {
        Ok(Self {
            client: Client::new(),
            url: Url::parse(url)?,
        })
    }

    /// URL of the remote collection
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch and decode the remote collection
    ///
    /// # Errors
    ///
    /// Returns `SeedError` on transport failures, non-success statuses or
    /// undecodable payloads.
    pub async fn fetch_all(&self) -> Result<Vec<DataRow>, SeedError> {
        debug!(url = %self.url, "fetching seed collection");

        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!(url = %self.url, status = status.as_u16(), "seed endpoint returned an error");
            return Err(SeedError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Fetch the remote collection and insert every record into `store`
    ///
    /// # Errors
    ///
    /// Returns `SeedError` only when the fetch itself fails; insert failures
    /// are reported through [`SeedReport::skipped`].
    pub async fn seed_all(&self, store: &SampleStore) -> Result<SeedReport, SeedError> {
        let rows = self.fetch_all().await?;

        let outcomes = join_all(rows.iter().map(|row| store.insert_row(row))).await;
        let inserted = outcomes
            .iter()
            .filter(|outcome| **outcome == InsertOutcome::Inserted)
            .count();

        let report = SeedReport {
            fetched: rows.len(),
            inserted,
            skipped: rows.len() - inserted,
        };
        info!(
            fetched = report.fetched,
            inserted = report.inserted,
            skipped = report.skipped,
            "seeded sample data"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_is_valid() {
        let client = SeedClient::new(DEFAULT_SEED_URL).unwrap();
        assert_eq!(client.url().path(), "/comments");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            SeedClient::new("not a url"),
            Err(SeedError::InvalidUrl(_))
        ));
    }

    #[test]
    fn seed_error_display() {
        let error = SeedError::Status { status: 503 };
        assert_eq!(error.to_string(), "Seed endpoint answered with status 503");
    }
}
