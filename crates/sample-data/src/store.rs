// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! SQLite store for the `sampleData` table
//!
//! The table carries no uniqueness constraint: inserting the same record twice
//! stores it twice. Reads are paged by a fixed page size and ordered by `id`.

use std::str::FromStr;

use shared_types::DataRow;
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use thiserror::Error;
use tracing::{debug, warn};

/// Number of rows returned by a single page read
pub const PAGE_SIZE: u32 = 30;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sampleData(id INTEGER, postId INTEGER, name TEXT, email TEXT, body TEXT)";
const SELECT_PAGE: &str =
    "SELECT id, postId, name, email, body FROM sampleData ORDER BY id LIMIT ? OFFSET ?";
const INSERT_ROW: &str =
    "INSERT INTO sampleData (id, postId, name, email, body) VALUES (?, ?, ?, ?, ?)";
const COUNT_ROWS: &str = "SELECT COUNT(*) AS total FROM sampleData";

/// Errors raised by store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened
    #[error("Failed to open database {url}: {source}")]
    Connect {
        /// Connection string that failed
        url: String,
        /// Underlying driver error
        #[source]
        source: sqlx::Error,
    },

    /// A statement failed to execute
    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Result of a single row insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written
    Inserted,
    /// The insert failed and the error was swallowed
    Skipped,
}

/// Offset of the first row of `page`
///
/// Pages are 1-based. Page 0 is read as page 1, matching the way SQLite treats
/// a negative offset.
pub fn page_offset(page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(PAGE_SIZE)
}

/// Store backed by a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SampleStore {
    pool: SqlitePool,
}

impl SampleStore {
    /// Open the database at `url`, creating the file when it does not exist
    ///
    /// Connections are kept for the lifetime of the pool so that in-memory
    /// databases survive between queries.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connect` if the connection string is invalid or the
    /// database cannot be opened.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let connect_error = |source| StoreError::Connect {
            url: url.to_string(),
            source,
        };

        let options = SqliteConnectOptions::from_str(url)
            .map_err(connect_error)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(connect_error)?;

        debug!(url, max_connections, "opened sample data database");
        Ok(Self { pool })
    }

    /// Create the `sampleData` table if it is absent
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Query` if the statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Read up to [`PAGE_SIZE`] rows of the given 1-based page, ordered by `id`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Query` with the underlying driver error.
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<DataRow>, StoreError> {
        let rows = sqlx::query(SELECT_PAGE)
            .bind(i64::from(PAGE_SIZE))
            .bind(page_offset(page))
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| warn!(page, error = %e, "failed to read sample data page"))?;

        rows.iter().map(decode_row).collect()
    }

    /// Insert one row, propagating failures
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Query` if the insert fails.
    pub async fn try_insert_row(&self, row: &DataRow) -> Result<(), StoreError> {
        sqlx::query(INSERT_ROW)
            .bind(row.id)
            .bind(row.post_id)
            .bind(&row.name)
            .bind(&row.email)
            .bind(&row.body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert one row, swallowing failures
    ///
    /// A failed insert is logged and reported as [`InsertOutcome::Skipped`]
    /// instead of an error, so callers inserting many rows never abort early.
    pub async fn insert_row(&self, row: &DataRow) -> InsertOutcome {
        match self.try_insert_row(row).await {
            Ok(()) => InsertOutcome::Inserted,
            Err(e) => {
                warn!(id = row.id, error = %e, "skipping sample data row");
                InsertOutcome::Skipped
            }
        }
    }

    /// Number of stored rows
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Query` if the statement fails.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query(COUNT_ROWS).fetch_one(&self.pool).await?;
        Ok(row.try_get("total")?)
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn decode_row(row: &SqliteRow) -> Result<DataRow, StoreError> {
    Ok(DataRow {
        id: row.try_get("id")?,
        post_id: row.try_get("postId")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        body: row.try_get("body")?,
    })
}
