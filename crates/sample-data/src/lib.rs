// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Data access for the `sampleData` table
//!
//! This crate provides the thin persistence layer behind the data service and
//! the routine that seeds the table from a remote JSON collection.
//!
//! # Architecture
//!
//! - **Store**: [`store::SampleStore`] - paginated reads and single row inserts over SQLite
//! - **Seeding**: [`seed::SeedClient`] - fetches the remote collection and inserts every record
//!
//! # Failure Policy
//!
//! - Page reads propagate driver errors to the caller
//! - Single row inserts never fail: errors are logged and reported as skipped
//! - Seeding propagates only transport and decoding failures of the remote fetch

pub mod seed;
pub mod store;

pub use seed::*;
pub use store::*;
