// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared types for the sample data API
//!
//! This crate provides the types that cross crate boundaries in the workspace:
//! the persisted row shape, the JSON response envelopes and the server status
//! enumeration, avoiding circular dependencies between the server and the
//! data access crate.

pub mod data_row;
pub mod envelope;
pub mod server_status;

pub use data_row::DataRow;
pub use envelope::{GenericError, SuccessfulResponse};
pub use server_status::{ServerStatus, ServerStatusParseError};
