// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Services shipped with the server

pub mod data;

pub use data::InsertData;
