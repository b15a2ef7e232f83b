// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server lifecycle status types

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle status of the API server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    /// Status has not been determined
    #[default]
    Unknown,
    /// Components are being loaded and routes generated
    Initializing,
    /// The listening socket is being opened
    Starting,
    /// The listening socket could not be opened
    StartFailed,
    /// The socket is bound and listening hooks are running
    Listening,
    /// The server accepts connections
    Connected,
    /// A socket level error was reported
    Error,
    /// The server stopped accepting connections and is draining
    ShuttingDown,
    /// The server has stopped
    Shutdown,
    /// The server failed to stop cleanly
    ShutdownFailed,
}

impl ServerStatus {
    /// All known statuses
    pub const ALL: [Self; 10] = [
        Self::Unknown,
        Self::Initializing,
        Self::Starting,
        Self::StartFailed,
        Self::Listening,
        Self::Connected,
        Self::Error,
        Self::ShuttingDown,
        Self::Shutdown,
        Self::ShutdownFailed,
    ];

    /// Name of the status as used in logs and serialized output
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Initializing => "INITIALIZING",
            Self::Starting => "STARTING",
            Self::StartFailed => "START_FAILED",
            Self::Listening => "LISTENING",
            Self::Connected => "CONNECTED",
            Self::Error => "ERROR",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Shutdown => "SHUTDOWN",
            Self::ShutdownFailed => "SHUTDOWN_FAILED",
        }
    }

    /// Whether a `start` call in this status joins the in-flight start
    pub const fn is_starting_or_started(self) -> bool {
        matches!(self, Self::Starting | Self::Connected)
    }

    /// Whether a `shutdown` call in this status joins the existing shutdown
    pub const fn is_stopping_or_stopped(self) -> bool {
        matches!(self, Self::StartFailed | Self::ShuttingDown | Self::Shutdown)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerStatus {
    type Err = ServerStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ServerStatusParseError(s.to_string()))
    }
}

/// Error returned when a status name is not one of the known statuses
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown Status, cannot set the status of the server to {0}")]
pub struct ServerStatusParseError(pub String);
