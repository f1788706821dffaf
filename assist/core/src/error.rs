//! Error Taxonomy
//!
//! Errors raised by session management, artifact commit, and suggestion
//! toggling. Each concern gets its own small enum so callers can translate
//! a failure into exactly one user-facing notification.
//!
//! User cancellation is deliberately absent from this module: stopping a
//! session is a normal termination signal ([`SessionEventKind::Stopped`]),
//! never an error.
//!
//! [`SessionEventKind::Stopped`]: crate::registry::SessionEventKind::Stopped

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionStatus;

/// Error when starting a generation session
#[derive(Debug, Error)]
pub enum StartError {
    /// The source content was empty (or whitespace only); no session was created
    #[error("source content is empty")]
    EmptyInput,

    /// The generation channel could not be opened; no session was created
    #[error("failed to open generation channel: {0}")]
    Channel(#[from] anyhow::Error),
}

/// Terminal failure of a streaming generation session
///
/// Timeout is kept distinct from transport failure because the caller
/// offers different remediation for each.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationError {
    /// The channel failed mid-stream or disconnected without a terminal event
    #[error("generation transport failed: {0}")]
    Transport(String),

    /// The client-side deadline elapsed before a terminal event arrived
    #[error("generation timed out after {timeout_ms} ms; reduce the input size or retry")]
    Timeout {
        /// The configured ceiling that was exceeded, in milliseconds
        timeout_ms: u64,
    },
}

/// Error when committing a finished artifact into the shared document
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    /// No session of the requested kind exists
    #[error("no generation session exists for this kind")]
    NoSession,

    /// The session has not reached `Completed`, so there is nothing to commit
    #[error("session has not completed (status: {status})")]
    NotCompleted {
        /// Status the session was in when the commit was attempted
        status: SessionStatus,
    },
}

/// Error when a suggestion toggle would exceed the applied-value bound
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityError {
    /// Applying the requested value(s) would exceed the bound
    #[error("applied value limit of {max} reached; {remaining} more would fit")]
    Exceeded {
        /// The configured upper bound
        max: usize,
        /// How many more values could still be applied right now
        remaining: usize,
    },
}

impl CapacityError {
    /// Remaining capacity reported by the rejection
    #[must_use]
    pub fn remaining(&self) -> usize {
        match self {
            Self::Exceeded { remaining, .. } => *remaining,
        }
    }
}
