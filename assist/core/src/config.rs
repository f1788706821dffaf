//! Assist Configuration
//!
//! Tunables for the session registry and the reconciliation poll. All
//! limits have the defaults the editor ships with; embedders override them
//! with the builder setters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default client-side ceiling on one generation session (5 minutes)
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// Default reconciliation poll cadence
pub const DEFAULT_RECONCILE_INTERVAL_MS: u64 = 500;

/// Default upper bound on applied suggestion values
pub const DEFAULT_MAX_APPLIED: usize = 6;

/// Configuration for the assist subsystem
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistConfig {
    /// Client-side deadline per session, in milliseconds
    pub session_timeout_ms: u64,
    /// Reconciliation poll cadence, in milliseconds
    pub reconcile_interval_ms: u64,
    /// Maximum applied suggestion values the document may hold
    pub max_applied: usize,
    /// Capacity of the per-session event channel to the caller
    pub event_capacity: usize,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            reconcile_interval_ms: DEFAULT_RECONCILE_INTERVAL_MS,
            max_applied: DEFAULT_MAX_APPLIED,
            event_capacity: 64,
        }
    }
}

impl AssistConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-session timeout in milliseconds
    #[must_use]
    pub fn with_session_timeout_ms(mut self, ms: u64) -> Self {
        self.session_timeout_ms = ms;
        self
    }

    /// Set the reconciliation poll cadence in milliseconds
    #[must_use]
    pub fn with_reconcile_interval_ms(mut self, ms: u64) -> Self {
        self.reconcile_interval_ms = ms;
        self
    }

    /// Set the applied-value bound
    #[must_use]
    pub fn with_max_applied(mut self, max: usize) -> Self {
        self.max_applied = max;
        self
    }

    /// Set the event channel capacity
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// The per-session timeout as a [`Duration`]
    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    /// The poll cadence as a [`Duration`]
    #[must_use]
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }
}
