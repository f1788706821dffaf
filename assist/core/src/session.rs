//! Generation Session State
//!
//! The lifecycle object for one in-flight or finished generation request.
//! A session owns an append-only content buffer, a deadline, and the flags
//! that disambiguate how it ended (user stop vs. supersession vs. failure).
//!
//! # Design Philosophy
//!
//! Everything a dispatch decision needs — status, `manual_stop`,
//! `superseded` — lives in one struct read under one lock, so a late
//! callback from the channel always observes a consistent picture. Intent
//! is never inferred from booleans set at different times; the terminal
//! [`SessionOutcome`] is recorded exactly once.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::GenerationError;

/// The category of a generation operation
///
/// Each kind has fully independent session state; no cross-kind invariant
/// exists. New kinds extend this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationKind {
    /// Polish/revise the article body
    ContentRevision,
    /// Generate an article summary
    Summary,
}

impl GenerationKind {
    /// Human-readable label (for UI display and logs)
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ContentRevision => "content revision",
            Self::Summary => "summary",
        }
    }
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Session identifier
///
/// Identity is what late callbacks are checked against: an event carrying a
/// stale id never reaches the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new unique session ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Session status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Session created, channel not yet producing
    Idle,
    /// Chunks are arriving; the buffer is growing
    Streaming,
    /// Terminal: the buffer is the finished artifact
    Completed,
    /// Terminal: transport failure or deadline overrun
    Errored,
    /// Terminal: stopped by the user or superseded by a newer session
    Cancelled,
}

impl SessionStatus {
    /// Whether this status is terminal (the buffer is now immutable)
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How a session ended, recorded exactly once
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Finished successfully with the full artifact
    Completed(String),
    /// Stopped by the user, or discarded by supersession
    Cancelled,
    /// The client-side deadline elapsed
    TimedOut,
    /// The channel reported a failure
    Failed(GenerationError),
}

/// The lifecycle object for one generation request
#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    kind: GenerationKind,
    status: SessionStatus,
    /// Accumulated content; append-only while streaming
    buffer: String,
    /// Set only by explicit user cancellation, never by timeout or failure
    manual_stop: bool,
    /// Set when a newer session of the same kind replaced this one
    superseded: bool,
    /// Set once the buffer has been committed through the apply gate
    applied: bool,
    started_at: Instant,
    deadline: Instant,
    outcome: Option<SessionOutcome>,
}

impl StreamSession {
    /// Create a new idle session with a deadline `timeout` from now
    #[must_use]
    pub fn new(kind: GenerationKind, timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            id: SessionId::new(),
            kind,
            status: SessionStatus::Idle,
            buffer: String::new(),
            manual_stop: false,
            superseded: false,
            applied: false,
            started_at: now,
            deadline: now + timeout,
            outcome: None,
        }
    }

    /// Get the session ID
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the operation kind
    #[must_use]
    pub fn kind(&self) -> GenerationKind {
        self.kind
    }

    /// Get the current status
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Get the accumulated content
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Whether the user explicitly stopped this session
    #[must_use]
    pub fn manual_stop(&self) -> bool {
        self.manual_stop
    }

    /// Whether a newer session of the same kind replaced this one
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.superseded
    }

    /// Whether the finished artifact has been committed
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// The absolute deadline for this session
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time since the session started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// The terminal outcome, if the session has ended
    #[must_use]
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Whether events for this session may still reach the caller
    ///
    /// False once the session is terminal or superseded; late callbacks
    /// checking this under the lock are dropped.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status == SessionStatus::Streaming && !self.superseded
    }

    /// Transition from idle to streaming
    pub fn begin_streaming(&mut self) {
        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Streaming;
        }
    }

    /// Append an incoming chunk to the buffer
    ///
    /// Returns false (and leaves the buffer untouched) if the session is no
    /// longer live; the caller must then drop the chunk.
    pub fn append_chunk(&mut self, text: &str) -> bool {
        if !self.is_live() {
            return false;
        }
        self.buffer.push_str(text);
        true
    }

    /// Terminal: the channel delivered its success event
    pub fn complete(&mut self) {
        self.finish(SessionStatus::Completed, SessionOutcome::Completed(self.buffer.clone()));
    }

    /// Terminal: the channel failed
    pub fn fail(&mut self, reason: impl Into<String>) {
        let error = GenerationError::Transport(reason.into());
        self.finish(SessionStatus::Errored, SessionOutcome::Failed(error));
    }

    /// Terminal: the client-side deadline elapsed
    pub fn time_out(&mut self) {
        self.finish(SessionStatus::Errored, SessionOutcome::TimedOut);
    }

    /// Terminal: the user explicitly stopped the session
    pub fn cancel_by_user(&mut self) {
        self.manual_stop = true;
        self.finish(SessionStatus::Cancelled, SessionOutcome::Cancelled);
    }

    /// Terminal: a newer session of the same kind replaced this one
    ///
    /// `manual_stop` stays false; supersession is internal, not a user stop.
    pub fn supersede(&mut self) {
        self.superseded = true;
        self.finish(SessionStatus::Cancelled, SessionOutcome::Cancelled);
    }

    /// Mark the artifact as committed
    ///
    /// Returns true only the first time; the gate uses this for idempotency.
    pub fn mark_applied(&mut self) -> bool {
        if self.applied {
            return false;
        }
        self.applied = true;
        true
    }

    /// Record the terminal transition, at most once
    fn finish(&mut self, status: SessionStatus, outcome: SessionOutcome) {
        if self.outcome.is_some() {
            return;
        }
        self.status = status;
        self.outcome = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_starts_idle_with_empty_buffer() {
        let session = StreamSession::new(GenerationKind::Summary, Duration::from_secs(300));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.buffer().is_empty());
        assert!(!session.manual_stop());
        assert!(!session.is_applied());
        assert!(session.outcome().is_none());
    }

    #[test]
    fn test_buffer_grows_only_while_streaming() {
        let mut session =
            StreamSession::new(GenerationKind::ContentRevision, Duration::from_secs(300));

        // Idle: chunks are rejected
        assert!(!session.append_chunk("early"));
        assert!(session.buffer().is_empty());

        session.begin_streaming();
        assert!(session.append_chunk("Hello "));
        assert!(session.append_chunk("world"));
        assert_eq!(session.buffer(), "Hello world");

        session.complete();
        assert!(!session.append_chunk(" late"));
        assert_eq!(session.buffer(), "Hello world");
    }

    #[test]
    fn test_outcome_recorded_exactly_once() {
        let mut session = StreamSession::new(GenerationKind::Summary, Duration::from_secs(300));
        session.begin_streaming();
        session.append_chunk("partial");
        session.cancel_by_user();

        assert_eq!(session.status(), SessionStatus::Cancelled);
        assert_eq!(session.outcome(), Some(&SessionOutcome::Cancelled));

        // A transport failure arriving after cancellation changes nothing
        session.fail("late error");
        assert_eq!(session.status(), SessionStatus::Cancelled);
        assert_eq!(session.outcome(), Some(&SessionOutcome::Cancelled));
    }

    #[test]
    fn test_supersede_does_not_set_manual_stop() {
        let mut session = StreamSession::new(GenerationKind::Summary, Duration::from_secs(300));
        session.begin_streaming();
        session.supersede();

        assert!(session.is_superseded());
        assert!(!session.manual_stop());
        assert_eq!(session.status(), SessionStatus::Cancelled);
        assert!(!session.is_live());
    }

    #[test]
    fn test_timeout_is_errored_not_cancelled() {
        let mut session = StreamSession::new(GenerationKind::Summary, Duration::from_secs(300));
        session.begin_streaming();
        session.time_out();

        assert_eq!(session.status(), SessionStatus::Errored);
        assert_eq!(session.outcome(), Some(&SessionOutcome::TimedOut));
        assert!(!session.manual_stop());
    }

    #[test]
    fn test_mark_applied_is_one_shot() {
        let mut session = StreamSession::new(GenerationKind::Summary, Duration::from_secs(300));
        session.begin_streaming();
        session.append_chunk("done");
        session.complete();

        assert!(session.mark_applied());
        assert!(!session.mark_applied());
        assert!(session.is_applied());
    }

    #[test]
    fn test_kind_and_status_labels() {
        assert_eq!(GenerationKind::ContentRevision.to_string(), "content revision");
        assert_eq!(GenerationKind::Summary.to_string(), "summary");
        assert_eq!(SessionStatus::Streaming.to_string(), "streaming");
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(!SessionStatus::Streaming.is_terminal());
    }
}
