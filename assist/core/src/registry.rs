//! Session Registry
//!
//! Holds at most one generation session per [`GenerationKind`]. Starting a
//! new session of a kind supersedes (cancels and discards) any prior one;
//! cancellation is user-initiated and produces a distinct stopped signal,
//! never an error. A per-session driver task multiplexes chunk arrival, the
//! cancellation token, and the client-side deadline.
//!
//! # Design Philosophy
//!
//! Ordering is the whole game here. A session is marked non-current under
//! its lock *before* its token is revoked, so any interleaved late callback
//! from the channel observes the cancelled/superseded state and is dropped.
//! Every dispatch decision reads status and flags atomically from the
//! session cell; there is no separately-timed side channel to go stale.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::channel::{GenerationChannel, GenerationChunk, GenerationRequest};
use crate::config::AssistConfig;
use crate::document::SharedDocument;
use crate::error::{ApplyError, GenerationError, StartError};
use crate::gate::{self, CommitOutcome};
use crate::session::{GenerationKind, SessionId, StreamSession};

/// Shared handle to one session's state cell
pub type SharedSession = Arc<Mutex<StreamSession>>;

// ============================================================================
// Session events
// ============================================================================

/// A notification delivered to the caller for one session's lifetime
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEvent {
    /// The session this event belongs to
    pub session_id: SessionId,
    /// The operation kind
    pub kind: GenerationKind,
    /// What happened
    pub payload: SessionEventKind,
}

/// Kind of session event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEventKind {
    /// An incremental chunk, forwarded verbatim in arrival order
    Chunk {
        /// The chunk text
        text: String,
    },
    /// Terminal success; the full buffer is the finished artifact
    Completed {
        /// The complete content
        content: String,
    },
    /// Terminal: stopped by the user (a deliberate signal, not an error)
    Stopped,
    /// Terminal failure (transport or timeout, kept distinct)
    Failed {
        /// The failure
        error: GenerationError,
    },
}

/// Caller's handle to one started session
///
/// Receives exactly the notifications for this session's lifetime: chunks,
/// then one terminal event — or nothing further once the session has been
/// superseded.
pub struct SessionHandle {
    session_id: SessionId,
    kind: GenerationKind,
    events: mpsc::Receiver<SessionEvent>,
    session: SharedSession,
}

impl SessionHandle {
    /// The session ID
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.session_id
    }

    /// The operation kind
    #[must_use]
    pub fn kind(&self) -> GenerationKind {
        self.kind
    }

    /// Receive the next event, or `None` once the session emits no more
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Shared access to the session state (status, buffer, applied flag)
    #[must_use]
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }
}

// ============================================================================
// Registry
// ============================================================================

struct SessionSlot {
    id: SessionId,
    session: SharedSession,
    token: CancellationToken,
}

/// Holds at most one session per generation kind
pub struct SessionRegistry {
    channel: Arc<dyn GenerationChannel>,
    config: AssistConfig,
    sessions: HashMap<GenerationKind, SessionSlot>,
}

impl SessionRegistry {
    /// Create a registry with default configuration
    #[must_use]
    pub fn new(channel: Arc<dyn GenerationChannel>) -> Self {
        Self::with_config(channel, AssistConfig::default())
    }

    /// Create a registry with custom configuration
    #[must_use]
    pub fn with_config(channel: Arc<dyn GenerationChannel>, config: AssistConfig) -> Self {
        Self {
            channel,
            config,
            sessions: HashMap::new(),
        }
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &AssistConfig {
        &self.config
    }

    /// Start a session of `kind` over `source`
    ///
    /// Any prior session of the same kind is superseded first: marked
    /// non-current, then its token revoked, and no further notification of
    /// any sort fires for it. Empty source is rejected before a session is
    /// created.
    pub async fn start_session(
        &mut self,
        kind: GenerationKind,
        source: &str,
    ) -> Result<SessionHandle, StartError> {
        if source.trim().is_empty() {
            return Err(StartError::EmptyInput);
        }

        if let Some(prev) = self.sessions.remove(&kind) {
            // Mark non-current before revoking the token (see module docs)
            prev.session.lock().supersede();
            prev.token.cancel();
            tracing::debug!(kind = %kind, session = %prev.id, "superseded active session");
        }

        let timeout = self.config.session_timeout();
        let token = CancellationToken::new();
        let request =
            GenerationRequest::new(kind, source).with_deadline(Instant::now() + timeout);
        let chunks = self.channel.open(&request, &token).await?;

        let mut session = StreamSession::new(kind, timeout);
        session.begin_streaming();
        let id = session.id();
        let deadline = session.deadline();
        let session: SharedSession = Arc::new(Mutex::new(session));

        let (tx, rx) = mpsc::channel(self.config.event_capacity);
        tokio::spawn(drive_session(
            Arc::clone(&session),
            chunks,
            token.clone(),
            deadline,
            timeout,
            tx,
        ));

        tracing::info!(
            kind = %kind,
            session = %id,
            channel = self.channel.name(),
            timeout_ms = self.config.session_timeout_ms,
            "generation session started"
        );

        self.sessions.insert(
            kind,
            SessionSlot {
                id,
                session: Arc::clone(&session),
                token,
            },
        );

        Ok(SessionHandle {
            session_id: id,
            kind,
            events: rx,
            session,
        })
    }

    /// Cancel the active session of `kind` (user-initiated)
    ///
    /// Returns true if a streaming session was stopped. The caller receives
    /// one [`SessionEventKind::Stopped`] and nothing else afterwards, even
    /// if the channel had a chunk or error already in flight.
    pub fn cancel_session(&mut self, kind: GenerationKind) -> bool {
        let Some(slot) = self.sessions.get(&kind) else {
            return false;
        };

        let stopped = {
            let mut session = slot.session.lock();
            if session.is_live() {
                session.cancel_by_user();
                true
            } else {
                false
            }
        };

        if stopped {
            slot.token.cancel();
            tracing::info!(kind = %kind, session = %slot.id, "session stopped by user");
        }
        stopped
    }

    /// Shared access to the most recent session of `kind`, if any
    #[must_use]
    pub fn session(&self, kind: GenerationKind) -> Option<SharedSession> {
        self.sessions.get(&kind).map(|s| Arc::clone(&s.session))
    }

    /// Whether a session of `kind` is currently streaming
    #[must_use]
    pub fn is_streaming(&self, kind: GenerationKind) -> bool {
        self.sessions
            .get(&kind)
            .is_some_and(|s| s.session.lock().is_live())
    }

    /// Commit the completed artifact of `kind` into the document, once
    ///
    /// Delegates to the apply gate; repeat calls for the same completed
    /// session are no-ops.
    pub fn commit<D>(
        &self,
        kind: GenerationKind,
        document: &mut D,
    ) -> Result<CommitOutcome, ApplyError>
    where
        D: SharedDocument + ?Sized,
    {
        let slot = self.sessions.get(&kind).ok_or(ApplyError::NoSession)?;
        gate::commit(&slot.session, document)
    }

    /// Kinds that currently have a streaming session
    #[must_use]
    pub fn streaming_kinds(&self) -> Vec<GenerationKind> {
        self.sessions
            .iter()
            .filter(|(_, slot)| slot.session.lock().is_live())
            .map(|(kind, _)| *kind)
            .collect()
    }
}

// ============================================================================
// Driver task
// ============================================================================

/// Drive one session: forward chunks, enforce the deadline, honor the token
///
/// Every dispatch is gated on the session still being live, read under the
/// lock at dispatch time, so anything that arrives after cancellation or
/// supersession is dropped.
async fn drive_session(
    session: SharedSession,
    mut chunks: mpsc::Receiver<GenerationChunk>,
    token: CancellationToken,
    deadline: Instant,
    timeout: Duration,
    tx: mpsc::Sender<SessionEvent>,
) {
    let expired = tokio::time::sleep_until(deadline);
    tokio::pin!(expired);

    loop {
        tokio::select! {
            // Revocation outranks whatever the channel has queued; without
            // this, a terminal chunk racing a user stop could win the poll
            // and the loop would exit before reporting the stop.
            biased;

            () = token.cancelled() => {
                // The state transition happened before the revocation; only
                // a user stop produces a notification, supersession is silent.
                let stopped_by_user = session.lock().manual_stop();
                if stopped_by_user {
                    emit(&tx, &session, SessionEventKind::Stopped).await;
                }
                break;
            }

            () = &mut expired => {
                let timed_out = {
                    let mut session = session.lock();
                    if session.is_live() {
                        session.time_out();
                        true
                    } else {
                        false
                    }
                };
                if timed_out {
                    // Client-enforced ceiling: revoke the token ourselves so
                    // the channel stops producing.
                    token.cancel();
                    tracing::warn!(
                        session = %session.lock().id(),
                        timeout_ms = timeout.as_millis() as u64,
                        "generation session timed out"
                    );
                    emit(
                        &tx,
                        &session,
                        SessionEventKind::Failed {
                            error: GenerationError::Timeout {
                                timeout_ms: timeout.as_millis() as u64,
                            },
                        },
                    )
                    .await;
                } else {
                    emit_stopped_if_user(&tx, &session).await;
                }
                break;
            }

            chunk = chunks.recv() => match chunk {
                Some(GenerationChunk::Delta(text)) => {
                    // append_chunk refuses once the session is no longer live
                    let delivered = session.lock().append_chunk(&text);
                    if delivered {
                        emit(&tx, &session, SessionEventKind::Chunk { text }).await;
                    }
                }
                Some(GenerationChunk::Done) => {
                    let content = {
                        let mut session = session.lock();
                        if session.is_live() {
                            session.complete();
                            Some(session.buffer().to_string())
                        } else {
                            None
                        }
                    };
                    if let Some(content) = content {
                        emit(&tx, &session, SessionEventKind::Completed { content }).await;
                    } else {
                        emit_stopped_if_user(&tx, &session).await;
                    }
                    break;
                }
                Some(GenerationChunk::Failed(reason)) => {
                    let failed = {
                        let mut session = session.lock();
                        if session.is_live() {
                            session.fail(reason.clone());
                            true
                        } else {
                            false
                        }
                    };
                    if failed {
                        tracing::warn!(
                            session = %session.lock().id(),
                            reason = %reason,
                            "generation channel failed"
                        );
                        emit(
                            &tx,
                            &session,
                            SessionEventKind::Failed {
                                error: GenerationError::Transport(reason),
                            },
                        )
                        .await;
                    } else {
                        emit_stopped_if_user(&tx, &session).await;
                    }
                    break;
                }
                None => {
                    // Channel closed without a terminal event
                    let failed = {
                        let mut session = session.lock();
                        if session.is_live() {
                            session.fail("stream disconnected unexpectedly");
                            true
                        } else {
                            false
                        }
                    };
                    if failed {
                        emit(
                            &tx,
                            &session,
                            SessionEventKind::Failed {
                                error: GenerationError::Transport(
                                    "stream disconnected unexpectedly".to_string(),
                                ),
                            },
                        )
                        .await;
                    } else {
                        emit_stopped_if_user(&tx, &session).await;
                    }
                    break;
                }
            },
        }
    }
}

/// Report a user stop observed on a terminal exit path
///
/// A suppressed terminal chunk means the session went non-live first; when
/// that was a user stop, the stopped signal still has to reach the caller
/// even though the cancellation arm will never run again.
async fn emit_stopped_if_user(tx: &mpsc::Sender<SessionEvent>, session: &SharedSession) {
    let stopped_by_user = session.lock().manual_stop();
    if stopped_by_user {
        emit(tx, session, SessionEventKind::Stopped).await;
    }
}

/// Send an event to the caller; a dropped handle just means nobody listens
async fn emit(tx: &mpsc::Sender<SessionEvent>, session: &SharedSession, payload: SessionEventKind) {
    let (session_id, kind) = {
        let session = session.lock();
        (session.id(), session.kind())
    };
    let _ = tx
        .send(SessionEvent {
            session_id,
            kind,
            payload,
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ScriptedChannel, ScriptedResponse};
    use crate::session::SessionStatus;
    use pretty_assertions::assert_eq;

    fn registry_with(channel: ScriptedChannel) -> SessionRegistry {
        SessionRegistry::new(Arc::new(channel))
    }

    async fn drain(handle: &mut SessionHandle) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_session_creation() {
        let mut registry = registry_with(ScriptedChannel::new());
        let result = registry.start_session(GenerationKind::Summary, "   ").await;
        assert!(matches!(result, Err(StartError::EmptyInput)));
        assert!(registry.session(GenerationKind::Summary).is_none());
    }

    #[tokio::test]
    async fn test_chunks_then_completion() {
        let channel = ScriptedChannel::new();
        channel.push(ScriptedResponse::succeed(["Hello ", "world"]));
        let mut registry = registry_with(channel);

        let mut handle = registry
            .start_session(GenerationKind::ContentRevision, "draft")
            .await
            .unwrap();

        let events = drain(&mut handle).await;
        let payloads: Vec<_> = events.iter().map(|e| &e.payload).collect();
        assert_eq!(
            payloads,
            vec![
                &SessionEventKind::Chunk { text: "Hello ".into() },
                &SessionEventKind::Chunk { text: "world".into() },
                &SessionEventKind::Completed { content: "Hello world".into() },
            ]
        );

        let session = handle.session();
        assert_eq!(session.lock().status(), SessionStatus::Completed);
        assert_eq!(session.lock().buffer(), "Hello world");
    }

    #[tokio::test]
    async fn test_transport_failure_surfaced_once() {
        let channel = ScriptedChannel::new();
        channel.push(ScriptedResponse::fail(["partial"], "connection reset"));
        let mut registry = registry_with(channel);

        let mut handle = registry
            .start_session(GenerationKind::Summary, "draft")
            .await
            .unwrap();

        let events = drain(&mut handle).await;
        let failures: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.payload, SessionEventKind::Failed { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].payload,
            SessionEventKind::Failed {
                error: GenerationError::Transport("connection reset".into())
            }
        );
        assert_eq!(
            handle.session().lock().status(),
            SessionStatus::Errored
        );
    }

    #[tokio::test]
    async fn test_cancel_emits_stopped_not_error() {
        let channel = ScriptedChannel::new();
        channel.push(ScriptedResponse::hang(["partial"]));
        let mut registry = registry_with(channel);

        let mut handle = registry
            .start_session(GenerationKind::Summary, "draft")
            .await
            .unwrap();

        // Let the partial chunk arrive
        let first = handle.recv().await.unwrap();
        assert_eq!(first.payload, SessionEventKind::Chunk { text: "partial".into() });

        assert!(registry.cancel_session(GenerationKind::Summary));

        let events = drain(&mut handle).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, SessionEventKind::Stopped);
        assert_eq!(
            handle.session().lock().status(),
            SessionStatus::Cancelled
        );
        assert!(!registry.is_streaming(GenerationKind::Summary));
    }

    #[tokio::test]
    async fn test_cancel_racing_terminal_event_still_reports_stopped() {
        // Zero-delay failure, so the terminal chunk and the user stop race
        // inside the driver on every iteration. Whichever side wins, the
        // caller gets exactly one coherent terminal notification.
        for _ in 0..100 {
            let channel = ScriptedChannel::new();
            channel.push(ScriptedResponse::fail(["partial "], "connection reset"));
            let mut registry = registry_with(channel);

            let mut handle = registry
                .start_session(GenerationKind::Summary, "draft")
                .await
                .unwrap();
            let stopped = registry.cancel_session(GenerationKind::Summary);

            let events = drain(&mut handle).await;
            let stops = events
                .iter()
                .filter(|e| e.payload == SessionEventKind::Stopped)
                .count();
            let failures = events
                .iter()
                .filter(|e| matches!(e.payload, SessionEventKind::Failed { .. }))
                .count();

            if stopped {
                // The stop won: one Stopped, last, and the late failure is
                // suppressed entirely.
                assert_eq!((stops, failures), (1, 0), "events: {events:?}");
                assert_eq!(events.last().unwrap().payload, SessionEventKind::Stopped);
                assert_eq!(
                    handle.session().lock().status(),
                    SessionStatus::Cancelled
                );
            } else {
                // The failure went terminal first; the registry said so and
                // no stop signal is owed.
                assert_eq!((stops, failures), (0, 1), "events: {events:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_cancel_without_active_session_is_noop() {
        let mut registry = registry_with(ScriptedChannel::new());
        assert!(!registry.cancel_session(GenerationKind::Summary));
    }

    #[tokio::test]
    async fn test_supersession_silences_old_session() {
        let channel = ScriptedChannel::new();
        channel.push(ScriptedResponse::hang(["old "]));
        channel.push(ScriptedResponse::succeed(["new"]));
        let mut registry = registry_with(channel);

        let mut first = registry
            .start_session(GenerationKind::Summary, "draft one")
            .await
            .unwrap();
        let chunk = first.recv().await.unwrap();
        assert_eq!(chunk.payload, SessionEventKind::Chunk { text: "old ".into() });

        let mut second = registry
            .start_session(GenerationKind::Summary, "draft two")
            .await
            .unwrap();

        // The superseded session emits nothing further, not even Stopped
        let leftovers = drain(&mut first).await;
        assert!(leftovers.is_empty());

        let events = drain(&mut second).await;
        assert_eq!(
            events.last().unwrap().payload,
            SessionEventKind::Completed { content: "new".into() }
        );

        // The registry reflects only the new session
        let current = registry.session(GenerationKind::Summary).unwrap();
        assert_eq!(current.lock().id(), second.id());
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let channel = ScriptedChannel::new();
        channel.push(ScriptedResponse::hang(["revision..."]));
        channel.push(ScriptedResponse::succeed(["summary"]));
        let mut registry = registry_with(channel);

        let _revision = registry
            .start_session(GenerationKind::ContentRevision, "body")
            .await
            .unwrap();
        let mut summary = registry
            .start_session(GenerationKind::Summary, "body")
            .await
            .unwrap();

        let events = drain(&mut summary).await;
        assert!(matches!(
            events.last().unwrap().payload,
            SessionEventKind::Completed { .. }
        ));

        // The revision session was not disturbed by the summary lifecycle
        assert!(registry.is_streaming(GenerationKind::ContentRevision));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_timeout_not_transport() {
        let channel = ScriptedChannel::new();
        channel.push(ScriptedResponse::hang(["partial"]));
        let config = AssistConfig::new().with_session_timeout_ms(1_000);
        let mut registry = SessionRegistry::with_config(Arc::new(channel), config);

        let mut handle = registry
            .start_session(GenerationKind::Summary, "draft")
            .await
            .unwrap();

        let first = handle.recv().await.unwrap();
        assert!(matches!(first.payload, SessionEventKind::Chunk { .. }));

        tokio::time::advance(Duration::from_millis(1_100)).await;

        let events = drain(&mut handle).await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].payload,
            SessionEventKind::Failed {
                error: GenerationError::Timeout { timeout_ms: 1_000 }
            }
        );
        assert_eq!(handle.session().lock().status(), SessionStatus::Errored);
    }

    #[tokio::test]
    async fn test_commit_via_registry_is_idempotent() {
        use crate::document::ArticleForm;

        let channel = ScriptedChannel::new();
        channel.push(ScriptedResponse::succeed(["X"]));
        let mut registry = registry_with(channel);

        let mut handle = registry
            .start_session(GenerationKind::Summary, "draft")
            .await
            .unwrap();
        drain(&mut handle).await;

        let mut form = ArticleForm::new();
        assert_eq!(
            registry.commit(GenerationKind::Summary, &mut form),
            Ok(CommitOutcome::Applied)
        );
        assert_eq!(
            registry.commit(GenerationKind::Summary, &mut form),
            Ok(CommitOutcome::AlreadyApplied)
        );
        assert_eq!(form.summary, "X");
    }
}
