//! Generation Channel Abstraction
//!
//! Trait definition for the streamed generation service boundary. This
//! abstraction lets the registry work against any provider (HTTP streaming,
//! local model, test script) without changing lifecycle logic.
//!
//! # Design Philosophy
//!
//! A channel is one request: it yields incremental content fragments
//! followed by exactly one terminal event, or stops early when the caller's
//! cancellation token is revoked. Cancellation is cooperative — revoking the
//! token means "stop producing"; the registry stops listening regardless.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::session::GenerationKind;

/// Events from a generation channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationChunk {
    /// An incremental content fragment
    Delta(String),
    /// Generation completed successfully
    Done,
    /// Generation failed with a reason
    ///
    /// A channel should not emit this once its token has been revoked, but
    /// consumers must tolerate it if it arrives anyway.
    Failed(String),
}

/// A single generation request
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// The operation kind
    pub kind: GenerationKind,
    /// Source content to operate on
    pub source: String,
    /// Absolute deadline; channels may use it to bound server-side work
    ///
    /// The registry enforces its own ceiling independently, so honoring
    /// this is advisory.
    pub deadline: Option<Instant>,
}

impl GenerationRequest {
    /// Create a new request
    pub fn new(kind: GenerationKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            deadline: None,
        }
    }

    /// Set the advisory deadline
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Generation channel trait
///
/// Implement this trait to connect a content-generation provider.
#[async_trait]
pub trait GenerationChannel: Send + Sync {
    /// Get the channel name (for logs)
    fn name(&self) -> &str;

    /// Open a streamed request
    ///
    /// Returns a receiver that yields [`GenerationChunk`]s in order. The
    /// sender side must stop (and may close the channel without a terminal
    /// event) once `cancel` is revoked.
    async fn open(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<GenerationChunk>>;
}

// ============================================================================
// Scripted channel (test harness)
// ============================================================================

/// One scripted reply for [`ScriptedChannel`]
#[derive(Debug)]
pub struct ScriptedResponse {
    events: Vec<GenerationChunk>,
    /// Keep the sender open after the last event (no terminal ever arrives)
    hold_open: bool,
    /// Delay before each event
    delay: Duration,
}

impl ScriptedResponse {
    /// A reply that streams `chunks` and then completes
    #[must_use]
    pub fn succeed<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<GenerationChunk> = chunks
            .into_iter()
            .map(|c| GenerationChunk::Delta(c.into()))
            .collect();
        events.push(GenerationChunk::Done);
        Self {
            events,
            hold_open: false,
            delay: Duration::ZERO,
        }
    }

    /// A reply that streams `chunks` and then fails with `reason`
    #[must_use]
    pub fn fail<I, S>(chunks: I, reason: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<GenerationChunk> = chunks
            .into_iter()
            .map(|c| GenerationChunk::Delta(c.into()))
            .collect();
        events.push(GenerationChunk::Failed(reason.into()));
        Self {
            events,
            hold_open: false,
            delay: Duration::ZERO,
        }
    }

    /// A reply that streams `chunks` and then hangs without a terminal event
    ///
    /// Used to exercise the deadline path.
    #[must_use]
    pub fn hang<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            events: chunks
                .into_iter()
                .map(|c| GenerationChunk::Delta(c.into()))
                .collect(),
            hold_open: true,
            delay: Duration::ZERO,
        }
    }

    /// Add a delay before each event
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A channel that replays queued [`ScriptedResponse`]s, one per `open` call
///
/// Lets tests and downstream harnesses drive the registry without a network
/// provider. Respects cancellation the way a real channel must.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    queue: Mutex<VecDeque<ScriptedResponse>>,
}

impl ScriptedChannel {
    /// Create an empty scripted channel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next reply
    pub fn push(&self, response: ScriptedResponse) {
        self.queue.lock().push_back(response);
    }
}

#[async_trait]
impl GenerationChannel for ScriptedChannel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(
        &self,
        _request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<GenerationChunk>> {
        let response = self
            .queue
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted response queued"))?;

        let (tx, rx) = mpsc::channel(32);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            for event in response.events {
                if !response.delay.is_zero() {
                    tokio::select! {
                        () = tokio::time::sleep(response.delay) => {}
                        () = cancel.cancelled() => return,
                    }
                }
                tokio::select! {
                    sent = tx.send(event) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                    () = cancel.cancelled() => return,
                }
            }
            if response.hold_open {
                // Keep the sender alive so the receiver never disconnects
                cancel.cancelled().await;
            }
        });

        Ok(rx)
    }
}
