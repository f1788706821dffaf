//! Assist Core - Headless AI-Assist Orchestration for the Article Editor
//!
//! This crate drives the article editor's AI-assist features, completely
//! independent of any UI framework: long-running streamed generation
//! sessions (content revision, summary) that can be started, superseded,
//! cancelled, and time-bounded, plus continuous reconciliation of AI tag
//! suggestions against a shared, externally-mutable form.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Editor UI surface                        │
//! │   start/cancel kind · commit artifact · toggle suggestions   │
//! └───────────────┬──────────────────────────────┬───────────────┘
//!                 │                              │
//! ┌───────────────┴───────────────┐  ┌───────────┴───────────────┐
//! │        SessionRegistry        │  │     SuggestionWatcher     │
//! │  one StreamSession per kind   │  │  500ms reconcile poll     │
//! │  cancel / supersede / timeout │  │  toggle / bulk toggle     │
//! └───────────────┬───────────────┘  └───────────┬───────────────┘
//!                 │                              │
//! ┌───────────────┴───────────────┐  ┌───────────┴───────────────┐
//! │      GenerationChannel        │  │      SharedDocument       │
//! │   (streamed provider, ext.)   │  │  (form state, ext. owned) │
//! └───────────────────────────────┘  └───────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SessionRegistry`]: at most one live session per [`GenerationKind`]
//! - [`SessionHandle`]: the caller's view of one session's event stream
//! - [`SuggestionReconciler`]: applied-subset computation and bounded toggles
//! - [`SuggestionWatcher`]: the recurring reconciliation poll
//! - [`GenerationChannel`]: the streamed provider boundary
//! - [`SharedDocument`]: the externally-owned form boundary
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use assist_core::{GenerationKind, SessionEventKind, SessionRegistry};
//!
//! # async fn run(channel: Arc<dyn assist_core::GenerationChannel>) {
//! let mut registry = SessionRegistry::new(channel);
//! let mut handle = registry
//!     .start_session(GenerationKind::Summary, "article body")
//!     .await
//!     .unwrap();
//!
//! while let Some(event) = handle.recv().await {
//!     match event.payload {
//!         SessionEventKind::Chunk { text } => print!("{text}"),
//!         SessionEventKind::Completed { content } => println!("\n--\n{content}"),
//!         SessionEventKind::Stopped => println!("stopped"),
//!         SessionEventKind::Failed { error } => eprintln!("{error}"),
//!     }
//! }
//! # }
//! ```
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any rendering framework. It is
//! pure orchestration logic that a web front end, TUI, or test harness can
//! embed.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channel;
pub mod config;
pub mod document;
pub mod error;
pub mod gate;
pub mod registry;
pub mod session;
pub mod suggestions;
pub mod watcher;

// Re-exports for convenience
pub use channel::{GenerationChannel, GenerationChunk, GenerationRequest, ScriptedChannel, ScriptedResponse};
pub use config::{AssistConfig, DEFAULT_MAX_APPLIED, DEFAULT_RECONCILE_INTERVAL_MS, DEFAULT_SESSION_TIMEOUT_MS};
pub use document::{ArticleForm, SharedDocument};
pub use error::{ApplyError, CapacityError, GenerationError, StartError};
pub use gate::{commit, CommitOutcome};
pub use registry::{SessionEvent, SessionEventKind, SessionHandle, SessionRegistry, SharedSession};
pub use session::{GenerationKind, SessionId, SessionOutcome, SessionStatus, StreamSession};
pub use suggestions::{
    BulkOutcome, Reconciliation, SuggestionReconciler, SuggestionSet, ToggleOutcome, MAX_APPLIED,
};
pub use watcher::SuggestionWatcher;
