//! Suggestion Watcher
//!
//! The recurring reconciliation poll. The shared document is mutated by
//! several independent UI affordances, and its owner does not guarantee a
//! change notification for every mutation path — so while the suggestion
//! panel is visible, the watcher re-reads the document on a fixed cadence
//! and publishes fresh [`Reconciliation`] snapshots. Polling over
//! subscription is a deliberate correctness-over-efficiency choice given
//! the small set sizes and human-scale interaction cadence.
//!
//! Immediate recomputes happen when a new suggestion set is installed and
//! when the panel transitions from hidden to visible.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::AssistConfig;
use crate::document::SharedDocument;
use crate::suggestions::{Reconciliation, SuggestionReconciler, SuggestionSet};

struct WatcherState {
    set: SuggestionSet,
    visible: bool,
}

/// Drives the reconciliation poll on a background task
///
/// Dropping the watcher (or calling [`SuggestionWatcher::shutdown`]) stops
/// the task.
pub struct SuggestionWatcher {
    state: Arc<Mutex<WatcherState>>,
    wake: Arc<Notify>,
    shutdown: CancellationToken,
    output: watch::Receiver<Reconciliation>,
}

impl SuggestionWatcher {
    /// Spawn a watcher over `document` with an initial suggestion set
    ///
    /// The watcher starts visible and publishes an initial snapshot
    /// computed synchronously before the task runs.
    #[must_use]
    pub fn spawn<D>(
        document: Arc<Mutex<D>>,
        set: SuggestionSet,
        config: &AssistConfig,
    ) -> Self
    where
        D: SharedDocument + 'static,
    {
        let reconciler = SuggestionReconciler::new(config.max_applied);
        let initial = reconciler.reconcile(&set, &*document.lock());
        let (tx, rx) = watch::channel(initial);

        let state = Arc::new(Mutex::new(WatcherState { set, visible: true }));
        let wake = Arc::new(Notify::new());
        let shutdown = CancellationToken::new();

        tokio::spawn(poll_loop(
            document,
            Arc::clone(&state),
            Arc::clone(&wake),
            shutdown.clone(),
            tx,
            reconciler,
            config.reconcile_interval(),
        ));

        Self {
            state,
            wake,
            shutdown,
            output: rx,
        }
    }

    /// Subscribe to reconciliation snapshots
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Reconciliation> {
        self.output.clone()
    }

    /// The most recently published snapshot
    #[must_use]
    pub fn latest(&self) -> Reconciliation {
        self.output.borrow().clone()
    }

    /// Install a new suggestion set and recompute immediately
    ///
    /// Called when a generation produces a fresh set; the old set is
    /// replaced wholesale.
    pub fn set_suggestions(&self, set: SuggestionSet) {
        self.state.lock().set = set;
        self.wake.notify_one();
    }

    /// Report a visibility transition of the presenting panel
    ///
    /// Hidden panels skip poll ticks; a hidden-to-visible transition
    /// recomputes immediately.
    pub fn set_visible(&self, visible: bool) {
        let became_visible = {
            let mut state = self.state.lock();
            let was = state.visible;
            state.visible = visible;
            visible && !was
        };
        if became_visible {
            self.wake.notify_one();
        }
    }

    /// Stop the poll task
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for SuggestionWatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn poll_loop<D>(
    document: Arc<Mutex<D>>,
    state: Arc<Mutex<WatcherState>>,
    wake: Arc<Notify>,
    shutdown: CancellationToken,
    tx: watch::Sender<Reconciliation>,
    reconciler: SuggestionReconciler,
    every: std::time::Duration,
) where
    D: SharedDocument,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; the spawn already published that state
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = wake.notified() => {}
            _ = ticker.tick() => {
                if !state.lock().visible {
                    continue;
                }
            }
        }

        let set = state.lock().set.clone();
        let snapshot = {
            let document = document.lock();
            reconciler.reconcile(&set, &*document)
        };
        tx.send_replace(snapshot);
    }
}
