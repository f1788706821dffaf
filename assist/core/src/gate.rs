//! Apply Gate
//!
//! Idempotency guard for committing a finished artifact into the shared
//! document. The first commit of a completed session writes through
//! [`SharedDocument::set_content`] and marks the session applied; every
//! later commit of the same session is a no-op. Detection uses the
//! session's `applied` flag, not content equality — two generations can
//! coincidentally produce identical text.

use parking_lot::Mutex;

use crate::document::SharedDocument;
use crate::error::ApplyError;
use crate::session::{SessionStatus, StreamSession};

/// Result of a commit attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The artifact was written into the document
    Applied,
    /// This session was already committed; nothing was written
    AlreadyApplied,
}

/// Commit a completed session's buffer into the shared document, once
///
/// A session that has not completed (still streaming, errored, cancelled)
/// is rejected with [`ApplyError::NotCompleted`]. A fresh session of the
/// same kind starts unapplied, so eligibility resets per generation.
pub fn commit<D>(session: &Mutex<StreamSession>, document: &mut D) -> Result<CommitOutcome, ApplyError>
where
    D: SharedDocument + ?Sized,
{
    // Decide and flip the flag under the lock; write outside it.
    let (kind, content) = {
        let mut session = session.lock();
        if session.status() != SessionStatus::Completed {
            return Err(ApplyError::NotCompleted {
                status: session.status(),
            });
        }
        if !session.mark_applied() {
            return Ok(CommitOutcome::AlreadyApplied);
        }
        (session.kind(), session.buffer().to_string())
    };

    document.set_content(kind, &content);
    tracing::debug!(kind = %kind, bytes = content.len(), "committed generation artifact");
    Ok(CommitOutcome::Applied)
}
