//! Suggestion Reconciliation
//!
//! Keeps an AI-generated suggestion set consistent with the shared
//! document's applied values, which the user and other UI widgets mutate
//! at any time. Reconciliation is a pure read: intersect the suggestion
//! set with the document's current values. Toggles are read-then-write
//! against current contents, never a stale cached copy, and every write
//! honors the applied-value bound.
//!
//! # Design Philosophy
//!
//! Suggestion sets are small (a handful of tags) and mutation happens at
//! human typing speed, so simple linear scans and wholesale rewrites of
//! the value list are the right tradeoff. Bulk application is
//! all-or-nothing: a partial, order-dependent result on overflow would be
//! more confusing than a clean rejection that reports remaining capacity.

use serde::{Deserialize, Serialize};

use crate::document::SharedDocument;
use crate::error::CapacityError;

/// The fixed upper bound on applied suggestion values
pub const MAX_APPLIED: usize = crate::config::DEFAULT_MAX_APPLIED;

/// A set of suggestion values produced atomically by one generation call
///
/// Order-preserving and deduplicated; replaced wholesale on every new
/// generation request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionSet {
    items: Vec<String>,
}

impl SuggestionSet {
    /// Build a set from raw values, trimming, dropping empties, and
    /// deduplicating while preserving order
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            let value = value.trim();
            if value.is_empty() || items.iter().any(|v| v == value) {
                continue;
            }
            items.push(value.to_string());
        }
        Self { items }
    }

    /// The suggestion values, in generation order
    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Number of suggestions
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the set contains `value`
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.items.iter().any(|v| v == value)
    }
}

/// Which suggestions are currently reflected in the document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Members of the suggestion set present in the document right now
    pub applied: Vec<String>,
    /// True when every suggestion is applied and the set is non-empty
    pub all_applied: bool,
}

impl Reconciliation {
    /// Whether a particular suggestion is currently applied
    #[must_use]
    pub fn is_applied(&self, value: &str) -> bool {
        self.applied.iter().any(|v| v == value)
    }
}

/// Result of toggling a single suggestion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The suggestion was added to the document
    Applied,
    /// The suggestion was removed from the document
    Unapplied,
}

/// Result of a bulk toggle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkOutcome {
    /// All missing suggestions were added
    Applied {
        /// How many values were newly added
        added: usize,
    },
    /// Every suggestion was applied already, so all were removed
    Cleared {
        /// How many values were removed
        removed: usize,
    },
}

/// Reconciles suggestion sets against the shared document
#[derive(Clone, Copy, Debug)]
pub struct SuggestionReconciler {
    max_applied: usize,
}

impl Default for SuggestionReconciler {
    fn default() -> Self {
        Self::new(MAX_APPLIED)
    }
}

impl SuggestionReconciler {
    /// Create a reconciler with a custom applied-value bound
    #[must_use]
    pub fn new(max_applied: usize) -> Self {
        Self { max_applied }
    }

    /// The configured bound
    #[must_use]
    pub fn max_applied(&self) -> usize {
        self.max_applied
    }

    /// Compute which suggestions are currently applied
    ///
    /// Reads the document once, at call time.
    pub fn reconcile<D>(&self, set: &SuggestionSet, document: &D) -> Reconciliation
    where
        D: SharedDocument + ?Sized,
    {
        let current = document.suggestion_values();
        let applied: Vec<String> = set
            .items()
            .iter()
            .filter(|item| current.iter().any(|v| v == *item))
            .cloned()
            .collect();
        let all_applied = !set.is_empty() && applied.len() == set.len();
        Reconciliation { applied, all_applied }
    }

    /// Toggle one suggestion in the document
    ///
    /// Removal always succeeds; addition is rejected with the remaining
    /// capacity (zero) when the document is already at the bound. The
    /// document is read immediately before the write so concurrent edits
    /// through other affordances are not clobbered.
    pub fn toggle<D>(&self, value: &str, document: &mut D) -> Result<ToggleOutcome, CapacityError>
    where
        D: SharedDocument + ?Sized,
    {
        let mut current = document.suggestion_values();

        if let Some(pos) = current.iter().position(|v| v == value) {
            current.remove(pos);
            document.set_suggestion_values(current);
            return Ok(ToggleOutcome::Unapplied);
        }

        if current.len() >= self.max_applied {
            tracing::debug!(
                value = value,
                max = self.max_applied,
                "toggle rejected: applied values at capacity"
            );
            return Err(CapacityError::Exceeded {
                max: self.max_applied,
                remaining: self.max_applied.saturating_sub(current.len()),
            });
        }

        current.push(value.to_string());
        document.set_suggestion_values(current);
        Ok(ToggleOutcome::Applied)
    }

    /// Apply or clear the whole suggestion set
    ///
    /// When everything is already applied, every member is removed.
    /// Otherwise the missing members are added as one unit: if they do not
    /// all fit under the bound, nothing is written and the rejection
    /// reports exactly how many more would fit.
    pub fn toggle_all<D>(
        &self,
        set: &SuggestionSet,
        document: &mut D,
    ) -> Result<BulkOutcome, CapacityError>
    where
        D: SharedDocument + ?Sized,
    {
        let mut current = document.suggestion_values();
        let applied_count = set
            .items()
            .iter()
            .filter(|item| current.iter().any(|v| v == *item))
            .count();
        let all_applied = !set.is_empty() && applied_count == set.len();

        if all_applied {
            current.retain(|v| !set.contains(v));
            let removed = set.len();
            document.set_suggestion_values(current);
            return Ok(BulkOutcome::Cleared { removed });
        }

        let to_add: Vec<String> = set
            .items()
            .iter()
            .filter(|item| !current.iter().any(|v| v == *item))
            .cloned()
            .collect();

        if current.len() + to_add.len() > self.max_applied {
            let remaining = self.max_applied.saturating_sub(current.len());
            tracing::debug!(
                requested = to_add.len(),
                remaining = remaining,
                max = self.max_applied,
                "bulk apply rejected: would exceed capacity"
            );
            return Err(CapacityError::Exceeded {
                max: self.max_applied,
                remaining,
            });
        }

        let added = to_add.len();
        current.extend(to_add);
        document.set_suggestion_values(current);
        Ok(BulkOutcome::Applied { added })
    }
}
