//! Shared Document Boundary
//!
//! The editor form that owns the article fields. This subsystem never owns
//! the document: it reads the applied suggestion values (which other UI
//! affordances mutate concurrently between polls) and requests bounded
//! writes for commits and toggles. Every read may be stale; every write is
//! a read-modify-write of current contents, never a blind overwrite.

use serde::{Deserialize, Serialize};

use crate::session::GenerationKind;

/// View of the surrounding form/editor document
pub trait SharedDocument: Send {
    /// Current applied suggestion values
    fn suggestion_values(&self) -> Vec<String>;

    /// Overwrite the applied suggestion values
    ///
    /// Callers compute `values` from a read of the current set at call
    /// time; the bound on `values.len()` is enforced by the reconciler.
    fn set_suggestion_values(&mut self, values: Vec<String>);

    /// Commit a finished generation artifact into the document
    fn set_content(&mut self, kind: GenerationKind, value: &str);
}

/// In-memory article form
///
/// The concrete document used by tests and headless embedders. A real
/// editor front end implements [`SharedDocument`] over its own form state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleForm {
    /// Applied tag values
    pub tags: Vec<String>,
    /// Article body
    pub content: String,
    /// Article summary
    pub summary: String,
}

impl ArticleForm {
    /// Create an empty form
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a form with initial tags
    #[must_use]
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

impl SharedDocument for ArticleForm {
    fn suggestion_values(&self) -> Vec<String> {
        self.tags.clone()
    }

    fn set_suggestion_values(&mut self, values: Vec<String>) {
        self.tags = values;
    }

    fn set_content(&mut self, kind: GenerationKind, value: &str) {
        match kind {
            GenerationKind::ContentRevision => self.content = value.to_string(),
            GenerationKind::Summary => self.summary = value.to_string(),
        }
    }
}
