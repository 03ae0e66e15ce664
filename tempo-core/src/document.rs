//! Completion-document data model.
//!
//! A completion document is a Markdown file recording the outcome of a
//! development task. The parsing cache extracts a small fixed vocabulary of
//! header fields from each document; the resulting value objects flow through
//! the rest of the release-analysis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Document classification derived from path conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    /// `task-<n>-completion.md` files
    TaskCompletion,
    /// Files under a `spec-completion` path
    SpecCompletion,
    /// Everything else
    Other,
}

impl Default for DocumentKind {
    fn default() -> Self {
        Self::Other
    }
}

/// Structured header fields extracted from a completion document.
///
/// All fields except `title` and `kind` come from `**Key**: value` lines in
/// the document header and are absent when the document omits them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Title from the first `# ` heading line
    pub title: String,
    pub date: Option<String>,
    pub task: Option<String>,
    pub spec: Option<String>,
    pub status: Option<String>,
    pub kind: DocumentKind,
}

/// A parsed completion document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionDocument {
    /// Path relative to the analysis working directory
    pub path: PathBuf,

    /// Full document text
    pub content: String,

    /// Filesystem modification time at parse time
    pub modified: DateTime<Utc>,

    /// Hash of the most recent commit touching this path. Empty when the
    /// lookup failed or the file is not tracked; never an error.
    pub git_commit: String,

    pub metadata: DocumentMetadata,
}

impl CompletionDocument {
    /// Size of the document content in bytes.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}
