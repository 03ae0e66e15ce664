//! Header-field extraction for completion documents.
//!
//! Documents carry a small fixed vocabulary in their header: a `# ` title
//! line plus `**Key**: value` lines for date, task, spec, and status. The
//! document kind comes from path conventions, not content.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tempo_core::{DocumentKind, DocumentMetadata};

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\*\*Date\*\*:\s*(.+)$").unwrap());
static TASK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\*\*Task\*\*:\s*(.+)$").unwrap());
static SPEC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\*\*Spec\*\*:\s*(.+)$").unwrap());
static STATUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\*\*Status\*\*:\s*(.+)$").unwrap());

fn capture(re: &Regex, content: &str) -> Option<String> {
    re.captures(content)
        .map(|caps| caps[1].trim().to_string())
}

/// Extract structured metadata from document content and path.
pub fn extract_metadata(content: &str, path: &Path) -> DocumentMetadata {
    DocumentMetadata {
        title: capture(&TITLE_RE, content).unwrap_or_default(),
        date: capture(&DATE_RE, content),
        task: capture(&TASK_RE, content),
        spec: capture(&SPEC_RE, content),
        status: capture(&STATUS_RE, content),
        kind: classify_kind(path),
    }
}

/// Classify a document from its path conventions.
pub fn classify_kind(path: &Path) -> DocumentKind {
    let path = path.to_string_lossy();
    if path.contains("task-") && path.contains("-completion.md") {
        DocumentKind::TaskCompletion
    } else if path.contains("spec-completion") {
        DocumentKind::SpecCompletion
    } else {
        DocumentKind::Other
    }
}

/// Blake3 digest of document content, hex encoded.
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const DOC: &str = "# Task 3 Completion\n\n\
        **Date**: 2023-10-20\n\
        **Task**: 3.1 Wire up the analyzer\n\
        **Spec**: release-analysis\n\
        **Status**: Complete\n\n\
        ## Summary\n\nDone.\n";

    #[test]
    fn extracts_all_header_fields() {
        let path = PathBuf::from("specs/x/completion/task-3-completion.md");
        let meta = extract_metadata(DOC, &path);

        assert_eq!(meta.title, "Task 3 Completion");
        assert_eq!(meta.date.as_deref(), Some("2023-10-20"));
        assert_eq!(meta.task.as_deref(), Some("3.1 Wire up the analyzer"));
        assert_eq!(meta.spec.as_deref(), Some("release-analysis"));
        assert_eq!(meta.status.as_deref(), Some("Complete"));
        assert_eq!(meta.kind, DocumentKind::TaskCompletion);
    }

    #[test]
    fn missing_fields_are_none() {
        let meta = extract_metadata("plain text, no headers", Path::new("notes.md"));
        assert_eq!(meta.title, "");
        assert!(meta.date.is_none());
        assert!(meta.status.is_none());
        assert_eq!(meta.kind, DocumentKind::Other);
    }

    #[test]
    fn classifies_from_path_conventions() {
        assert_eq!(
            classify_kind(Path::new("specs/a/task-1-completion.md")),
            DocumentKind::TaskCompletion
        );
        assert_eq!(
            classify_kind(Path::new("specs/a/spec-completion/summary.md")),
            DocumentKind::SpecCompletion
        );
        assert_eq!(classify_kind(Path::new("README.md")), DocumentKind::Other);
    }

    #[test]
    fn content_hash_tracks_content() {
        let a = content_hash("alpha");
        let b = content_hash("beta");
        assert_ne!(a, b);
        assert_eq!(a, content_hash("alpha"));
        assert_eq!(a.len(), 64);
    }
}
