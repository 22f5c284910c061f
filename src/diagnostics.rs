//! Recoverable per-record findings collected during a run.
//!
//! Nothing here aborts a batch. Each stage pushes what it skipped or
//! discarded, and the caller inspects the list instead of scraping logs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a recoverable condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Source category could not be detected; record excluded.
    UnrecognizedFormat,
    /// Record has no usable text field; record dropped.
    MissingRequiredField,
    /// Timestamp present but unparseable; item kept without `created_at`.
    InvalidTimestamp,
    /// A second record reused an id already seen in this batch.
    DuplicateId,
    /// Candidate action sentence too short or too long; candidate discarded.
    ActionOutOfBounds,
    /// Edge endpoint missing from the materialized graph; edge dropped.
    DanglingEdge,
}

impl DiagnosticKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::UnrecognizedFormat => "unrecognized-format",
            Self::MissingRequiredField => "missing-required-field",
            Self::InvalidTimestamp => "invalid-timestamp",
            Self::DuplicateId => "duplicate-id",
            Self::ActionOutOfBounds => "action-out-of-bounds",
            Self::DanglingEdge => "dangling-edge",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// One human-readable warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// What the finding is about: a record index, content id, or edge.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject, self.message)
    }
}

/// Ordered list of diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding and emit it as a `tracing` warning.
    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        tracing::warn!(
            kind = %diagnostic.kind,
            subject = %diagnostic.subject,
            "{}",
            diagnostic.message
        );
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// Number of findings of the given kind.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.0.iter().filter(|d| d.kind == kind).count()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A stage result paired with the diagnostics it produced.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Diagnostics,
}

impl<T> Outcome<T> {
    pub fn new(value: T, diagnostics: Diagnostics) -> Self {
        Self { value, diagnostics }
    }

    /// Split into the value and its diagnostics.
    pub fn into_parts(self) -> (T, Diagnostics) {
        (self.value, self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_count_by_kind() {
        let mut diags = Diagnostics::new();
        diags.push(DiagnosticKind::MissingRequiredField, "record 3", "no text field");
        diags.push(DiagnosticKind::DuplicateId, "post-1", "already seen");
        diags.push(DiagnosticKind::MissingRequiredField, "record 7", "blank text");

        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count(DiagnosticKind::MissingRequiredField), 2);
        assert_eq!(diags.count(DiagnosticKind::DanglingEdge), 0);
    }

    #[test]
    fn display_includes_kind_label() {
        let diag = Diagnostic {
            kind: DiagnosticKind::UnrecognizedFormat,
            subject: "record 0".into(),
            message: "no detection rule matched".into(),
        };
        assert_eq!(
            diag.to_string(),
            "[unrecognized-format] record 0: no detection rule matched"
        );
    }

    #[test]
    fn serializes_as_plain_list() {
        let mut diags = Diagnostics::new();
        diags.push(DiagnosticKind::DanglingEdge, "edge", "missing target");
        let json = serde_json::to_value(&diags).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["kind"], "dangling-edge");
    }
}
