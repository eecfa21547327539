//! Data-quality findings accumulated during a run
//!
//! Extraction and linking never fail on bad data. They record a
//! [`Diagnostic`] and keep going; the caller decides what is fatal.

use crate::model::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A file could not be read and was skipped
    UnreadableFile,
    /// A requirement id was defined more than once
    DuplicateRequirement,
    /// Two code references or test cases share an id
    DuplicateRecord,
    /// A satisfies link names a spec clause that does not exist
    InvalidSpecLink,
    /// A code reference implements a requirement that does not exist
    OrphanedCodeReference,
    /// A test case tests a requirement that does not exist
    OrphanedTestReference,
    /// A curated fuzzy-match pattern is not a valid regex
    InvalidPattern,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::UnreadableFile => "unreadable-file",
            DiagnosticKind::DuplicateRequirement => "duplicate-requirement",
            DiagnosticKind::DuplicateRecord => "duplicate-record",
            DiagnosticKind::InvalidSpecLink => "invalid-spec-link",
            DiagnosticKind::OrphanedCodeReference => "orphaned-code-reference",
            DiagnosticKind::OrphanedTestReference => "orphaned-test-reference",
            DiagnosticKind::InvalidPattern => "invalid-pattern",
        }
    }
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// The offending record (requirement id, code reference id, file path, ...)
    pub subject: String,
    /// The missing or conflicting endpoint, when there is one
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            target: None,
            location: None,
            message: message.into(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({location})")?;
        }
        Ok(())
    }
}

/// Ordered collection of findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
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

    /// Findings of one kind, in recorded order.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(move |d| d.kind == kind)
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Put findings in a stable order (kind, subject, target, location).
    pub fn sort(&mut self) {
        self.0.sort();
        self.0.dedup();
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
