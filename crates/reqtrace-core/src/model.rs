//! Records produced by extraction

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// A place in a file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File path (relative to the project root when known)
    pub file: PathBuf,
    /// Line number (1-indexed)
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Parse a `path:line` string. The path itself may contain colons.
    pub fn parse(location: &str) -> Option<Self> {
        let (path, line) = location.trim().rsplit_once(':')?;
        if path.is_empty() {
            return None;
        }
        let line = line.trim().parse().ok()?;
        Some(Self::new(path, line))
    }

    /// This location with its path made relative to `root` (unchanged if it
    /// lives elsewhere).
    pub fn relative_to(&self, root: &Path) -> Self {
        let file = self
            .file
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.file.clone());
        Self {
            file,
            line: self.line,
        }
    }

    /// File stem used when deriving record ids.
    pub fn stem(&self) -> String {
        self.file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            self.file.display().to_string().replace('\\', "/"),
            self.line
        )
    }
}

/// A requirement declared in a documentation directive.
///
/// The link sets are not part of this type: they are computed by the linker
/// and live on [`crate::TracedRequirement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Normalized (uppercase) id
    pub id: String,
    /// Directive title
    pub title: String,
    /// Normalized spec-clause ids from the `satisfies` attribute
    #[serde(default)]
    pub satisfies: Vec<String>,
    /// Free-text `status` attribute
    #[serde(default)]
    pub status: Option<String>,
    /// Where the directive was found
    #[serde(default)]
    pub source: Option<SourceLocation>,
    /// `**Code Location**: ``path`` ` hint from the directive body
    #[serde(default)]
    pub code_location: Option<String>,
}

/// An upstream specification clause. Only ever a link target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecClause {
    /// Normalized (lowercase) id
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source_file: Option<PathBuf>,
}

/// A source location annotated as implementing requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReference {
    /// `CODE_<stem>_<line>`
    pub id: String,
    pub location: SourceLocation,
    /// Nearest following declaration, when one was found
    #[serde(default)]
    pub function_name: Option<String>,
    /// Normalized requirement ids
    #[serde(default)]
    pub implements: Vec<String>,
    /// Normalized spec-clause ids
    #[serde(default)]
    pub satisfies: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl CodeReference {
    /// The deterministic id for a code reference at `location`.
    pub fn derive_id(location: &SourceLocation) -> String {
        format!("CODE_{}_{}", location.stem(), location.line)
    }
}

/// A test location annotated as exercising requirements or spec clauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// `@test_case` id, or `TC_<stem>_<line>` when none was given
    pub id: String,
    pub location: SourceLocation,
    #[serde(default)]
    pub test_name: Option<String>,
    /// Normalized references: requirement ids, spec ids, or test-internal tokens
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl TestCase {
    /// The id used when a block has `@tests` but no `@test_case`.
    pub fn derive_id(location: &SourceLocation) -> String {
        format!("TC_{}_{}", location.stem(), location.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_round_trips_through_display() {
        let loc = SourceLocation::new("src/serialization/serializer.cpp", 42);
        assert_eq!(loc.to_string(), "src/serialization/serializer.cpp:42");
        assert_eq!(SourceLocation::parse(&loc.to_string()), Some(loc));
    }

    #[test]
    fn location_parse_rejects_garbage() {
        assert_eq!(SourceLocation::parse("no-line"), None);
        assert_eq!(SourceLocation::parse(":12"), None);
        assert_eq!(SourceLocation::parse("file.cpp:abc"), None);
        assert_eq!(
            SourceLocation::parse("C:/proj/file.cpp:7"),
            Some(SourceLocation::new("C:/proj/file.cpp", 7))
        );
    }

    #[test]
    fn ids_derive_from_stem_and_line() {
        let loc = SourceLocation::new("src/serialization/serializer.cpp", 42);
        assert_eq!(CodeReference::derive_id(&loc), "CODE_serializer_42");
        let loc = SourceLocation::new("tests/test_ser.py", 10);
        assert_eq!(TestCase::derive_id(&loc), "TC_test_ser_10");
    }

    #[test]
    fn relative_to_strips_root() {
        let loc = SourceLocation::new("/proj/src/a.cpp", 3);
        assert_eq!(
            loc.relative_to(Path::new("/proj")),
            SourceLocation::new("src/a.cpp", 3)
        );
        assert_eq!(loc.relative_to(Path::new("/other")), loc);
    }
}
