//! The `needs` interchange document
//!
//! Code references and test cases are handed to downstream stages as a
//! sphinx-needs style JSON document:
//!
//! ```json
//! { "created": "...", "project": "...",
//!   "versions": { "current": { "needs": { "CODE_x_3": { ... } } } } }
//! ```
//!
//! List fields are comma-joined strings. Loading splits and normalizes them
//! again, so a hand-edited document links the same way a scanned one does.

use crate::extract::Extraction;
use crate::ids::{parse_ref_list, parse_req_list, parse_spec_list};
use crate::model::{CodeReference, SourceLocation, TestCase};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const NEED_CODE_REF: &str = "code_ref";
pub const NEED_TEST_CASE: &str = "test_case";

/// Title prefix for code references without a declaration.
const ANONYMOUS_CODE: &str = "Code";
/// Title prefix for test cases without a test name.
const ANONYMOUS_TEST: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsDocument {
    pub created: String,
    pub project: String,
    pub versions: NeedsVersions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsVersions {
    #[serde(default)]
    pub current: NeedsVersion,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsVersion {
    #[serde(default)]
    pub needs: BTreeMap<String, NeedRecord>,
}

/// One entry of the `needs` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `path:line`
    #[serde(default)]
    pub code_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satisfies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<String>,
}

impl NeedRecord {
    fn location(&self) -> SourceLocation {
        SourceLocation::parse(&self.code_location)
            .unwrap_or_else(|| SourceLocation::new(&self.code_location, 0))
    }

    /// The declaration name embedded in the title, if there was one.
    fn name(&self, anonymous: &str) -> Option<String> {
        let suffix = format!(" ({})", self.code_location);
        let name = self.title.strip_suffix(&suffix).unwrap_or(&self.title).trim();
        (!name.is_empty() && name != anonymous).then(|| name.to_string())
    }
}

impl NeedsDocument {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            created: "reqtrace".to_string(),
            project: project.into(),
            versions: NeedsVersions::default(),
        }
    }

    /// Build a document from extracted records, with locations made relative
    /// to `root`.
    pub fn from_records(
        project: impl Into<String>,
        code_refs: &[CodeReference],
        test_cases: &[TestCase],
        root: &Path,
    ) -> Self {
        let mut doc = Self::new(project);
        let needs = &mut doc.versions.current.needs;

        for code in code_refs {
            let location = code.location.relative_to(root).to_string();
            let name = code.function_name.as_deref().unwrap_or(ANONYMOUS_CODE);
            needs.insert(
                code.id.clone(),
                NeedRecord {
                    id: code.id.clone(),
                    kind: NEED_CODE_REF.to_string(),
                    title: format!("{name} ({location})"),
                    description: code.description.clone(),
                    code_location: location,
                    implements: Some(code.implements.join(", ")),
                    satisfies: Some(code.satisfies.join(", ")),
                    tests: None,
                },
            );
        }

        for test in test_cases {
            let location = test.location.relative_to(root).to_string();
            let name = test.test_name.as_deref().unwrap_or(ANONYMOUS_TEST);
            needs.insert(
                test.id.clone(),
                NeedRecord {
                    id: test.id.clone(),
                    kind: NEED_TEST_CASE.to_string(),
                    title: format!("{name} ({location})"),
                    description: test.description.clone(),
                    code_location: location,
                    implements: None,
                    satisfies: None,
                    tests: Some(test.tests.join(", ")),
                },
            );
        }

        doc
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).wrap_err("Failed to serialize needs document")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).wrap_err("Failed to parse needs document")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&json).wrap_err_with(|| format!("Failed to load {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.versions.current.needs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.current.needs.is_empty()
    }

    /// Turn the document back into records. Records of unknown type are
    /// skipped.
    pub fn into_extraction(self) -> Extraction {
        let mut out = Extraction::new();
        for (key, record) in self.versions.current.needs {
            let id = if record.id.trim().is_empty() {
                key
            } else {
                record.id.trim().to_string()
            };
            match record.kind.as_str() {
                NEED_CODE_REF => out.code_refs.push(CodeReference {
                    id,
                    location: record.location(),
                    function_name: record.name(ANONYMOUS_CODE),
                    implements: parse_req_list(record.implements.as_deref().unwrap_or("")),
                    satisfies: parse_spec_list(record.satisfies.as_deref().unwrap_or("")),
                    description: record.description,
                }),
                NEED_TEST_CASE => out.test_cases.push(TestCase {
                    id,
                    location: record.location(),
                    test_name: record.name(ANONYMOUS_TEST),
                    tests: parse_ref_list(record.tests.as_deref().unwrap_or("")),
                    description: record.description,
                }),
                other => debug!(id = %id, kind = other, "skipping need of unknown type"),
            }
        }
        out.finish();
        out
    }
}
