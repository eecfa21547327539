//! Structured output types for reqtrace
//!
//! This crate contains only the document types written to `matrix.json` and
//! read back as a diff baseline. Records are keyed by id so the document is
//! stable across runs; the `generated` timestamp is the only field that
//! changes when nothing else did.

use reqtrace_core::{
    ComplianceLevel, GapAnalysis, ProjectStage, Requirement, SourceLocation, Summary, TraceGraph,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixDocument {
    /// RFC 3339 time of generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
    #[serde(default)]
    pub project: String,
    pub summary: Summary,
    pub compliance: ComplianceLevel,
    pub stage: ProjectStage,
    pub requirements: BTreeMap<String, MatrixRequirement>,
    #[serde(default)]
    pub spec_clauses: BTreeMap<String, MatrixSpecClause>,
    #[serde(default)]
    pub code_references: BTreeMap<String, MatrixCodeRef>,
    #[serde(default)]
    pub test_cases: BTreeMap<String, MatrixTestCase>,
    #[serde(default)]
    pub diagnostics: Vec<MatrixDiagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRequirement {
    pub id: String,
    pub title: String,
    pub category: String,
    pub priority: String,
    #[serde(default)]
    pub satisfies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `path:line` of the directive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub implemented_by: Vec<String>,
    #[serde(default)]
    pub tested_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSpecClause {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCodeRef {
    pub id: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub satisfies: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixTestCase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixDiagnostic {
    pub kind: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub message: String,
}

impl MatrixDocument {
    /// Snapshot a graph and its analysis. `generated` is left unset.
    pub fn new(project: impl Into<String>, graph: &TraceGraph, gaps: &GapAnalysis) -> Self {
        let requirements = graph
            .requirements
            .iter()
            .map(|r| {
                let req = &r.requirement;
                let entry = MatrixRequirement {
                    id: req.id.clone(),
                    title: req.title.clone(),
                    category: r.category.to_string(),
                    priority: r.priority.to_string(),
                    satisfies: req.satisfies.clone(),
                    status: req.status.clone(),
                    source: req.source.as_ref().map(ToString::to_string),
                    implemented_by: r.implemented_by.iter().cloned().collect(),
                    tested_by: r.tested_by.iter().cloned().collect(),
                };
                (req.id.clone(), entry)
            })
            .collect();

        let spec_clauses = graph
            .spec_clauses
            .iter()
            .map(|c| {
                let entry = MatrixSpecClause {
                    id: c.id.clone(),
                    title: c.title.clone(),
                    file: c
                        .source_file
                        .as_ref()
                        .map(|f| f.display().to_string().replace('\\', "/")),
                };
                (c.id.clone(), entry)
            })
            .collect();

        let code_references = graph
            .code_refs
            .iter()
            .map(|c| {
                let entry = MatrixCodeRef {
                    id: c.id.clone(),
                    location: c.location.to_string(),
                    function: c.function_name.clone(),
                    implements: c.implements.clone(),
                    satisfies: c.satisfies.clone(),
                    description: c.description.clone(),
                };
                (c.id.clone(), entry)
            })
            .collect();

        let test_cases = graph
            .test_cases
            .iter()
            .map(|t| {
                let entry = MatrixTestCase {
                    id: t.id.clone(),
                    name: t.test_name.clone(),
                    location: t.location.to_string(),
                    tests: t.tests.clone(),
                    description: t.description.clone(),
                };
                (t.id.clone(), entry)
            })
            .collect();

        let diagnostics = graph
            .diagnostics
            .iter()
            .map(|d| MatrixDiagnostic {
                kind: d.kind.to_string(),
                subject: d.subject.clone(),
                target: d.target.clone(),
                location: d.location.as_ref().map(ToString::to_string),
                message: d.message.clone(),
            })
            .collect();

        Self {
            generated: None,
            project: project.into(),
            summary: gaps.summary.clone(),
            compliance: gaps.compliance,
            stage: gaps.stage,
            requirements,
            spec_clauses,
            code_references,
            test_cases,
            diagnostics,
        }
    }

    pub fn with_generated(mut self, generated: impl Into<String>) -> Self {
        self.generated = Some(generated.into());
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn requirement_count(&self) -> usize {
        self.requirements.len()
    }

    /// Implemented-by plus tested-by edges over all requirements.
    pub fn link_count(&self) -> usize {
        self.requirements
            .values()
            .map(|r| r.implemented_by.len() + r.tested_by.len())
            .sum()
    }

    /// The requirements as plain records, in id order.
    pub fn to_requirements(&self) -> Vec<Requirement> {
        self.requirements
            .values()
            .map(|r| Requirement {
                id: r.id.clone(),
                title: r.title.clone(),
                satisfies: r.satisfies.clone(),
                status: r.status.clone(),
                source: r.source.as_deref().and_then(SourceLocation::parse),
                code_location: None,
            })
            .collect()
    }
}
