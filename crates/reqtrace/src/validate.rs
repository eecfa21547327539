//! Traceability validation with a CI-friendly exit status
//!
//! Exit codes:
//! - `0` all checks passed
//! - `1` errors, or any warning in strict mode
//! - `2` no requirements were found in CI mode

use crate::output::ratio;
use owo_colors::OwoColorize;
use reqtrace_core::{ClassificationTable, DiagnosticKind, GapAnalysis, TraceGraph};

pub const EXIT_PASSED: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_NO_REQUIREMENTS: i32 = 2;

/// Findings that decide the exit status. Every message names the offending
/// ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validation {
    pub fn run(graph: &TraceGraph, table: &ClassificationTable) -> Self {
        let mut validation = Validation::default();

        for r in &graph.requirements {
            if !r.has_code() {
                validation
                    .warnings
                    .push(format!("Requirement {} has no code implementation", r.id()));
            }
            if !r.has_tests() {
                validation
                    .warnings
                    .push(format!("Requirement {} has no test coverage", r.id()));
            }
            if !table.is_exempt(&r.category) && !r.has_spec_link() {
                validation.errors.push(format!(
                    "Requirement {} has no spec links (missing :satisfies: field)",
                    r.id()
                ));
            }
        }

        for kind in [
            DiagnosticKind::OrphanedCodeReference,
            DiagnosticKind::OrphanedTestReference,
            DiagnosticKind::InvalidSpecLink,
        ] {
            for d in graph.diagnostics.of_kind(kind) {
                validation.warnings.push(d.message.clone());
            }
        }

        validation
    }

    pub fn passed(&self, strict: bool) -> bool {
        self.errors.is_empty() && !(strict && !self.warnings.is_empty())
    }

    pub fn exit_code(&self, strict: bool) -> i32 {
        if self.passed(strict) {
            EXIT_PASSED
        } else {
            EXIT_FAILED
        }
    }
}

pub fn render_validation(validation: &Validation, gaps: &GapAnalysis, strict: bool) -> String {
    let summary = &gaps.summary;
    let mut output = String::new();

    output.push_str("Gap Analysis Summary:\n");
    output.push_str(&format!(
        "  Total requirements: {}\n",
        summary.total_requirements
    ));
    output.push_str(&format!(
        "  Fully traced (code + tests): {}\n",
        ratio(summary.fully_traced, summary.total_requirements)
    ));
    output.push_str(&format!(
        "  Spec-linked requirements: {}/{}\n",
        summary.spec_link_required_present, summary.spec_link_required
    ));
    output.push_str(&format!("  Requirements with code: {}\n", summary.implemented));
    output.push_str(&format!("  Requirements with tests: {}\n", summary.tested));
    output.push_str(&format!(
        "  Missing spec links: {}\n",
        gaps.missing_required_spec_links.len()
    ));
    output.push_str(&format!("  Code references: {}\n", summary.code_references));
    output.push_str(&format!("  Test cases: {}\n", summary.test_cases));

    if !validation.warnings.is_empty() {
        output.push_str(&format!(
            "\n{} ({}):\n",
            "Warnings".yellow().bold(),
            validation.warnings.len()
        ));
        for msg in &validation.warnings {
            output.push_str(&format!("  - {msg}\n"));
        }
    }

    if !validation.errors.is_empty() {
        output.push_str(&format!(
            "\n{} ({}):\n",
            "Errors".red().bold(),
            validation.errors.len()
        ));
        for msg in &validation.errors {
            output.push_str(&format!("  - {msg}\n"));
        }
    }

    if validation.passed(strict) {
        output.push_str(&format!("\n{}\n", "Validation passed!".green().bold()));
    } else if validation.errors.is_empty() {
        output.push_str(&format!(
            "\n{}\n",
            "Validation failed: warnings are errors in strict mode".red().bold()
        ));
    } else {
        output.push_str(&format!("\n{}\n", "Validation failed".red().bold()));
    }

    output
}
