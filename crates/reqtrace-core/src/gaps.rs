//! Coverage statistics, gap lists and the compliance verdict

use crate::classify::{Category, ClassificationTable, Priority};
use crate::diagnostics::DiagnosticKind;
use crate::extract::FileKind;
use crate::link::{TraceGraph, TracedRequirement};
use crate::model::SourceLocation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Percentage of `part` in `total`; 0 when there is nothing to count.
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Level of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestLevel {
    Unit,
    Integration,
    System,
}

impl TestLevel {
    pub const ALL: [TestLevel; 3] = [TestLevel::Unit, TestLevel::Integration, TestLevel::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestLevel::Unit => "unit",
            TestLevel::Integration => "integration",
            TestLevel::System => "system",
        }
    }
}

impl Display for TestLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How test cases are assigned a level from their path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestLevelRules {
    /// Directory name → level; the first matching path segment wins
    pub segments: BTreeMap<String, TestLevel>,
    /// Level for Python tests in no recognized directory
    pub python: TestLevel,
    /// Level for everything else
    pub default: TestLevel,
}

impl Default for TestLevelRules {
    fn default() -> Self {
        Self {
            segments: BTreeMap::from([
                ("unit".to_string(), TestLevel::Unit),
                ("integration".to_string(), TestLevel::Integration),
                ("system".to_string(), TestLevel::System),
                ("e2e".to_string(), TestLevel::System),
            ]),
            python: TestLevel::Integration,
            default: TestLevel::Unit,
        }
    }
}

impl TestLevelRules {
    pub fn level_of(&self, location: &SourceLocation) -> TestLevel {
        let from_segment = location
            .file
            .parent()
            .into_iter()
            .flat_map(|p| p.components())
            .find_map(|c| self.segments.get(&*c.as_os_str().to_string_lossy()))
            .copied();
        match from_segment {
            Some(level) => level,
            None if FileKind::from_path(&location.file) == Some(FileKind::Python) => self.python,
            None => self.default,
        }
    }
}

/// Overall verdict on traceability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComplianceLevel {
    /// Below 80% fully traced
    CL0,
    /// At least 80% fully traced
    CL1,
    /// Every requirement fully traced
    CL2,
}

impl ComplianceLevel {
    pub fn from_fully_traced(fully_traced: usize, total: usize) -> Self {
        if total > 0 && fully_traced == total {
            ComplianceLevel::CL2
        } else if percent(fully_traced, total) >= 80.0 {
            ComplianceLevel::CL1
        } else {
            ComplianceLevel::CL0
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ComplianceLevel::CL0 => "Basic",
            ComplianceLevel::CL1 => "Standard",
            ComplianceLevel::CL2 => "Full traceability",
        }
    }
}

impl Display for ComplianceLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComplianceLevel::CL0 => "CL0",
            ComplianceLevel::CL1 => "CL1",
            ComplianceLevel::CL2 => "CL2",
        };
        f.write_str(s)
    }
}

/// Maturity of the project judged by the fully traced rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStage {
    Development,
    Alpha,
    Beta,
    Production,
}

impl ProjectStage {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 90.0 {
            ProjectStage::Production
        } else if rate >= 70.0 {
            ProjectStage::Beta
        } else if rate >= 50.0 {
            ProjectStage::Alpha
        } else {
            ProjectStage::Development
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProjectStage::Production => "Ready for production",
            ProjectStage::Beta => "Ready for beta",
            ProjectStage::Alpha => "Alpha stage",
            ProjectStage::Development => "Development stage",
        }
    }
}

/// Counts over all requirements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_requirements: usize,
    pub implemented: usize,
    pub tested: usize,
    pub fully_traced: usize,
    pub spec_linked: usize,
    /// Requirements in a category that needs a spec link
    pub spec_link_required: usize,
    pub spec_link_required_present: usize,
    pub spec_clauses: usize,
    pub code_references: usize,
    pub test_cases: usize,
    pub orphaned_references: usize,
    pub invalid_spec_links: usize,
}

impl Summary {
    pub fn implementation_rate(&self) -> f64 {
        percent(self.implemented, self.total_requirements)
    }

    pub fn test_rate(&self) -> f64 {
        percent(self.tested, self.total_requirements)
    }

    pub fn fully_traced_rate(&self) -> f64 {
        percent(self.fully_traced, self.total_requirements)
    }

    pub fn spec_link_rate(&self) -> f64 {
        percent(self.spec_linked, self.total_requirements)
    }

    /// Spec-link coverage among requirements that need one.
    pub fn required_spec_link_rate(&self) -> f64 {
        percent(self.spec_link_required_present, self.spec_link_required)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: Category,
    pub exempt: bool,
    pub total: usize,
    pub implemented: usize,
    pub tested: usize,
    pub spec_linked: usize,
}

impl CategoryStats {
    pub fn implemented_pct(&self) -> f64 {
        percent(self.implemented, self.total)
    }

    pub fn tested_pct(&self) -> f64 {
        percent(self.tested, self.total)
    }

    pub fn spec_linked_pct(&self) -> f64 {
        percent(self.spec_linked, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityStats {
    pub priority: Priority,
    pub total: usize,
    pub implemented: usize,
    pub tested: usize,
    pub fully_traced: usize,
    /// Ids still missing code or tests, sorted
    pub incomplete: Vec<String>,
}

impl PriorityStats {
    pub fn coverage(&self) -> f64 {
        percent(self.fully_traced, self.total)
    }
}

/// How soon a recommendation should be acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Urgency {
    /// Immediate
    P0,
    /// Short term
    P1,
    /// Long term
    P2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub urgency: Urgency,
    pub action: String,
}

/// The gap analysis of one trace graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapAnalysis {
    pub summary: Summary,
    /// Sorted by category name
    pub by_category: Vec<CategoryStats>,
    /// Critical first
    pub by_priority: Vec<PriorityStats>,
    pub test_levels: BTreeMap<TestLevel, usize>,
    pub no_implementation: Vec<String>,
    pub no_tests: Vec<String>,
    /// Every requirement without a spec link
    pub missing_spec_links: Vec<String>,
    /// Non-exempt requirements without a spec link
    pub missing_required_spec_links: Vec<String>,
    pub fully_traced: Vec<String>,
    pub compliance: ComplianceLevel,
    pub stage: ProjectStage,
    pub recommendations: Vec<Recommendation>,
}

fn ids_where(graph: &TraceGraph, pred: impl Fn(&TracedRequirement) -> bool) -> Vec<String> {
    // graph.requirements is sorted by id, so the result is too
    graph
        .requirements
        .iter()
        .filter(|r| pred(r))
        .map(|r| r.id().to_string())
        .collect()
}

impl GapAnalysis {
    pub fn analyze(graph: &TraceGraph, table: &ClassificationTable, levels: &TestLevelRules) -> Self {
        let reqs = &graph.requirements;
        let required = |r: &TracedRequirement| !table.is_exempt(&r.category);

        let summary = Summary {
            total_requirements: reqs.len(),
            implemented: reqs.iter().filter(|r| r.has_code()).count(),
            tested: reqs.iter().filter(|r| r.has_tests()).count(),
            fully_traced: reqs.iter().filter(|r| r.is_fully_traced()).count(),
            spec_linked: reqs.iter().filter(|r| r.has_spec_link()).count(),
            spec_link_required: reqs.iter().filter(|r| required(r)).count(),
            spec_link_required_present: reqs
                .iter()
                .filter(|r| required(r) && r.has_spec_link())
                .count(),
            spec_clauses: graph.spec_clauses.len(),
            code_references: graph.code_refs.len(),
            test_cases: graph.test_cases.len(),
            orphaned_references: graph.diagnostics.count(DiagnosticKind::OrphanedCodeReference)
                + graph.diagnostics.count(DiagnosticKind::OrphanedTestReference),
            invalid_spec_links: graph.diagnostics.count(DiagnosticKind::InvalidSpecLink),
        };

        let mut by_category: BTreeMap<Category, CategoryStats> = BTreeMap::new();
        for r in reqs {
            let stats = by_category
                .entry(r.category.clone())
                .or_insert_with(|| CategoryStats {
                    category: r.category.clone(),
                    exempt: table.is_exempt(&r.category),
                    total: 0,
                    implemented: 0,
                    tested: 0,
                    spec_linked: 0,
                });
            stats.total += 1;
            stats.implemented += usize::from(r.has_code());
            stats.tested += usize::from(r.has_tests());
            stats.spec_linked += usize::from(r.has_spec_link());
        }

        let by_priority = Priority::ALL
            .iter()
            .map(|&priority| {
                let in_tier: Vec<&TracedRequirement> =
                    reqs.iter().filter(|r| r.priority == priority).collect();
                PriorityStats {
                    priority,
                    total: in_tier.len(),
                    implemented: in_tier.iter().filter(|r| r.has_code()).count(),
                    tested: in_tier.iter().filter(|r| r.has_tests()).count(),
                    fully_traced: in_tier.iter().filter(|r| r.is_fully_traced()).count(),
                    incomplete: in_tier
                        .iter()
                        .filter(|r| !r.is_fully_traced())
                        .map(|r| r.id().to_string())
                        .collect(),
                }
            })
            .collect();

        let mut test_levels: BTreeMap<TestLevel, usize> =
            TestLevel::ALL.iter().map(|&level| (level, 0)).collect();
        for tc in &graph.test_cases {
            *test_levels.entry(levels.level_of(&tc.location)).or_default() += 1;
        }

        let compliance = ComplianceLevel::from_fully_traced(summary.fully_traced, summary.total_requirements);
        let stage = ProjectStage::from_rate(summary.fully_traced_rate());

        let mut analysis = GapAnalysis {
            no_implementation: ids_where(graph, |r| !r.has_code()),
            no_tests: ids_where(graph, |r| !r.has_tests()),
            missing_spec_links: ids_where(graph, |r| !r.has_spec_link()),
            missing_required_spec_links: ids_where(graph, |r| required(r) && !r.has_spec_link()),
            fully_traced: ids_where(graph, TracedRequirement::is_fully_traced),
            summary,
            by_category: by_category.into_values().collect(),
            by_priority,
            test_levels,
            compliance,
            stage,
            recommendations: Vec::new(),
        };
        analysis.recommendations = analysis.recommend();
        analysis
    }

    pub fn priority(&self, priority: Priority) -> Option<&PriorityStats> {
        self.by_priority.iter().find(|p| p.priority == priority)
    }

    fn recommend(&self) -> Vec<Recommendation> {
        let mut out = Vec::new();
        let mut push = |urgency, action: &str| {
            out.push(Recommendation {
                urgency,
                action: action.to_string(),
            })
        };
        let below = |priority, threshold| {
            self.priority(priority)
                .is_some_and(|p| p.total > 0 && p.coverage() < threshold)
        };
        let level = |level| self.test_levels.get(&level).copied().unwrap_or(0);

        if below(Priority::Critical, 80.0) {
            push(Urgency::P0, "Complete the remaining critical priority requirements");
        }
        if !self.missing_required_spec_links.is_empty() {
            push(
                Urgency::P0,
                "Add :satisfies: links to requirements missing spec references",
            );
        }
        if self.summary.orphaned_references > 0 || self.summary.invalid_spec_links > 0 {
            push(Urgency::P0, "Fix references to unknown requirements or spec clauses");
        }
        if level(TestLevel::Integration) < 10 {
            push(Urgency::P0, "Increase integration test coverage");
        }
        if below(Priority::High, 70.0) {
            push(Urgency::P1, "Implement the remaining high priority requirements");
        }
        if level(TestLevel::System) < 5 {
            push(Urgency::P1, "Add system level tests for end-to-end validation");
        }
        if below(Priority::Medium, 100.0) || below(Priority::Low, 100.0) {
            push(Urgency::P2, "Complete medium and low priority requirements");
        }
        out
    }
}
