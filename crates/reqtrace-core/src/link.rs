//! Linking extracted records into a traceability graph

use crate::classify::{Category, ClassificationTable, Priority};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::extract::Extraction;
use crate::ids::RefTarget;
use crate::model::{CodeReference, Requirement, SpecClause, TestCase};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Similarity above which an orphan diagnostic suggests a known id.
const SUGGESTION_THRESHOLD: f64 = 0.85;

/// A requirement together with everything linked to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracedRequirement {
    #[serde(flatten)]
    pub requirement: Requirement,
    pub category: Category,
    pub priority: Priority,
    /// Ids of code references implementing this requirement
    pub implemented_by: BTreeSet<String>,
    /// Ids of test cases testing this requirement
    pub tested_by: BTreeSet<String>,
}

impl TracedRequirement {
    pub fn id(&self) -> &str {
        &self.requirement.id
    }

    pub fn has_code(&self) -> bool {
        !self.implemented_by.is_empty()
    }

    pub fn has_tests(&self) -> bool {
        !self.tested_by.is_empty()
    }

    pub fn has_spec_link(&self) -> bool {
        !self.requirement.satisfies.is_empty()
    }

    /// Implemented and tested.
    pub fn is_fully_traced(&self) -> bool {
        self.has_code() && self.has_tests()
    }
}

/// Requirements, spec clauses, code references and test cases with all edges
/// resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceGraph {
    /// Sorted by id
    pub requirements: Vec<TracedRequirement>,
    pub spec_clauses: Vec<SpecClause>,
    pub code_refs: Vec<CodeReference>,
    pub test_cases: Vec<TestCase>,
    /// Extraction and linking findings, sorted
    pub diagnostics: Diagnostics,
}

/// The closest known id to `missing`, if any is close enough.
fn suggest<'a>(missing: &str, known: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    known
        .into_iter()
        .map(|candidate| (strsim::jaro_winkler(missing, candidate), candidate))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(a.1)))
        .map(|(_, candidate)| candidate)
}

impl TraceGraph {
    /// Resolve every edge of `extraction`, classifying requirements with
    /// `table`. Dangling edges become diagnostics.
    pub fn link(extraction: Extraction, table: &ClassificationTable) -> Self {
        let Extraction {
            requirements,
            spec_clauses,
            code_refs,
            test_cases,
            mut diagnostics,
        } = extraction;

        let mut implemented_by: HashMap<&str, BTreeSet<String>> = HashMap::new();
        let mut tested_by: HashMap<&str, BTreeSet<String>> = HashMap::new();

        let req_ids: HashSet<&str> = requirements.iter().map(|r| r.id.as_str()).collect();
        let spec_ids: HashSet<&str> = spec_clauses.iter().map(|c| c.id.as_str()).collect();

        let orphan = |kind: DiagnosticKind, record: &str, target: &str, what: &str| {
            let mut message = format!("{what} {record} references unknown requirement {target}");
            if let Some(close) = suggest(target, req_ids.iter().copied()) {
                message.push_str(&format!(" (did you mean {close}?)"));
            }
            Diagnostic::new(kind, record, message).with_target(target)
        };
        let invalid_spec = |record: &str, target: &str| {
            Diagnostic::new(
                DiagnosticKind::InvalidSpecLink,
                record,
                format!("{record} satisfies unknown spec clause {target}"),
            )
            .with_target(target)
        };

        for req in &requirements {
            for spec in &req.satisfies {
                if !spec_ids.contains(spec.as_str()) {
                    let mut diag = invalid_spec(req.id.as_str(), spec.as_str());
                    if let Some(source) = &req.source {
                        diag = diag.with_location(source.clone());
                    }
                    diagnostics.push(diag);
                }
            }
        }

        for code in &code_refs {
            for req in &code.implements {
                match req_ids.get(req.as_str()) {
                    Some(id) => {
                        implemented_by.entry(*id).or_default().insert(code.id.clone());
                    }
                    None => diagnostics.push(
                        orphan(
                            DiagnosticKind::OrphanedCodeReference,
                            code.id.as_str(),
                            req.as_str(),
                            "Code reference",
                        )
                        .with_location(code.location.clone()),
                    ),
                }
            }
            for spec in &code.satisfies {
                if !spec_ids.contains(spec.as_str()) {
                    diagnostics.push(
                        invalid_spec(code.id.as_str(), spec.as_str())
                            .with_location(code.location.clone()),
                    );
                }
            }
        }

        for test in &test_cases {
            for target in &test.tests {
                // Spec-clause and test-internal targets are not requirement edges
                let RefTarget::Requirement(req) = RefTarget::parse(target) else {
                    continue;
                };
                match req_ids.get(req.as_str()) {
                    Some(id) => {
                        tested_by.entry(*id).or_default().insert(test.id.clone());
                    }
                    None => diagnostics.push(
                        orphan(
                            DiagnosticKind::OrphanedTestReference,
                            test.id.as_str(),
                            req.as_str(),
                            "Test case",
                        )
                        .with_location(test.location.clone()),
                    ),
                }
            }
        }

        let mut traced: Vec<TracedRequirement> = requirements
            .iter()
            .map(|req| {
                let classification = table.classify(&req.id);
                TracedRequirement {
                    requirement: req.clone(),
                    category: classification.category,
                    priority: classification.priority,
                    implemented_by: implemented_by.remove(req.id.as_str()).unwrap_or_default(),
                    tested_by: tested_by.remove(req.id.as_str()).unwrap_or_default(),
                }
            })
            .collect();
        traced.sort_by(|a, b| a.id().cmp(b.id()));

        diagnostics.sort();
        debug!(
            requirements = traced.len(),
            diagnostics = diagnostics.len(),
            "linked trace graph"
        );

        TraceGraph {
            requirements: traced,
            spec_clauses,
            code_refs,
            test_cases,
            diagnostics,
        }
    }

    pub fn requirement(&self, id: &str) -> Option<&TracedRequirement> {
        self.requirements
            .binary_search_by(|r| r.id().cmp(id))
            .ok()
            .map(|i| &self.requirements[i])
    }

    pub fn code_ref(&self, id: &str) -> Option<&CodeReference> {
        self.code_refs.iter().find(|c| c.id == id)
    }

    pub fn test_case(&self, id: &str) -> Option<&TestCase> {
        self.test_cases.iter().find(|t| t.id == id)
    }

    pub fn spec_clause_ids(&self) -> BTreeSet<&str> {
        self.spec_clauses.iter().map(|c| c.id.as_str()).collect()
    }

    /// Requirement id → spec clauses it claims to satisfy.
    pub fn satisfies_map(&self) -> BTreeMap<&str, &[String]> {
        self.requirements
            .iter()
            .map(|r| (r.id(), r.requirement.satisfies.as_slice()))
            .collect()
    }

    /// Number of implements edges plus tests edges that resolved.
    pub fn link_count(&self) -> usize {
        self.requirements
            .iter()
            .map(|r| r.implemented_by.len() + r.tested_by.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MemorySources, Sources};
    use indoc::indoc;

    fn graph(sources: MemorySources) -> TraceGraph {
        TraceGraph::link(sources.extract().unwrap(), &ClassificationTable::default())
    }

    fn fixture() -> MemorySources {
        MemorySources::new()
            .add(
                "docs/requirements/msg.rst",
                indoc! {"
                    .. requirement:: Header
                       :id: REQ_MSG_001
                       :satisfies: feat_req_someip_538

                    .. requirement:: Body
                       :id: REQ_MSG_002
                       :satisfies: feat_req_someip_999
                "},
            )
            .add(
                "docs/spec/someip.rst",
                ".. feat_req:: Header\n   :id: feat_req_someip_538\n",
            )
            .add(
                "src/message.cpp",
                indoc! {"
                    /** @implements REQ_MSG_001, REQ_MSG_01 */
                    void header() {}
                "},
            )
            .add(
                "tests/test_message.cpp",
                indoc! {"
                    /**
                     * @test_case TC_MSG_001
                     * @tests req_msg_001, feat_req_someip_538, helper_token
                     */
                    TEST(Msg, Header) {}
                "},
            )
    }

    #[test]
    fn implemented_and_tested_by_are_inverse_edges() {
        let g = graph(fixture());
        let r1 = g.requirement("REQ_MSG_001").unwrap();
        assert_eq!(r1.implemented_by, BTreeSet::from(["CODE_message_1".to_string()]));
        assert_eq!(r1.tested_by, BTreeSet::from(["TC_MSG_001".to_string()]));
        assert!(r1.is_fully_traced());

        let r2 = g.requirement("REQ_MSG_002").unwrap();
        assert!(!r2.has_code());
        assert!(!r2.has_tests());

        for req in &g.requirements {
            for tc in &g.test_cases {
                assert_eq!(
                    req.tested_by.contains(&tc.id),
                    tc.tests.iter().any(|t| t == req.id())
                );
            }
        }
    }

    #[test]
    fn orphans_are_reported_with_suggestion() {
        let g = graph(fixture());
        let orphans: Vec<_> = g
            .diagnostics
            .of_kind(DiagnosticKind::OrphanedCodeReference)
            .collect();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].subject, "CODE_message_1");
        assert_eq!(orphans[0].target.as_deref(), Some("REQ_MSG_01"));
        assert!(orphans[0].message.contains("did you mean"));
        // Spec and test-internal targets in @tests are not orphans
        assert_eq!(g.diagnostics.count(DiagnosticKind::OrphanedTestReference), 0);
    }

    #[test]
    fn invalid_spec_links_are_reported() {
        let g = graph(fixture());
        let invalid: Vec<_> = g
            .diagnostics
            .of_kind(DiagnosticKind::InvalidSpecLink)
            .collect();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].subject, "REQ_MSG_002");
        assert_eq!(invalid[0].target.as_deref(), Some("feat_req_someip_999"));
    }

    #[test]
    fn classification_is_attached() {
        let g = graph(fixture());
        let r = g.requirement("REQ_MSG_001").unwrap();
        assert_eq!(r.category, Category::MESSAGE);
        assert_eq!(r.priority, Priority::Critical);
        assert_eq!(g.link_count(), 2);
    }

    #[test]
    fn suggestion_needs_similarity() {
        assert_eq!(suggest("REQ_MSG_01", ["REQ_MSG_001", "REQ_SD_900"]), Some("REQ_MSG_001"));
        assert_eq!(suggest("REQ_ZZZ", ["REQ_MSG_001"]), None);
    }
}
