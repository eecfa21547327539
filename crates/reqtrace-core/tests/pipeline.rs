//! End-to-end tests over a project on disk: walk, extract, link, analyze
#![cfg(feature = "walk")]

use indoc::indoc;
use reqtrace_core::{
    Category, ClassificationTable, ComplianceLevel, DiagnosticKind, FuzzyMatcher, GapAnalysis,
    NeedsDocument, PatternCatalog, Priority, ProjectStage, SourceIndex, Sources, TestLevel,
    TestLevelRules, TraceGraph, VerificationStatus, WalkSources,
};
use std::path::Path;

fn write(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A small project covering every scenario at once.
fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        root,
        "docs/requirements/message.rst",
        indoc! {"
            Message requirements
            ====================

            .. requirement:: Message type field
               :id: REQ_MSG_005

            .. requirement:: Serialize header
               :id: REQ_SER_001
               :satisfies: feat_req_someip_538

            .. requirement:: Layering
               :id: REQ_ARCH_001
        "},
    );
    write(
        root,
        "docs/spec/someip.rst",
        ".. feat_req:: Header format\n   :id: feat_req_someip_538\n",
    );

    let mut serializer = "\n".repeat(41);
    serializer.push_str(indoc! {"
        /**
         * @brief Writes the 16 byte header
         * @implements REQ_SER_001
         */
        bool Serializer::serialize_header(const Message& msg) {
            return true;
        }

        /** @satisfies feat_req_ghost_999 */
        void ghost() {}
    "});
    write(root, "src/serializer.cpp", &serializer);

    let mut python = "\n".repeat(8);
    python.push_str(indoc! {r#"
        def test_ser():
            """Header round trip.

            @tests REQ_SER_001
            """
            assert True
    "#});
    write(root, "tests/integration/test_ser.py", &python);

    // Not under a scanned directory
    write(root, "build/generated.cpp", "/** @implements REQ_MSG_005 */\nvoid g() {}\n");

    dir
}

fn scan(root: &Path) -> TraceGraph {
    let extraction = WalkSources::new(root)
        .dirs(["docs", "src", "include", "tests"])
        .extract()
        .unwrap();
    TraceGraph::link(extraction, &ClassificationTable::default())
}

fn analyze(graph: &TraceGraph) -> GapAnalysis {
    GapAnalysis::analyze(
        graph,
        &ClassificationTable::default(),
        &TestLevelRules::default(),
    )
}

#[test]
fn unlinked_requirement_is_in_every_gap_list() {
    let dir = project();
    let graph = scan(dir.path());
    let gaps = analyze(&graph);

    let req = graph.requirement("REQ_MSG_005").unwrap();
    assert_eq!(req.category, Category::MESSAGE);
    assert_eq!(req.priority, Priority::Critical);

    let id = "REQ_MSG_005".to_string();
    assert!(gaps.no_implementation.contains(&id));
    assert!(gaps.no_tests.contains(&id));
    assert!(gaps.missing_required_spec_links.contains(&id));
    assert!(!gaps.fully_traced.contains(&id));
    assert_eq!(gaps.compliance, ComplianceLevel::CL0);
}

#[test]
fn code_and_test_links_make_requirement_fully_traced() {
    let dir = project();
    let graph = scan(dir.path());

    let req = graph.requirement("REQ_SER_001").unwrap();
    assert_eq!(
        req.implemented_by.iter().collect::<Vec<_>>(),
        vec!["CODE_serializer_42"]
    );
    assert_eq!(req.tested_by.iter().collect::<Vec<_>>(), vec!["TC_test_ser_10"]);

    let code = graph.code_ref("CODE_serializer_42").unwrap();
    assert_eq!(code.function_name.as_deref(), Some("serialize_header"));
    assert_eq!(code.description, "Writes the 16 byte header");
    assert_eq!(code.location.to_string(), "src/serializer.cpp:42");

    let gaps = analyze(&graph);
    assert_eq!(gaps.fully_traced, vec!["REQ_SER_001"]);
    assert_eq!(gaps.test_levels[&TestLevel::Integration], 1);
}

#[test]
fn ghost_spec_link_is_a_diagnostic() {
    let dir = project();
    let graph = scan(dir.path());

    let invalid: Vec<_> = graph
        .diagnostics
        .of_kind(DiagnosticKind::InvalidSpecLink)
        .collect();
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].target.as_deref(), Some("feat_req_ghost_999"));
    assert_eq!(analyze(&graph).summary.invalid_spec_links, 1);
}

#[test]
fn exempt_requirement_only_misses_optional_spec_link() {
    let dir = project();
    let gaps = analyze(&scan(dir.path()));

    let id = "REQ_ARCH_001".to_string();
    assert!(gaps.missing_spec_links.contains(&id));
    assert!(!gaps.missing_required_spec_links.contains(&id));
}

#[test]
fn unscanned_directories_are_ignored() {
    let dir = project();
    let graph = scan(dir.path());
    assert!(
        graph
            .code_refs
            .iter()
            .all(|c| !c.location.file.starts_with("build"))
    );
    assert_eq!(graph.code_refs.len(), 2);
}

#[test]
fn needs_document_round_trips_links() {
    let dir = project();
    let graph = scan(dir.path());
    let doc = NeedsDocument::from_records("demo", &graph.code_refs, &graph.test_cases, dir.path());

    let path = dir.path().join("build/code_references.json");
    std::fs::write(&path, doc.to_json().unwrap()).unwrap();
    let reloaded = NeedsDocument::load(&path).unwrap().into_extraction();

    assert_eq!(reloaded.code_refs, graph.code_refs);
    assert_eq!(reloaded.test_cases, graph.test_cases);
}

#[test]
fn fuzzy_matcher_finds_unannotated_implementation() {
    let dir = project();
    write(
        dir.path(),
        "src/message.cpp",
        "uint8_t Message::message_type_field() const { return type_; }\n",
    );
    let graph = scan(dir.path());

    let walk = WalkSources::new(dir.path()).dirs(["src", "include"]);
    let index = SourceIndex::from_walk(&walk).unwrap();
    let catalog = PatternCatalog::new();
    let report = FuzzyMatcher::new(&catalog, &index).verify(&graph);

    assert_eq!(report.total, 3);
    assert_eq!(report.annotated, vec!["REQ_SER_001"]);
    let found = report
        .missing_annotation
        .iter()
        .find(|v| v.id == "REQ_MSG_005")
        .unwrap();
    assert_eq!(found.status, VerificationStatus::MissingAnnotation);
    assert_eq!(found.hits[0].file, Path::new("src/message.cpp"));
}

#[test]
fn empty_project_is_development_stage() {
    let dir = tempfile::tempdir().unwrap();
    let gaps = analyze(&scan(dir.path()));
    assert_eq!(gaps.summary.total_requirements, 0);
    assert_eq!(gaps.compliance, ComplianceLevel::CL0);
    assert_eq!(gaps.stage, ProjectStage::Development);
}
