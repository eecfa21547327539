//! Implementation verification report

use reqtrace_core::{Category, FuzzyReport, MatchKind, RequirementVerification, TraceGraph};
use std::collections::BTreeMap;

/// Evidence lines shown per requirement
const HITS_SHOWN: usize = 5;

/// Matched text is shortened further for the report
const SNIPPET_LIMIT: usize = 80;

fn kind_label(kind: MatchKind) -> &'static str {
    match kind {
        MatchKind::Pattern => "pattern",
        MatchKind::Value => "value",
    }
}

fn snippet(text: &str) -> String {
    if text.chars().count() > SNIPPET_LIMIT {
        let short: String = text.chars().take(SNIPPET_LIMIT).collect();
        format!("{short}...")
    } else {
        text.to_string()
    }
}

fn by_category(items: &[RequirementVerification]) -> BTreeMap<&Category, Vec<&RequirementVerification>> {
    let mut grouped: BTreeMap<&Category, Vec<&RequirementVerification>> = BTreeMap::new();
    for item in items {
        grouped.entry(&item.category).or_default().push(item);
    }
    grouped
}

pub fn render_verification(report: &FuzzyReport, graph: &TraceGraph) -> String {
    let mut output = String::new();
    let implemented = report.annotated.len() + report.missing_annotation.len();

    output.push_str("# Implementation Verification Report\n\n");
    output.push_str("## Summary\n\n");
    output.push_str(&format!("- **Total Requirements**: {}\n", report.total));
    output.push_str(&format!(
        "- **Annotated (in code)**: {}\n",
        report.annotated.len()
    ));
    output.push_str(&format!(
        "- **Missing Annotations (code exists)**: {}\n",
        report.missing_annotation.len()
    ));
    output.push_str(&format!(
        "- **Truly Missing (no code found)**: {}\n\n",
        report.truly_missing.len()
    ));
    output.push_str(&format!(
        "- **Effective Implementation Rate**: {}/{} ({:.1}%)\n\n",
        implemented,
        report.total,
        report.effective_implementation_rate()
    ));

    if !report.missing_annotation.is_empty() {
        output.push_str("## Requirements with Code but Missing Annotations\n\n");
        output.push_str(
            "These requirements appear to be implemented but lack `@implements` annotations.\n\n",
        );
        for v in &report.missing_annotation {
            output.push_str(&format!("### {}: {}\n\n", v.id, v.title));
            if !v.hits.is_empty() {
                output.push_str("**Potential implementation locations:**\n\n");
                for hit in v.hits.iter().take(HITS_SHOWN) {
                    output.push_str(&format!(
                        "- `{}:{}` ({})\n",
                        hit.file.display().to_string().replace('\\', "/"),
                        hit.line,
                        kind_label(hit.kind)
                    ));
                    output.push_str(&format!("  - `{}`\n", snippet(&hit.matched_text)));
                }
                output.push('\n');
            }
        }
    }

    let missing = by_category(&report.truly_missing);
    if !missing.is_empty() {
        output.push_str("## Requirements Truly Missing Implementation\n\n");
        output.push_str("These requirements have no detected implementation.\n\n");
        for (category, items) in &missing {
            output.push_str(&format!("### {} ({} missing)\n\n", category, items.len()));
            for v in items {
                let hint = graph
                    .requirement(&v.id)
                    .and_then(|r| r.requirement.code_location.as_deref());
                match hint {
                    Some(hint) => output.push_str(&format!(
                        "- **{}**: {} → `{}`\n",
                        v.id, v.title, hint
                    )),
                    None => output.push_str(&format!("- **{}**: {}\n", v.id, v.title)),
                }
            }
            output.push('\n');
        }
    }

    if !report.diagnostics.is_empty() {
        output.push_str("## Pattern Problems\n\n");
        for d in &report.diagnostics {
            output.push_str(&format!("- {}\n", d.message));
        }
        output.push('\n');
    }

    output.push_str("## Recommendations\n\n");
    output.push_str("### Immediate Actions (Quick Wins)\n\n");
    if report.missing_annotation.is_empty() {
        output.push_str("Nothing to annotate.\n");
    } else {
        output.push_str(&format!(
            "1. Add `@implements` annotations to {} requirements\n",
            report.missing_annotation.len()
        ));
        output.push_str("   - These appear to be implemented but need traceability annotations\n");
    }

    output.push_str("\n### Implementation Required\n\n");
    if missing.is_empty() {
        output.push_str("Nothing left to implement.\n");
    } else {
        output.push_str(&format!(
            "1. Implement {} missing requirements\n",
            report.truly_missing.len()
        ));
        for (category, items) in &missing {
            output.push_str(&format!("   - {}: {} requirements\n", category, items.len()));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use reqtrace_core::{
        ClassificationTable, FuzzyMatcher, MemorySources, PatternCatalog, SourceIndex, Sources,
    };

    fn report() -> (FuzzyReport, TraceGraph) {
        let extraction = MemorySources::new()
            .add(
                "docs/requirements/r.rst",
                indoc! {"
                    .. requirement:: Header
                       :id: REQ_MSG_001

                    .. requirement:: Session Handling
                       :id: REQ_MSG_030

                    .. requirement:: Offer Timer
                       :id: REQ_SD_050

                       **Code Location**: ``src/sd/sd_server.cpp``
                "},
            )
            .add(
                "src/message.cpp",
                "/** @implements REQ_MSG_001 */\nvoid header() {}\n",
            )
            .extract()
            .unwrap();
        let graph = TraceGraph::link(extraction, &ClassificationTable::default());
        let index = SourceIndex::new().add(
            "src/session.cpp",
            "void SessionHandling::next() { ++session_handling_counter_; }\n",
        );
        let catalog = PatternCatalog::new();
        let report = FuzzyMatcher::new(&catalog, &index).verify(&graph);
        (report, graph)
    }

    #[test]
    fn summary_and_rate() {
        let (report, graph) = report();
        let md = render_verification(&report, &graph);
        assert!(md.contains("- **Total Requirements**: 3"));
        assert!(md.contains("- **Effective Implementation Rate**: 2/3 (66.7%)"));
    }

    #[test]
    fn missing_annotations_list_locations() {
        let (report, graph) = report();
        let md = render_verification(&report, &graph);
        assert!(md.contains("### REQ_MSG_030: Session Handling"));
        assert!(md.contains("- `src/session.cpp:1` (pattern)"));
    }

    #[test]
    fn truly_missing_grouped_by_category_with_hint() {
        let (report, graph) = report();
        let md = render_verification(&report, &graph);
        assert!(md.contains("### service_discovery (1 missing)"));
        assert!(md.contains("- **REQ_SD_050**: Offer Timer → `src/sd/sd_server.cpp`"));
        assert!(md.contains("   - service_discovery: 1 requirements"));
    }

    #[test]
    fn long_snippets_are_shortened() {
        let text = "x".repeat(100);
        assert_eq!(snippet(&text).len(), SNIPPET_LIMIT + 3);
        assert_eq!(snippet("short"), "short");
    }
}
