//! Gap analysis narrative in Markdown

use super::ratio;
use crate::Analysis;
use reqtrace_core::{Priority, TestLevel, Urgency};

/// Ids listed per gap section before the rest are summarized
const GAP_LIST_LIMIT: usize = 50;

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn status_mark(percent: f64) -> &'static str {
    if percent >= 80.0 {
        "✅"
    } else if percent >= 50.0 {
        "⚠️"
    } else {
        "❌"
    }
}

fn level_description(level: TestLevel) -> &'static str {
    match level {
        TestLevel::Unit => "Component-level tests",
        TestLevel::Integration => "Module interaction tests",
        TestLevel::System => "End-to-end tests",
    }
}

fn urgency_heading(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::P0 => "Immediate Actions (P0)",
        Urgency::P1 => "Short-term Actions (P1)",
        Urgency::P2 => "Long-term Actions (P2)",
    }
}

fn push_id_list(output: &mut String, ids: &[String]) {
    for id in ids.iter().take(GAP_LIST_LIMIT) {
        output.push_str(&format!("- `{id}`\n"));
    }
    if ids.len() > GAP_LIST_LIMIT {
        output.push_str(&format!("- ... and {} more\n", ids.len() - GAP_LIST_LIMIT));
    }
    output.push('\n');
}

pub fn render_gap_analysis(project: &str, analysis: &Analysis, generated: Option<&str>) -> String {
    let gaps = &analysis.gaps;
    let summary = &gaps.summary;
    let mut output = String::new();

    output.push_str(&format!("# {project} Gap Analysis\n\n"));
    if let Some(generated) = generated {
        output.push_str(&format!("Generated: {generated}\n\n"));
    }

    output.push_str("## Summary\n\n");
    output.push_str(&format!(
        "- **Total Requirements**: {}\n",
        summary.total_requirements
    ));
    output.push_str(&format!(
        "- **Implemented**: {}\n",
        ratio(summary.implemented, summary.total_requirements)
    ));
    output.push_str(&format!(
        "- **Tested**: {}\n",
        ratio(summary.tested, summary.total_requirements)
    ));
    output.push_str(&format!(
        "- **Fully Traced (code + tests)**: {}\n",
        ratio(summary.fully_traced, summary.total_requirements)
    ));
    output.push_str(&format!(
        "- **Spec-linked (required)**: {}\n",
        ratio(summary.spec_link_required_present, summary.spec_link_required)
    ));
    output.push_str(&format!("- **Spec Clauses**: {}\n", summary.spec_clauses));
    output.push_str(&format!(
        "- **Code References**: {}\n",
        summary.code_references
    ));
    output.push_str(&format!("- **Test Cases**: {}\n", summary.test_cases));
    if summary.orphaned_references > 0 {
        output.push_str(&format!(
            "- **Orphaned References**: {}\n",
            summary.orphaned_references
        ));
    }
    if summary.invalid_spec_links > 0 {
        output.push_str(&format!(
            "- **Invalid Spec Links**: {}\n",
            summary.invalid_spec_links
        ));
    }
    output.push('\n');

    if !gaps.by_category.is_empty() {
        output.push_str("## Coverage by Category\n\n");
        output.push_str("| Category | Total | Implemented | Tested | Spec-linked |\n");
        output.push_str("|----------|-------|-------------|--------|-------------|\n");
        for c in &gaps.by_category {
            let spec = if c.exempt {
                format!("{:.1}% (exempt)", c.spec_linked_pct())
            } else {
                format!("{:.1}%", c.spec_linked_pct())
            };
            output.push_str(&format!(
                "| {} | {} | {:.1}% | {:.1}% | {} |\n",
                c.category,
                c.total,
                c.implemented_pct(),
                c.tested_pct(),
                spec
            ));
        }
        output.push('\n');
    }

    output.push_str("## Priority Analysis\n\n");
    output.push_str("| Priority | Total | Implemented | Tested | Coverage | Status |\n");
    output.push_str("|----------|-------|-------------|--------|----------|--------|\n");
    for p in &gaps.by_priority {
        if p.total == 0 {
            continue;
        }
        output.push_str(&format!(
            "| {} | {} | {} | {} | {:.1}% | {} |\n",
            capitalize(p.priority.as_str()),
            p.total,
            p.implemented,
            p.tested,
            p.coverage(),
            status_mark(p.coverage())
        ));
    }
    output.push('\n');

    if let Some(critical) = gaps.priority(Priority::Critical)
        && !critical.incomplete.is_empty()
    {
        output.push_str("### Incomplete Critical Requirements\n\n");
        push_id_list(&mut output, &critical.incomplete);
    }

    output.push_str("## Test Coverage\n\n");
    output.push_str("| Test Level | Count | Description |\n");
    output.push_str("|------------|-------|-------------|\n");
    for level in TestLevel::ALL {
        output.push_str(&format!(
            "| {} | {} | {} |\n",
            capitalize(level.as_str()),
            gaps.test_levels.get(&level).copied().unwrap_or(0),
            level_description(level)
        ));
    }
    output.push_str(&format!("\n**Total Test Cases**: {}\n\n", summary.test_cases));

    output.push_str("## Gap Analysis\n\n");
    output.push_str(&format!(
        "- Requirements without implementation: **{}**\n",
        gaps.no_implementation.len()
    ));
    output.push_str(&format!(
        "- Requirements without test coverage: **{}**\n",
        gaps.no_tests.len()
    ));
    output.push_str(&format!(
        "- Requirements without spec links: **{}** ({} required)\n\n",
        gaps.missing_spec_links.len(),
        gaps.missing_required_spec_links.len()
    ));

    if !gaps.no_implementation.is_empty() {
        output.push_str("### Requirements Without Implementation\n\n");
        push_id_list(&mut output, &gaps.no_implementation);
    }
    if !gaps.no_tests.is_empty() {
        output.push_str("### Requirements Without Tests\n\n");
        push_id_list(&mut output, &gaps.no_tests);
    }
    if !gaps.missing_required_spec_links.is_empty() {
        output.push_str("### Requirements Missing Required Spec Links\n\n");
        push_id_list(&mut output, &gaps.missing_required_spec_links);
    }
    let exempt_missing: Vec<String> = gaps
        .missing_spec_links
        .iter()
        .filter(|id| !gaps.missing_required_spec_links.contains(id))
        .cloned()
        .collect();
    if !exempt_missing.is_empty() {
        output.push_str("### Exempt Requirements Without Spec Links\n\n");
        output.push_str(
            "These categories are implementation-derived and need no `:satisfies:` link.\n\n",
        );
        push_id_list(&mut output, &exempt_missing);
    }

    output.push_str("## Compliance\n\n");
    output.push_str(&format!(
        "**Level**: {} ({})\n\n",
        gaps.compliance,
        gaps.compliance.description()
    ));
    output.push_str(&format!("**Project Status**: {}\n\n", gaps.stage.label()));

    if !gaps.recommendations.is_empty() {
        output.push_str("## Recommendations\n\n");
        let mut current = None;
        let mut n = 0;
        for rec in &gaps.recommendations {
            if current != Some(rec.urgency) {
                if current.is_some() {
                    output.push('\n');
                }
                output.push_str(&format!("### {}\n\n", urgency_heading(rec.urgency)));
                current = Some(rec.urgency);
                n = 0;
            }
            n += 1;
            output.push_str(&format!("{n}. {}\n", rec.action));
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use reqtrace_core::{
        ClassificationTable, GapAnalysis, MemorySources, Sources, TestLevelRules, TraceGraph,
    };

    fn analysis() -> Analysis {
        let extraction = MemorySources::new()
            .add(
                "docs/requirements/r.rst",
                indoc! {"
                    .. requirement:: Header
                       :id: REQ_MSG_001
                       :satisfies: feat_req_someip_538

                    .. requirement:: Type field
                       :id: REQ_MSG_005

                    .. requirement:: Layering
                       :id: REQ_ARCH_001
                "},
            )
            .add(
                "docs/spec/s.rst",
                ".. feat_req:: Header\n   :id: feat_req_someip_538\n",
            )
            .add(
                "src/message.cpp",
                "/** @implements REQ_MSG_001 */\nvoid header() {}\n",
            )
            .add(
                "tests/integration/test_message.cpp",
                "/** @test_case TC_MSG_001\n * @tests REQ_MSG_001 */\nTEST(Msg, Header) {}\n",
            )
            .extract()
            .unwrap();
        let table = ClassificationTable::default();
        let graph = TraceGraph::link(extraction, &table);
        let gaps = GapAnalysis::analyze(&graph, &table, &TestLevelRules::default());
        Analysis { graph, gaps }
    }

    #[test]
    fn sections_are_present() {
        let md = render_gap_analysis("demo", &analysis(), Some("2025-01-01T00:00:00Z"));
        for heading in [
            "# demo Gap Analysis",
            "Generated: 2025-01-01T00:00:00Z",
            "## Summary",
            "## Coverage by Category",
            "## Priority Analysis",
            "## Test Coverage",
            "## Gap Analysis",
            "## Compliance",
            "## Recommendations",
        ] {
            assert!(md.contains(heading), "missing {heading:?}");
        }
        assert!(md.contains("- **Fully Traced (code + tests)**: 1/3 (33.3%)"));
        assert!(md.contains("| Integration | 1 | Module interaction tests |"));
    }

    #[test]
    fn spec_link_sections_respect_exemptions() {
        let md = render_gap_analysis("demo", &analysis(), None);
        let required = md
            .split("### Requirements Missing Required Spec Links")
            .nth(1)
            .unwrap();
        let required = required.split("###").next().unwrap();
        assert!(required.contains("REQ_MSG_005"));
        assert!(!required.contains("REQ_ARCH_001"));

        let exempt = md
            .split("### Exempt Requirements Without Spec Links")
            .nth(1)
            .unwrap();
        assert!(exempt.contains("REQ_ARCH_001"));
        assert!(md.contains("| architectural | 1 | 0.0% | 0.0% | 0.0% (exempt) |"));
    }

    #[test]
    fn recommendations_are_grouped_by_urgency() {
        let md = render_gap_analysis("demo", &analysis(), None);
        assert!(md.contains("### Immediate Actions (P0)"));
        assert!(md.contains("Increase integration test coverage"));
        let p0 = md.find("(P0)").unwrap();
        let p1 = md.find("(P1)").unwrap();
        assert!(p0 < p1);
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("critical"), "Critical");
        assert_eq!(capitalize(""), "");
    }
}
