//! Spec mapping report

use reqtrace_core::{SpecMapping, TraceGraph};
use std::collections::BTreeMap;

/// Rows of the detailed mapping table
const MAPPING_ROWS: usize = 20;
/// Requirements shown per mapping row
const MAPPING_IDS: usize = 3;
/// Unmapped clauses listed inline per file
const UNMAPPED_INLINE: usize = 10;

/// `REQ_SD_001` → `SD`
fn id_group(id: &str) -> &str {
    id.split('_').nth(1).filter(|s| !s.is_empty()).unwrap_or("OTHER")
}

pub fn render_spec_mapping(mapping: &SpecMapping, graph: &TraceGraph) -> String {
    let mut output = String::new();

    output.push_str("# Spec Requirements Mapping Report\n\n");
    output.push_str("## Summary\n\n");
    output.push_str(&format!("- **Spec Clauses**: {}\n", mapping.spec_clauses));
    output.push_str(&format!("- **Requirements**: {}\n", mapping.requirements));
    output.push_str(&format!("  - Spec-derived: {}\n", mapping.spec_derived));
    output.push_str(&format!(
        "  - Implementation-derived: {}\n",
        mapping.implementation_derived
    ));
    output.push_str(&format!(
        "- **Mapped Spec Clauses**: {}\n",
        mapping.mapped.len()
    ));
    output.push_str(&format!(
        "- **Unmapped Spec Clauses**: {}\n",
        mapping.unmapped.len()
    ));
    output.push_str(&format!(
        "- **Requirements Missing Spec Links**: {}\n",
        mapping.missing_spec_links.len()
    ));
    output.push_str(&format!(
        "- **Invalid Spec Links**: {}\n\n",
        mapping.invalid_links.len()
    ));

    if mapping.spec_clauses > 0 {
        output.push_str(&format!("**Spec Coverage**: {:.1}%\n\n", mapping.coverage()));
    }

    if !mapping.invalid_links.is_empty() {
        output.push_str("## Invalid Spec Links\n\n");
        output.push_str("These requirements reference spec clauses that do not exist:\n\n");
        for link in &mapping.invalid_links {
            output.push_str(&format!(
                "- **{}** → `{}` (not found in spec)\n",
                link.requirement, link.spec
            ));
        }
        output.push('\n');
    }

    if !mapping.missing_spec_links.is_empty() {
        output.push_str("## Requirements Missing Spec Links\n\n");
        output.push_str("These spec-derived requirements should have `:satisfies:` links:\n");

        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for id in &mapping.missing_spec_links {
            groups.entry(id_group(id)).or_default().push(id);
        }
        for (group, ids) in &groups {
            output.push_str(&format!("\n### {} ({})\n\n", group, ids.len()));
            for id in ids {
                let title = graph
                    .requirement(id)
                    .map(|r| r.requirement.title.as_str())
                    .unwrap_or("Unknown");
                output.push_str(&format!("- **{id}**: {title}\n"));
            }
        }
        output.push('\n');
    }

    if !mapping.by_file.is_empty() {
        output.push_str("## Spec Coverage by File\n\n");
        for file in &mapping.by_file {
            output.push_str(&format!("### {}\n\n", file.file));
            output.push_str(&format!(
                "- Total: {}, Mapped: {}, Coverage: {:.0}%\n",
                file.total(),
                file.mapped.len(),
                file.coverage()
            ));
            if !file.unmapped.is_empty() {
                if file.unmapped.len() <= UNMAPPED_INLINE {
                    output.push_str(&format!("- Unmapped: {}\n", file.unmapped.join(", ")));
                } else {
                    output.push_str(&format!(
                        "- Unmapped: {} clauses\n",
                        file.unmapped.len()
                    ));
                }
            }
            output.push('\n');
        }
    }

    output.push_str("## Detailed Mapping (Sample)\n\n");
    output.push_str("| Spec Clause | Requirements |\n");
    output.push_str("|-------------|--------------|\n");
    for (spec, reqs) in mapping.spec_to_requirements.iter().take(MAPPING_ROWS) {
        let shown: Vec<&str> = reqs.iter().take(MAPPING_IDS).map(String::as_str).collect();
        let more = if reqs.len() > MAPPING_IDS { "..." } else { "" };
        output.push_str(&format!("| {} | {}{} |\n", spec, shown.join(", "), more));
    }
    if mapping.spec_to_requirements.len() > MAPPING_ROWS {
        output.push_str(&format!(
            "| ... | ({} more mappings) |\n",
            mapping.spec_to_requirements.len() - MAPPING_ROWS
        ));
    }
    output.push('\n');

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use reqtrace_core::{ClassificationTable, MemorySources, Sources};

    fn mapping() -> (SpecMapping, TraceGraph) {
        let extraction = MemorySources::new()
            .add(
                "docs/requirements/r.rst",
                indoc! {"
                    .. requirement:: Offer
                       :id: REQ_SD_001
                       :satisfies: feat_req_someipsd_100, feat_req_someipsd_999

                    .. requirement:: Find
                       :id: REQ_SD_002

                    .. requirement:: Layering
                       :id: REQ_ARCH_001
                "},
            )
            .add(
                "docs/spec/sd.rst",
                indoc! {"
                    .. feat_req:: Offer entry
                       :id: feat_req_someipsd_100

                    .. feat_req:: Find entry
                       :id: feat_req_someipsd_101
                "},
            )
            .extract()
            .unwrap();
        let table = ClassificationTable::default();
        let graph = TraceGraph::link(extraction, &table);
        (SpecMapping::analyze(&graph, &table), graph)
    }

    #[test]
    fn report_lists_invalid_and_missing_links() {
        let (mapping, graph) = mapping();
        let md = render_spec_mapping(&mapping, &graph);
        assert!(md.contains("**Spec Coverage**: 50.0%"));
        assert!(md.contains("- **REQ_SD_001** → `feat_req_someipsd_999` (not found in spec)"));
        assert!(md.contains("### SD (1)"));
        assert!(md.contains("- **REQ_SD_002**: Find"));
        assert!(!md.contains("- **REQ_ARCH_001**"));
    }

    #[test]
    fn per_file_coverage_and_mapping_table() {
        let (mapping, graph) = mapping();
        let md = render_spec_mapping(&mapping, &graph);
        assert!(md.contains("### docs/spec/sd.rst"));
        assert!(md.contains("- Total: 2, Mapped: 1, Coverage: 50%"));
        assert!(md.contains("- Unmapped: feat_req_someipsd_101"));
        assert!(md.contains("| feat_req_someipsd_100 | REQ_SD_001 |"));
    }

    #[test]
    fn groups_by_second_id_segment() {
        assert_eq!(id_group("REQ_SD_001"), "SD");
        assert_eq!(id_group("CUSTOM"), "OTHER");
    }
}
