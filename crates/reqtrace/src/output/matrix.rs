//! Traceability matrix in JSON, CSV and HTML

use super::{escape_html, join_or_dash, render_gap_analysis};
use crate::Analysis;
use eyre::{Result, WrapErr};
use reqtrace_api::MatrixDocument;
use reqtrace_core::{TraceGraph, TracedRequirement};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Paths written by [`write_matrix`].
#[derive(Debug, Clone)]
pub struct MatrixFiles {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub html: PathBuf,
    pub gap_analysis: PathBuf,
}

/// The structured matrix. `generated` is the only field that varies between
/// runs over the same tree.
pub fn render_json(project: &str, analysis: &Analysis, generated: Option<String>) -> Result<String> {
    let mut doc = MatrixDocument::new(project, &analysis.graph, &analysis.gaps);
    if let Some(generated) = generated {
        doc = doc.with_generated(generated);
    }
    doc.to_json().wrap_err("Failed to serialize matrix")
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

pub fn write_csv<W: Write>(out: &mut W, graph: &TraceGraph) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(out);
    wtr.write_record([
        "Requirement ID",
        "Title",
        "Category",
        "Priority",
        "Satisfies",
        "Implemented By",
        "Tested By",
        "Has Implementation",
        "Has Tests",
    ])?;

    for r in &graph.requirements {
        let req = &r.requirement;
        wtr.write_record([
            req.id.clone(),
            req.title.clone(),
            r.category.to_string(),
            r.priority.to_string(),
            req.satisfies.join("; "),
            r.implemented_by.iter().cloned().collect::<Vec<_>>().join("; "),
            r.tested_by.iter().cloned().collect::<Vec<_>>().join("; "),
            yes_no(r.has_code()).to_string(),
            yes_no(r.has_tests()).to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn render_csv(graph: &TraceGraph) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, graph)?;
    String::from_utf8(buf).wrap_err("CSV output is not valid UTF-8")
}

fn status_badge(r: &TracedRequirement) -> &'static str {
    match (r.has_code(), r.has_tests()) {
        (true, true) => r#"<span class="status-ok">✓ Complete</span>"#,
        (true, false) | (false, true) => r#"<span class="status-warning">⚠ Partial</span>"#,
        (false, false) => r#"<span class="status-error">✗ Missing</span>"#,
    }
}

const STYLE: &str = "\
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
h1 { color: #333; }
table { border-collapse: collapse; width: 100%; margin-top: 20px; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #4CAF50; color: white; }
tr:nth-child(even) { background-color: #f2f2f2; }
tr:hover { background-color: #ddd; }
.status-ok { color: #28a745; }
.status-warning { color: #ffc107; }
.status-error { color: #dc3545; }
.code-ref { font-family: monospace; font-size: 0.9em; }
.summary { margin-bottom: 20px; padding: 15px; background: #f8f9fa; border-radius: 5px; }
#filter { padding: 6px; width: 300px; }
";

const FILTER_SCRIPT: &str = "\
document.getElementById('filter').addEventListener('input', function (e) {
  var needle = e.target.value.toLowerCase();
  document.querySelectorAll('#requirements tr.req').forEach(function (row) {
    row.style.display = row.textContent.toLowerCase().includes(needle) ? '' : 'none';
  });
});
";

pub fn render_html(project: &str, analysis: &Analysis, generated: Option<&str>) -> String {
    let Analysis { graph, gaps } = analysis;
    let project = escape_html(project);
    let mut output = String::new();

    output.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    output.push_str("<meta charset=\"utf-8\">\n");
    output.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    output.push_str(&format!("<title>{project} Traceability Matrix</title>\n"));
    output.push_str("<style>\n");
    output.push_str(STYLE);
    output.push_str("</style>\n");
    output.push_str("</head>\n<body>\n");

    output.push_str(&format!("<h1>{project} Traceability Matrix</h1>\n"));
    if let Some(generated) = generated {
        output.push_str(&format!("<p>Generated: {}</p>\n", escape_html(generated)));
    }

    output.push_str("<div class=\"summary\">\n<strong>Summary:</strong>\n<ul>\n");
    output.push_str(&format!(
        "<li>Total Requirements: {}</li>\n",
        gaps.summary.total_requirements
    ));
    output.push_str(&format!(
        "<li>Code References: {}</li>\n",
        gaps.summary.code_references
    ));
    output.push_str(&format!("<li>Test Cases: {}</li>\n", gaps.summary.test_cases));
    output.push_str(&format!(
        "<li>Fully Traced: {:.1}%</li>\n",
        gaps.summary.fully_traced_rate()
    ));
    output.push_str(&format!(
        "<li>Compliance: {} ({})</li>\n",
        gaps.compliance,
        gaps.compliance.description()
    ));
    output.push_str("</ul>\n</div>\n");

    output.push_str("<h2>Requirements Traceability</h2>\n");
    output.push_str(
        "<input id=\"filter\" type=\"search\" placeholder=\"Filter requirements...\">\n",
    );
    output.push_str("<table id=\"requirements\">\n");
    output.push_str(
        "<tr><th>Requirement ID</th><th>Title</th><th>Priority</th><th>Satisfies</th>\
         <th>Implemented By</th><th>Tested By</th><th>Status</th></tr>\n",
    );
    for r in &graph.requirements {
        let req = &r.requirement;
        output.push_str(&format!(
            "<tr class=\"req\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td class=\"code-ref\">{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&req.id),
            escape_html(&req.title),
            r.priority,
            escape_html(&join_or_dash(&req.satisfies)),
            escape_html(&join_or_dash(&r.implemented_by)),
            escape_html(&join_or_dash(&r.tested_by)),
            status_badge(r)
        ));
    }
    output.push_str("</table>\n");

    output.push_str("<h2>Code References</h2>\n<table>\n");
    output.push_str(
        "<tr><th>ID</th><th>Location</th><th>Function</th><th>Implements</th>\
         <th>Satisfies (Spec)</th></tr>\n",
    );
    for code in &graph.code_refs {
        output.push_str(&format!(
            "<tr><td>{}</td><td class=\"code-ref\">{}</td><td class=\"code-ref\">{}</td>\
             <td>{}</td><td>{}</td></tr>\n",
            escape_html(&code.id),
            escape_html(&code.location.to_string()),
            escape_html(code.function_name.as_deref().unwrap_or("-")),
            escape_html(&join_or_dash(&code.implements)),
            escape_html(&join_or_dash(&code.satisfies))
        ));
    }
    output.push_str("</table>\n");

    output.push_str("<h2>Test Cases</h2>\n<table>\n");
    output.push_str("<tr><th>ID</th><th>Name</th><th>Location</th><th>Tests</th></tr>\n");
    for test in &graph.test_cases {
        output.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"code-ref\">{}</td><td>{}</td></tr>\n",
            escape_html(&test.id),
            escape_html(test.test_name.as_deref().unwrap_or("-")),
            escape_html(&test.location.to_string()),
            escape_html(&join_or_dash(&test.tests))
        ));
    }
    output.push_str("</table>\n");

    output.push_str("<script>\n");
    output.push_str(FILTER_SCRIPT);
    output.push_str("</script>\n");
    output.push_str("</body>\n</html>\n");
    output
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).wrap_err_with(|| format!("Failed to write {}", path.display()))
}

/// Write `matrix.json`, `matrix.csv`, `matrix.html` and `gap_analysis.md`
/// into `dir`, creating it if needed.
pub fn write_matrix(
    dir: &Path,
    project: &str,
    analysis: &Analysis,
    generated: Option<String>,
) -> Result<MatrixFiles> {
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;

    let files = MatrixFiles {
        json: dir.join("matrix.json"),
        csv: dir.join("matrix.csv"),
        html: dir.join("matrix.html"),
        gap_analysis: dir.join("gap_analysis.md"),
    };

    write_file(
        &files.json,
        &render_json(project, analysis, generated.clone())?,
    )?;
    write_file(&files.csv, &render_csv(&analysis.graph)?)?;
    write_file(
        &files.html,
        &render_html(project, analysis, generated.as_deref()),
    )?;
    write_file(
        &files.gap_analysis,
        &render_gap_analysis(project, analysis, generated.as_deref()),
    )?;

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use reqtrace_core::{
        ClassificationTable, GapAnalysis, MemorySources, Sources, TestLevelRules,
    };

    fn analysis() -> Analysis {
        let extraction = MemorySources::new()
            .add(
                "docs/requirements/ser.rst",
                indoc! {r#"
                    .. requirement:: Serialize <header> & "payload"
                       :id: REQ_SER_001
                       :satisfies: feat_req_someip_538, feat_req_someip_539

                    .. requirement:: Partial
                       :id: REQ_SER_002

                    .. requirement:: Missing
                       :id: REQ_SER_003
                "#},
            )
            .add(
                "docs/spec/someip.rst",
                indoc! {"
                    .. feat_req:: Header
                       :id: feat_req_someip_538

                    .. feat_req:: Payload
                       :id: feat_req_someip_539
                "},
            )
            .add(
                "src/serializer.cpp",
                "/** @implements REQ_SER_001, REQ_SER_002 */\nvoid serialize() {}\n",
            )
            .add(
                "tests/test_serializer.cpp",
                "/** @test_case TC_SER_001\n * @tests REQ_SER_001 */\nTEST(Ser, Header) {}\n",
            )
            .extract()
            .unwrap();
        let table = ClassificationTable::default();
        let graph = TraceGraph::link(extraction, &table);
        let gaps = GapAnalysis::analyze(&graph, &table, &TestLevelRules::default());
        Analysis { graph, gaps }
    }

    #[test]
    fn csv_has_one_row_per_requirement() {
        let csv = render_csv(&analysis().graph).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Requirement ID,Title,Category,Priority,Satisfies"));
        assert!(lines[1].starts_with("REQ_SER_001,"));
        assert!(lines[1].contains("feat_req_someip_538; feat_req_someip_539"));
        assert!(lines[1].ends_with("CODE_serializer_1,TC_SER_001,Yes,Yes"));
        assert!(lines[3].ends_with(",,,No,No"));
    }

    #[test]
    fn html_has_badges_filter_and_escaping() {
        let html = render_html("demo", &analysis(), None);
        assert!(html.contains("status-ok"));
        assert!(html.contains("status-warning"));
        assert!(html.contains("status-error"));
        assert!(html.contains("id=\"filter\""));
        assert!(html.contains("Serialize &lt;header&gt; &amp; &quot;payload&quot;"));
        assert!(!html.contains("<header>"));
        assert!(!html.contains("Generated:"));
    }

    #[test]
    fn json_round_trips_counts() {
        let a = analysis();
        let json = render_json("demo", &a, Some("2025-01-01T00:00:00Z".into())).unwrap();
        let doc = MatrixDocument::from_json(&json).unwrap();
        assert_eq!(doc.requirement_count(), a.graph.requirements.len());
        assert_eq!(doc.link_count(), a.graph.link_count());
        assert_eq!(doc.generated.as_deref(), Some("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn rendering_without_timestamp_is_deterministic() {
        let a = analysis();
        assert_eq!(
            render_json("demo", &a, None).unwrap(),
            render_json("demo", &a, None).unwrap()
        );
        assert_eq!(render_html("demo", &a, None), render_html("demo", &a, None));
    }

    #[test]
    fn write_matrix_creates_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("build/docs/traceability");
        let files = write_matrix(&out, "demo", &analysis(), None).unwrap();
        for path in [&files.json, &files.csv, &files.html, &files.gap_analysis] {
            assert!(path.exists(), "{} was not written", path.display());
        }
    }
}
