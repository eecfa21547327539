//! Terminal summary

use super::{color_percent, ratio};
use crate::Analysis;
use owo_colors::OwoColorize;

/// Untraced requirements listed before the rest are elided
const LIST_LIMIT: usize = 20;

pub fn render_status(project: &str, analysis: &Analysis, verbose: bool) -> String {
    let Analysis { graph, gaps } = analysis;
    let summary = &gaps.summary;
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!(
        "{} {} Traceability Status\n",
        "##".bold(),
        project.cyan().bold()
    ));
    output.push('\n');

    output.push_str(&format!(
        "Requirements: {}  {}\n",
        summary.total_requirements.to_string().bold(),
        format!(
            "({} spec clauses, {} code references, {} test cases)",
            summary.spec_clauses, summary.code_references, summary.test_cases
        )
        .dimmed()
    ));

    let rows = [
        ("Implemented", summary.implemented),
        ("Tested", summary.tested),
        ("Fully traced", summary.fully_traced),
    ];
    for (label, count) in rows {
        let percent = reqtrace_core::percent(count, summary.total_requirements);
        output.push_str(&format!(
            "  {:<14}{} ({}/{})\n",
            format!("{label}:"),
            color_percent(percent),
            count,
            summary.total_requirements
        ));
    }
    output.push_str(&format!(
        "  {:<14}{}\n",
        "Spec-linked:",
        ratio(summary.spec_link_required_present, summary.spec_link_required)
    ));
    output.push('\n');

    output.push_str(&format!(
        "Compliance: {} ({})\n",
        gaps.compliance.to_string().bold(),
        gaps.compliance.description()
    ));
    output.push_str(&format!("Stage: {}\n", gaps.stage.label()));
    output.push('\n');

    if !graph.diagnostics.is_empty() {
        output.push_str(&format!(
            "{} Diagnostics ({}):\n",
            "!".red().bold(),
            graph.diagnostics.len()
        ));
        for d in &graph.diagnostics {
            output.push_str(&format!(
                "  {} {} {}",
                "-".red(),
                d.kind.as_str().dimmed(),
                d.message
            ));
            if let Some(location) = &d.location {
                output.push_str(&format!(" ({})", location.to_string().dimmed()));
            }
            output.push('\n');
        }
        output.push('\n');
    }

    let untraced: Vec<_> = graph
        .requirements
        .iter()
        .filter(|r| !r.is_fully_traced())
        .collect();
    if !untraced.is_empty() {
        output.push_str(&format!(
            "{} Incomplete Requirements ({}):\n",
            "?".yellow().bold(),
            untraced.len()
        ));
        let shown = if verbose { untraced.len() } else { LIST_LIMIT };
        for r in untraced.iter().take(shown) {
            let mut missing = Vec::new();
            if !r.has_code() {
                missing.push("code");
            }
            if !r.has_tests() {
                missing.push("tests");
            }
            output.push_str(&format!(
                "  {} {} {}\n",
                "-".yellow(),
                r.id(),
                format!("[{} | no {}]", r.priority, missing.join(", ")).dimmed()
            ));
        }
        if untraced.len() > shown {
            output.push_str(&format!(
                "  {}\n",
                format!("... and {} more (use -v to list all)", untraced.len() - shown).dimmed()
            ));
        }
        output.push('\n');
    }

    output
}
