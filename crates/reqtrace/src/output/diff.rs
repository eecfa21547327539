//! Requirement diff report

use reqtrace_core::{ChangedField, RequirementDiff};

fn field_label(field: ChangedField) -> &'static str {
    match field {
        ChangedField::Title => "Title",
        ChangedField::Satisfies => "Satisfies",
        ChangedField::Status => "Status",
    }
}

pub fn render_diff(diff: &RequirementDiff) -> String {
    let mut output = String::new();

    output.push_str("## Requirements Changes\n\n");
    output.push_str("### Requirements Change Summary\n\n");
    output.push_str(&format!("- **Added**: {}\n", diff.added.len()));
    output.push_str(&format!("- **Removed**: {}\n", diff.removed.len()));
    output.push_str(&format!("- **Modified**: {}\n", diff.modified.len()));
    output.push_str(&format!("- **Unchanged**: {}\n", diff.unchanged.len()));
    output.push_str(&format!("- **Total**: {}\n\n", diff.total()));

    if !diff.has_changes() {
        output.push_str("*No requirement changes detected.*\n");
        return output;
    }

    if !diff.added.is_empty() {
        output.push_str("### Added Requirements\n\n");
        for req in &diff.added {
            output.push_str(&format!("- **{}**: {}\n", req.id, req.title));
            if !req.satisfies.is_empty() {
                output.push_str(&format!("  - Satisfies: {}\n", req.satisfies.join(", ")));
            }
        }
        output.push('\n');
    }

    if !diff.removed.is_empty() {
        output.push_str("### Removed Requirements\n\n");
        for req in &diff.removed {
            output.push_str(&format!("- **{}**: {}\n", req.id, req.title));
        }
        output.push('\n');
    }

    if !diff.modified.is_empty() {
        output.push_str("### Modified Requirements\n\n");
        for m in &diff.modified {
            output.push_str(&format!("- **{}**:\n", m.id));
            for change in &m.changes {
                output.push_str(&format!(
                    "  - {}: `{}` → `{}`\n",
                    field_label(change.field),
                    change.before,
                    change.after
                ));
            }
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqtrace_core::Requirement;

    fn req(id: &str, title: &str, satisfies: &[&str]) -> Requirement {
        Requirement {
            id: id.into(),
            title: title.into(),
            satisfies: satisfies.iter().map(|s| s.to_string()).collect(),
            status: None,
            source: None,
            code_location: None,
        }
    }

    #[test]
    fn no_changes_is_stated() {
        let reqs = vec![req("REQ_A_1", "Same", &[])];
        let md = render_diff(&RequirementDiff::compute(&reqs, &reqs));
        assert!(md.contains("- **Unchanged**: 1"));
        assert!(md.contains("*No requirement changes detected.*"));
    }

    #[test]
    fn changes_are_listed() {
        let baseline = vec![req("REQ_A_1", "Old", &[]), req("REQ_A_2", "Gone", &[])];
        let current = vec![
            req("REQ_A_1", "New", &[]),
            req("REQ_A_3", "Fresh", &["feat_req_x_1"]),
        ];
        let md = render_diff(&RequirementDiff::compute(&current, &baseline));
        assert!(md.contains("- **REQ_A_3**: Fresh\n  - Satisfies: feat_req_x_1"));
        assert!(md.contains("### Removed Requirements\n\n- **REQ_A_2**: Gone"));
        assert!(md.contains("  - Title: `Old` → `New`"));
        assert!(!md.contains("No requirement changes"));
    }
}
