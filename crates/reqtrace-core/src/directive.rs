//! Parsing of requirement and spec-clause directives in `.rst` documents
//!
//! Only a fixed directive vocabulary matters:
//!
//! ```text
//! .. requirement:: Message header layout
//!    :id: REQ_MSG_001
//!    :satisfies: feat_req_someip_538, feat_req_someip_539
//!    :status: implemented
//!
//!    **Code Location**: ``src/someip/message.cpp``
//!
//! .. feat_req:: Header format
//!    :id: feat_req_someip_538
//! ```
//!
//! `spec_req` and `heading` directives declare spec clauses the same way
//! `feat_req` does. Anything else in the document is ignored.

use crate::ids::{self, is_valid_req_id, is_valid_spec_id};
use crate::model::{Requirement, SourceLocation, SpecClause};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Directive names that declare an upstream spec clause.
pub const SPEC_DIRECTIVES: &[&str] = &["feat_req", "spec_req", "heading"];

static CODE_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Code Location\*\*:\s*``([^`]+)``").expect("code location pattern is valid")
});

/// Records declared by one document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Directives {
    pub requirements: Vec<Requirement>,
    pub spec_clauses: Vec<SpecClause>,
}

/// A `.. name:: argument` line.
struct DirectiveLine<'a> {
    name: &'a str,
    argument: &'a str,
}

fn parse_directive_line(line: &str) -> Option<DirectiveLine<'_>> {
    let rest = line.trim_start().strip_prefix("..")?;
    // `..name::` is a comment in reStructuredText, not a directive
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (name, argument) = rest.trim_start().split_once("::")?;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    Some(DirectiveLine {
        name,
        argument: argument.trim(),
    })
}

/// An indented `:name: value` line.
fn parse_attribute(line: &str) -> Option<(&str, &str)> {
    if !line.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = line.trim().strip_prefix(':')?;
    let (name, value) = rest.split_once(':')?;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, value.trim()))
}

/// The first whitespace-delimited word of an attribute value.
fn first_word(value: &str) -> &str {
    value.split_whitespace().next().unwrap_or("")
}

/// Parse every recognized directive in `content`.
///
/// `path` is only recorded as provenance. Blocks whose `id` is missing or
/// malformed are skipped.
pub fn parse_directives(path: &Path, content: &str) -> Directives {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = Directives::default();
    let mut i = 0;

    while i < lines.len() {
        let Some(directive) = parse_directive_line(lines[i]) else {
            i += 1;
            continue;
        };
        let line_num = i + 1;
        let name = directive.name.to_ascii_lowercase();
        i += 1;

        let mut attributes: Vec<(&str, &str)> = Vec::new();
        while i < lines.len() {
            match parse_attribute(lines[i]) {
                Some(attr) => {
                    attributes.push(attr);
                    i += 1;
                }
                None => break,
            }
        }

        let attr = |wanted: &str| {
            attributes
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| *value)
        };

        if name == "requirement" {
            let body_start = i;
            while i < lines.len() && parse_directive_line(lines[i]).is_none() {
                i += 1;
            }

            let Some(id) = attr("id").map(first_word).filter(|id| is_valid_req_id(id)) else {
                continue;
            };

            let code_location = lines[body_start..i]
                .iter()
                .find_map(|line| CODE_LOCATION.captures(line))
                .map(|caps| caps[1].trim().to_string());

            out.requirements.push(Requirement {
                id: ids::normalize_req_id(id),
                title: directive.argument.to_string(),
                satisfies: attr("satisfies").map(ids::parse_spec_list).unwrap_or_default(),
                status: attr("status")
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                source: Some(SourceLocation::new(path, line_num)),
                code_location,
            });
        } else if SPEC_DIRECTIVES.contains(&name.as_str()) {
            let Some(id) = attr("id").map(first_word).filter(|id| is_valid_spec_id(id)) else {
                continue;
            };
            out.spec_clauses.push(SpecClause {
                id: ids::normalize_spec_id(id),
                title: Some(directive.argument.to_string()).filter(|t| !t.is_empty()),
                source_file: Some(path.to_path_buf()),
            });
        }
    }

    out
}
