//! Output formatting for traceability reports
//!
//! Every renderer takes the finished model by shared reference and returns a
//! `String` (or writes to an `io::Write`); none of them mutate what they
//! render.

mod diff;
mod gaps;
mod matrix;
mod specs;
mod text;
mod verify;

pub use diff::render_diff;
pub use gaps::render_gap_analysis;
pub use matrix::{MatrixFiles, render_csv, render_html, render_json, write_csv, write_matrix};
pub use specs::render_spec_mapping;
pub use text::render_status;
pub use verify::render_verification;

use eyre::{Result, WrapErr};
use owo_colors::OwoColorize;

/// Current time as RFC 3339, for the `generated` field of reports.
pub fn timestamp() -> Result<String> {
    use time::format_description::well_known::Rfc3339;

    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .wrap_err("Failed to format timestamp")
}

/// Escape text for HTML element content and attribute values.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `12/34 (35.3%)`
pub(crate) fn ratio(part: usize, total: usize) -> String {
    format!("{part}/{total} ({:.1}%)", reqtrace_core::percent(part, total))
}

/// A percentage colored green, yellow or red.
pub(crate) fn color_percent(percent: f64) -> String {
    let percent_str = format!("{percent:.1}%");
    if percent >= 80.0 {
        percent_str.green().to_string()
    } else if percent >= 50.0 {
        percent_str.yellow().to_string()
    } else {
        percent_str.red().to_string()
    }
}

/// `", "`-joined, or `-` when empty.
pub(crate) fn join_or_dash<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> String {
    let joined = items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}
