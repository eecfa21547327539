//! Identifier normalization
//!
//! Requirement ids are uppercased, spec-clause ids are lowercased, and both
//! are trimmed. Every ingestion point goes through these functions so the same
//! logical id compares equal no matter how it was cased at the source.

use std::fmt::{Display, Formatter};

/// Prefix shared by every requirement id (`REQ_MSG_001`).
pub const REQ_PREFIX: &str = "REQ_";

/// Prefix shared by every upstream spec-clause id (`feat_req_someip_538`).
pub const SPEC_PREFIX: &str = "feat_req_";

/// Canonical form of a requirement id.
pub fn normalize_req_id(id: &str) -> String {
    id.trim().to_uppercase()
}

/// Canonical form of a spec-clause id.
pub fn normalize_spec_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Split a comma-separated list, trimming tokens and dropping empty ones.
pub fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Split and normalize a comma-separated list of requirement ids.
pub fn parse_req_list(list: &str) -> Vec<String> {
    split_list(list).map(normalize_req_id).collect()
}

/// Split and normalize a comma-separated list of spec-clause ids.
pub fn parse_spec_list(list: &str) -> Vec<String> {
    split_list(list).map(normalize_spec_id).collect()
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Whether a token names a requirement.
///
/// Only the prefix is checked: `REQ_` followed by anything counts, even if the
/// remainder would not pass the directive id grammar. This is a known
/// looseness that tolerates hand-written test annotations.
pub fn is_req_ref(token: &str) -> bool {
    starts_with_ignore_case(token.trim(), REQ_PREFIX)
}

/// Whether a token names an upstream spec clause.
pub fn is_spec_ref(token: &str) -> bool {
    starts_with_ignore_case(token.trim(), SPEC_PREFIX)
}

/// Whether `id` matches the full requirement grammar `REQ_[A-Za-z0-9_]+`.
pub fn is_valid_req_id(id: &str) -> bool {
    let id = id.trim();
    is_req_ref(id)
        && id.len() > REQ_PREFIX.len()
        && id[REQ_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `id` matches the spec-clause grammar `feat_req_[a-z0-9_]+`
/// (case-insensitively; normalization lowercases it).
pub fn is_valid_spec_id(id: &str) -> bool {
    let id = id.trim();
    is_spec_ref(id)
        && id.len() > SPEC_PREFIX.len()
        && id[SPEC_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// What a `tests` entry points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefTarget {
    /// A local requirement (normalized, uppercase).
    Requirement(String),
    /// An upstream spec clause (normalized, lowercase).
    SpecClause(String),
    /// Anything else, kept verbatim (trimmed).
    Other(String),
}

impl RefTarget {
    /// Classify and normalize a raw reference token.
    pub fn parse(token: &str) -> Self {
        if is_req_ref(token) {
            RefTarget::Requirement(normalize_req_id(token))
        } else if is_spec_ref(token) {
            RefTarget::SpecClause(normalize_spec_id(token))
        } else {
            RefTarget::Other(token.trim().to_string())
        }
    }

    /// The normalized id, whatever kind it is.
    pub fn id(&self) -> &str {
        match self {
            RefTarget::Requirement(id) | RefTarget::SpecClause(id) | RefTarget::Other(id) => id,
        }
    }

    /// Canonical string form of a raw token.
    pub fn normalize(token: &str) -> String {
        Self::parse(token).id().to_string()
    }
}

impl Display for RefTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Parse a comma-separated `tests` list into normalized tokens.
pub fn parse_ref_list(list: &str) -> Vec<String> {
    split_list(list).map(RefTarget::normalize).collect()
}
