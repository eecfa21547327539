//! Annotation extraction from documentation, source and test files
//!
//! Source files carry traceability tags inside doc comments:
//!
//! ```text
//! /**
//!  * @brief Serialize a message header
//!  * @implements REQ_SER_001, REQ_SER_002
//!  * @satisfies feat_req_someip_538
//!  */
//! void serialize_header(const Header& h) { ... }
//! ```
//!
//! Tests use `@test_case` and `@tests`; Python tests put the same tags in
//! the docstring of a `def test_*` function.

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::directive::parse_directives;
use crate::ids::{self, RefTarget, is_valid_req_id, is_valid_spec_id};
use crate::model::{CodeReference, Requirement, SourceLocation, SpecClause, TestCase};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::LazyLock;

/// How far past the end of a comment to look for the declaration it labels.
pub const DECLARATION_LOOKAHEAD: usize = 500;

/// How far before the end of a docstring to look for its `def test_*`.
pub const TEST_LOOKBEHIND: usize = 500;

/// The file kinds extraction understands, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    /// reStructuredText documents with requirement/spec directives
    Directive,
    /// C and C++ sources and headers
    CFamily,
    Rust,
    Python,
}

/// File extensions that reqtrace knows how to scan.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "rst", // directives
    "c", "h", "cc", "cpp", "cxx", "hh", "hpp", // C family
    "rs", // Rust
    "py", // Python
];

impl FileKind {
    pub fn from_extension(ext: &OsStr) -> Option<Self> {
        match ext.to_str()? {
            "rst" => Some(FileKind::Directive),
            "c" | "h" | "cc" | "cpp" | "cxx" | "hh" | "hpp" => Some(FileKind::CFamily),
            "rs" => Some(FileKind::Rust),
            "py" => Some(FileKind::Python),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Directive => "directive",
            FileKind::CFamily => "c-family",
            FileKind::Rust => "rust",
            FileKind::Python => "python",
        }
    }

    /// Whether files of this kind carry code/test annotations.
    pub fn is_source(&self) -> bool {
        !matches!(self, FileKind::Directive)
    }
}

/// Check if a file extension is supported for scanning
pub fn is_supported_extension(ext: &OsStr) -> bool {
    FileKind::from_extension(ext).is_some()
}

/// Everything extracted from a set of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub requirements: Vec<Requirement>,
    pub spec_clauses: Vec<SpecClause>,
    pub code_refs: Vec<CodeReference>,
    pub test_cases: Vec<TestCase>,
    pub diagnostics: Diagnostics,
}

impl Extraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract from raw content (no I/O)
    pub fn from_content(path: &Path, content: &str) -> Self {
        let mut extraction = Extraction::new();
        extract_from_content(path, content, &mut extraction);
        extraction.finish();
        extraction
    }

    /// Merge another extraction into this one
    pub fn extend(&mut self, other: Extraction) {
        self.requirements.extend(other.requirements);
        self.spec_clauses.extend(other.spec_clauses);
        self.code_refs.extend(other.code_refs);
        self.test_cases.extend(other.test_cases);
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
            && self.spec_clauses.is_empty()
            && self.code_refs.is_empty()
            && self.test_cases.is_empty()
    }

    /// Requirement id → the spec clauses it claims to satisfy.
    pub fn satisfies_map(&self) -> BTreeMap<String, Vec<String>> {
        self.requirements
            .iter()
            .map(|r| (r.id.clone(), r.satisfies.clone()))
            .collect()
    }

    /// Put records in (path, line, id) order and collapse duplicates.
    ///
    /// Files may be scanned in any order, so this runs once after merging.
    /// The first definition of a requirement or record id wins; later ones are
    /// reported.
    pub fn finish(&mut self) {
        self.requirements.sort_by(|a, b| {
            (&a.source, &a.id).cmp(&(&b.source, &b.id))
        });
        self.spec_clauses
            .sort_by(|a, b| (&a.source_file, &a.id).cmp(&(&b.source_file, &b.id)));
        self.code_refs
            .sort_by(|a, b| (&a.location, &a.id).cmp(&(&b.location, &b.id)));
        self.test_cases
            .sort_by(|a, b| (&a.location, &a.id).cmp(&(&b.location, &b.id)));

        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        self.requirements.retain(|req| {
            if seen.insert(req.id.clone()) {
                true
            } else {
                duplicates.push(req.clone());
                false
            }
        });
        for req in duplicates {
            let mut diag = Diagnostic::new(
                DiagnosticKind::DuplicateRequirement,
                &req.id,
                format!("Requirement {} is defined more than once; keeping the first definition", req.id),
            );
            if let Some(source) = req.source {
                diag = diag.with_location(source);
            }
            self.diagnostics.push(diag);
        }

        let mut seen = HashSet::new();
        self.spec_clauses.retain(|clause| seen.insert(clause.id.clone()));

        let mut seen = HashSet::new();
        let mut dropped = Vec::new();
        self.code_refs.retain(|r| {
            seen.insert(r.id.clone()) || {
                dropped.push((r.id.clone(), r.location.clone()));
                false
            }
        });
        let mut seen = HashSet::new();
        self.test_cases.retain(|t| {
            seen.insert(t.id.clone()) || {
                dropped.push((t.id.clone(), t.location.clone()));
                false
            }
        });
        for (id, location) in dropped {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DuplicateRecord,
                    &id,
                    format!("Record {id} appears more than once; keeping the first occurrence"),
                )
                .with_location(location),
            );
        }

        self.diagnostics.sort();
    }
}

/// Extract records from one file's content into `out`.
pub fn extract_from_content(path: &Path, content: &str, out: &mut Extraction) {
    match FileKind::from_path(path) {
        Some(FileKind::Directive) => {
            let directives = parse_directives(path, content);
            out.requirements.extend(directives.requirements);
            out.spec_clauses.extend(directives.spec_clauses);
        }
        Some(kind @ (FileKind::CFamily | FileKind::Rust)) => {
            extract_from_source(path, content, kind, out)
        }
        Some(FileKind::Python) => extract_from_python(path, content, out),
        None => {}
    }
}

/// 1-indexed line numbers from byte offsets.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(content: &str) -> Self {
        Self {
            starts: std::iter::once(0)
                .chain(content.match_indices('\n').map(|(i, _)| i + 1))
                .collect(),
        }
    }

    fn line(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }
}

/// A doc comment or docstring: where it starts, where it ends, what it says.
#[derive(Debug, Clone, Copy)]
struct CommentBlock<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

fn flush_line_run<'a>(
    content: &'a str,
    run: &mut Option<(usize, usize)>,
    blocks: &mut Vec<CommentBlock<'a>>,
) {
    if let Some((start, end)) = run.take() {
        blocks.push(CommentBlock {
            start,
            end,
            text: &content[start..end],
        });
    }
}

/// `/** ... */` blocks and runs of consecutive `///` lines, in file order.
fn doc_comment_blocks(content: &str) -> Vec<CommentBlock<'_>> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    let mut line_run: Option<(usize, usize)> = None;

    for line in content.split_inclusive('\n') {
        let line_start = pos;
        pos += line.len();

        if let Some(idx) = line.find("///") {
            if line[..idx].trim().is_empty() {
                let begin = line_start + idx;
                let end = line_start + line.trim_end_matches(['\n', '\r']).len();
                line_run = match line_run {
                    Some((start, _)) => Some((start, end)),
                    None => Some((begin, end)),
                };
                continue;
            }
        }
        flush_line_run(content, &mut line_run, &mut blocks);
    }
    flush_line_run(content, &mut line_run, &mut blocks);

    let mut search = 0;
    while let Some(rel) = content[search..].find("/**") {
        let start = search + rel;
        let body_start = start + 3;
        let Some(close) = content.get(body_start..).and_then(|rest| rest.find("*/")) else {
            break;
        };
        let body_end = body_start + close;
        let end = body_end + 2;
        // `/** */` nested inside a `///` run belongs to that run
        if !blocks.iter().any(|b| b.start <= start && start < b.end) {
            blocks.push(CommentBlock {
                start,
                end,
                text: &content[body_start..body_end],
            });
        }
        search = end;
    }

    blocks.sort_by_key(|b| b.start);
    blocks
}

/// `"""..."""` and `'''...'''` docstrings, in file order.
fn python_docstrings(content: &str) -> Vec<CommentBlock<'_>> {
    let mut blocks = Vec::new();
    let mut search = 0;

    loop {
        let double = content[search..].find("\"\"\"");
        let single = content[search..].find("'''");
        let (rel, quote) = match (double, single) {
            (Some(d), Some(s)) if s < d => (s, "'''"),
            (Some(d), _) => (d, "\"\"\""),
            (None, Some(s)) => (s, "'''"),
            (None, None) => break,
        };
        let start = search + rel;
        let body_start = start + quote.len();
        let Some(close) = content[body_start..].find(quote) else {
            break;
        };
        let body_end = body_start + close;
        blocks.push(CommentBlock {
            start,
            end: body_end + quote.len(),
            text: &content[body_start..body_end],
        });
        search = body_end + quote.len();
    }

    blocks
}

/// A value runs to the end of the line or to the next tag on it.
static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)@(implements|satisfies|test_case|tests|brief)\b[ \t]*([^\n@]*)")
        .expect("tag pattern is valid")
});

/// Tags found in one block.
#[derive(Debug, Default)]
struct Tags {
    implements: Vec<String>,
    satisfies: Vec<String>,
    test_cases: Vec<String>,
    tests: Vec<String>,
    brief: Option<String>,
}

impl Tags {
    fn has_links(&self) -> bool {
        !(self.implements.is_empty()
            && self.satisfies.is_empty()
            && self.test_cases.is_empty()
            && self.tests.is_empty())
    }

    fn is_test(&self) -> bool {
        !(self.test_cases.is_empty() && self.tests.is_empty())
    }

    fn is_code(&self) -> bool {
        !(self.implements.is_empty() && self.satisfies.is_empty())
    }

    /// What a test case built from these tags exercises.
    fn tested_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = Vec::new();
        for r in self
            .tests
            .iter()
            .chain(&self.implements)
            .chain(&self.satisfies)
        {
            if !refs.contains(r) {
                refs.push(r.clone());
            }
        }
        refs
    }
}

/// The leading identifier characters of a list token (`REQ_A_1.` → `REQ_A_1`).
fn ident_prefix(token: &str) -> &str {
    let end = token
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(token.len());
    &token[..end]
}

fn tag_values(value: &str) -> impl Iterator<Item = &str> {
    ids::split_list(value)
        .map(ident_prefix)
        .filter(|s| !s.is_empty())
}

fn parse_tags(text: &str) -> Tags {
    let mut tags = Tags::default();
    for caps in TAG.captures_iter(text) {
        let value = caps[2].trim_end_matches(['\r', '*', '/', ' ', '\t']);
        match caps[1].to_ascii_lowercase().as_str() {
            "implements" => tags.implements.extend(
                tag_values(value)
                    .filter(|t| is_valid_req_id(t))
                    .map(ids::normalize_req_id),
            ),
            "satisfies" => tags.satisfies.extend(
                tag_values(value)
                    .filter(|t| is_valid_spec_id(t))
                    .map(ids::normalize_spec_id),
            ),
            "test_case" => tags.test_cases.extend(
                tag_values(value)
                    .filter(|t| t.len() > 3 && t[..3].eq_ignore_ascii_case("TC_"))
                    .map(str::to_string),
            ),
            "tests" => tags.tests.extend(tag_values(value).map(RefTarget::normalize)),
            _ => {
                if tags.brief.is_none() {
                    let brief = value.trim();
                    if !brief.is_empty() {
                        tags.brief = Some(brief.to_string());
                    }
                }
            }
        }
    }
    tags
}

static CPP_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:(?:virtual|static|inline|explicit|constexpr)[ \t]+)*(?:[\w:]+(?:<[^>]*>)?[*&]*[ \t]+[*&]*)+(?:\w+::)*(~?\w+)[ \t]*\([^)]*\)",
    )
    .expect("function pattern is valid")
});

/// Statement keywords that can look like `type name(args)` to [`CPP_FUNCTION`].
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "return", "throw", "new", "delete",
    "sizeof", "goto",
];

/// `else if (ready)`, `return encode(buf)` and the like.
fn is_control_flow(signature: &str) -> bool {
    let head = signature.split('(').next().unwrap_or("");
    head.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|token| CONTROL_KEYWORDS.contains(&token))
}

static CPP_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:class|struct)\s+(\w+)").expect("class pattern is valid")
});

static GTEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TEST(?:_F|_P)?\s*\(\s*(\w+)\s*,\s*(\w+)\s*\)").expect("gtest pattern is valid")
});

static RUST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:fn|struct|enum|trait)\s+(\w+)",
    )
    .expect("rust item pattern is valid")
});

static PYTEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:async\s+)?def\s+(test_\w+)\s*\(").expect("pytest pattern is valid")
});

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index.min(s.len())
}

/// The declaration a comment ending at `comment_end` labels: the
/// earliest-starting declaration of any supported shape inside the lookahead
/// window.
fn following_declaration(content: &str, comment_end: usize, kind: FileKind) -> Option<String> {
    let window_end = floor_char_boundary(content, comment_end + DECLARATION_LOOKAHEAD);
    let window = &content[comment_end..window_end];

    let mut candidates: Vec<(usize, String)> = Vec::new();
    match kind {
        FileKind::Rust => {
            if let Some(caps) = RUST_ITEM.captures(window) {
                candidates.push((caps.get(0).map_or(0, |m| m.start()), caps[1].to_string()));
            }
        }
        _ => {
            if let Some(caps) = CPP_FUNCTION
                .captures_iter(window)
                .find(|caps| !is_control_flow(&caps[0]))
            {
                candidates.push((caps.get(0).map_or(0, |m| m.start()), caps[1].to_string()));
            }
            if let Some(caps) = CPP_CLASS.captures(window) {
                candidates.push((caps.get(0).map_or(0, |m| m.start()), caps[1].to_string()));
            }
            if let Some(caps) = GTEST.captures(window) {
                candidates.push((
                    caps.get(0).map_or(0, |m| m.start()),
                    format!("{}.{}", &caps[1], &caps[2]),
                ));
            }
        }
    }

    candidates
        .into_iter()
        .min_by_key(|(start, _)| *start)
        .map(|(_, name)| name)
}

/// The nearest `def test_*` before a docstring ending at `docstring_end`.
fn preceding_test(content: &str, docstring_end: usize) -> Option<String> {
    let window_start = ceil_char_boundary(content, docstring_end.saturating_sub(TEST_LOOKBEHIND));
    PYTEST
        .captures_iter(&content[window_start..docstring_end])
        .last()
        .map(|caps| caps[1].to_string())
}

fn extract_from_source(path: &Path, content: &str, kind: FileKind, out: &mut Extraction) {
    let lines = LineIndex::new(content);

    for block in doc_comment_blocks(content) {
        let tags = parse_tags(block.text);
        if !tags.has_links() {
            continue;
        }

        let location = SourceLocation::new(path, lines.line(block.start));
        let declaration = following_declaration(content, block.end, kind);
        let description = tags.brief.clone().unwrap_or_default();

        if tags.is_test() {
            push_test_cases(&tags, &location, declaration.clone(), description.clone(), out);
        }

        if tags.is_code() {
            out.code_refs.push(CodeReference {
                id: CodeReference::derive_id(&location),
                location,
                function_name: declaration,
                implements: tags.implements,
                satisfies: tags.satisfies,
                description,
            });
        }
    }
}

fn extract_from_python(path: &Path, content: &str, out: &mut Extraction) {
    let lines = LineIndex::new(content);

    for block in python_docstrings(content) {
        let tags = parse_tags(block.text);
        if !tags.is_test() {
            continue;
        }

        let location = SourceLocation::new(path, lines.line(block.start));
        let description = tags.brief.clone().unwrap_or_else(|| {
            let first = block.text.trim().lines().next().unwrap_or("").trim();
            if first.starts_with('@') {
                String::new()
            } else {
                first.to_string()
            }
        });
        let test_name = preceding_test(content, block.end);
        push_test_cases(&tags, &location, test_name, description, out);
    }
}

fn push_test_cases(
    tags: &Tags,
    location: &SourceLocation,
    test_name: Option<String>,
    description: String,
    out: &mut Extraction,
) {
    let tested = tags.tested_refs();
    let ids = if tags.test_cases.is_empty() {
        vec![TestCase::derive_id(location)]
    } else {
        tags.test_cases.clone()
    };
    for id in ids {
        out.test_cases.push(TestCase {
            id,
            location: location.clone(),
            test_name: test_name.clone(),
            tests: tested.clone(),
            description: description.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn extract(path: &str, content: &str) -> Extraction {
        Extraction::from_content(Path::new(path), content)
    }

    #[test]
    fn file_kind_from_extension() {
        assert_eq!(FileKind::from_path(Path::new("a/b.hpp")), Some(FileKind::CFamily));
        assert_eq!(FileKind::from_path(Path::new("x.rst")), Some(FileKind::Directive));
        assert_eq!(FileKind::from_path(Path::new("x.py")), Some(FileKind::Python));
        assert_eq!(FileKind::from_path(Path::new("x.rs")), Some(FileKind::Rust));
        assert_eq!(FileKind::from_path(Path::new("README.md")), None);
    }

    #[test]
    fn cpp_block_yields_code_reference() {
        let ex = extract(
            "src/serialization/serializer.cpp",
            indoc! {"
                #include \"serializer.h\"

                /**
                 * @brief Serialize a header
                 * @implements req_ser_001, REQ_SER_002
                 * @satisfies FEAT_REQ_someip_538
                 */
                bool Serializer::serialize_header(const Header& h) {
                    return true;
                }
            "},
        );
        assert_eq!(ex.code_refs.len(), 1);
        let r = &ex.code_refs[0];
        assert_eq!(r.id, "CODE_serializer_3");
        assert_eq!(r.location.line, 3);
        assert_eq!(r.function_name.as_deref(), Some("serialize_header"));
        assert_eq!(r.implements, vec!["REQ_SER_001", "REQ_SER_002"]);
        assert_eq!(r.satisfies, vec!["feat_req_someip_538"]);
        assert_eq!(r.description, "Serialize a header");
        assert!(ex.test_cases.is_empty());
    }

    #[test]
    fn block_without_linking_tags_is_not_indexed() {
        let ex = extract(
            "src/a.cpp",
            indoc! {"
                /** @brief Just docs */
                void f() {}
            "},
        );
        assert!(ex.is_empty());
    }

    #[test]
    fn class_declaration_is_found() {
        let ex = extract(
            "include/e2e/e2e_crc.h",
            indoc! {"
                /// @implements REQ_E2E_PLUGIN_003
                class E2ECrc {
                public:
                    uint8_t calculate(const uint8_t* data);
                };
            "},
        );
        assert_eq!(ex.code_refs[0].function_name.as_deref(), Some("E2ECrc"));
        assert_eq!(ex.code_refs[0].location.line, 1);
    }

    #[test]
    fn nearest_declaration_wins_over_later_function() {
        let ex = extract(
            "include/msg.h",
            indoc! {"
                /** @implements REQ_MSG_001 */
                struct Header {
                    int x;
                };
                void later_function(int a);
            "},
        );
        assert_eq!(ex.code_refs[0].function_name.as_deref(), Some("Header"));
    }

    #[test]
    fn declaration_outside_window_is_not_attributed() {
        let padding = "// filler line\n".repeat(40);
        let content = format!("/** @implements REQ_MSG_001 */\n{padding}void far_away() {{}}\n");
        let ex = extract("src/far.cpp", &content);
        assert_eq!(ex.code_refs[0].function_name, None);
    }

    #[test]
    fn gtest_block_yields_test_case() {
        let ex = extract(
            "tests/test_message.cpp",
            indoc! {"
                /**
                 * @test_case TC_MSG_001
                 * @tests REQ_MSG_001, req_msg_002
                 * @satisfies feat_req_someip_538
                 */
                TEST_F(MessageTest, HeaderLayout) {
                    EXPECT_TRUE(true);
                }
            "},
        );
        assert_eq!(ex.test_cases.len(), 1);
        let tc = &ex.test_cases[0];
        assert_eq!(tc.id, "TC_MSG_001");
        assert_eq!(tc.test_name.as_deref(), Some("MessageTest.HeaderLayout"));
        assert_eq!(
            tc.tests,
            vec!["REQ_MSG_001", "REQ_MSG_002", "feat_req_someip_538"]
        );
        // The satisfies tag also makes it a code reference
        assert_eq!(ex.code_refs.len(), 1);
    }

    #[test]
    fn cpp_tests_without_test_case_get_synthetic_id() {
        let ex = extract(
            "tests/test_tp.cpp",
            indoc! {"
                /// @tests REQ_TP_001
                TEST(TpTest, Segments) {}
            "},
        );
        assert_eq!(ex.test_cases[0].id, "TC_test_tp_1");
    }

    #[test]
    fn rust_doc_comment_run_is_one_block() {
        let ex = extract(
            "src/codec.rs",
            indoc! {"
                /// Encodes a header.
                ///
                /// @implements REQ_SER_001
                /// @brief header codec
                pub fn encode_header(buf: &mut Vec<u8>) {}
            "},
        );
        assert_eq!(ex.code_refs.len(), 1);
        assert_eq!(ex.code_refs[0].location.line, 1);
        assert_eq!(ex.code_refs[0].function_name.as_deref(), Some("encode_header"));
        assert_eq!(ex.code_refs[0].description, "header codec");
    }

    #[test]
    fn python_docstring_yields_test_case() {
        let ex = extract(
            "tests/integration/test_e2e_integration.py",
            indoc! {r#"
                import pytest

                def test_round_trip():
                    """Round trip through the E2E layer.

                    @tests REQ_E2E_PLUGIN_001
                    @tests feat_req_someip_100
                    """
                    assert True
            "#},
        );
        assert_eq!(ex.test_cases.len(), 1);
        let tc = &ex.test_cases[0];
        assert_eq!(tc.id, "TC_test_e2e_integration_4");
        assert_eq!(tc.test_name.as_deref(), Some("test_round_trip"));
        assert_eq!(tc.description, "Round trip through the E2E layer.");
        assert_eq!(tc.tests, vec!["REQ_E2E_PLUGIN_001", "feat_req_someip_100"]);
        assert!(ex.code_refs.is_empty());
    }

    #[test]
    fn python_description_skips_tag_first_line() {
        let ex = extract(
            "tests/test_x.py",
            indoc! {r#"
                def test_x():
                    '''@test_case TC_X_1
                    @tests REQ_X_1
                    '''
            "#},
        );
        assert_eq!(ex.test_cases[0].id, "TC_X_1");
        assert_eq!(ex.test_cases[0].description, "");
    }

    #[test]
    fn tags_sharing_a_line_are_all_read() {
        let ex = extract(
            "tests/test_x.cpp",
            indoc! {"
                /** @test_case TC_X_1 @tests REQ_X_1 */
                TEST(X, One) {}
            "},
        );
        assert_eq!(ex.test_cases.len(), 1);
        assert_eq!(ex.test_cases[0].id, "TC_X_1");
        assert_eq!(ex.test_cases[0].tests, vec!["REQ_X_1"]);
    }

    #[test]
    fn brief_ends_at_next_tag() {
        let ex = extract(
            "src/message.cpp",
            indoc! {"
                /** @brief Writes header @implements REQ_MSG_001 */
                void write_header() {}
            "},
        );
        assert_eq!(ex.code_refs.len(), 1);
        let r = &ex.code_refs[0];
        assert_eq!(r.implements, vec!["REQ_MSG_001"]);
        assert_eq!(r.description, "Writes header");
        assert_eq!(r.function_name.as_deref(), Some("write_header"));
    }

    #[test]
    fn python_tags_sharing_a_line_are_all_read() {
        let ex = extract(
            "tests/test_py.py",
            indoc! {r#"
                def test_py():
                    """@brief Checks both @test_case TC_PY_1 @tests REQ_PY_1, feat_req_py_2"""
            "#},
        );
        assert_eq!(ex.test_cases.len(), 1);
        let tc = &ex.test_cases[0];
        assert_eq!(tc.id, "TC_PY_1");
        assert_eq!(tc.description, "Checks both");
        assert_eq!(tc.tests, vec!["REQ_PY_1", "feat_req_py_2"]);
    }

    #[test]
    fn control_statements_are_not_declarations() {
        let ex = extract(
            "src/sender.cpp",
            indoc! {"
                /** @implements REQ_TP_010 */
                else if (ready) {
                    return encode(buf);
                }
                bool Sender::flush_pending() {}
            "},
        );
        assert_eq!(ex.code_refs[0].function_name.as_deref(), Some("flush_pending"));
        assert!(is_control_flow("while (x)"));
        assert!(!is_control_flow("bool Sender::flush_pending()"));
    }

    #[test]
    fn python_implements_alone_is_ignored() {
        let ex = extract(
            "tests/test_y.py",
            indoc! {r#"
                def helper():
                    """@implements REQ_Y_1"""
            "#},
        );
        assert!(ex.is_empty());
    }

    #[test]
    fn duplicate_requirements_keep_first() {
        let mut ex = Extraction::new();
        extract_from_content(
            Path::new("docs/a.rst"),
            ".. requirement:: First\n   :id: REQ_A_1\n",
            &mut ex,
        );
        extract_from_content(
            Path::new("docs/b.rst"),
            ".. requirement:: Second\n   :id: req_a_1\n",
            &mut ex,
        );
        ex.finish();
        assert_eq!(ex.requirements.len(), 1);
        assert_eq!(ex.requirements[0].title, "First");
        assert_eq!(ex.diagnostics.count(DiagnosticKind::DuplicateRequirement), 1);
    }

    #[test]
    fn satisfies_map_is_keyed_by_requirement() {
        let ex = extract(
            "docs/r.rst",
            ".. requirement:: R\n   :id: REQ_A_1\n   :satisfies: feat_req_a, feat_req_b\n",
        );
        let map = ex.satisfies_map();
        assert_eq!(map["REQ_A_1"], vec!["feat_req_a", "feat_req_b"]);
    }
}
