//! Heuristic search for unannotated implementations
//!
//! For requirements no code reference claims, look for textual evidence that
//! an implementation exists anyway. Evidence comes from a curated per-id
//! catalog ([`PatternLookup`]) plus patterns derived from the requirement
//! title. This never claims correctness, only that matching text exists.

use crate::classify::{Category, ClassificationTable, Priority};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::gaps::percent;
use crate::ids::normalize_req_id;
use crate::link::{TraceGraph, TracedRequirement};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Matched text is cut to this many characters.
pub const MATCHED_TEXT_LIMIT: usize = 100;

/// Curated evidence for one requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementPattern {
    /// Regex fragments, matched case-insensitively per line
    pub patterns: Vec<String>,
    /// Literal substrings
    pub values: Vec<String>,
    /// File-name fragments where an implementation is expected
    pub files: Vec<String>,
}

/// Where the matcher gets curated patterns from.
pub trait PatternLookup {
    fn lookup(&self, id: &str) -> Option<&RequirementPattern>;
}

/// A [`PatternLookup`] backed by a map, loadable from YAML or JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternCatalog(BTreeMap<String, RequirementPattern>);

impl PatternCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, pattern: RequirementPattern) {
        self.0.insert(normalize_req_id(id), pattern);
    }

    pub fn with(mut self, id: &str, pattern: RequirementPattern) -> Self {
        self.insert(id, pattern);
        self
    }

    /// Entries of `other` replace entries with the same id.
    pub fn merge(&mut self, other: PatternCatalog) {
        for (id, pattern) in other.0 {
            self.insert(&id, pattern);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PatternLookup for PatternCatalog {
    fn lookup(&self, id: &str) -> Option<&RequirementPattern> {
        // Keys from deserialization may not be normalized yet
        self.0
            .get(id)
            .or_else(|| self.0.iter().find(|(k, _)| normalize_req_id(k) == id).map(|(_, v)| v))
    }
}

/// One file's lines.
#[derive(Debug, Clone)]
struct IndexedFile {
    path: PathBuf,
    name: String,
    lines: Vec<String>,
}

/// The source files the matcher searches, read once.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    files: Vec<IndexedFile>,
}

impl SourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; `path` is what hits will report.
    pub fn add(mut self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.insert(path.into(), content);
        self
    }

    fn insert(&mut self, path: PathBuf, content: &str) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lines = content.lines().map(str::to_string).collect();
        let at = self.files.partition_point(|f| f.path < path);
        self.files.insert(at, IndexedFile { path, name, lines });
    }

    /// Index every file a walker yields.
    #[cfg(feature = "walk")]
    pub fn from_walk(walk: &crate::sources::WalkSources) -> eyre::Result<Self> {
        let mut index = SourceIndex::new();
        for (path, content) in walk.read_all()? {
            index.insert(path, &content);
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    /// Explicit annotation; never produced by the matcher
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Pattern,
    Value,
}

/// One line of textual evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceHit {
    pub file: PathBuf,
    pub line: usize,
    pub kind: MatchKind,
    pub matched_text: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationStatus {
    /// A code reference implements it
    Annotated,
    /// Medium-or-better evidence exists but no annotation
    MissingAnnotation,
    /// Only low evidence or none at all
    TrulyMissing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementVerification {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub priority: Priority,
    pub status: VerificationStatus,
    pub hits: Vec<EvidenceHit>,
}

/// Outcome of verifying every requirement of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuzzyReport {
    pub total: usize,
    pub annotated: Vec<String>,
    pub missing_annotation: Vec<RequirementVerification>,
    pub truly_missing: Vec<RequirementVerification>,
    pub diagnostics: Diagnostics,
}

impl FuzzyReport {
    /// Annotated plus evidently implemented, as a percentage of all.
    pub fn effective_implementation_rate(&self) -> f64 {
        percent(self.annotated.len() + self.missing_annotation.len(), self.total)
    }

    /// Truly missing requirements outside the exempt categories.
    pub fn critical_gaps<'a>(
        &'a self,
        table: &'a ClassificationTable,
    ) -> impl Iterator<Item = &'a RequirementVerification> + 'a {
        self.truly_missing
            .iter()
            .filter(|v| !table.is_exempt(&v.category))
    }
}

/// Search terms derived from a title: `snake_case` and `ConcatenatedWords`.
pub fn title_patterns(title: &str) -> Vec<String> {
    let title = title.trim();
    if title.is_empty() {
        return Vec::new();
    }
    let snake: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let concatenated = title.replace(' ', "");
    vec![regex::escape(&snake), regex::escape(&concatenated)]
}

fn truncate(text: &str) -> String {
    text.trim().chars().take(MATCHED_TEXT_LIMIT).collect()
}

pub struct FuzzyMatcher<'a, L: PatternLookup + ?Sized> {
    lookup: &'a L,
    index: &'a SourceIndex,
}

impl<'a, L: PatternLookup + ?Sized> FuzzyMatcher<'a, L> {
    pub fn new(lookup: &'a L, index: &'a SourceIndex) -> Self {
        Self { lookup, index }
    }

    fn compile(
        &self,
        id: &str,
        fragments: &[String],
        diagnostics: &mut Diagnostics,
    ) -> Vec<Regex> {
        fragments
            .iter()
            .filter_map(|fragment| {
                match RegexBuilder::new(fragment).case_insensitive(true).build() {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticKind::InvalidPattern,
                                id,
                                format!("Pattern for {id} is not a valid regex: {e}"),
                            )
                            .with_target(fragment.as_str()),
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Textual evidence for one requirement, deduplicated on (file, line).
    pub fn search(&self, req: &TracedRequirement, diagnostics: &mut Diagnostics) -> Vec<EvidenceHit> {
        let id = req.id();
        let curated = self.lookup.lookup(id);

        let mut fragments: Vec<String> = curated.map(|p| p.patterns.clone()).unwrap_or_default();
        fragments.extend(title_patterns(&req.requirement.title));
        let values: &[String] = curated.map(|p| p.values.as_slice()).unwrap_or(&[]);

        let mut hints: Vec<String> = curated.map(|p| p.files.clone()).unwrap_or_default();
        if let Some(location) = &req.requirement.code_location {
            if let Some(name) = Path::new(location).file_name() {
                hints.push(name.to_string_lossy().into_owned());
            }
        }

        let regexes = self.compile(id, &fragments, diagnostics);

        let mut seen: HashSet<(&Path, usize)> = HashSet::new();
        let mut hits = Vec::new();
        let targets = self
            .index
            .files
            .iter()
            .filter(|f| hints.is_empty() || hints.iter().any(|h| f.name.contains(h.as_str())));

        for file in targets {
            let mut record = |line_idx: usize, kind: MatchKind, confidence: Confidence| {
                if seen.insert((file.path.as_path(), line_idx + 1)) {
                    hits.push(EvidenceHit {
                        file: file.path.clone(),
                        line: line_idx + 1,
                        kind,
                        matched_text: truncate(&file.lines[line_idx]),
                        confidence,
                    });
                }
            };

            for regex in &regexes {
                for (i, line) in file.lines.iter().enumerate() {
                    if regex.is_match(line) {
                        record(i, MatchKind::Pattern, Confidence::Medium);
                    }
                }
            }
            for value in values {
                for (i, line) in file.lines.iter().enumerate() {
                    if line.contains(value.as_str()) {
                        record(i, MatchKind::Value, Confidence::Low);
                    }
                }
            }
        }

        hits
    }

    /// Verify every requirement of `graph`.
    pub fn verify(&self, graph: &TraceGraph) -> FuzzyReport {
        let mut report = FuzzyReport {
            total: graph.requirements.len(),
            ..FuzzyReport::default()
        };

        for req in &graph.requirements {
            if req.has_code() {
                report.annotated.push(req.id().to_string());
                continue;
            }

            let hits = self.search(req, &mut report.diagnostics);
            let status = if hits.iter().any(|h| h.confidence >= Confidence::Medium) {
                VerificationStatus::MissingAnnotation
            } else {
                VerificationStatus::TrulyMissing
            };
            debug!(id = req.id(), hits = hits.len(), ?status, "verified requirement");

            let verification = RequirementVerification {
                id: req.id().to_string(),
                title: req.requirement.title.clone(),
                category: req.category.clone(),
                priority: req.priority,
                status,
                hits,
            };
            match status {
                VerificationStatus::MissingAnnotation => report.missing_annotation.push(verification),
                _ => report.truly_missing.push(verification),
            }
        }

        report.diagnostics.sort();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationTable;
    use crate::sources::{MemorySources, Sources};
    use indoc::indoc;

    fn graph(rst: &str) -> TraceGraph {
        let extraction = MemorySources::new()
            .add("docs/requirements/tp.rst", rst)
            .add("src/tp/annotated.cpp", "/** @implements REQ_TP_001 */\nvoid a() {}\n")
            .extract()
            .unwrap();
        TraceGraph::link(extraction, &ClassificationTable::default())
    }

    fn index() -> SourceIndex {
        SourceIndex::new()
            .add(
                "src/tp/tp_segmenter.cpp",
                indoc! {"
                    static constexpr size_t MAX_SEGMENT_PAYLOAD = 1392;
                    // 87 * 16 bytes
                    size_t align(size_t n) { return n % 16; }
                "},
            )
            .add(
                "src/someip/message.cpp",
                "uint32_t Message::get_message_id() const { return 1392; }\n",
            )
    }

    fn catalog() -> PatternCatalog {
        PatternCatalog::new()
            .with(
                "REQ_TP_002",
                RequirementPattern {
                    patterns: vec![r"max_segment.*1392".into()],
                    values: vec!["1392".into(), "87 * 16".into()],
                    files: vec!["tp_segmenter".into()],
                },
            )
            .with(
                "REQ_TP_003",
                RequirementPattern {
                    patterns: vec!["(unclosed".into()],
                    values: vec!["16".into()],
                    files: vec!["tp_segmenter.cpp".into()],
                },
            )
    }

    #[test]
    fn pattern_hits_are_medium_and_dedupe_value_hits() {
        let g = graph(indoc! {"
            .. requirement:: Max Segment Payload Size
               :id: REQ_TP_002
        "});
        let index = index();
        let catalog = catalog();
        let matcher = FuzzyMatcher::new(&catalog, &index);
        let mut diags = Diagnostics::new();
        let hits = matcher.search(g.requirement("REQ_TP_002").unwrap(), &mut diags);

        // Line 1 matches both the pattern and "1392"; it is kept once, as a pattern hit
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].line, 1);
        assert_eq!(hits[0].kind, MatchKind::Pattern);
        assert_eq!(hits[0].confidence, Confidence::Medium);
        assert_eq!(hits[1].line, 2);
        assert_eq!(hits[1].confidence, Confidence::Low);
        // message.cpp also contains 1392 but is not a hinted file
        assert!(hits.iter().all(|h| h.file.ends_with("tp_segmenter.cpp")));
        assert!(diags.is_empty());
    }

    #[test]
    fn invalid_pattern_is_reported_and_skipped() {
        let g = graph(indoc! {"
            .. requirement:: Segment Alignment
               :id: REQ_TP_003
        "});
        let index = index();
        let catalog = catalog();
        let report = FuzzyMatcher::new(&catalog, &index).verify(&g);

        assert_eq!(report.diagnostics.count(DiagnosticKind::InvalidPattern), 1);
        // Only "16" value hits remain, so it is truly missing
        assert_eq!(report.truly_missing.len(), 1);
        assert_eq!(report.truly_missing[0].id, "REQ_TP_003");
        assert!(
            report.truly_missing[0]
                .hits
                .iter()
                .all(|h| h.confidence == Confidence::Low)
        );
    }

    #[test]
    fn title_fallback_searches_all_files() {
        let g = graph(indoc! {"
            .. requirement:: Get Message Id
               :id: REQ_MSG_011
        "});
        let index = index();
        let catalog = PatternCatalog::new();
        let report = FuzzyMatcher::new(&catalog, &index).verify(&g);

        assert_eq!(report.missing_annotation.len(), 1);
        let v = &report.missing_annotation[0];
        assert_eq!(v.status, VerificationStatus::MissingAnnotation);
        assert_eq!(v.hits[0].file, PathBuf::from("src/someip/message.cpp"));
        assert_eq!(v.hits[0].kind, MatchKind::Pattern);
    }

    #[test]
    fn annotated_requirements_bypass_matching() {
        let g = graph(indoc! {"
            .. requirement:: Annotated
               :id: REQ_TP_001

            .. requirement:: Nothing Like This Anywhere
               :id: REQ_TP_099
        "});
        let index = index();
        let catalog = catalog();
        let report = FuzzyMatcher::new(&catalog, &index).verify(&g);

        assert_eq!(report.annotated, vec!["REQ_TP_001"]);
        assert_eq!(report.truly_missing.len(), 1);
        assert!(report.truly_missing[0].hits.is_empty());
        assert_eq!(report.effective_implementation_rate(), 50.0);
    }

    #[test]
    fn code_location_hint_narrows_files() {
        let g = graph(indoc! {"
            .. requirement:: Message Id
               :id: REQ_MSG_012

               **Code Location**: ``src/someip/message.cpp``
        "});
        let index = index().add("src/other.cpp", "int message_id = 0;\n");
        let catalog = PatternCatalog::new();
        let report = FuzzyMatcher::new(&catalog, &index).verify(&g);
        let v = &report.missing_annotation[0];
        assert!(v.hits.iter().all(|h| h.file.ends_with("message.cpp")));
    }

    #[test]
    fn critical_gaps_skip_exempt_categories() {
        let g = graph(indoc! {"
            .. requirement:: Zzz Unfindable One
               :id: REQ_TP_098

            .. requirement:: Zzz Unfindable Two
               :id: REQ_ARCH_098
        "});
        let index = index();
        let catalog = PatternCatalog::new();
        let report = FuzzyMatcher::new(&catalog, &index).verify(&g);
        assert_eq!(report.truly_missing.len(), 2);

        let table = ClassificationTable::default();
        let gaps: Vec<_> = report.critical_gaps(&table).map(|v| v.id.as_str()).collect();
        assert_eq!(gaps, vec!["REQ_TP_098"]);
    }

    #[test]
    fn title_patterns_are_escaped() {
        assert_eq!(
            title_patterns("Bool (uint8) Serialization"),
            vec![
                r"bool__uint8__serialization".to_string(),
                r"Bool\(uint8\)Serialization".to_string()
            ]
        );
        assert!(title_patterns("  ").is_empty());
    }

    #[test]
    fn matched_text_is_truncated() {
        let long = format!("   {}   ", "x".repeat(150));
        assert_eq!(truncate(&long).len(), MATCHED_TEXT_LIMIT);
    }

    #[test]
    fn catalog_loads_from_json() {
        let catalog: PatternCatalog = serde_json::from_str(
            r#"{"req_sd_001": {"patterns": ["SDMessage"], "files": ["sd_message"]}}"#,
        )
        .unwrap();
        let entry = catalog.lookup("REQ_SD_001").unwrap();
        assert_eq!(entry.patterns, vec!["SDMessage"]);
        assert!(entry.values.is_empty());
    }
}
