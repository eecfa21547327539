//! reqtrace-core - Core library for requirements traceability
//!
//! This crate provides the building blocks for:
//! - Extracting requirements and spec clauses from `.rst` directive documents
//! - Extracting code references and test cases from annotated comments
//! - Linking them into a [`TraceGraph`] and reporting dangling links
//! - Classifying requirements and computing a [`GapAnalysis`]
//! - Looking for unannotated implementations with a [`FuzzyMatcher`]
//!
//! # Features
//!
//! - `walk` - Enable [`WalkSources`] for gitignore-aware directory walking (brings in `ignore`)
//! - `parallel` - Enable parallel extraction (brings in `rayon`)
//!
//! # Annotations
//!
//! Requirements are declared in documentation:
//!
//! ```text
//! .. requirement:: Message header layout
//!    :id: REQ_MSG_001
//!    :satisfies: feat_req_someip_538
//! ```
//!
//! Source and test files point back at them from doc comments:
//!
//! ```text
//! /**
//!  * @implements REQ_MSG_001
//!  * @satisfies feat_req_someip_538
//!  */
//! void serialize_header(Buffer& out);
//! ```
//!
//! # In-Memory Sources (for testing)
//!
//! ```
//! use reqtrace_core::{ClassificationTable, MemorySources, Sources, TraceGraph};
//!
//! let extraction = MemorySources::new()
//!     .add("docs/reqs.rst", ".. requirement:: Header\n   :id: REQ_MSG_001\n")
//!     .add("src/header.cpp", "/** @implements REQ_MSG_001 */\nvoid header() {}\n")
//!     .extract()
//!     .unwrap();
//!
//! let graph = TraceGraph::link(extraction, &ClassificationTable::default());
//! assert!(graph.requirement("REQ_MSG_001").unwrap().has_code());
//! ```

mod classify;
mod diagnostics;
mod diff;
mod directive;
mod extract;
mod fuzzy;
mod gaps;
pub mod ids;
mod link;
mod model;
mod needs;
mod sources;
mod specmap;

pub use classify::{
    Category, CategoryRule, Classification, ClassificationTable, Priority, PriorityBand,
    PriorityRule,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use diff::{ChangedField, FieldChange, ModifiedRequirement, RequirementDiff};
pub use directive::{Directives, SPEC_DIRECTIVES, parse_directives};
pub use extract::{
    DECLARATION_LOOKAHEAD, Extraction, FileKind, SUPPORTED_EXTENSIONS, TEST_LOOKBEHIND,
    extract_from_content, is_supported_extension,
};
pub use fuzzy::{
    Confidence, EvidenceHit, FuzzyMatcher, FuzzyReport, MATCHED_TEXT_LIMIT, MatchKind,
    PatternCatalog, PatternLookup, RequirementPattern, RequirementVerification, SourceIndex,
    VerificationStatus, title_patterns,
};
pub use gaps::{
    CategoryStats, ComplianceLevel, GapAnalysis, PriorityStats, ProjectStage, Recommendation,
    Summary, TestLevel, TestLevelRules, Urgency, percent,
};
pub use link::{TraceGraph, TracedRequirement};
pub use model::{CodeReference, Requirement, SourceLocation, SpecClause, TestCase};
pub use needs::{NEED_CODE_REF, NEED_TEST_CASE, NeedRecord, NeedsDocument};
pub use sources::{MemorySources, PathSources, Sources};
pub use specmap::{FileCoverage, InvalidSpecLink, SpecMapping};

#[cfg(feature = "walk")]
pub use sources::WalkSources;
