//! reqtrace library - Trace requirements through specs, code and tests
//!
//! This library exposes the project pipeline behind the `reqtrace` binary for
//! testing and embedding purposes: load config, scan the tree, link, analyze.

pub mod config;
pub mod output;
pub mod validate;

use config::{CONFIG_FILE, Config, load_config, load_config_or_default, load_patterns};
use eyre::Result;
use reqtrace_core::{
    Extraction, FileKind, GapAnalysis, NeedsDocument, PatternCatalog, SourceIndex, Sources,
    TraceGraph, WalkSources,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source kinds that carry `@implements` / `@tests` annotations
const SOURCE_KINDS: [FileKind; 3] = [FileKind::CFamily, FileKind::Rust, FileKind::Python];

/// A linked graph and its gap analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub graph: TraceGraph,
    pub gaps: GapAnalysis,
}

/// A project root and the config that applies to it.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
}

/// Drop directories nested inside another one in the list, so no file is
/// walked twice.
fn distinct_dirs(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if dirs.iter().any(|other| other != dir && dir.starts_with(other)) {
            continue;
        }
        if !out.contains(dir) {
            out.push(dir.clone());
        }
    }
    out
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Open the project at `root`. An explicit `config_path` must exist; the
    /// default `reqtrace.yaml` may be absent.
    pub fn open(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => load_config(path)?,
            None => load_config_or_default(&root.join(CONFIG_FILE))?,
        };
        Ok(Self::new(root, config))
    }

    /// Configured name, or the root directory name.
    pub fn name(&self) -> String {
        if let Some(name) = &self.config.project {
            return name.clone();
        }
        self.root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }

    /// `path` resolved against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn has_requirements_dir(&self) -> bool {
        self.resolve(&self.config.requirements_dir).is_dir()
    }

    /// Walker over the requirement and spec documents.
    pub fn document_walk(&self) -> WalkSources {
        let dirs = distinct_dirs(&[
            self.config.requirements_dir.clone(),
            self.config.spec_dir.clone(),
        ]);
        WalkSources::new(&self.root)
            .dirs(dirs)
            .exclude(self.config.exclude.iter().cloned())
            .kinds([FileKind::Directive])
    }

    /// Walker over source and test roots.
    pub fn source_walk(&self) -> WalkSources {
        let mut dirs = self.config.src_dirs.clone();
        dirs.extend(self.config.test_dirs.iter().cloned());
        WalkSources::new(&self.root)
            .dirs(distinct_dirs(&dirs))
            .exclude(self.config.exclude.iter().cloned())
            .kinds(SOURCE_KINDS)
    }

    /// Scan documents, then take code references and test cases either from
    /// the source tree or from a previously written needs document.
    pub fn extract(&self, code_refs: Option<&Path>) -> Result<Extraction> {
        let mut extraction = self.document_walk().extract()?;

        let annotations = match code_refs {
            Some(path) => {
                let path = self.resolve(path);
                info!("loading code references from {}", path.display());
                NeedsDocument::load(&path)?.into_extraction()
            }
            None => self.source_walk().extract()?,
        };
        extraction.extend(annotations);
        extraction.finish();

        debug!(
            requirements = extraction.requirements.len(),
            spec_clauses = extraction.spec_clauses.len(),
            code_refs = extraction.code_refs.len(),
            test_cases = extraction.test_cases.len(),
            "extraction complete"
        );
        Ok(extraction)
    }

    pub fn link(&self, extraction: Extraction) -> TraceGraph {
        TraceGraph::link(extraction, &self.config.classification)
    }

    pub fn analyze(&self, code_refs: Option<&Path>) -> Result<Analysis> {
        let graph = self.link(self.extract(code_refs)?);
        let gaps = GapAnalysis::analyze(
            &graph,
            &self.config.classification,
            &self.config.test_levels,
        );
        Ok(Analysis { graph, gaps })
    }

    /// The inline catalog with `patterns_file` merged over it.
    pub fn patterns(&self) -> Result<PatternCatalog> {
        let mut catalog = self.config.patterns.clone();
        if let Some(file) = &self.config.patterns_file {
            catalog.merge(load_patterns(&self.resolve(file))?);
        }
        Ok(catalog)
    }

    /// Every source file under the source roots, for fuzzy matching.
    pub fn source_index(&self) -> Result<SourceIndex> {
        let walk = WalkSources::new(&self.root)
            .dirs(distinct_dirs(&self.config.src_dirs))
            .exclude(self.config.exclude.iter().cloned())
            .kinds(SOURCE_KINDS);
        SourceIndex::from_walk(&walk)
    }

    /// The needs document for the code references and test cases of `graph`.
    pub fn needs_document(&self, graph: &TraceGraph) -> NeedsDocument {
        NeedsDocument::from_records(self.name(), &graph.code_refs, &graph.test_cases, &self.root)
    }
}
