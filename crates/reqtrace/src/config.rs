//! Configuration schema for reqtrace
//!
//! Config lives at `reqtrace.yaml` in the project root. Every key is
//! optional; a missing file means all defaults.

use eyre::{Result, WrapErr};
use reqtrace_core::{ClassificationTable, PatternCatalog, TestLevelRules};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up in the project root
pub const CONFIG_FILE: &str = "reqtrace.yaml";

/// Root configuration for reqtrace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display name; defaults to the root directory name
    pub project: Option<String>,

    /// Where `requirement` directives live
    pub requirements_dir: PathBuf,

    /// Where upstream spec clause directives live
    pub spec_dir: PathBuf,

    /// Source roots scanned for `@implements`
    pub src_dirs: Vec<PathBuf>,

    /// Test roots scanned for `@tests`
    pub test_dirs: Vec<PathBuf>,

    /// Glob patterns to skip, relative to the project root
    pub exclude: Vec<String>,

    /// Needs document written by `extract`
    pub code_refs: PathBuf,

    /// Where `matrix` writes its files
    pub output_dir: PathBuf,

    /// Category rules, priority policies and exemptions. Each of `rules`,
    /// `priorities` and `exempt` that is given replaces the built-in list
    /// as a whole: a table that only adds `REQ_NET_` also drops the
    /// `REQ_MSG_` / `REQ_SER_` / `REQ_TP_` rules and their priority bands,
    /// so copy the ones still wanted.
    pub classification: ClassificationTable,

    pub test_levels: TestLevelRules,

    /// Inline fuzzy-match catalog
    pub patterns: PatternCatalog,

    /// Extra catalog file (YAML or JSON), merged over `patterns`
    pub patterns_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: None,
            requirements_dir: PathBuf::from("docs/requirements"),
            spec_dir: PathBuf::from("docs/spec"),
            src_dirs: vec![PathBuf::from("src"), PathBuf::from("include")],
            test_dirs: vec![PathBuf::from("tests")],
            exclude: Vec::new(),
            code_refs: PathBuf::from("build/code_references.json"),
            output_dir: PathBuf::from("build/docs/traceability"),
            classification: ClassificationTable::default(),
            test_levels: TestLevelRules::default(),
            patterns: PatternCatalog::new(),
            patterns_file: None,
        }
    }
}

/// Walk up from `start` to the first directory holding a config file or a
/// `.git` directory. Falls back to `start`.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_FILE).exists() || current.join(".git").exists() {
            return current;
        }

        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        eyre::bail!(
            "Config file not found at {}\n\n\
             Create a config file, for example:\n\n\
             project: my-project\n\
             requirements_dir: docs/requirements\n\
             src_dirs: [src, include]",
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = serde_yaml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Load config if it exists, otherwise return the default config.
/// A config file that exists but does not parse is still an error.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    load_config(path)
}

/// Load a fuzzy-match catalog. `.json` files are read as JSON, anything
/// else as YAML.
pub fn load_patterns(path: &Path) -> Result<PatternCatalog> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read patterns file: {}", path.display()))?;

    let catalog = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse patterns file: {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse patterns file: {}", path.display()))?
    };

    Ok(catalog)
}
