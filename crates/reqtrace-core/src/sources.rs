//! Source providers for extraction

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::extract::{Extraction, FileKind, extract_from_content};
use eyre::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Trait for providing files to extract records from
pub trait Sources {
    /// Extract records from all sources
    fn extract(self) -> Result<Extraction>;
}

/// Read one file and extract from it, recording a diagnostic instead of
/// failing when it cannot be read. `display` is the path records carry.
fn extract_file(path: &Path, display: &Path) -> Extraction {
    let mut out = Extraction::new();
    match std::fs::read(path) {
        Ok(bytes) => {
            let content = String::from_utf8_lossy(&bytes);
            extract_from_content(display, &content, &mut out);
        }
        Err(e) => {
            warn!("skipping unreadable file {}: {e}", path.display());
            out.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::UnreadableFile,
                    display.display().to_string(),
                    format!("Failed to read {}: {e}", display.display()),
                )
                .with_target(path.display().to_string()),
            );
        }
    }
    out
}

/// Sources from an explicit list of file paths
pub struct PathSources(Vec<PathBuf>);

impl PathSources {
    /// Create from an iterator of paths
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self(paths.into_iter().map(Into::into).collect())
    }
}

impl Sources for PathSources {
    fn extract(self) -> Result<Extraction> {
        #[cfg(feature = "parallel")]
        let mut extraction = {
            use rayon::prelude::*;

            self.0
                .par_iter()
                .map(|path| extract_file(path, path))
                .reduce(Extraction::new, |mut acc, file| {
                    acc.extend(file);
                    acc
                })
        };

        #[cfg(not(feature = "parallel"))]
        let mut extraction = {
            let mut acc = Extraction::new();
            for path in &self.0 {
                acc.extend(extract_file(path, path));
            }
            acc
        };

        extraction.finish();
        Ok(extraction)
    }
}

/// In-memory sources (useful for testing)
pub struct MemorySources(Vec<(PathBuf, String)>);

impl MemorySources {
    /// Create empty memory sources
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a file with content
    pub fn add(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.0.push((path.into(), content.into()));
        self
    }
}

impl Default for MemorySources {
    fn default() -> Self {
        Self::new()
    }
}

impl Sources for MemorySources {
    fn extract(self) -> Result<Extraction> {
        let mut extraction = Extraction::new();
        for (path, content) in self.0 {
            extract_from_content(&path, &content, &mut extraction);
        }
        extraction.finish();
        Ok(extraction)
    }
}

/// Gitignore-aware directory walker.
///
/// Walks the given directories under `root` (or `root` itself when none are
/// given). Records carry paths relative to `root`.
#[cfg(feature = "walk")]
pub struct WalkSources {
    root: PathBuf,
    dirs: Vec<PathBuf>,
    include: Vec<String>,
    exclude: Vec<String>,
    kinds: Vec<FileKind>,
}

#[cfg(feature = "walk")]
impl WalkSources {
    /// Create a walker for the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirs: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            kinds: Vec::new(),
        }
    }

    /// Walk these directories (relative to the root) instead of the whole root
    pub fn dirs(mut self, dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Add include patterns (e.g., `["src/**/*.cpp"]`)
    pub fn include(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add exclude patterns (e.g., `["build/**"]`)
    pub fn exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Only scan files of these kinds (all supported kinds when empty)
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = FileKind>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    /// The directories that will actually be walked. Missing ones are logged
    /// and skipped.
    fn existing_roots(&self) -> Vec<PathBuf> {
        if self.dirs.is_empty() {
            return vec![self.root.clone()];
        }
        let mut roots = Vec::new();
        for dir in &self.dirs {
            let path = self.root.join(dir);
            if path.is_dir() {
                roots.push(path);
            } else {
                info!("directory not found, skipping: {}", path.display());
            }
        }
        roots
    }
}

#[cfg(feature = "walk")]
fn build_globset(patterns: &[String]) -> Result<Option<globset::GlobSet>> {
    use eyre::WrapErr;

    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::Glob::new(&pattern.replace('\\', "/"))
            .wrap_err_with(|| format!("Invalid glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}

#[cfg(feature = "walk")]
impl WalkSources {
    /// Visit every matching file in parallel with its absolute and
    /// root-relative paths.
    pub fn walk<F>(&self, visit: F) -> Result<()>
    where
        F: Fn(&Path, &Path) + Sync,
    {
        use ignore::WalkBuilder;

        let include = build_globset(&self.include)?;
        let exclude = build_globset(&self.exclude)?;

        let roots = self.existing_roots();
        let Some((first, rest)) = roots.split_first() else {
            return Ok(());
        };

        let mut builder = WalkBuilder::new(first);
        for root in rest {
            builder.add(root);
        }
        let walker = builder
            .follow_links(true)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            // Honor ignore files even outside a git checkout
            .require_git(false)
            .build_parallel();

        let root = self.root.as_path();
        let kinds = self.kinds.as_slice();
        let visit = &visit;

        walker.run(|| {
            let include = include.as_ref();
            let exclude = exclude.as_ref();

            Box::new(move |entry| {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        debug!("walk error: {e}");
                        return ignore::WalkState::Continue;
                    }
                };
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    return ignore::WalkState::Continue;
                }

                let path = entry.path();
                let Some(kind) = FileKind::from_path(path) else {
                    return ignore::WalkState::Continue;
                };
                if !kinds.is_empty() && !kinds.contains(&kind) {
                    return ignore::WalkState::Continue;
                }

                let relative = path.strip_prefix(root).unwrap_or(path);
                let relative_str = relative.to_string_lossy().replace('\\', "/");
                if include.is_some_and(|set| !set.is_match(&relative_str)) {
                    return ignore::WalkState::Continue;
                }
                if exclude.is_some_and(|set| set.is_match(&relative_str)) {
                    debug!("excluded {relative_str}");
                    return ignore::WalkState::Continue;
                }

                visit(path, relative);
                ignore::WalkState::Continue
            })
        });

        Ok(())
    }

    /// Read every matching file, sorted by relative path. Unreadable files are
    /// logged and skipped.
    pub fn read_all(&self) -> Result<Vec<(PathBuf, String)>> {
        use std::sync::{Mutex, PoisonError};

        let files = Mutex::new(Vec::new());
        self.walk(|path, relative| match std::fs::read(path) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes).into_owned();
                files
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((relative.to_path_buf(), content));
            }
            Err(e) => warn!("skipping unreadable file {}: {e}", path.display()),
        })?;

        let mut files = files.into_inner().unwrap_or_else(PoisonError::into_inner);
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

#[cfg(feature = "walk")]
impl Sources for WalkSources {
    fn extract(self) -> Result<Extraction> {
        use std::sync::{Mutex, PoisonError};

        let merged = Mutex::new(Extraction::new());
        self.walk(|path, relative| {
            let file = extract_file(path, relative);
            merged
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(file);
        })?;

        let mut extraction = merged.into_inner().unwrap_or_else(PoisonError::into_inner);
        extraction.finish();
        debug!(
            requirements = extraction.requirements.len(),
            code_refs = extraction.code_refs.len(),
            test_cases = extraction.test_cases.len(),
            "walk complete"
        );
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn memory_sources_merge_and_sort() {
        let extraction = MemorySources::new()
            .add(
                "tests/test_b.cpp",
                "/** @test_case TC_B_1\n @tests REQ_MSG_001 */\nTEST(B, One) {}\n",
            )
            .add(
                "src/a.cpp",
                "/** @implements REQ_MSG_001 */\nvoid a() {}\n",
            )
            .add(
                "docs/requirements/msg.rst",
                ".. requirement:: Header\n   :id: REQ_MSG_001\n",
            )
            .add("README.md", "/** @implements REQ_MSG_002 */")
            .extract()
            .unwrap();

        assert_eq!(extraction.requirements.len(), 1);
        assert_eq!(extraction.code_refs.len(), 1);
        assert_eq!(extraction.code_refs[0].id, "CODE_a_1");
        assert_eq!(extraction.test_cases.len(), 1);
    }

    #[test]
    fn path_sources_report_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.cpp");
        std::fs::write(&good, "/// @implements REQ_SER_001\nvoid s() {}\n").unwrap();
        let missing = dir.path().join("missing.cpp");

        let extraction = PathSources::new([good, missing]).extract().unwrap();
        assert_eq!(extraction.code_refs.len(), 1);
        assert_eq!(
            extraction.diagnostics.count(DiagnosticKind::UnreadableFile),
            1
        );
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("latin1.cpp");
        let mut bytes = b"// caf\xe9\n".to_vec();
        bytes.extend_from_slice(b"/** @implements REQ_MSG_007 */\nvoid f() {}\n");
        std::fs::write(&file, bytes).unwrap();

        let extraction = PathSources::new([file]).extract().unwrap();
        assert_eq!(extraction.code_refs.len(), 1);
        assert_eq!(extraction.code_refs[0].location.line, 2);
        assert!(extraction.diagnostics.is_empty());
    }

    #[cfg(feature = "walk")]
    #[test]
    fn walk_sources_respect_dirs_and_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/gen")).unwrap();
        std::fs::create_dir_all(root.join("other")).unwrap();
        std::fs::write(
            root.join("src/msg.cpp"),
            indoc! {"
                /** @implements REQ_MSG_001 */
                void build() {}
            "},
        )
        .unwrap();
        std::fs::write(
            root.join("src/gen/skip.cpp"),
            "/** @implements REQ_MSG_002 */\nvoid g() {}\n",
        )
        .unwrap();
        std::fs::write(
            root.join("other/elsewhere.cpp"),
            "/** @implements REQ_MSG_003 */\nvoid e() {}\n",
        )
        .unwrap();

        let extraction = WalkSources::new(root)
            .dirs(["src", "does-not-exist"])
            .exclude(["src/gen/**"])
            .extract()
            .unwrap();

        assert_eq!(extraction.code_refs.len(), 1);
        let r = &extraction.code_refs[0];
        assert_eq!(r.location.to_string(), "src/msg.cpp:1");
        assert_eq!(r.implements, vec!["REQ_MSG_001"]);
    }

    #[cfg(feature = "walk")]
    #[test]
    fn walk_sources_filter_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(
            root.join("reqs.rst"),
            ".. requirement:: R\n   :id: REQ_A_1\n",
        )
        .unwrap();
        std::fs::write(root.join("a.cpp"), "/** @implements REQ_A_1 */\nvoid a() {}\n").unwrap();

        let extraction = WalkSources::new(root)
            .kinds([FileKind::Directive])
            .extract()
            .unwrap();
        assert_eq!(extraction.requirements.len(), 1);
        assert!(extraction.code_refs.is_empty());
    }

    #[cfg(feature = "walk")]
    #[test]
    fn walk_with_no_existing_dirs_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let extraction = WalkSources::new(dir.path())
            .dirs(["nope"])
            .extract()
            .unwrap();
        assert!(extraction.is_empty());
    }
}
