//! Test case discovery

use log::debug;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::HarnessError;

/// Reserved prefix every test case file name starts with
pub const CASE_PREFIX: &str = "test-";

/// Separator between a case stem and a baseline label
pub const LABEL_SEPARATOR: char = '_';

/// A single test case, identified by its file name (e.g. `test-a.txt`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestCase {
    name: String,
}

impl TestCase {
    /// Wrap a file name that is already known to match the case pattern
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The identifier used as the join key for outputs and baselines
    pub fn id(&self) -> &str {
        &self.name
    }

    /// The file name without its extension (`test-a` for `test-a.txt`)
    pub fn stem(&self) -> &str {
        Path::new(&self.name).file_stem().and_then(|s| s.to_str()).unwrap_or(&self.name)
    }

    /// Path of the case file inside a working directory
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Naming convention a file must follow to count as a test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasePattern {
    pub prefix: String,
    pub separator: char,
    pub extensions: Vec<String>,
}

impl CasePattern {
    /// Pattern for `test-*.<extension>` files without a separator
    pub fn with_extension(extension: &str) -> Self {
        Self {
            prefix: CASE_PREFIX.to_string(),
            separator: LABEL_SEPARATOR,
            extensions: vec![extension.to_string()],
        }
    }

    /// Check whether a file name is a test case under this pattern
    pub fn matches(&self, file_name: &str) -> bool {
        if !file_name.starts_with(&self.prefix) || file_name.contains(self.separator) {
            return false;
        }

        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|known| known == ext))
            .unwrap_or(false)
    }
}

impl Default for CasePattern {
    fn default() -> Self {
        Self::with_extension("txt")
    }
}

/// Source of file names for discovery
pub trait DirectoryLister {
    /// Names of the regular files in the directory, in any order
    fn list(&self) -> Result<Vec<String>, HarnessError>;
}

/// The working directory all file scans and program invocations happen in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Wrap a directory, resolving a relative path against the current directory
    ///
    /// Programs are spawned as `<root>/<name>` with `<root>` as their current
    /// directory, so the root has to be absolute.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a file name inside the working directory
    pub fn join(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl DirectoryLister for WorkDir {
    fn list(&self) -> Result<Vec<String>, HarnessError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            HarnessError::Execution(format!(
                "Failed to read directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // Non UTF-8 names can never match the ASCII case prefix
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        Ok(names)
    }
}

impl DirectoryLister for [&str] {
    fn list(&self) -> Result<Vec<String>, HarnessError> {
        Ok(self.iter().map(|name| name.to_string()).collect())
    }
}

impl DirectoryLister for Vec<String> {
    fn list(&self) -> Result<Vec<String>, HarnessError> {
        Ok(self.clone())
    }
}

/// Discover the test cases in a directory, sorted and deduplicated
pub fn discover<L>(lister: &L, pattern: &CasePattern) -> Result<Vec<TestCase>, HarnessError>
where
    L: DirectoryLister + ?Sized,
{
    let mut cases: Vec<TestCase> = lister
        .list()?
        .into_iter()
        .filter(|name| pattern.matches(name))
        .map(TestCase::new)
        .collect();

    cases.sort();
    cases.dedup();

    debug!("Discovered {} test cases", cases.len());

    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn ids(cases: &[TestCase]) -> Vec<&str> {
        cases.iter().map(|c| c.id()).collect()
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let listing: &[&str] = &[
            "test-b.txt",
            "Makefile",
            "test-a_old.txt",
            "test-a.txt",
            "test-a_tmp.txt",
            "main.cpp",
            "test-c.cpp",
            "test-d",
        ];

        let cases = discover(listing, &CasePattern::default()).unwrap();
        assert_eq!(ids(&cases), vec!["test-a.txt", "test-b.txt"]);
    }

    #[test]
    fn test_discover_empty_directory() {
        let listing: &[&str] = &[];
        let cases = discover(listing, &CasePattern::default()).unwrap();
        assert!(cases.is_empty());
    }

    #[test]
    fn test_discover_deduplicates() {
        let listing = vec!["test-a.txt".to_string(), "test-a.txt".to_string()];
        let cases = discover(&listing, &CasePattern::default()).unwrap();
        assert_eq!(ids(&cases), vec!["test-a.txt"]);
    }

    #[test]
    fn test_source_extension_pattern() {
        let listing: &[&str] = &["test-a.cpp", "test-a.txt", "test-b_x.cpp"];
        let cases = discover(listing, &CasePattern::with_extension("cpp")).unwrap();
        assert_eq!(ids(&cases), vec!["test-a.cpp"]);
    }

    #[test]
    fn test_stem_uses_path_extension() {
        assert_eq!(TestCase::new("test-a.txt").stem(), "test-a");
        assert_eq!(TestCase::new("test-long.input").stem(), "test-long");
        assert_eq!(TestCase::new("test-x.y.txt").stem(), "test-x.y");
    }

    #[test]
    fn test_workdir_lists_only_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("test-a.txt"), "1\n").unwrap();
        std::fs::write(temp_dir.path().join("test-a_old.txt"), "1\n").unwrap();
        std::fs::create_dir(temp_dir.path().join("test-dir.txt")).unwrap();

        let workdir = WorkDir::new(temp_dir.path());
        let cases = discover(&workdir, &CasePattern::default()).unwrap();
        assert_eq!(ids(&cases), vec!["test-a.txt"]);
    }

    #[test]
    fn test_relative_workdir_is_resolved() {
        let workdir = WorkDir::new("cases");
        let cwd = std::env::current_dir().unwrap();

        assert!(workdir.path().is_absolute());
        assert_eq!(workdir.path(), cwd.join("cases"));
        assert_eq!(workdir.join("prog"), cwd.join("cases").join("prog"));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let workdir = WorkDir::new(temp_dir.path().join("missing"));
        assert!(discover(&workdir, &CasePattern::default()).is_err());
    }

    proptest! {
        #[test]
        fn prop_included_iff_prefix_and_no_separator(name in "[a-z_-]{0,8}(\\.txt)?") {
            let listing = vec![name.clone()];
            let cases = discover(&listing, &CasePattern::default()).unwrap();
            let expected = name.starts_with(CASE_PREFIX)
                && !name.contains(LABEL_SEPARATOR)
                && name.ends_with(".txt")
                && name.len() > ".txt".len();
            prop_assert_eq!(cases.len() == 1, expected);
        }

        #[test]
        fn prop_baseline_files_never_discovered(stem in "[a-z]{1,6}", label in "[a-z]{0,6}") {
            let listing = vec![format!("test-{}_{}.txt", stem, label)];
            let cases = discover(&listing, &CasePattern::default()).unwrap();
            prop_assert!(cases.is_empty());
        }
    }
}
