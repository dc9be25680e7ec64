//! Baseline output storage
//!
//! A baseline is the saved output of one test case under a caller-chosen
//! label, stored next to the case as `<stem>_<label>.txt`. Everything lives
//! on disk; nothing is cached between invocations.

use log::{debug, info};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::discovery::{DirectoryLister, TestCase, WorkDir, LABEL_SEPARATOR};
use crate::HarnessError;

/// Extension of every baseline file
pub const BASELINE_EXTENSION: &str = "txt";

/// Label of the scratch outputs written while comparing
pub const TMP_LABEL: &str = "tmp";

/// Opaque name distinguishing one set of baselines from another
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Label used for temporary comparison outputs
    pub fn tmp() -> Self {
        Self::new(TMP_LABEL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `_<label>.txt` tail shared by every file under this label
    pub fn file_suffix(&self) -> String {
        format!("{}{}.{}", LABEL_SEPARATOR, self.0, BASELINE_EXTENSION)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything baselines can be looked up in
pub trait BaselineLookup {
    /// Saved output bytes for a case, or `None` when no baseline exists
    fn baseline(&self, case: &TestCase, label: &Label) -> Result<Option<Vec<u8>>, HarnessError>;
}

/// File name of the baseline for a case under a label
pub fn baseline_file_name(case: &TestCase, label: &Label) -> String {
    format!("{}{}", case.stem(), label.file_suffix())
}

/// File-backed baseline store rooted at the working directory
#[derive(Debug, Clone)]
pub struct BaselineStore {
    workdir: WorkDir,
}

impl BaselineStore {
    pub fn new(workdir: WorkDir) -> Self {
        Self { workdir }
    }

    /// Path of the baseline file, rejecting names that escape the directory
    pub fn path_for(&self, case: &TestCase, label: &Label) -> Result<PathBuf, HarnessError> {
        let name = baseline_file_name(case, label);

        let mut components = Path::new(&name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.workdir.join(&name)),
            _ => Err(HarnessError::Config(format!(
                "Label `{}` does not produce a plain file name: {}",
                label, name
            ))),
        }
    }

    /// Persist output for a case byte for byte, overwriting any previous baseline
    pub fn write(
        &self,
        case: &TestCase,
        label: &Label,
        contents: impl AsRef<[u8]>,
    ) -> Result<PathBuf, HarnessError> {
        let path = self.path_for(case, label)?;
        fs::write(&path, contents)?;
        debug!("Wrote baseline {}", path.display());
        Ok(path)
    }

    /// Read the saved output for a case; a missing file is `None`
    pub fn read(&self, case: &TestCase, label: &Label) -> Result<Option<Vec<u8>>, HarnessError> {
        let path = self.path_for(case, label)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every file carrying the label's suffix, whichever case it belongs to
    ///
    /// Returns the removed file names in sorted order.
    pub fn delete_all(&self, label: &Label) -> Result<Vec<String>, HarnessError> {
        let suffix = label.file_suffix();

        let mut doomed: Vec<String> =
            self.workdir.list()?.into_iter().filter(|name| name.contains(&suffix)).collect();
        doomed.sort();

        for name in &doomed {
            fs::remove_file(self.workdir.join(name))?;
            info!("Removed {}", name);
        }

        Ok(doomed)
    }
}

impl BaselineLookup for BaselineStore {
    fn baseline(&self, case: &TestCase, label: &Label) -> Result<Option<Vec<u8>>, HarnessError> {
        self.read(case, label)
    }
}

/// In-memory baselines keyed by baseline file name
impl BaselineLookup for HashMap<String, Vec<u8>> {
    fn baseline(&self, case: &TestCase, label: &Label) -> Result<Option<Vec<u8>>, HarnessError> {
        Ok(self.get(&baseline_file_name(case, label)).cloned())
    }
}
