use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, HarnessResult};
use crate::sample::Sample;

/// Every sample under a samples root, keyed by directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCatalog {
    root: PathBuf,
    samples: BTreeMap<String, Sample>,
}

impl SampleCatalog {
    /// One sample per immediate subdirectory of `root`.
    ///
    /// Fails if the root is missing or has no subdirectories, and on the first sample that
    /// fails discovery.
    #[tracing::instrument(skip_all, fields(root = %root.display()))]
    pub fn from_root(root: &Path) -> HarnessResult<Self> {
        let no_samples = || HarnessError::NoSamplesFound { root: root.to_path_buf() };

        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(no_samples()),
            Err(e) => return Err(HarnessError::io(root, e)),
        };

        let mut samples = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| HarnessError::io(root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let sample = Sample::from_directory(&path)?;
            samples.insert(sample.name().to_string(), sample);
        }

        if samples.is_empty() {
            return Err(no_samples());
        }
        tracing::info!(count = samples.len(), "loaded sample catalog");
        Ok(Self {
            root: root.to_path_buf(),
            samples,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, name: &str) -> HarnessResult<&Sample> {
        self.samples.get(name).ok_or_else(|| HarnessError::SampleNotFound {
            name: name.to_string(),
        })
    }

    /// Samples in name order.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
