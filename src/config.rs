//! Harness configuration
//!
//! Defaults come from the layout next to the test binary; environment variables override them.

use std::fs;
use std::path::{Path, PathBuf};

use buildtest_core::Severity;

use crate::error::{HarnessError, HarnessResult};

pub const ENV_SAMPLES: &str = "BUILDTEST_SAMPLES";
pub const ENV_PACKAGES: &str = "BUILDTEST_PACKAGES";
pub const ENV_VERBOSITY: &str = "BUILDTEST_VERBOSITY";
pub const ENV_NAMESPACE: &str = "BUILDTEST_NAMESPACE";
pub const ENV_PUBLIC_FEED: &str = "BUILDTEST_PUBLIC_FEED";

/// File in the test root whose (trimmed) contents name the samples directory.
pub const SAMPLES_PATH_FILE: &str = "samples_path.txt";

pub const DEFAULT_NAMESPACE: &str = "buildtest";

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Directory holding one subdirectory per sample. `None` resolves against the test root.
    pub samples_root: Option<PathBuf>,
    /// Directory holding locally built package archives. `None` resolves against the test root.
    pub packages_dir: Option<PathBuf>,
    /// Segment under the OS temp directory that scopes every scratch area.
    pub namespace: String,
    /// Minimum severity forwarded live to the test output sink.
    pub verbosity: Severity,
    /// Whether the generated package sources include the public registry.
    pub public_feed: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            samples_root: None,
            packages_dir: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            verbosity: Severity::Informational,
            public_feed: true,
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.samples_root = Some(root.into());
        self
    }

    pub fn with_packages_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.packages_dir = Some(dir.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_verbosity(mut self, verbosity: Severity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_public_feed(mut self, enabled: bool) -> Self {
        self.public_feed = enabled;
        self
    }

    /// Defaults overlaid with `BUILDTEST_*` environment variables.
    pub fn from_env() -> HarnessResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`HarnessConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> HarnessResult<Self> {
        let mut config = Self::default();

        if let Some(root) = non_empty(lookup(ENV_SAMPLES)) {
            config.samples_root = Some(PathBuf::from(root));
        }
        if let Some(dir) = non_empty(lookup(ENV_PACKAGES)) {
            config.packages_dir = Some(PathBuf::from(dir));
        }
        if let Some(namespace) = non_empty(lookup(ENV_NAMESPACE)) {
            config.namespace = namespace;
        }
        if let Some(level) = non_empty(lookup(ENV_VERBOSITY)) {
            config.verbosity = level.parse().map_err(|_| HarnessError::InvalidSetting {
                key: ENV_VERBOSITY,
                value: level.clone(),
                hint: "expected one of critical, error, warning, info, verbose, diagnostic".to_string(),
            })?;
        }
        if let Some(flag) = non_empty(lookup(ENV_PUBLIC_FEED)) {
            config.public_feed = parse_flag(&flag).ok_or_else(|| HarnessError::InvalidSetting {
                key: ENV_PUBLIC_FEED,
                value: flag.clone(),
                hint: "expected 1/true/yes or 0/false/no".to_string(),
            })?;
        }

        Ok(config)
    }

    /// Samples root for a given test root.
    ///
    /// An explicit setting wins; then `samples_path.txt` in the test root; then `<test root>/samples`.
    /// Relative settings resolve against the test root.
    pub fn resolve_samples_root(&self, test_root: &Path) -> PathBuf {
        if let Some(root) = &self.samples_root {
            return test_root.join(root);
        }
        match fs::read_to_string(test_root.join(SAMPLES_PATH_FILE)) {
            Ok(contents) if !contents.trim().is_empty() => test_root.join(contents.trim()),
            _ => test_root.join("samples"),
        }
    }

    /// Packages directory for a given test root. A relative setting resolves against it.
    pub fn resolve_packages_dir(&self, test_root: &Path) -> PathBuf {
        match &self.packages_dir {
            Some(dir) => test_root.join(dir),
            None => test_root.join("packages"),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
