//! Scratch-space layout for a test binary.
//!
//! The temp root is derived from the test binary's own directory, so two different test
//! binaries never share a cache while repeated runs of the same binary reuse one:
//!
//! ```text
//! <os temp>/<namespace>/<sha256(test root)>/
//!     projects/          cloned project and sample instances
//!     packages_cache/    packages restored by builds
//!     nuget.config, Directory.Build.props, Directory.Build.targets
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};

const PROJECTS_DIR: &str = "projects";
const PACKAGES_CACHE_DIR: &str = "packages_cache";

/// Every directory the harness reads fixtures from or writes scratch files to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPaths {
    test_root: PathBuf,
    temp_root: PathBuf,
    samples_dir: PathBuf,
    packages_dir: PathBuf,
}

impl TestPaths {
    /// Layout for the running executable, scratch space under the OS temp directory.
    pub fn new(config: &HarnessConfig) -> HarnessResult<Self> {
        let exe = std::env::current_exe().map_err(|e| HarnessError::io("<current executable>", e))?;
        let test_root = exe.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::for_test_root(config, test_root, std::env::temp_dir()))
    }

    /// Layout for an explicit test root, with scratch space under `temp_base`.
    pub fn for_test_root(config: &HarnessConfig, test_root: impl Into<PathBuf>, temp_base: impl AsRef<Path>) -> Self {
        let test_root = test_root.into();
        let temp_root = temp_base
            .as_ref()
            .join(&config.namespace)
            .join(root_digest(&test_root));
        Self {
            samples_dir: config.resolve_samples_root(&test_root),
            packages_dir: config.resolve_packages_dir(&test_root),
            test_root,
            temp_root,
        }
    }

    /// Process-wide layout derived from [`HarnessConfig::from_env`] on first use.
    pub fn global() -> HarnessResult<&'static TestPaths> {
        static GLOBAL: OnceLock<TestPaths> = OnceLock::new();
        if let Some(paths) = GLOBAL.get() {
            return Ok(paths);
        }
        let paths = TestPaths::new(&HarnessConfig::from_env()?)?;
        // A racing thread may have won; either value is identical.
        let _ = GLOBAL.set(paths);
        GLOBAL.get().ok_or_else(|| HarnessError::io("<global test paths>", io::ErrorKind::Other.into()))
    }

    /// Directory containing the running test binary.
    pub fn test_root(&self) -> &Path {
        &self.test_root
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    pub fn samples_dir(&self) -> &Path {
        &self.samples_dir
    }

    /// Local package feed: the directory of locally built package archives.
    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    pub fn project_cache(&self) -> PathBuf {
        self.temp_root.join(PROJECTS_DIR)
    }

    pub fn packages_cache(&self) -> PathBuf {
        self.temp_root.join(PACKAGES_CACHE_DIR)
    }

    /// A new, never-used directory under the project cache.
    pub fn fresh_project_dir(&self) -> PathBuf {
        self.project_cache().join(Uuid::new_v4().simple().to_string())
    }

    pub fn project_dir_named(&self, name: &str) -> PathBuf {
        self.project_cache().join(name)
    }

    /// Delete and recreate the whole temp root.
    pub fn clear_temp_root(&self) -> HarnessResult<()> {
        recreate_dir(&self.temp_root)
    }

    /// Delete and recreate only the project cache.
    pub fn clear_projects_cache(&self) -> HarnessResult<()> {
        recreate_dir(&self.project_cache())
    }
}

fn root_digest(test_root: &Path) -> String {
    let digest = Sha256::digest(test_root.to_string_lossy().as_bytes());
    hex::encode(digest)
}

/// Remove `dir` if present, then create it (and its parents).
pub(crate) fn recreate_dir(dir: &Path) -> HarnessResult<()> {
    remove_dir_if_exists(dir)?;
    fs::create_dir_all(dir).map_err(|e| HarnessError::io(dir, e))?;
    tracing::debug!(path = %dir.display(), "recreated directory");
    Ok(())
}

pub(crate) fn remove_dir_if_exists(dir: &Path) -> HarnessResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HarnessError::io(dir, e)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_root_is_stable_for_same_test_root() {
        let config = HarnessConfig::default();
        let a = TestPaths::for_test_root(&config, "/bin/tests", "/tmp");
        let b = TestPaths::for_test_root(&config, "/bin/tests", "/tmp");
        assert_eq!(a.temp_root(), b.temp_root());
    }

    #[test]
    fn test_temp_root_differs_between_test_roots() {
        let config = HarnessConfig::default();
        let a = TestPaths::for_test_root(&config, "/bin/a", "/tmp");
        let b = TestPaths::for_test_root(&config, "/bin/b", "/tmp");
        assert_ne!(a.temp_root(), b.temp_root());
    }

    #[test]
    fn test_temp_root_layout() {
        let config = HarnessConfig::default().with_namespace("ns");
        let paths = TestPaths::for_test_root(&config, "/bin/tests", "/tmp");
        let leaf = paths.temp_root().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(leaf.len(), 64);
        assert!(leaf.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(paths.temp_root().parent(), Some(Path::new("/tmp/ns")));
        assert_eq!(paths.project_cache(), paths.temp_root().join("projects"));
        assert_eq!(paths.packages_cache(), paths.temp_root().join("packages_cache"));
    }

    #[test]
    fn test_fresh_project_dirs_are_unique() {
        let paths = TestPaths::for_test_root(&HarnessConfig::default(), "/bin/tests", "/tmp");
        let a = paths.fresh_project_dir();
        let b = paths.fresh_project_dir();
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(paths.project_cache().as_path()));
    }

    #[test]
    fn test_clear_temp_root_tolerates_absence_and_wipes_contents() {
        let base = tempfile::tempdir().unwrap();
        let paths = TestPaths::for_test_root(&HarnessConfig::default(), "/bin/tests", base.path());

        paths.clear_temp_root().unwrap();
        assert!(paths.temp_root().is_dir());

        let stale = paths.project_cache().join("stale.txt");
        fs::create_dir_all(paths.project_cache()).unwrap();
        fs::write(&stale, "x").unwrap();

        paths.clear_temp_root().unwrap();
        assert!(!stale.exists());
        assert!(paths.temp_root().is_dir());
    }

    #[test]
    fn test_clear_projects_cache_keeps_siblings() {
        let base = tempfile::tempdir().unwrap();
        let paths = TestPaths::for_test_root(&HarnessConfig::default(), "/bin/tests", base.path());
        fs::create_dir_all(paths.packages_cache()).unwrap();
        fs::create_dir_all(paths.project_dir_named("old")).unwrap();

        paths.clear_projects_cache().unwrap();
        assert!(paths.project_cache().is_dir());
        assert!(!paths.project_dir_named("old").exists());
        assert!(paths.packages_cache().is_dir());
    }
}
