//! Samples: named groups of project files used as fixtures.
//!
//! A sample is a directory. Its projects are the `*.*proj` files found in three places,
//! concatenated in this order:
//!
//! 1. the sample root (`Foo/`)
//! 2. a subdirectory named after the sample (`Foo/Foo/`)
//! 3. a conventional source layout (`Foo/src/Foo/`)
//!
//! The default project is the one whose file stem equals the sample name, searched in the
//! same order; the first location with a match wins and two matches in one location are an
//! error. Without any match the project with the smallest path is the default.

mod catalog;
mod instance;

pub use catalog::SampleCatalog;
pub use instance::SampleInstance;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::BuildEngine;
use crate::error::{HarnessError, HarnessResult};
use crate::paths::TestPaths;
use crate::project::{FileProject, ProjectDescriptor};

/// File-name pattern of project files.
pub const PROJECT_FILE_PATTERN: &str = "*.*proj";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    name: String,
    root: PathBuf,
    projects: Vec<FileProject>,
    default_index: usize,
}

impl Sample {
    /// Discover the projects of the sample rooted at `root`.
    #[tracing::instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn from_directory(root: impl AsRef<Path>) -> HarnessResult<Self> {
        let root = std::path::absolute(root.as_ref()).map_err(|e| HarnessError::io(root.as_ref(), e))?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut locations = vec![list_projects(&root)?];
        for candidate in [root.join(&name), root.join("src").join(&name)] {
            if !name.is_empty() && candidate.is_dir() {
                locations.push(list_projects(&candidate)?);
            }
        }

        let mut default_index = None;
        let mut offset = 0;
        for location in &locations {
            let matches: Vec<usize> = location
                .iter()
                .enumerate()
                .filter(|(_, p)| p.stem() == name)
                .map(|(i, _)| i)
                .collect();
            match matches.as_slice() {
                [] => {}
                [only] => {
                    default_index = Some(offset + only);
                    break;
                }
                _ => {
                    return Err(HarnessError::MultipleDefaultProjects {
                        sample: name,
                        paths: matches.iter().map(|&i| location[i].path().to_path_buf()).collect(),
                    });
                }
            }
            offset += location.len();
        }

        let projects: Vec<FileProject> = locations.into_iter().flatten().collect();
        if projects.is_empty() {
            return Err(HarnessError::NoProjectsFound { path: root });
        }

        let default_index = match default_index {
            Some(index) => index,
            None => projects
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.path().as_os_str().cmp(b.path().as_os_str()))
                .map(|(i, _)| i)
                .unwrap_or(0),
        };

        tracing::debug!(
            sample = %name,
            projects = projects.len(),
            default = %projects[default_index].name(),
            "discovered sample"
        );
        Ok(Self {
            name,
            root,
            projects,
            default_index,
        })
    }

    /// Directory name of the sample.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root projects, then nested-directory projects, then `src/<name>` projects.
    pub fn projects(&self) -> &[FileProject] {
        &self.projects
    }

    pub fn default_project(&self) -> &FileProject {
        &self.projects[self.default_index]
    }

    pub(crate) fn default_index(&self) -> usize {
        self.default_index
    }

    /// The single project whose file name starts with `prefix`.
    pub fn project_named(&self, prefix: &str) -> HarnessResult<&FileProject> {
        let matches: Vec<&FileProject> = self.projects.iter().filter(|p| p.name().starts_with(prefix)).collect();
        match matches.as_slice() {
            [] => Err(HarnessError::ProjectNotFound {
                sample: self.name.clone(),
                name: prefix.to_string(),
            }),
            [only] => Ok(only),
            _ => Err(HarnessError::MultipleProjectsFound {
                sample: self.name.clone(),
                name: prefix.to_string(),
                paths: matches.iter().map(|p| p.path().to_path_buf()).collect(),
            }),
        }
    }

    /// The default project as a descriptor, ready to materialize on its own.
    pub fn default_descriptor(&self) -> ProjectDescriptor {
        ProjectDescriptor::File(self.default_project().clone())
    }

    /// Copy the whole sample into a fresh directory and bind every project in it.
    pub fn materialize(&self, engine: Arc<dyn BuildEngine>, paths: &TestPaths) -> HarnessResult<SampleInstance> {
        SampleInstance::create(self.clone(), engine, paths.fresh_project_dir())
    }
}

/// Project files directly inside `dir`, sorted by path.
fn list_projects(dir: &Path) -> HarnessResult<Vec<FileProject>> {
    let pattern = glob::Pattern::new(PROJECT_FILE_PATTERN).map_err(|e| HarnessError::io(dir, std::io::Error::other(e)))?;
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| HarnessError::io(dir, e))? {
        let entry = entry.map_err(|e| HarnessError::io(dir, e))?;
        let path = entry.path();
        let is_project = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| pattern.matches(n));
        if is_project && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    paths.into_iter().map(FileProject::new).collect()
}
