//! Project descriptors
//!
//! A descriptor is the immutable definition of a project: either a project file on disk
//! ([`FileProject`], which brings its whole directory along) or a literal project text
//! ([`InlineProject`]). Materializing a descriptor clones it into a working directory and
//! returns a [`ProjectInstance`] bound to that copy; the descriptor's own files are never
//! handed to the engine.

mod instance;

pub use instance::{BuildOptions, ProjectInstance};

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::engine::BuildEngine;
use crate::error::{HarnessError, HarnessResult};
use crate::paths::{TestPaths, recreate_dir};

/// A project file on disk. Cloning copies its entire parent directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileProject {
    path: PathBuf,
    name: String,
}

impl FileProject {
    /// `path` must be rooted.
    pub fn new(path: impl Into<PathBuf>) -> HarnessResult<Self> {
        let path = path.into();
        if !path.has_root() {
            return Err(HarnessError::UnrootedProjectPath { path });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| HarnessError::UnrootedProjectPath { path: path.clone() })?;
        Ok(Self { path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that is copied when the project is cloned.
    pub fn root_directory(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    /// File name, extension included.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// A project given as text, written to a single file when cloned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InlineProject {
    name: String,
    contents: String,
}

impl InlineProject {
    /// `name` is the generated file name and must carry an extension, e.g. `App.csproj`.
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> HarnessResult<Self> {
        let name = name.into();
        if Path::new(&name).extension().is_none() {
            return Err(HarnessError::MissingProjectExtension { name });
        }
        Ok(Self {
            name,
            contents: contents.into(),
        })
    }

    /// Read the contents from `reader`; read failures are reported, never coerced.
    pub fn from_reader(name: impl Into<String>, mut reader: impl Read) -> HarnessResult<Self> {
        let name = name.into();
        let mut contents = String::new();
        if let Err(source) = reader.read_to_string(&mut contents) {
            return Err(HarnessError::UnreadableContents { name, source });
        }
        Self::new(name, contents)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

/// Either kind of project definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectDescriptor {
    File(FileProject),
    Inline(InlineProject),
}

impl From<FileProject> for ProjectDescriptor {
    fn from(project: FileProject) -> Self {
        ProjectDescriptor::File(project)
    }
}

impl From<InlineProject> for ProjectDescriptor {
    fn from(project: InlineProject) -> Self {
        ProjectDescriptor::Inline(project)
    }
}

impl ProjectDescriptor {
    pub fn file(path: impl Into<PathBuf>) -> HarnessResult<Self> {
        FileProject::new(path).map(Self::File)
    }

    pub fn inline(name: impl Into<String>, contents: impl Into<String>) -> HarnessResult<Self> {
        InlineProject::new(name, contents).map(Self::Inline)
    }

    /// File name of the project, extension included.
    pub fn name(&self) -> &str {
        match self {
            ProjectDescriptor::File(p) => p.name(),
            ProjectDescriptor::Inline(p) => p.name(),
        }
    }

    /// Clone into a fresh directory under the project cache.
    pub fn materialize(&self, engine: Arc<dyn BuildEngine>, paths: &TestPaths) -> HarnessResult<ProjectInstance> {
        self.materialize_into(engine, paths.fresh_project_dir())
    }

    /// Clone into `directory`, replacing whatever a previous clone left there.
    pub fn materialize_into(
        &self,
        engine: Arc<dyn BuildEngine>,
        directory: impl Into<PathBuf>,
    ) -> HarnessResult<ProjectInstance> {
        let directory = directory.into();
        let project_path = directory.join(self.name());
        let instance = ProjectInstance::new(engine, self.clone(), directory, project_path);
        instance.clone_files()?;
        Ok(instance)
    }

    /// Write this descriptor's files into `directory` after clearing it.
    pub(crate) fn write_to(&self, directory: &Path) -> HarnessResult<()> {
        match self {
            ProjectDescriptor::File(p) => copy_tree(p.root_directory(), directory),
            ProjectDescriptor::Inline(p) => {
                recreate_dir(directory)?;
                let target = directory.join(p.name());
                fs::write(&target, p.contents()).map_err(|e| HarnessError::io(&target, e))?;
                tracing::debug!(path = %target.display(), "wrote inline project");
                Ok(())
            }
        }
    }
}

/// Replace `destination` with a copy of every file under `source`, keeping relative paths.
pub(crate) fn copy_tree(source: &Path, destination: &Path) -> HarnessResult<()> {
    recreate_dir(destination)?;
    let mut copied = 0usize;
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
            HarnessError::io(path, e.into())
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let target = destination.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
        }
        fs::copy(entry.path(), &target).map_err(|e| HarnessError::io(entry.path(), e))?;
        copied += 1;
    }
    tracing::debug!(from = %source.display(), to = %destination.display(), files = copied, "cloned tree");
    Ok(())
}
