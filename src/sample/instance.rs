use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildtest_core::Severity;

use crate::engine::BuildEngine;
use crate::error::HarnessResult;
use crate::output::TestOutput;
use crate::paths::remove_dir_if_exists;
use crate::project::{ProjectDescriptor, ProjectInstance, copy_tree};
use crate::sample::Sample;

/// A whole sample copied into one directory, with an instance bound to every project.
///
/// Each project keeps its position relative to the sample root, so relative references
/// between projects of the sample keep working inside the copy.
#[derive(Debug)]
pub struct SampleInstance {
    sample: Sample,
    directory: PathBuf,
    projects: Vec<ProjectInstance>,
    default_index: usize,
}

impl SampleInstance {
    pub(crate) fn create(sample: Sample, engine: Arc<dyn BuildEngine>, directory: PathBuf) -> HarnessResult<Self> {
        copy_tree(sample.root(), &directory)?;

        let projects = sample
            .projects()
            .iter()
            .map(|project| {
                let relative = project
                    .root_directory()
                    .strip_prefix(sample.root())
                    .unwrap_or_else(|_| Path::new(""));
                let project_dir = directory.join(relative);
                let project_path = project_dir.join(project.name());
                ProjectInstance::new(
                    Arc::clone(&engine),
                    ProjectDescriptor::File(project.clone()),
                    project_dir,
                    project_path,
                )
                .in_sample(&directory)
            })
            .collect();

        Ok(Self {
            default_index: sample.default_index(),
            sample,
            directory,
            projects,
        })
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Instances in the same order as [`Sample::projects`].
    pub fn projects(&self) -> &[ProjectInstance] {
        &self.projects
    }

    pub fn projects_mut(&mut self) -> &mut [ProjectInstance] {
        &mut self.projects
    }

    pub fn default_project(&self) -> &ProjectInstance {
        &self.projects[self.default_index]
    }

    pub fn default_project_mut(&mut self) -> &mut ProjectInstance {
        &mut self.projects[self.default_index]
    }

    /// The instance of the single project whose name starts with `prefix`.
    pub fn project_named_mut(&mut self, prefix: &str) -> HarnessResult<&mut ProjectInstance> {
        let index = self.index_of(prefix)?;
        Ok(&mut self.projects[index])
    }

    fn index_of(&self, prefix: &str) -> HarnessResult<usize> {
        let wanted = self.sample.project_named(prefix)?.path();
        Ok(self
            .sample
            .projects()
            .iter()
            .position(|p| p.path() == wanted)
            .unwrap_or(self.default_index))
    }

    pub fn with_output(mut self, output: Arc<dyn TestOutput>) -> Self {
        self.projects = self
            .projects
            .into_iter()
            .map(|p| p.with_output(Arc::clone(&output)))
            .collect();
        self
    }

    pub fn with_verbosity(mut self, verbosity: Severity) -> Self {
        self.projects = self.projects.into_iter().map(|p| p.with_verbosity(verbosity)).collect();
        self
    }

    /// Copy the whole sample again; every project restores on its next build.
    pub fn reclone(&mut self) -> HarnessResult<()> {
        for project in &mut self.projects {
            project.reset();
        }
        copy_tree(self.sample.root(), &self.directory)
    }

    /// Copy one project's directory again.
    ///
    /// Every instance living in or below that directory restores on its next build, since its
    /// restore output went with the old copy. For the default project at the sample root that
    /// is the whole sample.
    pub fn reclone_project(&mut self, prefix: &str) -> HarnessResult<()> {
        let index = self.index_of(prefix)?;
        let directory = self.projects[index].directory().to_path_buf();
        for project in &mut self.projects {
            if project.directory().starts_with(&directory) {
                project.reset();
            }
        }
        self.projects[index].clone_files()
    }

    pub fn delete(&mut self) -> HarnessResult<()> {
        for project in &mut self.projects {
            project.reset();
        }
        remove_dir_if_exists(&self.directory)
    }
}
