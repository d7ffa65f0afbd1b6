//! A cloned project bound to a build engine.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildtest_core::Severity;

use crate::capture::DiagnosticCapture;
use crate::engine::{
    BUILD_TARGET, BuildEngine, BuildParameters, BuildRequest, EngineProject, HostServices, PACK_TARGET,
    PUBLISH_TARGET, ProjectState, RESTORE_TARGET, RequestFlags,
};
use crate::error::{HarnessError, HarnessResult};
use crate::output::TestOutput;
use crate::paths::remove_dir_if_exists;
use crate::project::ProjectDescriptor;
use crate::result::BuildResult;

type ParametersHook<'a> = Box<dyn FnOnce(&mut BuildParameters) + 'a>;
type RequestHook<'a> = Box<dyn FnOnce(&mut BuildRequest) + 'a>;
type StateHook<'a> = Box<dyn FnOnce(&mut ProjectState) + 'a>;

/// Optional knobs for [`ProjectInstance::build_with`].
///
/// Hooks run in the order state, parameters, request, right before submission.
#[derive(Default)]
pub struct BuildOptions<'a> {
    pub flags: RequestFlags,
    pub host_services: Option<HostServices>,
    configure_parameters: Option<ParametersHook<'a>>,
    configure_request: Option<RequestHook<'a>>,
    configure_state: Option<StateHook<'a>>,
}

impl<'a> BuildOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flags(mut self, flags: RequestFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_host_services(mut self, services: HostServices) -> Self {
        self.host_services = Some(services);
        self
    }

    pub fn configure_parameters(mut self, hook: impl FnOnce(&mut BuildParameters) + 'a) -> Self {
        self.configure_parameters = Some(Box::new(hook));
        self
    }

    pub fn configure_request(mut self, hook: impl FnOnce(&mut BuildRequest) + 'a) -> Self {
        self.configure_request = Some(Box::new(hook));
        self
    }

    /// Adjust the project snapshot before it is submitted.
    pub fn configure_state(mut self, hook: impl FnOnce(&mut ProjectState) + 'a) -> Self {
        self.configure_state = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for BuildOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("flags", &self.flags)
            .field("host_services", &self.host_services.is_some())
            .field("configure_parameters", &self.configure_parameters.is_some())
            .field("configure_request", &self.configure_request.is_some())
            .field("configure_state", &self.configure_state.is_some())
            .finish()
    }
}

/// A private working copy of a project plus the engine handle that builds it.
///
/// The engine only ever sees `project_path`, which lives inside this instance's directory.
/// Restore runs once per clone: the first build restores, later builds skip it until
/// [`ProjectInstance::reclone`] is called.
pub struct ProjectInstance {
    engine: Arc<dyn BuildEngine>,
    /// Source the working copy is (re)created from.
    descriptor: ProjectDescriptor,
    directory: PathBuf,
    project_path: PathBuf,
    output: Option<Arc<dyn TestOutput>>,
    verbosity: Severity,
    global_properties: BTreeMap<String, String>,
    restored: bool,
    project: Option<Box<dyn EngineProject>>,
    /// Clone directory of the sample this instance is part of, if any.
    sample_directory: Option<PathBuf>,
}

impl fmt::Debug for ProjectInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectInstance")
            .field("directory", &self.directory)
            .field("project_path", &self.project_path)
            .field("restored", &self.restored)
            .field("loaded", &self.project.is_some())
            .finish()
    }
}

impl ProjectInstance {
    pub(crate) fn new(
        engine: Arc<dyn BuildEngine>,
        descriptor: ProjectDescriptor,
        directory: PathBuf,
        project_path: PathBuf,
    ) -> Self {
        Self {
            engine,
            descriptor,
            directory,
            project_path,
            output: None,
            verbosity: Severity::Informational,
            global_properties: BTreeMap::new(),
            restored: false,
            project: None,
            sample_directory: None,
        }
    }

    /// Mark this instance as one project of a cloned sample. Its directory then overlaps its
    /// siblings', so it can no longer be re-cloned or deleted on its own.
    pub(crate) fn in_sample(mut self, sample_directory: impl Into<PathBuf>) -> Self {
        self.sample_directory = Some(sample_directory.into());
        self
    }

    pub fn with_output(mut self, output: Arc<dyn TestOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Severity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Global property the project is loaded with. Drops an already loaded engine project.
    pub fn with_global_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_properties.insert(name.into(), value.into());
        self.project = None;
        self
    }

    /// File name of the project, extension included.
    pub fn name(&self) -> &str {
        self.project_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the cloned project file.
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Discard the working copy and clone it again. The next build restores again.
    ///
    /// Fails with [`HarnessError::SharedWorkingCopy`] for a project of a
    /// [`SampleInstance`](crate::sample::SampleInstance).
    pub fn reclone(&mut self) -> HarnessResult<()> {
        self.ensure_standalone()?;
        self.reset();
        self.clone_files()
    }

    /// Remove the working copy. Tolerates a directory that is already gone.
    pub fn delete(&mut self) -> HarnessResult<()> {
        self.ensure_standalone()?;
        self.reset();
        remove_dir_if_exists(&self.directory)?;
        tracing::debug!(path = %self.directory.display(), "deleted project instance");
        Ok(())
    }

    /// Forget the loaded project and the restore marker; files are left alone.
    pub(crate) fn reset(&mut self) {
        self.project = None;
        self.restored = false;
    }

    fn ensure_standalone(&self) -> HarnessResult<()> {
        match &self.sample_directory {
            Some(sample_directory) => Err(HarnessError::SharedWorkingCopy {
                project: self.project_path.clone(),
                sample_directory: sample_directory.clone(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn clone_files(&self) -> HarnessResult<()> {
        self.descriptor.write_to(&self.directory)
    }

    /// The engine's project, loaded from the working copy on first use.
    ///
    /// Recreates the working copy first if it was deleted.
    pub fn engine_project(&mut self) -> HarnessResult<&mut dyn EngineProject> {
        let project = match self.project.take() {
            Some(project) => project,
            None => {
                if !self.directory.exists() {
                    self.clone_files()?;
                }
                self.engine.load_project(&self.project_path, &self.global_properties)?
            }
        };
        Ok(self.project.insert(project).as_mut())
    }

    /// Run the `Restore` target unless this clone has already been restored.
    ///
    /// Returns the restore result when restore actually ran.
    #[tracing::instrument(skip_all, fields(project = %self.project_path.display()))]
    pub fn restore(&mut self) -> HarnessResult<Option<BuildResult>> {
        if self.restored {
            return Ok(None);
        }
        let state = self.engine_project()?.create_state();
        let request = BuildRequest::new(state, vec![RESTORE_TARGET.to_string()]);
        let result = self.submit(&BuildParameters::default(), request)?;
        self.restored = true;
        if !result.succeeded() {
            tracing::warn!(errors = result.errors().len(), "restore failed");
        }
        Ok(Some(result))
    }

    /// Build the default `Build` target.
    pub fn build(&mut self) -> HarnessResult<BuildResult> {
        self.build_with(&[BUILD_TARGET], BuildOptions::default())
    }

    /// `Build` then `Pack`.
    pub fn pack(&mut self, options: BuildOptions<'_>) -> HarnessResult<BuildResult> {
        self.build_with(&[BUILD_TARGET, PACK_TARGET], options)
    }

    /// `Build` then `Publish`.
    pub fn publish(&mut self, options: BuildOptions<'_>) -> HarnessResult<BuildResult> {
        self.build_with(&[BUILD_TARGET, PUBLISH_TARGET], options)
    }

    /// Restore if needed, re-evaluate and run `targets` with diagnostics captured.
    #[tracing::instrument(skip_all, fields(project = %self.project_path.display(), targets = ?targets))]
    pub fn build_with(&mut self, targets: &[&str], options: BuildOptions<'_>) -> HarnessResult<BuildResult> {
        if !self.restored {
            self.restore()?;
        }

        let project = self.engine_project()?;
        // Restore may have changed what the project imports.
        project.mark_dirty();
        project.reevaluate_if_necessary()?;
        let mut state = project.create_state();

        let BuildOptions {
            flags,
            host_services,
            configure_parameters,
            configure_request,
            configure_state,
        } = options;

        if let Some(hook) = configure_state {
            hook(&mut state);
        }
        let mut parameters = BuildParameters::default();
        if let Some(hook) = configure_parameters {
            hook(&mut parameters);
        }
        let mut request = BuildRequest {
            state,
            targets: targets.iter().map(|t| t.to_string()).collect(),
            host_services,
            flags,
        };
        if let Some(hook) = configure_request {
            hook(&mut request);
        }

        let result = self.submit(&parameters, request)?;
        tracing::debug!(
            overall = %result.overall(),
            errors = result.errors().len(),
            warnings = result.warnings().len(),
            "build finished"
        );
        Ok(result)
    }

    /// Submit one request with a capture attached for exactly its duration.
    fn submit(&self, parameters: &BuildParameters, request: BuildRequest) -> HarnessResult<BuildResult> {
        let mut capture = DiagnosticCapture::new(self.verbosity);
        if let Some(output) = &self.output {
            capture = capture.with_output(Arc::clone(output));
        }

        let outcome = {
            let _guard = capture.scoped(self.engine.event_source())?;
            self.engine.build(parameters, request)
        }?;

        if let Some(violation) = capture.contract_violation() {
            return Err(violation);
        }
        Ok(BuildResult::from_capture(&capture, outcome))
    }
}
