//! Build engine boundary
//!
//! The harness never evaluates or executes a project itself. It loads a project through a
//! [`BuildEngine`], turns the loaded [`EngineProject`] into a [`ProjectState`] snapshot and
//! submits that with a list of targets. Everything the engine reports while building arrives
//! through its [`EventSource`].
//!
//! ## Implementations
//!
//! - [`process::ProcessEngine`] - runs an external build tool and translates its console output
//! - `tests/common` - a scripted engine for tests

pub mod events;
pub mod process;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

pub use events::{
    BuildEvent, DiagnosticEvent, EventHandler, EventKind, EventSource, MessageImportance, StatusEvent, StatusKind,
    SubscriptionId,
};

/// Target run before the first build of every instance.
pub const RESTORE_TARGET: &str = "Restore";
pub const BUILD_TARGET: &str = "Build";
pub const PACK_TARGET: &str = "Pack";
pub const PUBLISH_TARGET: &str = "Publish";

/// Errors reported by an engine implementation.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("failed to launch build tool '{program}'")]
    #[diagnostic(code(buildtest::engine::launch), help("is the build tool installed and on PATH?"))]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load project {}: {message}", path.display())]
    #[diagnostic(code(buildtest::engine::load))]
    Load { path: PathBuf, message: String },

    #[error("build engine failure: {message}")]
    #[diagnostic(code(buildtest::engine::internal))]
    Internal { message: String },
}

/// Overall result code of one build submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallResult {
    Success,
    Failure,
}

impl OverallResult {
    pub fn is_success(self) -> bool {
        self == OverallResult::Success
    }
}

impl fmt::Display for OverallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallResult::Success => write!(f, "Success"),
            OverallResult::Failure => write!(f, "Failure"),
        }
    }
}

/// One evaluated item of a project.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProjectItem {
    pub item_type: String,
    pub identity: String,
    pub metadata: BTreeMap<String, String>,
}

impl ProjectItem {
    pub fn new(item_type: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            identity: identity.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }
}

/// Snapshot of a project's evaluated state, handed to the engine and returned after a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectState {
    pub path: PathBuf,
    /// Caller-supplied properties; these override evaluated ones.
    pub global_properties: BTreeMap<String, String>,
    /// Evaluated properties in engine order.
    pub properties: Vec<(String, String)>,
    /// Evaluated items in engine order.
    pub items: Vec<ProjectItem>,
}

impl ProjectState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    pub fn with_global_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_properties.insert(name.into(), value.into());
        self
    }

    pub fn with_item(mut self, item: ProjectItem) -> Self {
        self.items.push(item);
        self
    }
}

/// Session-wide settings for a build submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildParameters {
    pub enable_node_reuse: bool,
    /// `None` leaves the engine default.
    pub max_node_count: Option<usize>,
    pub global_properties: BTreeMap<String, String>,
}

impl Default for BuildParameters {
    fn default() -> Self {
        Self {
            enable_node_reuse: true,
            max_node_count: None,
            global_properties: BTreeMap::new(),
        }
    }
}

/// Flags altering how a single request is processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RequestFlags(u32);

impl RequestFlags {
    pub const NONE: RequestFlags = RequestFlags(0);
    pub const REPLACE_EXISTING_PROJECT_INSTANCE: RequestFlags = RequestFlags(1 << 0);
    pub const PROVIDE_PROJECT_STATE_AFTER_BUILD: RequestFlags = RequestFlags(1 << 1);
    pub const IGNORE_EXISTING_PROJECT_STATE: RequestFlags = RequestFlags(1 << 2);
    pub const CLEAR_CACHES_AFTER_BUILD: RequestFlags = RequestFlags(1 << 3);
    pub const SKIP_NONEXISTENT_TARGETS: RequestFlags = RequestFlags(1 << 4);

    pub fn contains(self, other: RequestFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for RequestFlags {
    type Output = RequestFlags;

    fn bitor(self, rhs: RequestFlags) -> RequestFlags {
        RequestFlags(self.0 | rhs.0)
    }
}

/// Engine-specific services passed through to the build untouched.
pub type HostServices = Arc<dyn Any + Send + Sync>;

/// One submission: a project snapshot plus the targets to run against it.
#[derive(Clone)]
pub struct BuildRequest {
    pub state: ProjectState,
    pub targets: Vec<String>,
    pub host_services: Option<HostServices>,
    pub flags: RequestFlags,
}

impl BuildRequest {
    pub fn new(state: ProjectState, targets: Vec<String>) -> Self {
        Self {
            state,
            targets,
            host_services: None,
            flags: RequestFlags::NONE,
        }
    }
}

impl fmt::Debug for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRequest")
            .field("state", &self.state)
            .field("targets", &self.targets)
            .field("host_services", &self.host_services.is_some())
            .field("flags", &self.flags)
            .finish()
    }
}

/// What the engine hands back from a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutcome {
    pub overall: OverallResult,
    pub project_state_after_build: Option<ProjectState>,
}

/// The engine's live, evaluated representation of one project file.
pub trait EngineProject: Send {
    fn path(&self) -> &Path;

    /// Force the next [`EngineProject::reevaluate_if_necessary`] to re-read the project.
    fn mark_dirty(&mut self);

    fn reevaluate_if_necessary(&mut self) -> Result<(), EngineError>;

    /// Snapshot suitable for a [`BuildRequest`].
    fn create_state(&self) -> ProjectState;
}

/// A build engine: loads projects and runs targets against them, one blocking call at a time.
///
/// Engines do not serialize submissions. Callers sharing one engine across threads need an
/// engine whose session model allows concurrent requests.
pub trait BuildEngine: Send + Sync {
    fn event_source(&self) -> &EventSource;

    fn load_project(
        &self,
        path: &Path,
        global_properties: &BTreeMap<String, String>,
    ) -> Result<Box<dyn EngineProject>, EngineError>;

    fn build(&self, parameters: &BuildParameters, request: BuildRequest) -> Result<EngineOutcome, EngineError>;
}

/// A project known only by its path and global properties.
///
/// Used by engines that evaluate out of process and therefore have nothing to re-evaluate
/// in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathProject {
    path: PathBuf,
    global_properties: BTreeMap<String, String>,
    dirty: bool,
    evaluations: usize,
}

impl PathProject {
    pub fn new(path: impl Into<PathBuf>, global_properties: BTreeMap<String, String>) -> Self {
        Self {
            path: path.into(),
            global_properties,
            dirty: false,
            evaluations: 1,
        }
    }

    /// Number of evaluations, the initial load included.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

impl EngineProject for PathProject {
    fn path(&self) -> &Path {
        &self.path
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn reevaluate_if_necessary(&mut self) -> Result<(), EngineError> {
        if self.dirty {
            self.dirty = false;
            self.evaluations += 1;
        }
        Ok(())
    }

    fn create_state(&self) -> ProjectState {
        ProjectState {
            path: self.path.clone(),
            global_properties: self.global_properties.clone(),
            properties: Vec::new(),
            items: Vec::new(),
        }
    }
}
