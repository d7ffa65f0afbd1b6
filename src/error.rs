//! Error taxonomy for the harness.
//!
//! Every failure carries the offending path or name as a field so tests can match on the
//! variant instead of the message text. Nothing here is retried: discovery, descriptor and
//! package-metadata errors are all fatal to the operation that raised them.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::engine::{EngineError, MessageImportance};

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------
    #[error("the directory {} does not contain project files", path.display())]
    #[diagnostic(
        code(buildtest::discovery::no_projects),
        help("a sample needs at least one *.*proj file at its root, in <sample>/<sample>/ or in src/<sample>/")
    )]
    NoProjectsFound { path: PathBuf },

    #[error("sample '{sample}' has more than one project named after it: {}", display_paths(paths))]
    #[diagnostic(
        code(buildtest::discovery::ambiguous_default),
        help("rename all but one of the projects, or move them to different search locations")
    )]
    MultipleDefaultProjects { sample: String, paths: Vec<PathBuf> },

    #[error("no samples found in {}", root.display())]
    #[diagnostic(code(buildtest::discovery::no_samples))]
    NoSamplesFound { root: PathBuf },

    // ------------------------------------------------------------------
    // Descriptors
    // ------------------------------------------------------------------
    #[error("project path {} is not rooted", path.display())]
    #[diagnostic(code(buildtest::project::unrooted_path), help("pass an absolute path to the project file"))]
    UnrootedProjectPath { path: PathBuf },

    #[error("project name '{name}' has no file extension")]
    #[diagnostic(
        code(buildtest::project::missing_extension),
        help("project names include their extension, e.g. 'App.csproj'")
    )]
    MissingProjectExtension { name: String },

    #[error("contents of inline project '{name}' could not be read")]
    #[diagnostic(code(buildtest::project::unreadable_contents))]
    UnreadableContents {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("project {} shares the working copy of the sample cloned at {}", project.display(), sample_directory.display())]
    #[diagnostic(
        code(buildtest::project::shared_working_copy),
        help("re-clone through SampleInstance::reclone_project or SampleInstance::reclone")
    )]
    SharedWorkingCopy { project: PathBuf, sample_directory: PathBuf },

    // ------------------------------------------------------------------
    // Package metadata
    // ------------------------------------------------------------------
    #[error("the package located at {} does not contain a top-level .nuspec file", archive.display())]
    #[diagnostic(code(buildtest::packages::metadata_not_found))]
    MetadataNotFound { archive: PathBuf },

    #[error("the .nuspec file located at {path} does not contain a root element")]
    #[diagnostic(code(buildtest::packages::metadata_root_not_found))]
    MetadataRootNotFound { path: String },

    #[error("{element} was not found in the .nuspec file located at {path}")]
    #[diagnostic(code(buildtest::packages::metadata_element_not_found))]
    MetadataElementNotFound { path: String, element: String },

    #[error("the package located at {} has the invalid ID \"{id}\"", archive.display())]
    #[diagnostic(
        code(buildtest::packages::invalid_id),
        help("package IDs must not contain '\"' or '<![CDATA['")
    )]
    InvalidPackageId { archive: PathBuf, id: String },

    #[error("the package located at {} has the invalid version \"{version}\"", archive.display())]
    #[diagnostic(
        code(buildtest::packages::invalid_version),
        help("package versions must not contain '\"' or '<![CDATA['")
    )]
    InvalidPackageVersion { archive: PathBuf, version: String },

    #[error("failed to read package archive {}", archive.display())]
    #[diagnostic(code(buildtest::packages::archive))]
    Archive {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("malformed XML in {path}")]
    #[diagnostic(code(buildtest::packages::xml))]
    Xml {
        path: String,
        #[source]
        source: quick_xml::Error,
    },

    // ------------------------------------------------------------------
    // Engine
    // ------------------------------------------------------------------
    #[error("unsupported message importance {importance}")]
    #[diagnostic(
        code(buildtest::engine::unsupported_importance),
        help("the build engine raised a message outside High/Normal/Low")
    )]
    UnsupportedImportance { importance: MessageImportance },

    #[error("diagnostic capture cannot attach while {state}")]
    #[diagnostic(code(buildtest::engine::capture_state))]
    InvalidCaptureState { state: &'static str },

    #[error(transparent)]
    #[diagnostic(code(buildtest::engine::failure))]
    Engine(#[from] EngineError),

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------
    #[error("sample '{name}' not found")]
    #[diagnostic(code(buildtest::lookup::sample_not_found))]
    SampleNotFound { name: String },

    #[error("project with the name '{name}' not found in sample '{sample}'")]
    #[diagnostic(code(buildtest::lookup::project_not_found))]
    ProjectNotFound { sample: String, name: String },

    #[error("more than one project with the name '{name}' in sample '{sample}': {}", display_paths(paths))]
    #[diagnostic(code(buildtest::lookup::multiple_projects), help("use a longer name prefix, e.g. include the extension"))]
    MultipleProjectsFound { sample: String, name: String, paths: Vec<PathBuf> },

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------
    #[error("invalid value '{value}' for {key}")]
    #[diagnostic(code(buildtest::config::invalid_setting))]
    InvalidSetting {
        key: &'static str,
        value: String,
        #[help]
        hint: String,
    },

    // ------------------------------------------------------------------
    // File system
    // ------------------------------------------------------------------
    #[error("I/O error at {}", path.display())]
    #[diagnostic(code(buildtest::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    /// Attach the path an I/O failure happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
