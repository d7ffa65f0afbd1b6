#![forbid(unsafe_code)]
//! Buildtest: fixtures for testing build-tool projects
//!
//! The harness finds sample projects on disk, clones them into isolated scratch directories,
//! runs them through a [`engine::BuildEngine`] and hands back a [`BuildResult`] with every
//! error, warning and high-importance message the engine reported, plus the evaluated
//! project state when the engine provides one.
//!
//! ```no_run
//! use std::sync::Arc;
//! use buildtest::{Harness, HarnessConfig, engine::process::ProcessEngine};
//!
//! # fn main() -> buildtest::HarnessResult<()> {
//! let harness = Harness::new(HarnessConfig::from_env()?, Arc::new(ProcessEngine::new()))?;
//! let mut project = harness.project("Library")?;
//! let result = project.build()?;
//! assert!(result.succeeded(), "{:?}", result.diagnostics());
//! # Ok(())
//! # }
//! ```
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **True invariants**: If a panic represents a harness bug (logic error), use `.expect("INVARIANT: reason")` with
//!   a clear explanation. Compiling a literal regex is the only such case.

pub mod capture;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod harness;
pub mod output;
pub mod packages;
pub mod paths;
pub mod project;
pub mod result;
pub mod sample;
pub mod version;

pub use buildtest_core::{Diagnostic, Position, Severity, TextSpan};

pub use capture::DiagnosticCapture;
pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use harness::Harness;
pub use packages::{PackageCatalog, TestPackage};
pub use paths::TestPaths;
pub use project::{BuildOptions, FileProject, InlineProject, ProjectDescriptor, ProjectInstance};
pub use result::BuildResult;
pub use sample::{Sample, SampleCatalog, SampleInstance};
