//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.
//! Rendering is split from printing so the text and JSON forms can be tested.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildtest_core::Severity;
use serde::Serialize;

use crate::config::HarnessConfig;
use crate::engine::process::ProcessEngine;
use crate::feed;
use crate::harness::Harness;
use crate::output::StderrOutput;
use crate::packages::PackageCatalog;
use crate::paths::TestPaths;
use crate::project::BuildOptions;
use crate::result::BuildResult;
use crate::sample::SampleCatalog;

use super::{CacheAction, CliError, CliResult, ExitCode};

// ============================================================================
// Shared setup
// ============================================================================

/// Configuration from the environment; the CLI treats the working directory as test root.
fn load_paths(config: &HarnessConfig) -> CliResult<TestPaths> {
    let cwd = env::current_dir().map_err(|e| CliError::failure(format!("cannot read working directory: {e}")))?;
    Ok(TestPaths::for_test_root(config, cwd, env::temp_dir()))
}

fn load_config(samples_root: Option<PathBuf>) -> CliResult<HarnessConfig> {
    let config = HarnessConfig::from_env()?;
    Ok(match samples_root {
        Some(root) => config.with_samples_root(root),
        None => config,
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::failure(format!("failed to serialize output: {e}")))
}

// ============================================================================
// samples
// ============================================================================

#[derive(Debug, Serialize)]
struct SampleSummary<'a> {
    name: &'a str,
    root: &'a Path,
    default_project: &'a str,
    projects: Vec<String>,
}

/// Text or JSON listing of every sample in `catalog`.
pub fn render_samples(catalog: &SampleCatalog, json: bool) -> CliResult<String> {
    let summaries: Vec<SampleSummary<'_>> = catalog
        .samples()
        .map(|sample| SampleSummary {
            name: sample.name(),
            root: sample.root(),
            default_project: sample.default_project().name(),
            projects: sample
                .projects()
                .iter()
                .map(|p| {
                    p.path()
                        .strip_prefix(sample.root())
                        .unwrap_or(p.path())
                        .display()
                        .to_string()
                })
                .collect(),
        })
        .collect();

    if json {
        return to_json(&summaries);
    }

    let mut out = String::new();
    for summary in &summaries {
        out.push_str(&format!("{} (default: {})\n", summary.name, summary.default_project));
        for project in &summary.projects {
            out.push_str(&format!("  {project}\n"));
        }
    }
    Ok(out)
}

pub fn list_samples(root: Option<PathBuf>, json: bool) -> CliResult<ExitCode> {
    let config = load_config(root)?;
    let paths = load_paths(&config)?;
    let catalog = SampleCatalog::from_root(paths.samples_dir())?;
    print!("{}", render_samples(&catalog, json)?);
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// packages
// ============================================================================

/// Text or JSON listing of every package in `catalog`.
pub fn render_packages(catalog: &PackageCatalog, json: bool) -> CliResult<String> {
    if json {
        return to_json(catalog.packages());
    }
    if catalog.is_empty() {
        return Ok("no packages\n".to_string());
    }
    let mut out = String::new();
    for package in catalog.packages() {
        out.push_str(&format!("{} {} ({})\n", package.id, package.version, package.path.display()));
    }
    Ok(out)
}

pub fn list_packages(dir: Option<PathBuf>, json: bool) -> CliResult<ExitCode> {
    let mut config = HarnessConfig::from_env()?;
    if let Some(dir) = dir {
        config = config.with_packages_dir(dir);
    }
    let paths = load_paths(&config)?;
    let catalog = PackageCatalog::from_dir(paths.packages_dir())?;
    print!("{}", render_packages(&catalog, json)?);
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// cache
// ============================================================================

pub fn cache(action: CacheAction) -> CliResult<ExitCode> {
    let config = HarnessConfig::from_env()?;
    let paths = load_paths(&config)?;
    match action {
        CacheAction::Path => {}
        CacheAction::Clear => {
            let catalog = PackageCatalog::from_dir(paths.packages_dir())?;
            feed::clear_cache(&paths, &config, &catalog)?;
            eprintln!("cleared scratch area ({} package(s) in feed)", catalog.len());
        }
    }
    println!("{}", paths.temp_root().display());
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// build
// ============================================================================

/// Arguments of `buildtest build`.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    pub sample: String,
    pub project: Option<String>,
    pub targets: Vec<String>,
    pub properties: Vec<(String, String)>,
    pub engine: Option<String>,
    pub engine_args: Vec<String>,
    pub verbosity: Option<Severity>,
    pub root: Option<PathBuf>,
    pub json: bool,
}

/// Text summary of a finished build: every diagnostic, errors first, then the outcome.
pub fn render_result(result: &BuildResult) -> String {
    let mut out = String::new();
    for diagnostic in result.diagnostics() {
        out.push_str(&format!("{diagnostic}\n"));
    }
    out.push_str(&format!(
        "{}: {} error(s), {} warning(s)\n",
        result.overall(),
        result.errors().len(),
        result.warnings().len()
    ));
    out
}

pub fn build_sample(args: BuildArgs) -> CliResult<ExitCode> {
    let mut config = load_config(args.root)?;
    if let Some(verbosity) = args.verbosity {
        config = config.with_verbosity(verbosity);
    }
    let paths = load_paths(&config)?;

    let engine = match args.engine {
        Some(program) => ProcessEngine::with_program(program, args.engine_args),
        None => ProcessEngine::new(),
    };
    let mut harness = Harness::with_paths(config, paths, Arc::new(engine));
    // JSON goes to stdout; live diagnostics would interleave with it.
    if !args.json {
        harness = harness.with_output(Arc::new(StderrOutput));
    }

    let mut instance = match &args.project {
        Some(prefix) => harness.project_named(&args.sample, prefix)?,
        None => harness.project(&args.sample)?,
    };
    for (name, value) in args.properties {
        instance = instance.with_global_property(name, value);
    }
    tracing::info!(project = %instance.project_path().display(), "cloned project");

    let targets: Vec<&str> = if args.targets.is_empty() {
        vec![crate::engine::BUILD_TARGET]
    } else {
        args.targets.iter().map(String::as_str).collect()
    };
    let result = instance.build_with(&targets, BuildOptions::default())?;

    if args.json {
        println!("{}", to_json(&result)?);
    } else {
        print!("{}", render_result(&result));
    }

    Ok(if result.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::OverallResult;
    use buildtest_core::Diagnostic;
    use std::fs;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in ["Library/Library.csproj", "Library/tests/Library.Tests.csproj", "Tool/src/Tool/Tool.csproj"] {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "<Project />").unwrap();
        }
        dir
    }

    #[test]
    fn test_render_samples_text() {
        let dir = sample_tree();
        let catalog = SampleCatalog::from_root(dir.path()).unwrap();
        let text = render_samples(&catalog, false).unwrap();
        assert!(text.contains("Library (default: Library.csproj)\n  Library.csproj\n"));
        assert!(text.contains("Tool (default: Tool.csproj)\n"));
        // Only the three search locations count.
        assert!(!text.contains("Library.Tests"));
    }

    #[test]
    fn test_render_samples_json() {
        let dir = sample_tree();
        let catalog = SampleCatalog::from_root(dir.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&render_samples(&catalog, true).unwrap()).unwrap();
        assert_eq!(value[0]["name"], "Library");
        assert_eq!(value[1]["default_project"], "Tool.csproj");
    }

    #[test]
    fn test_render_empty_packages() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = PackageCatalog::from_dir(&dir.path().join("missing")).unwrap();
        assert_eq!(render_packages(&catalog, false).unwrap(), "no packages\n");
        assert_eq!(render_packages(&catalog, true).unwrap(), "[]");
    }

    #[test]
    fn test_render_result_lists_errors_first() {
        let result = BuildResult::new(
            OverallResult::Failure,
            vec![Diagnostic::error("CS1002", "; expected")],
            vec![Diagnostic::warning("CS0168", "unused")],
            Vec::new(),
            None,
        );
        let text = render_result(&result);
        let error_at = text.find("CS1002").unwrap();
        let warning_at = text.find("CS0168").unwrap();
        assert!(error_at < warning_at);
        assert!(text.ends_with("Failure: 1 error(s), 1 warning(s)\n"));
    }
}
