//! Per-test-binary entry point.
//!
//! A [`Harness`] ties together the scratch-space layout, the sample catalog, the local
//! package feed and one build engine. Every lookup hands out a freshly cloned instance, so
//! tests never build the same working copy by accident.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::config::HarnessConfig;
use crate::engine::BuildEngine;
use crate::error::HarnessResult;
use crate::feed;
use crate::output::TestOutput;
use crate::packages::PackageCatalog;
use crate::paths::TestPaths;
use crate::project::{ProjectDescriptor, ProjectInstance};
use crate::sample::{Sample, SampleCatalog, SampleInstance};

pub struct Harness {
    config: HarnessConfig,
    paths: TestPaths,
    engine: Arc<dyn BuildEngine>,
    output: Option<Arc<dyn TestOutput>>,
    bootstrapped: Mutex<bool>,
    samples: OnceLock<SampleCatalog>,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("paths", &self.paths)
            .field("output", &self.output.is_some())
            .finish_non_exhaustive()
    }
}

impl Harness {
    /// Harness laid out for the running executable.
    pub fn new(config: HarnessConfig, engine: Arc<dyn BuildEngine>) -> HarnessResult<Self> {
        let paths = TestPaths::new(&config)?;
        Ok(Self::with_paths(config, paths, engine))
    }

    /// Harness over an explicit layout.
    pub fn with_paths(config: HarnessConfig, paths: TestPaths, engine: Arc<dyn BuildEngine>) -> Self {
        Self {
            config,
            paths,
            engine,
            output: None,
            bootstrapped: Mutex::new(false),
            samples: OnceLock::new(),
        }
    }

    /// Sink every instance handed out from now on forwards diagnostics to.
    pub fn with_output(mut self, output: Arc<dyn TestOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn paths(&self) -> &TestPaths {
        &self.paths
    }

    pub fn engine(&self) -> &Arc<dyn BuildEngine> {
        &self.engine
    }

    /// Reset the temp root and write the package feed files. Runs at most once per harness;
    /// later calls are no-ops. Every materializing lookup calls this first.
    pub fn bootstrap(&self) -> HarnessResult<()> {
        let mut done = self.bootstrapped.lock().unwrap_or_else(PoisonError::into_inner);
        if *done {
            return Ok(());
        }
        let packages = PackageCatalog::from_dir(self.paths.packages_dir())?;
        feed::clear_cache(&self.paths, &self.config, &packages)?;
        *done = true;
        tracing::info!(temp_root = %self.paths.temp_root().display(), packages = packages.len(), "harness ready");
        Ok(())
    }

    /// The sample catalog, discovered on first use.
    pub fn samples(&self) -> HarnessResult<&SampleCatalog> {
        if let Some(samples) = self.samples.get() {
            return Ok(samples);
        }
        let discovered = SampleCatalog::from_root(self.paths.samples_dir())?;
        Ok(self.samples.get_or_init(|| discovered))
    }

    pub fn sample(&self, name: &str) -> HarnessResult<&Sample> {
        self.samples()?.get(name)
    }

    /// A fresh clone of the sample's default project.
    pub fn project(&self, sample: &str) -> HarnessResult<ProjectInstance> {
        let descriptor = self.sample(sample)?.default_descriptor();
        self.materialize(&descriptor)
    }

    /// A fresh clone of the sample project whose name starts with `prefix`.
    pub fn project_named(&self, sample: &str, prefix: &str) -> HarnessResult<ProjectInstance> {
        let project = self.sample(sample)?.project_named(prefix)?.clone();
        self.materialize(&ProjectDescriptor::File(project))
    }

    /// A fresh clone of any descriptor, inline projects included.
    pub fn materialize(&self, descriptor: &ProjectDescriptor) -> HarnessResult<ProjectInstance> {
        self.bootstrap()?;
        let instance = descriptor
            .materialize(Arc::clone(&self.engine), &self.paths)?
            .with_verbosity(self.config.verbosity);
        Ok(match &self.output {
            Some(output) => instance.with_output(Arc::clone(output)),
            None => instance,
        })
    }

    /// A fresh clone of the whole sample with every project bound.
    pub fn sample_instance(&self, sample: &str) -> HarnessResult<SampleInstance> {
        let sample = self.sample(sample)?;
        self.bootstrap()?;
        let instance = sample
            .materialize(Arc::clone(&self.engine), &self.paths)?
            .with_verbosity(self.config.verbosity);
        Ok(match &self.output {
            Some(output) => instance.with_output(Arc::clone(output)),
            None => instance,
        })
    }
}
