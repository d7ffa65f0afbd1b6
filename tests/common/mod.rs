//! Shared fixtures for integration tests: a scripted engine and sample trees on disk.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use buildtest::engine::{
    BuildEngine, BuildEvent, BuildParameters, BuildRequest, EngineError, EngineOutcome, EngineProject, EventSource,
    OverallResult, PathProject, ProjectState, RESTORE_TARGET, RequestFlags,
};
use buildtest::{HarnessConfig, TestPaths};

/// What the engine does for one kind of request.
#[derive(Debug, Clone)]
pub struct Script {
    pub events: Vec<BuildEvent>,
    pub overall: OverallResult,
    pub snapshot: Option<ProjectState>,
    pub fail: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            overall: OverallResult::Success,
            snapshot: None,
            fail: None,
        }
    }
}

/// Everything the engine saw for one submission.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: PathBuf,
    pub targets: Vec<String>,
    pub global_properties: BTreeMap<String, String>,
    pub flags: RequestFlags,
    pub parameters: BuildParameters,
    pub has_host_services: bool,
    /// Subscribers on the event source while the build ran.
    pub subscribers: usize,
    pub project_existed: bool,
}

/// Engine that records every request and replays configured events.
///
/// Restore requests follow `restore`, everything else follows `build`. The snapshot is only
/// returned when the request asks for it.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    events: EventSource,
    restore: Mutex<Script>,
    build: Mutex<Script>,
    requests: Mutex<Vec<Recorded>>,
    loads: Mutex<Vec<PathBuf>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_build(build: Script) -> Arc<Self> {
        let engine = Self::default();
        *engine.build.lock().unwrap() = build;
        Arc::new(engine)
    }

    pub fn set_build(&self, build: Script) {
        *self.build.lock().unwrap() = build;
    }

    pub fn set_restore(&self, restore: Script) {
        *self.restore.lock().unwrap() = restore;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn target_lists(&self) -> Vec<Vec<String>> {
        self.requests().into_iter().map(|r| r.targets).collect()
    }

    pub fn loads(&self) -> Vec<PathBuf> {
        self.loads.lock().unwrap().clone()
    }

    pub fn event_source_subscribers(&self) -> usize {
        self.events.subscriber_count()
    }
}

impl BuildEngine for ScriptedEngine {
    fn event_source(&self) -> &EventSource {
        &self.events
    }

    fn load_project(
        &self,
        path: &Path,
        global_properties: &BTreeMap<String, String>,
    ) -> Result<Box<dyn EngineProject>, EngineError> {
        self.loads.lock().unwrap().push(path.to_path_buf());
        Ok(Box::new(PathProject::new(path, global_properties.clone())))
    }

    fn build(&self, parameters: &BuildParameters, request: BuildRequest) -> Result<EngineOutcome, EngineError> {
        self.requests.lock().unwrap().push(Recorded {
            path: request.state.path.clone(),
            targets: request.targets.clone(),
            global_properties: request.state.global_properties.clone(),
            flags: request.flags,
            parameters: parameters.clone(),
            has_host_services: request.host_services.is_some(),
            subscribers: self.events.subscriber_count(),
            project_existed: request.state.path.is_file(),
        });

        let script = if request.targets.iter().any(|t| t == RESTORE_TARGET) {
            self.restore.lock().unwrap().clone()
        } else {
            self.build.lock().unwrap().clone()
        };
        for event in &script.events {
            self.events.raise(event);
        }
        if let Some(message) = script.fail {
            return Err(EngineError::Internal { message });
        }

        let wants_state = request.flags.contains(RequestFlags::PROVIDE_PROJECT_STATE_AFTER_BUILD);
        Ok(EngineOutcome {
            overall: script.overall,
            project_state_after_build: if wants_state { script.snapshot } else { None },
        })
    }
}

/// Write `<Project />` at every relative path under `root`.
pub fn write_projects(root: &Path, files: &[&str]) {
    for file in files {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<Project />").unwrap();
    }
}

/// A test root with `samples/` and `packages/` plus scratch space, all under one temp dir.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub config: HarnessConfig,
    pub paths: TestPaths,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let test_root = dir.path().join("bin");
        fs::create_dir_all(test_root.join("samples")).unwrap();
        let config = HarnessConfig::default().with_namespace("buildtest-it");
        let paths = TestPaths::for_test_root(&config, &test_root, dir.path().join("tmp"));
        Self { dir, config, paths }
    }

    pub fn samples_dir(&self) -> &Path {
        self.paths.samples_dir()
    }

    pub fn add_sample(&self, name: &str, files: &[&str]) -> PathBuf {
        let root = self.samples_dir().join(name);
        write_projects(&root, files);
        root
    }
}
