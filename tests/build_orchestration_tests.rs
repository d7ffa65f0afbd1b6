//! Build orchestration against a scripted engine: restore-once, isolation, capture lifetime
//! and result aggregation.

mod common;

use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use buildtest::engine::{
    BuildEvent, DiagnosticEvent, EngineError, MessageImportance, OverallResult, ProjectItem, ProjectState,
    RequestFlags, StatusKind,
};
use buildtest::output::MemoryOutput;
use buildtest::{
    BuildOptions, HarnessConfig, HarnessError, ProjectDescriptor, ProjectInstance, Severity, TestPaths, TextSpan,
};
use common::{Script, ScriptedEngine, write_projects};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Digest over every relative path and file content under `root`, in walk order.
fn tree_digest(root: &std::path::Path) -> String {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(root).unwrap();
        hasher.update(relative.to_string_lossy().as_bytes());
        if entry.file_type().is_file() {
            hasher.update(fs::read(entry.path()).unwrap());
        }
    }
    hex::encode(hasher.finalize())
}

fn inline_instance(engine: &Arc<ScriptedEngine>, dir: &tempfile::TempDir) -> ProjectInstance {
    ProjectDescriptor::inline("App.csproj", "<Project Sdk=\"Microsoft.NET.Sdk\" />")
        .unwrap()
        .materialize_into(engine.clone(), dir.path().join("clone"))
        .unwrap()
}

fn targets(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

// ============================================================================
// Restore
// ============================================================================

#[test]
fn first_build_restores_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let mut instance = inline_instance(&engine, &dir);

    assert!(!instance.is_restored());
    instance.build().unwrap();
    instance.build().unwrap();

    assert!(instance.is_restored());
    assert_eq!(
        engine.target_lists(),
        vec![targets(&["Restore"]), targets(&["Build"]), targets(&["Build"])]
    );
}

#[test]
fn reclone_restores_again() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let mut instance = inline_instance(&engine, &dir);

    instance.build().unwrap();
    instance.reclone().unwrap();
    assert!(!instance.is_restored());
    instance.build().unwrap();

    assert_eq!(
        engine.target_lists(),
        vec![targets(&["Restore"]), targets(&["Build"]), targets(&["Restore"]), targets(&["Build"])]
    );
}

#[test]
fn failed_restore_still_builds_and_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    engine.set_restore(Script {
        events: vec![BuildEvent::Error(DiagnosticEvent::new("NU1101", "Unable to find package"))],
        overall: OverallResult::Failure,
        ..Script::default()
    });
    let mut instance = inline_instance(&engine, &dir);

    let restore = instance.restore().unwrap().unwrap();
    assert!(!restore.succeeded());
    assert_eq!(restore.errors()[0].code, "NU1101");
    assert!(instance.restore().unwrap().is_none());

    // The restore diagnostics do not leak into the build result.
    let result = instance.build().unwrap();
    assert!(result.succeeded());
    assert!(result.errors().is_empty());
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn engine_only_sees_the_clone() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("samples").join("Library");
    write_projects(&source, &["Library.csproj", "Nested/Helper.cs"]);
    let engine = ScriptedEngine::new();

    let mut instance = ProjectDescriptor::file(source.join("Library.csproj"))
        .unwrap()
        .materialize_into(engine.clone(), dir.path().join("clone"))
        .unwrap();
    assert!(instance.directory().join("Nested").join("Helper.cs").is_file());

    instance.build().unwrap();
    for request in engine.requests() {
        assert_eq!(request.path, instance.project_path());
        assert!(request.project_existed);
    }
    assert!(engine.loads().iter().all(|p| !p.starts_with(&source)));

    fs::write(instance.project_path(), "<Project><!-- edited --></Project>").unwrap();
    assert_eq!(fs::read_to_string(source.join("Library.csproj")).unwrap(), "<Project />");
}

#[test]
fn building_never_touches_the_source_tree() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("samples").join("Library");
    write_projects(&source, &["Library.csproj", "src/Lib.cs", "Directory.Build.props"]);
    let before = tree_digest(&source);

    let engine = ScriptedEngine::new();
    let paths = TestPaths::for_test_root(&HarnessConfig::default(), dir.path().join("bin"), dir.path().join("tmp"));
    let mut instance = ProjectDescriptor::file(source.join("Library.csproj"))
        .unwrap()
        .materialize(engine.clone(), &paths)
        .unwrap();
    assert!(instance.directory().starts_with(paths.project_cache()));
    instance.build().unwrap();
    fs::write(instance.directory().join("src").join("Lib.cs"), "changed").unwrap();

    assert_eq!(tree_digest(&source), before);
}

#[test]
fn cloning_twice_leaves_no_stale_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("samples").join("Library");
    write_projects(&source, &["Library.csproj", "src/Lib.cs"]);
    let descriptor = ProjectDescriptor::file(source.join("Library.csproj")).unwrap();
    let engine = ScriptedEngine::new();
    let target = dir.path().join("clone");

    let first = descriptor.materialize_into(engine.clone(), &target).unwrap();
    let first_digest = tree_digest(first.directory());
    fs::write(target.join("stale.txt"), "left over").unwrap();

    let second = descriptor.materialize_into(engine.clone(), &target).unwrap();
    assert!(!target.join("stale.txt").exists());
    assert_eq!(tree_digest(second.directory()), first_digest);
}

#[test]
fn build_after_delete_clones_again() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let mut instance = inline_instance(&engine, &dir);

    instance.delete().unwrap();
    assert!(!instance.directory().exists());
    // Deleting twice is fine.
    instance.delete().unwrap();

    instance.build().unwrap();
    assert!(instance.project_path().is_file());
    assert!(engine.requests().iter().all(|r| r.project_existed));
}

// ============================================================================
// Capture lifetime
// ============================================================================

#[test]
fn capture_is_attached_only_while_building() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let mut instance = inline_instance(&engine, &dir);

    instance.build().unwrap();
    assert!(engine.requests().iter().all(|r| r.subscribers == 4));
    assert_eq!(engine.event_source_subscribers(), 0);
}

#[test]
fn engine_failure_propagates_and_detaches() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let mut instance = inline_instance(&engine, &dir);
    instance.restore().unwrap();
    engine.set_build(Script {
        fail: Some("node crashed".to_string()),
        ..Script::default()
    });

    let err = instance.build().unwrap_err();
    assert!(matches!(err, HarnessError::Engine(EngineError::Internal { message }) if message == "node crashed"));
    assert_eq!(engine.event_source_subscribers(), 0);
}

#[test]
fn unsupported_importance_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let mut instance = inline_instance(&engine, &dir);
    instance.restore().unwrap();
    engine.set_build(Script {
        events: vec![
            BuildEvent::message(MessageImportance(7), "odd"),
            BuildEvent::message(MessageImportance(9), "odder"),
        ],
        ..Script::default()
    });

    let err = instance.build().unwrap_err();
    assert!(matches!(err, HarnessError::UnsupportedImportance { importance } if importance == MessageImportance(7)));
    assert_eq!(engine.event_source_subscribers(), 0);
}

// ============================================================================
// Results
// ============================================================================

#[test]
fn diagnostics_are_sorted_errors_first() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::with_build(Script {
        events: vec![
            BuildEvent::Warning(DiagnosticEvent::new("CS0168", "unused").with_file("b.cs")),
            BuildEvent::Error(DiagnosticEvent::new("CS1002", "; expected").with_file("b.cs")),
            BuildEvent::Error(
                DiagnosticEvent::new("CS1002", "; expected")
                    .with_file("a.cs")
                    .with_span(TextSpan::from_coords(3, 1, 3, 2)),
            ),
            BuildEvent::message(MessageImportance::HIGH, "App -> /out/App.dll"),
            BuildEvent::message(MessageImportance::LOW, "detail"),
        ],
        overall: OverallResult::Failure,
        ..Script::default()
    });
    let mut instance = inline_instance(&engine, &dir);

    let result = instance.build().unwrap();
    assert_eq!(result.overall(), OverallResult::Failure);
    let files: Vec<_> = result.errors().iter().map(|d| d.file.as_deref().unwrap()).collect();
    assert_eq!(files, vec!["a.cs", "b.cs"]);
    assert_eq!(result.warnings().len(), 1);
    assert_eq!(result.messages().len(), 1);

    let severities: Vec<_> = result.diagnostics().iter().map(|d| d.severity).collect();
    assert_eq!(severities, vec![Severity::Error, Severity::Error, Severity::Warning]);
}

#[test]
fn snapshot_properties_are_overlaid_by_globals() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = ProjectState::new("/clone/App.csproj")
        .with_property("Configuration", "Debug")
        .with_property("OutputPath", "bin/")
        .with_global_property("Configuration", "Release")
        .with_item(ProjectItem::new("Compile", "Program.cs"))
        .with_item(ProjectItem::new("PackageReference", "Contoso.Core").with_metadata("Version", "1.2.0"))
        .with_item(ProjectItem::new("Compile", "Util.cs"));
    let engine = ScriptedEngine::with_build(Script {
        snapshot: Some(snapshot),
        ..Script::default()
    });
    let mut instance = inline_instance(&engine, &dir);

    let options = BuildOptions::new().with_flags(RequestFlags::PROVIDE_PROJECT_STATE_AFTER_BUILD);
    let result = instance.build_with(&["Build"], options).unwrap();

    assert_eq!(result.property("Configuration"), Some("Release"));
    assert_eq!(result.property("OutputPath"), Some("bin/"));
    let compile: Vec<_> = result.items_of("Compile").iter().map(|i| i.identity.as_str()).collect();
    assert_eq!(compile, vec!["Program.cs", "Util.cs"]);
    assert_eq!(
        result.untyped_items()["PackageReference"][0].metadata.get("Version").map(String::as_str),
        Some("1.2.0")
    );
}

#[test]
fn no_snapshot_means_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::with_build(Script {
        snapshot: Some(ProjectState::new("/clone/App.csproj").with_property("A", "1")),
        ..Script::default()
    });
    let mut instance = inline_instance(&engine, &dir);

    // The snapshot was not requested.
    let result = instance.build().unwrap();
    assert!(result.properties().is_empty());
    assert!(result.items().is_empty());
    assert!(result.items_of("Compile").is_empty());
}

// ============================================================================
// Targets and request shaping
// ============================================================================

#[test]
fn pack_and_publish_build_first() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let mut instance = inline_instance(&engine, &dir);

    instance.pack(BuildOptions::default()).unwrap();
    instance.publish(BuildOptions::default()).unwrap();

    assert_eq!(
        engine.target_lists(),
        vec![targets(&["Restore"]), targets(&["Build", "Pack"]), targets(&["Build", "Publish"])]
    );
}

#[test]
fn hooks_shape_the_submission() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let mut instance = inline_instance(&engine, &dir).with_global_property("Configuration", "Release");
    let services: Arc<dyn Any + Send + Sync> = Arc::new(42u32);

    let options = BuildOptions::new()
        .with_flags(RequestFlags::CLEAR_CACHES_AFTER_BUILD)
        .with_host_services(services)
        .configure_state(|state| {
            state.global_properties.insert("ContinuousIntegrationBuild".into(), "true".into());
        })
        .configure_parameters(|parameters| {
            parameters.enable_node_reuse = false;
            parameters.max_node_count = Some(1);
        })
        .configure_request(|request| request.targets.push("Test".to_string()));
    instance.build_with(&["Build"], options).unwrap();

    let requests = engine.requests();
    let restore = &requests[0];
    assert_eq!(restore.flags, RequestFlags::NONE);
    assert!(restore.parameters.enable_node_reuse);
    assert_eq!(restore.global_properties.get("Configuration").map(String::as_str), Some("Release"));

    let build = &requests[1];
    assert_eq!(build.targets, targets(&["Build", "Test"]));
    assert_eq!(build.flags, RequestFlags::CLEAR_CACHES_AFTER_BUILD);
    assert!(build.has_host_services);
    assert!(!build.parameters.enable_node_reuse);
    assert_eq!(build.parameters.max_node_count, Some(1));
    let mut expected = BTreeMap::new();
    expected.insert("Configuration".to_string(), "Release".to_string());
    expected.insert("ContinuousIntegrationBuild".to_string(), "true".to_string());
    assert_eq!(build.global_properties, expected);
}

// ============================================================================
// Live output
// ============================================================================

#[test]
fn output_receives_status_and_diagnostics_above_verbosity() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::with_build(Script {
        events: vec![
            BuildEvent::status(StatusKind::BuildStarted, "Build started."),
            BuildEvent::Warning(DiagnosticEvent::new("CS0168", "unused")),
            BuildEvent::message(MessageImportance::HIGH, "App -> /out/App.dll"),
        ],
        ..Script::default()
    });
    let output = Arc::new(MemoryOutput::new());
    let mut instance = inline_instance(&engine, &dir)
        .with_output(output.clone())
        .with_verbosity(Severity::Warning);

    instance.build().unwrap();
    let lines = output.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Build started.");
    assert!(lines[1].contains("CS0168"));
}
