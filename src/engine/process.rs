//! Out-of-process engine
//!
//! Runs an MSBuild-compatible command line (by default `dotnet msbuild`) once per request and
//! replays its console output as [`BuildEvent`]s. Lines in the canonical diagnostic format
//! become errors and warnings; every other stdout line is a normal-importance message and every
//! other stderr line a high-importance one. The process exit code decides the overall result.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use buildtest_core::TextSpan;
use regex::Regex;

use super::{
    BuildEngine, BuildEvent, BuildParameters, BuildRequest, DiagnosticEvent, EngineError, EngineOutcome,
    EngineProject, EventSource, MessageImportance, OverallResult, PathProject, RequestFlags, StatusKind,
};

/// `origin(location): [subcategory] error|warning CODE: text [project]`
///
/// `CODE` is letters followed by digits (`CS1002`, `MSB4018`) or absent (`error : text`), so
/// prose such as `error handling: enabled` is not taken for a diagnostic.
static CANONICAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?P<origin>.*?)(?:\((?P<location>[0-9,\-]+)\))?\s*:\s*)?(?:[^:]*?\s+)?(?P<kind>(?i:error|warning))\s+(?P<code>(?:[A-Za-z]+[0-9]+)?)\s*:\s*(?P<text>.*?)(?:\s+\[(?P<project>[^\]]+)\])?\s*$",
    )
    .expect("INVARIANT: canonical line pattern is a valid regex")
});

/// Engine that shells out to a build tool for every submission.
#[derive(Debug)]
pub struct ProcessEngine {
    program: String,
    leading_args: Vec<String>,
    events: EventSource,
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessEngine {
    /// `dotnet msbuild`.
    pub fn new() -> Self {
        Self::with_program("dotnet", ["msbuild"])
    }

    /// A custom tool. `leading_args` go before the generated arguments.
    pub fn with_program<I, S>(program: impl Into<String>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
            events: EventSource::new(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the tool for one submission, leading arguments included.
    pub fn command_line(&self, parameters: &BuildParameters, request: &BuildRequest) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.push(request.state.path.to_string_lossy().into_owned());
        args.push("-nologo".to_string());
        args.push("-consoleLoggerParameters:NoSummary".to_string());
        args.push(format!("-t:{}", request.targets.join(";")));
        if !parameters.enable_node_reuse {
            args.push("-nodeReuse:false".to_string());
        }
        if let Some(count) = parameters.max_node_count {
            args.push(format!("-m:{count}"));
        }

        // Project-level globals win over session-level ones.
        let mut properties: BTreeMap<&str, &str> = BTreeMap::new();
        for (name, value) in &parameters.global_properties {
            properties.insert(name, value);
        }
        for (name, value) in &request.state.global_properties {
            properties.insert(name, value);
        }
        for (name, value) in properties {
            args.push(format!("-p:{name}={}", value.replace(';', "%3B")));
        }
        args
    }
}

impl BuildEngine for ProcessEngine {
    fn event_source(&self) -> &EventSource {
        &self.events
    }

    fn load_project(
        &self,
        path: &Path,
        global_properties: &BTreeMap<String, String>,
    ) -> Result<Box<dyn EngineProject>, EngineError> {
        if !path.is_file() {
            return Err(EngineError::Load {
                path: path.to_path_buf(),
                message: "project file does not exist".to_string(),
            });
        }
        Ok(Box::new(PathProject::new(path, global_properties.clone())))
    }

    #[tracing::instrument(skip_all, fields(program = %self.program, targets = ?request.targets))]
    fn build(&self, parameters: &BuildParameters, request: BuildRequest) -> Result<EngineOutcome, EngineError> {
        if request.flags.contains(RequestFlags::PROVIDE_PROJECT_STATE_AFTER_BUILD) {
            tracing::debug!("out-of-process builds never return a project snapshot");
        }

        let args = self.command_line(parameters, &request);
        let mut command = Command::new(&self.program);
        command.args(&args);
        if let Some(dir) = request.state.path.parent() {
            command.current_dir(dir);
        }

        self.events.raise(&BuildEvent::status(StatusKind::BuildStarted, "Build started."));
        let output = command.output().map_err(|source| EngineError::Launch {
            program: self.program.clone(),
            source,
        })?;

        let mut errors = 0usize;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let event = parse_line(line).unwrap_or_else(|| BuildEvent::message(MessageImportance::NORMAL, line));
            if matches!(event, BuildEvent::Error(_)) {
                errors += 1;
            }
            self.events.raise(&event);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            let event = parse_line(line).unwrap_or_else(|| BuildEvent::message(MessageImportance::HIGH, line));
            if matches!(event, BuildEvent::Error(_)) {
                errors += 1;
            }
            self.events.raise(&event);
        }

        let overall = if output.status.success() && errors == 0 {
            OverallResult::Success
        } else {
            OverallResult::Failure
        };
        let summary = match overall {
            OverallResult::Success => "Build succeeded.",
            OverallResult::Failure => "Build FAILED.",
        };
        self.events.raise(&BuildEvent::status(StatusKind::BuildFinished, summary));
        tracing::debug!(status = ?output.status.code(), errors, "build tool exited");

        Ok(EngineOutcome {
            overall,
            project_state_after_build: None,
        })
    }
}

/// Parse one console line in the canonical error/warning format.
pub fn parse_line(line: &str) -> Option<BuildEvent> {
    let caps = CANONICAL_LINE.captures(line)?;

    let mut event = DiagnosticEvent::new(&caps["code"], &caps["text"]);
    if let Some(origin) = caps.name("origin").map(|m| m.as_str().trim()) {
        if !origin.is_empty() {
            event = event.with_file(origin);
        }
    }
    if let Some(location) = caps.name("location") {
        event = event.with_span(parse_location(location.as_str()));
    }
    if let Some(project) = caps.name("project") {
        // `App.csproj::TargetFramework=net8.0` names the inner build.
        let project = project.as_str();
        let path = project.split_once("::").map_or(project, |(path, _)| path);
        event = event.with_project(path);
    }

    if caps["kind"].eq_ignore_ascii_case("error") {
        Some(BuildEvent::Error(event))
    } else {
        Some(BuildEvent::Warning(event))
    }
}

/// `l`, `l-el`, `l,c`, `l,c-ec` or `l,c,el,ec`. Anything else is an empty span.
fn parse_location(location: &str) -> TextSpan {
    fn range(part: &str) -> Option<(u32, Option<u32>)> {
        match part.split_once('-') {
            Some((start, end)) => Some((start.parse().ok()?, Some(end.parse().ok()?))),
            None => Some((part.parse().ok()?, None)),
        }
    }

    let parts: Vec<&str> = location.split(',').collect();
    let span = match parts.as_slice() {
        [lines] => range(lines).map(|(line, end_line)| TextSpan::from_coords(line, 0, end_line.unwrap_or(0), 0)),
        [line, columns] => line.parse().ok().and_then(|line| {
            range(columns).map(|(column, end_column)| match end_column {
                Some(end_column) => TextSpan::from_coords(line, column, line, end_column),
                None => TextSpan::from_coords(line, column, 0, 0),
            })
        }),
        [line, column, end_line, end_column] => full_span(line, column, end_line, end_column),
        _ => None,
    };
    span.unwrap_or_default()
}

fn full_span(line: &str, column: &str, end_line: &str, end_column: &str) -> Option<TextSpan> {
    Some(TextSpan::from_coords(
        line.parse().ok()?,
        column.parse().ok()?,
        end_line.parse().ok()?,
        end_column.parse().ok()?,
    ))
}
