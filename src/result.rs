//! The immutable outcome of one build call.

use std::collections::BTreeMap;

use buildtest_core::{Diagnostic, merge_errors_first, sort_diagnostics};
use serde::Serialize;

use crate::capture::DiagnosticCapture;
use crate::engine::{EngineOutcome, OverallResult, ProjectItem, ProjectState};

/// An item with its type erased; the type is the key it is grouped under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UntypedItem {
    pub identity: String,
    pub metadata: BTreeMap<String, String>,
}

impl From<&ProjectItem> for UntypedItem {
    fn from(item: &ProjectItem) -> Self {
        Self {
            identity: item.identity.clone(),
            metadata: item.metadata.clone(),
        }
    }
}

/// Diagnostics plus the evaluated state read back after the build.
///
/// Errors, warnings and messages are each sorted by the diagnostic total order, so assertions
/// do not depend on the order the engine emitted them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    overall: OverallResult,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    messages: Vec<Diagnostic>,
    properties: BTreeMap<String, String>,
    items: BTreeMap<String, Vec<ProjectItem>>,
}

impl BuildResult {
    /// Assemble a result from a detached capture and the engine outcome.
    pub fn from_capture(capture: &DiagnosticCapture, outcome: EngineOutcome) -> Self {
        Self::new(
            outcome.overall,
            capture.errors(),
            capture.warnings(),
            capture.messages(),
            outcome.project_state_after_build.as_ref(),
        )
    }

    pub fn new(
        overall: OverallResult,
        mut errors: Vec<Diagnostic>,
        mut warnings: Vec<Diagnostic>,
        mut messages: Vec<Diagnostic>,
        snapshot: Option<&ProjectState>,
    ) -> Self {
        sort_diagnostics(&mut errors);
        sort_diagnostics(&mut warnings);
        sort_diagnostics(&mut messages);

        let (properties, items) = match snapshot {
            Some(state) => (collect_properties(state), group_items(&state.items)),
            None => (BTreeMap::new(), BTreeMap::new()),
        };

        Self {
            overall,
            errors,
            warnings,
            messages,
            properties,
            items,
        }
    }

    pub fn overall(&self) -> OverallResult {
        self.overall
    }

    pub fn succeeded(&self) -> bool {
        self.overall.is_success()
    }

    /// Errors followed by warnings.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        merge_errors_first(&self.errors, &self.warnings)
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    /// Evaluated properties with global properties overlaid.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Items grouped by item type, in snapshot order within each type.
    pub fn items(&self) -> &BTreeMap<String, Vec<ProjectItem>> {
        &self.items
    }

    pub fn items_of(&self, item_type: &str) -> &[ProjectItem] {
        self.items.get(item_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Same grouping as [`BuildResult::items`] with the type erased from each item.
    pub fn untyped_items(&self) -> BTreeMap<String, Vec<UntypedItem>> {
        self.items
            .iter()
            .map(|(item_type, items)| (item_type.clone(), items.iter().map(UntypedItem::from).collect()))
            .collect()
    }
}

fn collect_properties(state: &ProjectState) -> BTreeMap<String, String> {
    let mut properties: BTreeMap<String, String> = state.properties.iter().cloned().collect();
    for (name, value) in &state.global_properties {
        properties.insert(name.clone(), value.clone());
    }
    properties
}

fn group_items(items: &[ProjectItem]) -> BTreeMap<String, Vec<ProjectItem>> {
    let mut grouped: BTreeMap<String, Vec<ProjectItem>> = BTreeMap::new();
    for item in items {
        grouped.entry(item.item_type.clone()).or_default().push(item.clone());
    }
    grouped
}
