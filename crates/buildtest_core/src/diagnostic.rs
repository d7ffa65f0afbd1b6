//! Diagnostics captured from a build and the order they are presented in.
//!
//! A [`Diagnostic`] is produced from exactly one engine event. Engines emit events in
//! temporal order, which differs between runs; consumers sort with [`sort_diagnostics`]
//! so assertions and diffs stay stable.

use std::cmp::Ordering;
use std::fmt;

use crate::severity::Severity;
use crate::span::TextSpan;

/// A single error, warning or message raised while building a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    pub severity: Severity,
    /// Tool-defined identifier such as `CS0168` or `NU1101`. May be empty.
    pub code: String,
    pub message: Option<String>,
    /// File the diagnostic was raised against.
    pub file: Option<String>,
    pub span: TextSpan,
    /// Project that was being built when the diagnostic was raised.
    pub project: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: None,
            file: None,
            span: TextSpan::default(),
            project: None,
        }
    }

    pub fn critical(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, code).with_message(message)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code).with_message(message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code).with_message(message)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Informational, code).with_message(message)
    }

    pub fn verbose(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Verbose, code).with_message(message)
    }

    pub fn diag(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Diagnostic, code).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_span(mut self, span: impl Into<TextSpan>) -> Self {
        self.span = span.into();
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Critical | Severity::Error)
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl Ord for Diagnostic {
    /// Severity, then project, then code, then message, then file, then span.
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity
            .cmp(&other.severity)
            .then_with(|| self.project.cmp(&other.project))
            .then_with(|| self.code.cmp(&other.code))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.file.cmp(&other.file))
            .then_with(|| self.span.cmp(&other.span))
    }
}

impl PartialOrd for Diagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity.abbreviation(), self.code)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        write!(
            f,
            " @ {}({}) [{}]",
            self.file.as_deref().unwrap_or(""),
            self.span,
            self.project.as_deref().unwrap_or("")
        )
    }
}

/// Sort diagnostics into presentation order (stable).
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort();
}

/// Merge two independently sorted lists so that every error precedes every warning.
///
/// Each list is sorted on its own; the merge never interleaves them.
pub fn merge_errors_first(errors: &[Diagnostic], warnings: &[Diagnostic]) -> Vec<Diagnostic> {
    let mut sorted_errors = errors.to_vec();
    let mut sorted_warnings = warnings.to_vec();
    sort_diagnostics(&mut sorted_errors);
    sort_diagnostics(&mut sorted_warnings);
    sorted_errors.extend(sorted_warnings);
    sorted_errors
}
