//! The closed six-level severity taxonomy.

use std::fmt;
use std::str::FromStr;

/// Severity of a captured diagnostic, from most severe to most verbose.
///
/// The derived ordering follows declaration order, so `Critical < Error < ... < Diagnostic`.
/// Sorting ascending therefore puts the most severe diagnostics first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    /// Events which leave the build in an irrecoverable state.
    Critical = 1,
    /// Events which terminate some paths due to failure.
    Error = 2,
    /// Events which are unexpected.
    Warning = 3,
    /// Events which document the state of the build.
    Informational = 4,
    /// Events which carry more detail about the build's current state.
    Verbose = 5,
    /// Events which carry the most detail about the build's current state.
    Diagnostic = 6,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Informational,
        Severity::Verbose,
        Severity::Diagnostic,
    ];

    /// Three-letter tag used in rendered diagnostics.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Severity::Critical => "CRT",
            Severity::Error => "ERR",
            Severity::Warning => "WRN",
            Severity::Informational => "INF",
            Severity::Verbose => "VRB",
            Severity::Diagnostic => "DBG",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Informational => "info",
            Severity::Verbose => "verbose",
            Severity::Diagnostic => "diagnostic",
        }
    }

    /// Whether `self` is at least as severe as `threshold`.
    ///
    /// A threshold of `Informational` lets critical, error, warning and informational
    /// diagnostics through and drops verbose and diagnostic-level ones.
    pub fn meets(self, threshold: Severity) -> bool {
        self <= threshold
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSeverityError {
    pub input: String,
}

impl fmt::Display for ParseSeverityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown severity '{}' (expected one of: critical, error, warning, info, verbose, diagnostic)",
            self.input
        )
    }
}

impl std::error::Error for ParseSeverityError {}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" | "crit" | "crt" => Ok(Severity::Critical),
            "error" | "err" => Ok(Severity::Error),
            "warning" | "warn" | "wrn" => Ok(Severity::Warning),
            "info" | "information" | "informational" | "inf" => Ok(Severity::Informational),
            "verbose" | "vrb" => Ok(Severity::Verbose),
            "diagnostic" | "diag" | "debug" | "dbg" => Ok(Severity::Diagnostic),
            _ => Err(ParseSeverityError { input: s.to_string() }),
        }
    }
}
