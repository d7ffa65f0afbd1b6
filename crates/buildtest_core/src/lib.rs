//! Diagnostic vocabulary shared by the buildtest harness and its callers.
//!
//! This crate holds the value types a build produces and a test asserts on:
//! severities, source spans and diagnostics, together with the total order used
//! to present them deterministically.
//!
//! ## Notes
//!
//! - This is a "value core" crate: **no IO**, no global state, no engine types.
//! - Enable the `serde` feature to serialize diagnostics (the CLI uses it for `--json`).

pub mod diagnostic;
pub mod severity;
pub mod span;

pub use diagnostic::{Diagnostic, merge_errors_first, sort_diagnostics};
pub use severity::{ParseSeverityError, Severity};
pub use span::{Position, TextSpan};
