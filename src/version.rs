//! Harness version reported by the CLI.
//!
//! Taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.

/// The buildtest version string (for example, `0.3.0`).
pub const BUILDTEST_VERSION: &str = env!("CARGO_PKG_VERSION");
