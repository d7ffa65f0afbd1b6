//! Line-oriented sinks for live build output.
//!
//! The harness only ever writes to a sink. Which sink a test uses decides where forwarded
//! diagnostics and status lines show up.

use std::fmt;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

pub trait TestOutput: Send + Sync {
    fn write_line(&self, line: &str);

    fn write_fmt_line(&self, args: fmt::Arguments<'_>) {
        self.write_line(&args.to_string());
    }
}

/// Writes to stderr; visible under `cargo test -- --nocapture`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrOutput;

impl TestOutput for StderrOutput {
    fn write_line(&self, line: &str) {
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

/// Forwards every line as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOutput;

impl TestOutput for TracingOutput {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "buildtest::output", "{}", line);
    }
}

/// Buffers lines for later assertions.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    lines: Mutex<Vec<String>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TestOutput for MemoryOutput {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}
