//! Diagnostic capture for a single build call.
//!
//! A capture moves through `Uninitialized -> Attached -> Detached`. While attached it
//! translates engine events into [`Diagnostic`]s:
//!
//! - errors and warnings are always retained
//! - messages map High/Normal/Low importance to Informational/Verbose/Diagnostic severity and
//!   are retained only at High importance
//! - status events are forwarded verbatim when they carry a message
//!
//! Independently of retention, every diagnostic at or above the configured verbosity is
//! forwarded to the test output sink.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use buildtest_core::{Diagnostic, Severity};

use crate::engine::{BuildEvent, EventKind, EventSource, MessageImportance, SubscriptionId};
use crate::error::{HarnessError, HarnessResult};
use crate::output::TestOutput;

#[derive(Debug, Default)]
struct CaptureLog {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    messages: Vec<Diagnostic>,
    /// First message raised with an importance outside High/Normal/Low.
    unsupported: Option<MessageImportance>,
}

#[derive(Debug)]
enum Phase {
    Uninitialized,
    Attached(Vec<SubscriptionId>),
    Detached,
}

/// Collects the diagnostics an engine raises while it is attached.
pub struct DiagnosticCapture {
    log: Arc<Mutex<CaptureLog>>,
    output: Option<Arc<dyn TestOutput>>,
    verbosity: Severity,
    phase: Phase,
}

impl std::fmt::Debug for DiagnosticCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticCapture")
            .field("verbosity", &self.verbosity)
            .field("phase", &self.phase)
            .field("has_output", &self.output.is_some())
            .finish()
    }
}

impl Default for DiagnosticCapture {
    fn default() -> Self {
        Self::new(Severity::Informational)
    }
}

impl DiagnosticCapture {
    pub fn new(verbosity: Severity) -> Self {
        Self {
            log: Arc::new(Mutex::new(CaptureLog::default())),
            output: None,
            verbosity,
            phase: Phase::Uninitialized,
        }
    }

    pub fn with_output(mut self, output: Arc<dyn TestOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn verbosity(&self) -> Severity {
        self.verbosity
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.phase, Phase::Attached(_))
    }

    /// Subscribe to `source`. A capture attaches at most once.
    pub fn attach(&mut self, source: &EventSource) -> HarnessResult<()> {
        match self.phase {
            Phase::Uninitialized => {}
            Phase::Attached(_) => return Err(HarnessError::InvalidCaptureState { state: "attached" }),
            Phase::Detached => return Err(HarnessError::InvalidCaptureState { state: "detached" }),
        }

        let ids = [EventKind::Error, EventKind::Warning, EventKind::Message, EventKind::Status]
            .into_iter()
            .map(|kind| {
                let log = Arc::clone(&self.log);
                let output = self.output.clone();
                let verbosity = self.verbosity;
                source.subscribe(kind, move |event| record(&log, output.as_deref(), verbosity, event))
            })
            .collect();
        self.phase = Phase::Attached(ids);
        Ok(())
    }

    /// Unsubscribe from `source`. A no-op unless attached.
    pub fn detach(&mut self, source: &EventSource) {
        if let Phase::Attached(ids) = &self.phase {
            for id in ids {
                source.unsubscribe(*id);
            }
            self.phase = Phase::Detached;
        }
    }

    /// Attach to `source` until the returned guard is dropped.
    pub fn scoped<'a>(&'a mut self, source: &'a EventSource) -> HarnessResult<CaptureGuard<'a>> {
        self.attach(source)?;
        Ok(CaptureGuard { capture: self, source })
    }

    /// Retained errors in arrival order.
    pub fn errors(&self) -> Vec<Diagnostic> {
        self.lock().errors.clone()
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.lock().warnings.clone()
    }

    /// High-importance messages in arrival order.
    pub fn messages(&self) -> Vec<Diagnostic> {
        self.lock().messages.clone()
    }

    /// Error for the first unsupported message importance seen, if any.
    pub fn contract_violation(&self) -> Option<HarnessError> {
        self.lock()
            .unsupported
            .map(|importance| HarnessError::UnsupportedImportance { importance })
    }

    fn lock(&self) -> MutexGuard<'_, CaptureLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a capture attached; detaches on drop, including during unwinding.
pub struct CaptureGuard<'a> {
    capture: &'a mut DiagnosticCapture,
    source: &'a EventSource,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.capture.detach(self.source);
    }
}

fn record(log: &Mutex<CaptureLog>, output: Option<&dyn TestOutput>, verbosity: Severity, event: &BuildEvent) {
    let forward = |diagnostic: &Diagnostic| {
        if let Some(output) = output {
            if diagnostic.severity.meets(verbosity) {
                output.write_line(&diagnostic.to_string());
            }
        }
    };

    match event {
        BuildEvent::Status(status) => {
            if let (Some(output), Some(message)) = (output, &status.message) {
                output.write_line(message);
            }
        }
        BuildEvent::Error(e) => {
            let diagnostic = e.to_diagnostic(Severity::Error);
            forward(&diagnostic);
            lock_log(log).errors.push(diagnostic);
        }
        BuildEvent::Warning(e) => {
            let diagnostic = e.to_diagnostic(Severity::Warning);
            forward(&diagnostic);
            lock_log(log).warnings.push(diagnostic);
        }
        BuildEvent::Message { importance, event } => match importance.severity() {
            Some(severity) => {
                let diagnostic = event.to_diagnostic(severity);
                forward(&diagnostic);
                if *importance == MessageImportance::HIGH {
                    lock_log(log).messages.push(diagnostic);
                }
            }
            None => {
                tracing::warn!(%importance, "build engine raised a message with unsupported importance");
                lock_log(log).unsupported.get_or_insert(*importance);
            }
        },
    }
}

fn lock_log(log: &Mutex<CaptureLog>) -> MutexGuard<'_, CaptureLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}
