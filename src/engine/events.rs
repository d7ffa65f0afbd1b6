//! Build engine event stream.
//!
//! Engines report progress through an [`EventSource`]: status changes, errors, warnings and
//! messages. Subscribers register a handler per [`EventKind`] and get a [`SubscriptionId`]
//! back to unsubscribe with. Handlers run synchronously on the thread that raised the event.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use buildtest_core::{Diagnostic, Severity, TextSpan};

/// Importance attached to a message event.
///
/// Engines only define [`MessageImportance::HIGH`], [`MessageImportance::NORMAL`] and
/// [`MessageImportance::LOW`]; any other value is a contract violation on the engine side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageImportance(pub i32);

impl MessageImportance {
    pub const HIGH: MessageImportance = MessageImportance(0);
    pub const NORMAL: MessageImportance = MessageImportance(1);
    pub const LOW: MessageImportance = MessageImportance(2);

    /// Severity a message of this importance is recorded with, if the importance is known.
    pub fn severity(self) -> Option<Severity> {
        match self {
            Self::HIGH => Some(Severity::Informational),
            Self::NORMAL => Some(Severity::Verbose),
            Self::LOW => Some(Severity::Diagnostic),
            _ => None,
        }
    }
}

impl fmt::Display for MessageImportance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::HIGH => write!(f, "High"),
            Self::NORMAL => write!(f, "Normal"),
            Self::LOW => write!(f, "Low"),
            MessageImportance(other) => write!(f, "{}", other),
        }
    }
}

/// Payload shared by error, warning and message events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub code: String,
    pub message: Option<String>,
    pub file: Option<String>,
    pub span: TextSpan,
    /// Project file being built when the event was raised.
    pub project: Option<String>,
}

impl DiagnosticEvent {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
            ..Self::default()
        }
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

    pub fn to_diagnostic(&self, severity: Severity) -> Diagnostic {
        Diagnostic {
            severity,
            code: self.code.clone(),
            message: self.message.clone(),
            file: self.file.clone(),
            span: self.span,
            project: self.project.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    BuildStarted,
    BuildFinished,
    ProjectStarted,
    ProjectFinished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub kind: StatusKind,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    Status(StatusEvent),
    Error(DiagnosticEvent),
    Warning(DiagnosticEvent),
    Message {
        importance: MessageImportance,
        event: DiagnosticEvent,
    },
}

impl BuildEvent {
    pub fn status(kind: StatusKind, message: impl Into<String>) -> Self {
        BuildEvent::Status(StatusEvent {
            kind,
            message: Some(message.into()),
        })
    }

    pub fn message(importance: MessageImportance, text: impl Into<String>) -> Self {
        BuildEvent::Message {
            importance,
            event: DiagnosticEvent {
                message: Some(text.into()),
                ..DiagnosticEvent::default()
            },
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            BuildEvent::Status(_) => EventKind::Status,
            BuildEvent::Error(_) => EventKind::Error,
            BuildEvent::Warning(_) => EventKind::Warning,
            BuildEvent::Message { .. } => EventKind::Message,
        }
    }
}

/// What a handler subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Status,
    Error,
    Warning,
    Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type EventHandler = Arc<dyn Fn(&BuildEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    handler: EventHandler,
}

/// Subscription registry owned by a build engine.
#[derive(Default)]
pub struct EventSource {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, handler: impl Fn(&BuildEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscription {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Deliver `event` to every handler subscribed to its kind, in subscription order.
    pub fn raise(&self, event: &BuildEvent) {
        let kind = event.kind();
        // Handlers may subscribe or unsubscribe, so they run outside the lock.
        let handlers: Vec<EventHandler> = self
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| Arc::clone(&s.handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
