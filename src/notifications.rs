use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    /// One-shot celebration shown after a successful claim
    pub celebrate: bool,
}

/// User-facing alerts raised by workflow operations.
///
/// Cloning shares the queue. Every alert is mirrored to the log.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    queue: Arc<Mutex<Vec<Notification>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(Severity::Success, message.into(), false);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Severity::Info, message.into(), false);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into(), false);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Severity::Error, message.into(), false);
    }

    pub fn celebrate(&self, message: impl Into<String>) {
        self.push(Severity::Success, message.into(), true);
    }

    /// Take every pending notification, oldest first
    pub fn drain(&self) -> Vec<Notification> {
        match self.queue.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => Vec::new(),
        }
    }

    fn push(&self, severity: Severity, message: String, celebrate: bool) {
        match severity {
            Severity::Success | Severity::Info => info!(severity = %severity, "{}", message),
            Severity::Warning => warn!(severity = %severity, "{}", message),
            Severity::Error => error!(severity = %severity, "{}", message),
        }
        if let Ok(mut queue) = self.queue.lock() {
            queue.push(Notification {
                severity,
                message,
                celebrate,
            });
        }
    }
}
