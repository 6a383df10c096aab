//! Transient user-facing notifications.
//!
//! Failures on the push and fetch paths are never fatal; they are handed to a
//! [`Notifier`] and the caller carries on with its previous state.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Sink for notices. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to the tracing subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Info => info!(target: "notice", "{}", notice.message),
            Severity::Error => error!(target: "notice", "{}", notice.message),
        }
    }
}

/// Keeps every notice in memory, oldest first.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn errors(&self) -> usize {
        self.notices()
            .iter()
            .filter(|notice| notice.severity == Severity::Error)
            .count()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut guard) = self.notices.lock() {
            guard.push(notice);
        }
    }
}
