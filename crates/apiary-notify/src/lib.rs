// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Where user-facing messages about snatches end up.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn send(&self, message: &str, severity: Severity);
}

/// Writes notifications to the log.
pub struct LogNotificationSink;

#[async_trait::async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => info!(target: "notify", %message, "notification"),
            Severity::Warning => warn!(target: "notify", %message, "notification"),
            Severity::Error => error!(target: "notify", %message, "notification"),
        }
    }
}

/// Keeps every notification in memory until drained.
#[derive(Clone, Default)]
pub struct CollectingNotificationSink {
    inner: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl CollectingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve and clear all captured notifications
    pub fn drain(&self) -> Vec<(Severity, String)> {
        let mut guard = self.entries();
        std::mem::take(&mut *guard)
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(Severity, String)>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl NotificationSink for CollectingNotificationSink {
    async fn send(&self, message: &str, severity: Severity) {
        self.entries().push((severity, message.to_string()));
    }
}
