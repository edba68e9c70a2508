//! Notification Dispatcher
//!
//! Fan-out point for alerts: the local balloon/toast channel is shown
//! synchronously, the networked channel goes through the delivery queue.
//! Callers never block on, or learn about, network delivery.

use crate::delivery::{DeliveryError, DeliveryQueue, NotificationItem};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Local presentation channel (balloon/toast), implemented by the shell.
/// Best-effort; failures stay inside the implementation.
pub trait LocalAlert: Send + Sync {
    fn show(&self, title: &str, body: &str, severity: Severity);
}

/// Fallback collaborator that routes alerts to the log
pub struct LogAlert;

impl LocalAlert for LogAlert {
    fn show(&self, title: &str, body: &str, severity: Severity) {
        match severity {
            Severity::Info => info!("{title}: {body}"),
            Severity::Warning => warn!("{title}: {body}"),
            Severity::Error => error!("{title}: {body}"),
        }
    }
}

pub struct NotificationDispatcher {
    local: Arc<dyn LocalAlert>,
    queue: Arc<DeliveryQueue>,
}

impl NotificationDispatcher {
    pub fn new(local: Arc<dyn LocalAlert>, queue: Arc<DeliveryQueue>) -> Self {
        Self { local, queue }
    }

    /// Shows the local alert and enqueues the networked copy.
    /// Returns nothing; delivery is asynchronous and decoupled.
    pub fn send(&self, title: &str, body: &str, severity: Severity) {
        self.local.show(title, body, severity);
        self.queue.enqueue(NotificationItem::new(title, body));
    }

    /// Blocking single delivery attempt for the configuration workflow
    pub fn send_test_notification(&self) -> Result<(), DeliveryError> {
        self.queue.deliver_now(NotificationItem::new(
            "Test Notification",
            "Validating the configuration.",
        ))
    }
}
