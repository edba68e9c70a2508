//! Delivery Queue
//!
//! Connectivity-gated, retrying FIFO for outbound notifications. Enqueueing
//! always succeeds locally; a background drain worker probes reachability on
//! a fixed interval and delivers the head item, popping it only on success.
//! A persistently failing head item blocks the rest of the queue by design.

use crate::config::ConfigHandle;
use crate::notify::{LocalAlert, Severity};
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Well-known host for the reachability probe
const PROBE_URL: &str = "https://www.google.com";

/// Outbound message; immutable once created
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationItem {
    pub title: String,
    pub body: String,
    pub enqueued_at: DateTime<Local>,
}

impl NotificationItem {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            enqueued_at: Local::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("endpoint returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Network seam: reachability probe plus one delivery attempt.
/// Tests substitute a fake; production uses [`HttpTransport`].
pub trait Transport: Send + Sync {
    /// True when the remote side looks reachable
    fn probe(&self) -> bool;

    /// One delivery attempt. Non-2xx and transport failures both mean
    /// "not delivered, retry later".
    fn deliver(&self, item: &NotificationItem) -> Result<(), DeliveryError>;
}

/// Blocking HTTP transport against a Telegram-style bot endpoint
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    config: ConfigHandle,
}

impl HttpTransport {
    pub fn new(config: ConfigHandle) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("mu_watcher delivery")
            .build()?;
        Ok(Self { client, config })
    }
}

impl Transport for HttpTransport {
    fn probe(&self) -> bool {
        // Any successful response counts, regardless of status
        self.client.get(PROBE_URL).send().is_ok()
    }

    fn deliver(&self, item: &NotificationItem) -> Result<(), DeliveryError> {
        let cfg = self.config.snapshot();
        let url = format!("https://api.telegram.org/bot{}/sendMessage", cfg.bot_token);
        let payload = serde_json::json!({
            "chat_id": cfg.chat_id,
            "text": format!("{}: {}", item.title, item.body),
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}

struct QueueInner {
    items: Mutex<VecDeque<NotificationItem>>,
    transport: Arc<dyn Transport>,
    local: Arc<dyn LocalAlert>,
    config: ConfigHandle,
}

pub struct DeliveryQueue {
    inner: Arc<QueueInner>,
    worker: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl DeliveryQueue {
    pub fn new(
        transport: Arc<dyn Transport>,
        local: Arc<dyn LocalAlert>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                items: Mutex::new(VecDeque::new()),
                transport,
                local,
                config,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Appends to the FIFO; never fails due to network state
    pub fn enqueue(&self, item: NotificationItem) {
        debug!("Queued notification: {}", item.title);
        self.inner.items.lock().push_back(item);
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    /// Abandons the head item, if any. Operator escape hatch for a
    /// permanently undeliverable message blocking the queue.
    pub fn drop_head(&self) -> Option<NotificationItem> {
        self.inner.items.lock().pop_front()
    }

    /// Immediate blocking delivery attempt, bypassing the queue.
    /// Used by the configuration test-notification workflow.
    pub fn deliver_now(&self, item: NotificationItem) -> Result<(), DeliveryError> {
        self.inner.transport.deliver(&item)
    }

    /// Runs one drain pass: probe, then attempt the head item
    pub fn drain_once(&self) {
        Self::drain(&self.inner);
    }

    /// Spawns the drain worker
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (tx, rx) = bounded::<()>(1);
        let inner = self.inner.clone();

        let spawned = thread::Builder::new()
            .name("delivery-drain".to_string())
            .spawn(move || {
                info!("Delivery worker started");
                loop {
                    let interval = inner.config.snapshot().probe_interval_ms;
                    match rx.recv_timeout(Duration::from_millis(interval)) {
                        Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                            Self::drain(&inner);
                        }
                    }
                }
                info!("Delivery worker ended");
            });

        match spawned {
            Ok(handle) => *worker = Some((tx, handle)),
            Err(e) => warn!("Could not spawn delivery worker: {e}"),
        }
    }

    /// Signals the drain worker and joins it
    pub fn stop(&self) {
        if let Some((tx, handle)) = self.worker.lock().take() {
            drop(tx);
            let _ = handle.join();
        }
    }

    fn drain(inner: &QueueInner) {
        // Peek, deliver, dequeue only on success
        let Some(head) = inner.items.lock().front().cloned() else {
            return;
        };

        if !inner.transport.probe() {
            debug!("Connectivity probe failed, {} queued", inner.items.lock().len());
            return;
        }

        match inner.transport.deliver(&head) {
            Ok(()) => {
                // drop_head() may have raced the attempt; pop only the item
                // that was actually delivered
                let mut items = inner.items.lock();
                if items.front() == Some(&head) {
                    items.pop_front();
                }
                drop(items);
                info!("Delivered notification: {}", head.title);
            }
            Err(e) => {
                warn!("Delivery failed, will retry: {e}");
                inner.local.show(
                    "Delivery Error",
                    &format!("Failed to send notification: {e}"),
                    Severity::Error,
                );
            }
        }
    }
}
