//! Window Registry
//!
//! Thread-safe set of window handles under observation. Each handle carries
//! exactly one observation mode; presentation code subscribes to a channel to
//! learn that the set changed.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Opaque OS window identifier. Never dereferenced as a pointer here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a tracked window is observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationMode {
    Monitoring,
    Marketing,
}

/// Sent to subscribers whenever the tracked set changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    Changed,
}

#[derive(Default)]
pub struct WindowRegistry {
    windows: Mutex<HashMap<WindowHandle, ObservationMode>>,
    subscribers: Mutex<Vec<Sender<RegistryEvent>>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a channel that receives an event for every registry change
    pub fn subscribe(&self) -> Receiver<RegistryEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Starts observing a handle in Monitoring mode.
    /// A handle already tracked under any mode keeps its existing mode.
    pub fn start_monitoring(&self, handle: WindowHandle) {
        self.start(handle, ObservationMode::Monitoring);
    }

    /// Starts observing a handle in Marketing mode.
    /// A handle already tracked under any mode keeps its existing mode.
    pub fn start_marketing(&self, handle: WindowHandle) {
        self.start(handle, ObservationMode::Marketing);
    }

    fn start(&self, handle: WindowHandle, mode: ObservationMode) {
        {
            let mut windows = self.windows.lock();
            if let Some(existing) = windows.get(&handle) {
                debug!("Window {handle} already tracked as {existing:?}, ignoring {mode:?}");
                return;
            }
            windows.insert(handle, mode);
        }
        self.notify_changed();
    }

    /// Stops observing a handle. Idempotent; unknown handles are a no-op.
    pub fn stop_monitoring(&self, handle: WindowHandle) {
        self.remove(handle);
    }

    /// Stops observing a handle. Idempotent; unknown handles are a no-op.
    pub fn stop_marketing(&self, handle: WindowHandle) {
        self.remove(handle);
    }

    fn remove(&self, handle: WindowHandle) {
        let removed = self.windows.lock().remove(&handle).is_some();
        if removed {
            self.notify_changed();
        }
    }

    pub fn is_monitoring(&self, handle: WindowHandle) -> bool {
        self.windows.lock().get(&handle) == Some(&ObservationMode::Monitoring)
    }

    pub fn is_marketing(&self, handle: WindowHandle) -> bool {
        self.windows.lock().get(&handle) == Some(&ObservationMode::Marketing)
    }

    /// Snapshot of the handles tracked under the given mode.
    /// Pollers iterate this copy, never the live map.
    pub fn handles(&self, mode: ObservationMode) -> Vec<WindowHandle> {
        self.windows
            .lock()
            .iter()
            .filter(|(_, m)| **m == mode)
            .map(|(h, _)| *h)
            .collect()
    }

    /// Number of tracked handles across both modes
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }

    fn notify_changed(&self) {
        // Drop subscribers whose receiver side is gone
        self.subscribers
            .lock()
            .retain(|tx| tx.send(RegistryEvent::Changed).is_ok());
    }
}
