//! Monitor Loops
//!
//! Two independent cancellable pollers share the window registry: the
//! monitoring loop watches helper liveness, the marketing loop watches for
//! incoming messages. A positive detection (or a vanished window) removes
//! the handle, raises an alert and sounds the alarm. One bad handle never
//! aborts a tick for the others.

use crate::alarm::{AlarmController, MESSAGE_SOUND};
use crate::capture::FrameSource;
use crate::config::ConfigHandle;
use crate::notify::{NotificationDispatcher, Severity};
use crate::registry::{ObservationMode, WindowHandle, WindowRegistry};
use crate::vision::TemplateSet;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

/// What a template matched on a tracked window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    HelperInactive,
    MessageReceived,
}

/// Per-handle outcome of one poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Healthy,
    Detected(Detection),
    /// The window is gone or can no longer be captured
    TargetUnavailable,
}

/// Classifies one tracked window: resolve, capture, match templates.
/// Every failure path is data, never a panic or propagated error.
pub fn observe(
    source: &dyn FrameSource,
    templates: &TemplateSet,
    handle: WindowHandle,
    mode: ObservationMode,
) -> Observation {
    let Some(rect) = source.resolve_rect(handle) else {
        return Observation::TargetUnavailable;
    };

    let frame = match source.capture(rect) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Capture failed for window {handle}: {e}");
            return Observation::TargetUnavailable;
        }
    };

    // A degenerate frame means there was nothing to capture
    if frame.width() <= 1 || frame.height() <= 1 {
        return Observation::TargetUnavailable;
    }

    match mode {
        ObservationMode::Monitoring => {
            if templates.helper_inactive(&frame) {
                Observation::Detected(Detection::HelperInactive)
            } else {
                Observation::Healthy
            }
        }
        ObservationMode::Marketing => {
            if templates.message_received(&frame) {
                Observation::Detected(Detection::MessageReceived)
            } else {
                Observation::Healthy
            }
        }
    }
}

struct LoopShared {
    mode: ObservationMode,
    registry: Arc<WindowRegistry>,
    source: Arc<dyn FrameSource>,
    templates: Arc<TemplateSet>,
    dispatcher: Arc<NotificationDispatcher>,
    alarm: Arc<AlarmController>,
    config: ConfigHandle,
}

/// A cancellable background poller over one observation mode
pub struct PollLoop {
    shared: Arc<LoopShared>,
    worker: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl PollLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: ObservationMode,
        registry: Arc<WindowRegistry>,
        source: Arc<dyn FrameSource>,
        templates: Arc<TemplateSet>,
        dispatcher: Arc<NotificationDispatcher>,
        alarm: Arc<AlarmController>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            shared: Arc::new(LoopShared {
                mode,
                registry,
                source,
                templates,
                dispatcher,
                alarm,
                config,
            }),
            worker: Mutex::new(None),
        }
    }

    fn thread_name(mode: ObservationMode) -> &'static str {
        match mode {
            ObservationMode::Monitoring => "monitor-loop",
            ObservationMode::Marketing => "marketing-loop",
        }
    }

    /// Spawns the poller thread
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (tx, rx) = bounded::<()>(1);
        let shared = self.shared.clone();
        let name = Self::thread_name(shared.mode);

        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                info!("{name} started");
                loop {
                    // Interval is re-read each tick so reloads take effect
                    let interval = shared.config.snapshot().poll_interval_ms;
                    match rx.recv_timeout(Duration::from_millis(interval)) {
                        Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => tick(&shared),
                    }
                }
                info!("{name} ended");
            });

        match spawned {
            Ok(handle) => *worker = Some((tx, handle)),
            Err(e) => warn!("Could not spawn {name}: {e}"),
        }
    }

    /// Signals the poller and joins it. Shutdown may last up to one
    /// in-flight capture/classify operation.
    pub fn stop(&self) {
        if let Some((tx, handle)) = self.worker.lock().take() {
            drop(tx);
            let _ = handle.join();
        }
    }

    /// Runs a single tick synchronously (tests, manual refresh)
    pub fn tick_once(&self) {
        tick(&self.shared);
    }
}

fn tick(shared: &LoopShared) {
    for handle in shared.registry.handles(shared.mode) {
        let observation = observe(
            shared.source.as_ref(),
            shared.templates.as_ref(),
            handle,
            shared.mode,
        );
        match observation {
            Observation::Healthy => {}
            Observation::Detected(detection) => react(shared, handle, Some(detection)),
            Observation::TargetUnavailable => react(shared, handle, None),
        }
    }
}

/// Detect -> deregister -> notify -> maybe-alarm, strictly in that order
fn react(shared: &LoopShared, handle: WindowHandle, detection: Option<Detection>) {
    match shared.mode {
        ObservationMode::Monitoring => shared.registry.stop_monitoring(handle),
        ObservationMode::Marketing => shared.registry.stop_marketing(handle),
    }

    match detection {
        Some(Detection::HelperInactive) => {
            let message = format!("Helper inactive on window {handle}.");
            shared
                .dispatcher
                .send("Helper Inactive", &message, Severity::Warning);
            shared.alarm.start(None);
        }
        Some(Detection::MessageReceived) => {
            let message = format!("Message received on window {handle}.");
            shared
                .dispatcher
                .send("Message received", &message, Severity::Info);
            // Never silences a looping alarm already sounding
            if shared.config.snapshot().use_alarm && !shared.alarm.is_playing() {
                shared.alarm.play_oneshot(MESSAGE_SOUND);
            }
        }
        None => {
            let message = format!("Window {handle} has been closed.");
            shared
                .dispatcher
                .send("Window Closed", &message, Severity::Warning);
            shared.alarm.start(None);
        }
    }
}
