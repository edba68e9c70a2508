//! MU Watcher - window monitoring, vision classification and alerting engine
//!
//! Watches externally-owned application windows, inspects their pixels
//! against reference templates on a poll interval, and reacts to detections
//! with local alerts, a looping alarm and a connectivity-gated delivery
//! queue. The graphical shell, configuration dialogs and packaging live
//! outside this crate; it exposes trait seams for them instead.

pub mod alarm;
pub mod capture;
pub mod config;
pub mod delivery;
pub mod logger;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod vision;

pub use alarm::AlarmController;
pub use capture::{Frame, FrameSource, Rect};
pub use config::{Config, ConfigHandle};
pub use delivery::{DeliveryQueue, NotificationItem, Transport};
pub use monitor::{Detection, Observation, PollLoop};
pub use notify::{LocalAlert, NotificationDispatcher, Severity};
pub use registry::{ObservationMode, WindowHandle, WindowRegistry};
pub use vision::{ClassificationTemplate, RoiPolicy, TemplateSet};
