use mu_watcher::config::{Config, ConfigHandle};
use mu_watcher::delivery::{DeliveryError, DeliveryQueue, NotificationItem, Transport};
use mu_watcher::notify::{LocalAlert, NotificationDispatcher, Severity};
use parking_lot::Mutex;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct FakeTransport {
    reachable: AtomicBool,
    deliver_ok: AtomicBool,
    probes: AtomicUsize,
    attempts: Mutex<Vec<String>>,
    delivered: Mutex<Vec<String>>,
}

impl FakeTransport {
    fn online(ok: bool) -> Self {
        let t = Self::default();
        t.reachable.store(true, Ordering::SeqCst);
        t.deliver_ok.store(ok, Ordering::SeqCst);
        t
    }
}

impl Transport for FakeTransport {
    fn probe(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }

    fn deliver(&self, item: &NotificationItem) -> Result<(), DeliveryError> {
        self.attempts.lock().push(item.title.clone());
        if self.deliver_ok.load(Ordering::SeqCst) {
            self.delivered.lock().push(item.title.clone());
            Ok(())
        } else {
            Err(DeliveryError::Status(400))
        }
    }
}

#[derive(Default)]
struct RecordingAlert {
    shown: Mutex<Vec<(String, String, Severity)>>,
}

impl LocalAlert for RecordingAlert {
    fn show(&self, title: &str, body: &str, severity: Severity) {
        self.shown
            .lock()
            .push((title.to_string(), body.to_string(), severity));
    }
}

fn queue_with(transport: Arc<FakeTransport>) -> (DeliveryQueue, Arc<RecordingAlert>) {
    let alert = Arc::new(RecordingAlert::default());
    let queue = DeliveryQueue::new(transport, alert.clone(), ConfigHandle::default());
    (queue, alert)
}

#[test]
fn offline_enqueue_keeps_everything() {
    let transport = Arc::new(FakeTransport::default());
    let (queue, _) = queue_with(transport.clone());

    for i in 0..3 {
        queue.enqueue(NotificationItem::new(format!("n{i}"), "body"));
    }
    for _ in 0..3 {
        queue.drain_once();
    }

    assert_eq!(queue.len(), 3);
    assert!(transport.attempts.lock().is_empty());
    assert_eq!(transport.probes.load(Ordering::SeqCst), 3);
}

#[test]
fn delivers_in_fifo_order() {
    let transport = Arc::new(FakeTransport::online(true));
    let (queue, _) = queue_with(transport.clone());

    queue.enqueue(NotificationItem::new("a", "1"));
    queue.enqueue(NotificationItem::new("b", "2"));
    queue.enqueue(NotificationItem::new("c", "3"));
    for _ in 0..3 {
        queue.drain_once();
    }

    assert!(queue.is_empty());
    assert_eq!(*transport.delivered.lock(), vec!["a", "b", "c"]);
}

#[test]
fn failing_head_blocks_the_line() {
    let transport = Arc::new(FakeTransport::online(false));
    let (queue, alert) = queue_with(transport.clone());

    queue.enqueue(NotificationItem::new("stuck", "1"));
    queue.enqueue(NotificationItem::new("waiting", "2"));
    for _ in 0..3 {
        queue.drain_once();
    }

    // Only the head was ever attempted
    assert_eq!(*transport.attempts.lock(), vec!["stuck", "stuck", "stuck"]);
    assert_eq!(queue.len(), 2);
    assert_eq!(alert.shown.lock().len(), 3);
    assert!(alert.shown.lock()[0].0 == "Delivery Error");

    // Once the head goes through, the rest follows
    transport.deliver_ok.store(true, Ordering::SeqCst);
    queue.drain_once();
    queue.drain_once();
    assert!(queue.is_empty());
    assert_eq!(*transport.delivered.lock(), vec!["stuck", "waiting"]);
}

#[test]
fn delivery_waits_for_connectivity() {
    let transport = Arc::new(FakeTransport::default());
    transport.deliver_ok.store(true, Ordering::SeqCst);
    let (queue, _) = queue_with(transport.clone());

    queue.enqueue(NotificationItem::new("hello", "world"));

    // Three failed probes, nothing attempted
    for _ in 0..3 {
        queue.drain_once();
    }
    assert!(transport.attempts.lock().is_empty());
    assert_eq!(queue.len(), 1);

    // Connectivity returns: exactly one successful delivery call
    transport.reachable.store(true, Ordering::SeqCst);
    queue.drain_once();
    assert_eq!(*transport.delivered.lock(), vec!["hello"]);
    assert!(queue.is_empty());

    queue.drain_once();
    assert_eq!(transport.attempts.lock().len(), 1);
}

#[test]
fn empty_queue_skips_the_probe() {
    let transport = Arc::new(FakeTransport::online(true));
    let (queue, _) = queue_with(transport.clone());

    queue.drain_once();
    assert_eq!(transport.probes.load(Ordering::SeqCst), 0);
}

#[test]
fn drop_head_abandons_one_item() {
    let transport = Arc::new(FakeTransport::default());
    let (queue, _) = queue_with(transport);

    queue.enqueue(NotificationItem::new("poison", "x"));
    queue.enqueue(NotificationItem::new("fine", "y"));

    let dropped = queue.drop_head().expect("head");
    assert_eq!(dropped.title, "poison");
    assert_eq!(queue.len(), 1);
}

#[test]
fn dispatcher_fans_out_locally_and_to_queue() {
    let transport = Arc::new(FakeTransport::default());
    let alert = Arc::new(RecordingAlert::default());
    let queue = Arc::new(DeliveryQueue::new(
        transport,
        alert.clone(),
        ConfigHandle::default(),
    ));
    let dispatcher = NotificationDispatcher::new(alert.clone(), queue.clone());

    dispatcher.send("Helper Inactive", "Helper inactive on window 7.", Severity::Warning);

    let shown = alert.shown.lock();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].0, "Helper Inactive");
    assert_eq!(shown[0].2, Severity::Warning);
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_notification_is_a_direct_attempt() {
    let transport = Arc::new(FakeTransport::online(true));
    let alert = Arc::new(RecordingAlert::default());
    let queue = Arc::new(DeliveryQueue::new(
        transport.clone(),
        alert.clone(),
        ConfigHandle::default(),
    ));
    let dispatcher = NotificationDispatcher::new(alert, queue.clone());

    dispatcher.send_test_notification().expect("delivery");
    assert_eq!(*transport.delivered.lock(), vec!["Test Notification"]);
    // Bypasses the queue entirely
    assert!(queue.is_empty());

    transport.deliver_ok.store(false, Ordering::SeqCst);
    assert!(dispatcher.send_test_notification().is_err());
}

/// Transport whose delivery coincides with an operator drop_head(),
/// exercising the peek/pop window
#[derive(Default)]
struct DropHeadTransport {
    queue: Mutex<Option<Arc<DeliveryQueue>>>,
    delivered: Mutex<Vec<String>>,
}

impl Transport for DropHeadTransport {
    fn probe(&self) -> bool {
        true
    }

    fn deliver(&self, item: &NotificationItem) -> Result<(), DeliveryError> {
        if let Some(queue) = &*self.queue.lock() {
            queue.drop_head();
        }
        self.delivered.lock().push(item.title.clone());
        Ok(())
    }
}

#[test]
fn drop_head_during_delivery_does_not_lose_the_next_item() {
    let transport = Arc::new(DropHeadTransport::default());
    let alert = Arc::new(RecordingAlert::default());
    let queue = Arc::new(DeliveryQueue::new(
        transport.clone(),
        alert,
        ConfigHandle::default(),
    ));
    *transport.queue.lock() = Some(queue.clone());

    queue.enqueue(NotificationItem::new("first", "1"));
    queue.enqueue(NotificationItem::new("second", "2"));

    // "first" is delivered while the operator abandons the head; the
    // success bookkeeping must not pop "second" in its place
    queue.drain_once();
    assert_eq!(*transport.delivered.lock(), vec!["first"]);
    assert_eq!(queue.len(), 1);

    // Without interference the survivor goes out normally
    *transport.queue.lock() = None;
    queue.drain_once();
    assert_eq!(*transport.delivered.lock(), vec!["first", "second"]);
    assert!(queue.is_empty());
}

#[test]
#[serial]
fn drain_worker_delivers_in_background() {
    let mut config = Config::default();
    config.probe_interval_ms = 20;
    let transport = Arc::new(FakeTransport::online(true));
    let alert = Arc::new(RecordingAlert::default());
    let queue = DeliveryQueue::new(
        transport.clone(),
        alert,
        ConfigHandle::in_memory(config),
    );

    queue.enqueue(NotificationItem::new("bg", "drained by the worker"));
    queue.start();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !queue.is_empty() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    queue.stop();

    assert!(queue.is_empty());
    assert_eq!(*transport.delivered.lock(), vec!["bg"]);
}
