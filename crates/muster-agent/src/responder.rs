use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use muster_lib::session::Status;

pub(crate) type StatusFn = Arc<dyn Fn() -> Status + Send + Sync>;
type ShutdownFn = Arc<dyn Fn() + Send + Sync>;

/// Callback registry answering the pool's probes for one session.
///
/// Status is a single overwritable slot (one current answer); shutdown is a
/// fan-out list of independent subscribers. The channel driver only holds a
/// `Weak` to this, so a disposed session never sees late callbacks.
pub(crate) struct Responder {
    me: Weak<Responder>,
    status: Mutex<Option<StatusFn>>,
    shutdown: Mutex<Vec<(u64, ShutdownFn)>>,
    next_subscription: AtomicU64,
}

impl Responder {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            status: Mutex::new(None),
            shutdown: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        })
    }

    /// Installs the status producer, replacing any previous one.
    pub fn set_status_callback(&self, callback: StatusFn) {
        *self.status.lock().unwrap() = Some(callback);
    }

    /// Current status. `Unknown` until a producer is installed. The
    /// producer runs outside the slot lock, but is still expected to be a
    /// plain read of local state.
    pub fn status(&self) -> Status {
        let producer = self.status.lock().unwrap().clone();
        producer.map(|f| f()).unwrap_or_default()
    }

    pub fn subscribe_shutdown(&self, callback: ShutdownFn) -> ShutdownSubscription {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.shutdown.lock().unwrap().push((id, callback));
        ShutdownSubscription {
            responder: self.me.clone(),
            id,
        }
    }

    /// Fans a shutdown notification out to every live subscriber.
    /// Callbacks run outside the registry lock, so they may themselves
    /// subscribe or drop subscriptions.
    pub fn notify_shutdown(&self) {
        let callbacks: Vec<ShutdownFn> = self
            .shutdown
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.shutdown
            .lock()
            .unwrap()
            .retain(|(subscription, _)| *subscription != id);
    }
}

/// Handle to a shutdown callback registration. Dropping it unregisters the
/// callback.
#[must_use = "dropping the subscription unregisters the callback"]
pub struct ShutdownSubscription {
    responder: Weak<Responder>,
    id: u64,
}

impl Drop for ShutdownSubscription {
    fn drop(&mut self) {
        if let Some(responder) = self.responder.upgrade() {
            responder.unsubscribe(self.id);
        }
    }
}
