//! Copy-on-write subscriber channel
//!
//! Registration clones the subscriber map and swaps it in under a short
//! write lock. Dispatch only clones the `Arc` of the current map, so no lock
//! is held while a subscriber runs and a subscriber may itself subscribe or
//! unsubscribe.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use crate::hooks::HookKind;

new_key_type! {
    /// Key for a registered subscriber
    pub struct SubscriberKey;
}

/// Dispatch slower than this for a single call is reported
const SLOW_DISPATCH: Duration = Duration::from_millis(1);

/// Handle returned by every registration
///
/// Pass it back to `unsubscribe` to remove exactly that registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: HookKind,
    key: SubscriberKey,
}

impl Subscription {
    /// The call kind this subscription listens to
    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn key(&self) -> SubscriberKey {
        self.key
    }
}

type Subscribers<F> = SlotMap<SubscriberKey, Arc<F>>;

/// Subscribers of one call kind
pub(crate) struct Channel<F: ?Sized> {
    kind: HookKind,
    subscribers: RwLock<Arc<Subscribers<F>>>,
}

impl<F: ?Sized> Channel<F> {
    pub fn new(kind: HookKind) -> Self {
        Self {
            kind,
            subscribers: RwLock::new(Arc::new(SlotMap::with_key())),
        }
    }

    pub fn subscribe(&self, subscriber: Arc<F>) -> Subscription {
        let mut current = self.subscribers.write();
        let key = Arc::make_mut(&mut current).insert(subscriber);
        tracing::trace!("Added {} subscriber {:?}", self.kind, key);
        Subscription {
            kind: self.kind,
            key,
        }
    }

    /// Returns `true` if the subscriber was found and removed
    pub fn unsubscribe(&self, key: SubscriberKey) -> bool {
        let mut current = self.subscribers.write();
        if !current.contains_key(key) {
            return false;
        }
        Arc::make_mut(&mut current).remove(key);
        tracing::trace!("Removed {} subscriber {:?}", self.kind, key);
        true
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn clear(&self) {
        *self.subscribers.write() = Arc::new(SlotMap::with_key());
    }

    /// Current subscriber set; later registrations do not affect it
    pub fn snapshot(&self) -> Arc<Subscribers<F>> {
        Arc::clone(&self.subscribers.read())
    }

    /// Run `invoke` once per subscriber of the current snapshot
    ///
    /// A panicking subscriber is logged and skipped; the remaining
    /// subscribers still run.
    pub fn dispatch(&self, mut invoke: impl FnMut(&F)) {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return;
        }

        let start = Instant::now();

        for (key, subscriber) in snapshot.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| invoke(&**subscriber)));
            if let Err(payload) = result {
                tracing::warn!(
                    "{} subscriber {:?} panicked: {}",
                    self.kind,
                    key,
                    panic_message(payload.as_ref())
                );
            }
        }

        let elapsed = start.elapsed();
        if elapsed > SLOW_DISPATCH {
            tracing::warn!(
                "{} dispatch took {}us ({} subscribers)",
                self.kind,
                elapsed.as_micros(),
                snapshot.len()
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
