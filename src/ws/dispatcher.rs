use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use dashmap::DashMap;

use super::envelope::{Event, WILDCARD};

/// Subscriber callback. Identity is the identity of the [`Arc`].
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// Typed publish/subscribe registry.
///
/// Routes each dispatched [`Event`] to the callbacks registered for its type and,
/// separately, to those registered for [`WILDCARD`]. A callback that panics is
/// logged and skipped; the remaining callbacks still run.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Arc<DashMap<String, Vec<Callback>>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("types", &self.handlers.len())
            .finish()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `msg_type`. Registering the same callback twice for
    /// one type is a no-op.
    pub fn on<S: Into<String>>(&self, msg_type: S, callback: Callback) -> Subscription {
        let msg_type = msg_type.into();
        {
            let mut handlers = self.handlers.entry(msg_type.clone()).or_default();
            if !handlers.iter().any(|existing| Arc::ptr_eq(existing, &callback)) {
                handlers.push(Arc::clone(&callback));
            }
        }

        Subscription {
            dispatcher: self.clone(),
            msg_type,
            callback,
        }
    }

    /// Remove exactly the `(msg_type, callback)` pair. Returns whether it was registered.
    pub fn off(&self, msg_type: &str, callback: &Callback) -> bool {
        let removed = match self.handlers.get_mut(msg_type) {
            Some(mut handlers) => {
                let before = handlers.len();
                handlers.retain(|existing| !Arc::ptr_eq(existing, callback));
                handlers.len() != before
            }
            None => false,
        };

        self.handlers.remove_if(msg_type, |_, handlers| handlers.is_empty());
        removed
    }

    /// Invoke every callback for `event.msg_type`, then every wildcard callback.
    pub fn dispatch(&self, event: &Event) {
        self.invoke(&event.msg_type, event);
        if event.msg_type != WILDCARD {
            self.invoke(WILDCARD, event);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self, msg_type: &str) -> usize {
        self.handlers.get(msg_type).map_or(0, |handlers| handlers.value().len())
    }

    fn invoke(&self, key: &str, event: &Event) {
        // Snapshot so callbacks may call `on`/`off` without holding a shard lock.
        let handlers: Vec<Callback> = match self.handlers.get(key) {
            Some(handlers) => handlers.value().clone(),
            None => return,
        };

        for handler in handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                #[cfg(feature = "tracing")]
                tracing::error!(
                    msg_type = %event.msg_type,
                    subscription = key,
                    %reason,
                    "Subscriber callback panicked"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = &reason;
            }
        }
    }
}

/// Handle returned by [`Dispatcher::on`].
#[must_use = "dropping a Subscription keeps the callback registered; call `unsubscribe` to remove it"]
pub struct Subscription {
    dispatcher: Dispatcher,
    msg_type: String,
    callback: Callback,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("msg_type", &self.msg_type)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Remove this `(type, callback)` pair, leaving other subscribers untouched.
    pub fn unsubscribe(self) {
        self.dispatcher.off(&self.msg_type, &self.callback);
    }

    /// Convert into a guard that unsubscribes when dropped.
    pub(crate) fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard(Some(self))
    }
}

pub(crate) struct SubscriptionGuard(Option<Subscription>);

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.0.take() {
            subscription.unsubscribe();
        }
    }
}
