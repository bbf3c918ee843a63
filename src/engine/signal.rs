//! Lifecycle signal dispatch.
//!
//! Subscribers register a callback against one [`SignalKind`]; dispatch
//! invokes every callback for that kind synchronously, in subscription
//! order, on the dispatching thread. A panicking callback is caught and
//! logged so it can neither disturb its peers nor stop the worker.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::error;

use super::command::CommandClient;
use super::operation::Operation;

/// A named lifecycle point at which subscribed callbacks are invoked.
///
/// The enumeration is closed: there is no way to subscribe to an unknown
/// kind, which is the compile-time form of the "reject unknown signal names"
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// The worker began executing the operation.
    Started,
    /// The collaborator reported a progress percentage. Best effort; may
    /// never fire for a given operation.
    Progress,
    /// The operation finished successfully.
    Completed,
    /// The collaborator call returned an error.
    Failed,
    /// The operation was cancelled before the worker dequeued it.
    Cancelled,
}

impl SignalKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [SignalKind; 5] = [
        SignalKind::Started,
        SignalKind::Progress,
        SignalKind::Completed,
        SignalKind::Failed,
        SignalKind::Cancelled,
    ];

    /// Returns the wire-style name of the signal.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Started => "operation_started",
            SignalKind::Progress => "operation_progress",
            SignalKind::Completed => "operation_completed",
            SignalKind::Failed => "operation_failed",
            SignalKind::Cancelled => "operation_cancelled",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token returned by `subscribe`, used to unsubscribe.
///
/// Closures have no identity in Rust, so removal is by token rather than by
/// callback value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback<C> = Arc<dyn Fn(&Operation<C>) + Send + Sync>;

pub(crate) struct SignalHub<C: CommandClient> {
    next_id: AtomicU64,
    slots: Mutex<HashMap<SignalKind, Vec<(SubscriptionId, Callback<C>)>>>,
}

impl<C: CommandClient> SignalHub<C> {
    pub(crate) fn new() -> Self {
        let mut slots = HashMap::new();
        for kind in SignalKind::ALL {
            slots.insert(kind, Vec::new());
        }
        Self {
            next_id: AtomicU64::new(1),
            slots: Mutex::new(slots),
        }
    }

    pub(crate) fn subscribe(
        &self,
        kind: SignalKind,
        callback: impl Fn(&Operation<C>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut slots = self.slots.lock().expect("signal hub lock poisoned");
        slots
            .get_mut(&kind)
            .expect("all signal kinds are pre-registered")
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes one subscription. Returns false if it was not present.
    pub(crate) fn unsubscribe(&self, kind: SignalKind, id: SubscriptionId) -> bool {
        let mut slots = self.slots.lock().expect("signal hub lock poisoned");
        let callbacks = slots
            .get_mut(&kind)
            .expect("all signal kinds are pre-registered");
        let before = callbacks.len();
        callbacks.retain(|(sub_id, _)| *sub_id != id);
        callbacks.len() != before
    }

    /// Invokes every callback subscribed to `kind`, in subscription order.
    ///
    /// Callbacks run on the calling thread with no hub lock held, so a
    /// callback may subscribe or unsubscribe reentrantly. A panic inside one
    /// callback is logged and does not prevent the remaining callbacks.
    pub(crate) fn dispatch(&self, kind: SignalKind, operation: &Operation<C>) {
        let callbacks: Vec<Callback<C>> = {
            let slots = self.slots.lock().expect("signal hub lock poisoned");
            slots
                .get(&kind)
                .expect("all signal kinds are pre-registered")
                .iter()
                .map(|(_, cb)| cb.clone())
                .collect()
        };

        for callback in callbacks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(operation))) {
                error!(
                    signal = kind.as_str(),
                    op = %operation.id(),
                    "signal callback panicked: {}",
                    panic_message(&panic)
                );
            }
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
