//! Concurrent operation registry.
//!
//! One mutex guards the whole map and every record's lifecycle fields; all
//! status/result/error/timestamp mutation happens while holding it, so a
//! multi-field read (status plus timestamps, say) taken under the lock is
//! always consistent. The registry is append-only for the engine's lifetime.
//!
//! Each entry carries a [`Notify`] that fires when the record reaches a
//! terminal status. `Engine::wait` blocks on it instead of sleep-polling.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::command::CommandClient;
use super::operation::{Operation, OperationError, OperationId, OperationStatus};

struct Entry<C: CommandClient> {
    op: Operation<C>,
    /// Notified once, when the record reaches a terminal status.
    done: Arc<Notify>,
}

pub(crate) struct Registry<C: CommandClient> {
    inner: Mutex<HashMap<OperationId, Entry<C>>>,
}

impl<C: CommandClient> Registry<C> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, op: Operation<C>) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.insert(
            op.id(),
            Entry {
                op,
                done: Arc::new(Notify::new()),
            },
        );
    }

    /// Point-in-time clone of one record.
    pub(crate) fn get(&self, id: OperationId) -> Option<Operation<C>> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner.get(&id).map(|entry| entry.op.clone())
    }

    /// Point-in-time clone of every record, keyed by id.
    pub(crate) fn snapshot(&self) -> HashMap<OperationId, Operation<C>> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner
            .iter()
            .map(|(id, entry)| (*id, entry.op.clone()))
            .collect()
    }

    /// Terminal-notification handle for a record, if it exists.
    pub(crate) fn notifier(&self, id: OperationId) -> Option<Arc<Notify>> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner.get(&id).map(|entry| entry.done.clone())
    }

    /// Transitions Pending → Running and stamps `start_time`.
    ///
    /// Returns a clone of the updated record, or `None` if the record is
    /// unknown or no longer Pending (cancelled before dequeue). The worker
    /// skips the operation in that case.
    pub(crate) fn begin(&self, id: OperationId) -> Option<Operation<C>> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let entry = inner.get_mut(&id)?;
        if entry.op.status() != OperationStatus::Pending {
            return None;
        }
        entry.op.mark_running(Utc::now());
        Some(entry.op.clone())
    }

    /// Transitions Running → Completed with the collaborator's result.
    pub(crate) fn complete(&self, id: OperationId, result: C::Output) -> Option<Operation<C>> {
        self.finish(id, |op| op.mark_completed(result, Utc::now()))
    }

    /// Transitions Running → Failed with the captured error.
    pub(crate) fn fail(&self, id: OperationId, error: OperationError) -> Option<Operation<C>> {
        self.finish(id, |op| op.mark_failed(error, Utc::now()))
    }

    /// Compare-and-transition Pending → Cancelled.
    ///
    /// Succeeds only while the record is still Pending; once the worker has
    /// dequeued it (status Running or beyond) cancellation is refused and
    /// the operation proceeds normally. Atomic under the registry lock, so
    /// the cancel/dequeue race cannot produce a half-cancelled record.
    pub(crate) fn try_cancel(&self, id: OperationId) -> Option<Operation<C>> {
        let (snapshot, done) = {
            let mut inner = self.inner.lock().expect("registry lock poisoned");
            let entry = inner.get_mut(&id)?;
            if entry.op.status() != OperationStatus::Pending {
                return None;
            }
            entry.op.mark_cancelled();
            (entry.op.clone(), entry.done.clone())
        };
        done.notify_waiters();
        Some(snapshot)
    }

    /// Records collaborator-reported progress while the operation is Running.
    ///
    /// Reports against a non-Running record are dropped: a terminal record
    /// never changes, and a Pending one has nothing executing.
    pub(crate) fn set_progress(&self, id: OperationId, percent: f64) -> Option<Operation<C>> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let entry = inner.get_mut(&id)?;
        if entry.op.status() != OperationStatus::Running {
            return None;
        }
        entry.op.set_progress(percent);
        Some(entry.op.clone())
    }

    fn finish(
        &self,
        id: OperationId,
        apply: impl FnOnce(&mut Operation<C>),
    ) -> Option<Operation<C>> {
        let (snapshot, done) = {
            let mut inner = self.inner.lock().expect("registry lock poisoned");
            let entry = inner.get_mut(&id)?;
            if entry.op.status() != OperationStatus::Running {
                return None;
            }
            apply(&mut entry.op);
            (entry.op.clone(), entry.done.clone())
        };
        done.notify_waiters();
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::{BoxError, ProgressHandle, Request};

    #[derive(Debug, Clone)]
    struct Noop;

    impl Request for Noop {
        fn method(&self) -> &str {
            "noop"
        }
    }

    struct NoopClient;

    impl CommandClient for NoopClient {
        type Request = Noop;
        type Output = i32;

        fn invoke(&self, _request: Noop, _progress: &ProgressHandle) -> Result<i32, BoxError> {
            Ok(0)
        }
    }

    fn registry_with(id: u64) -> (Registry<NoopClient>, OperationId) {
        let registry = Registry::new();
        let id = OperationId::new(id);
        registry.insert(Operation::new(id, Noop));
        (registry, id)
    }

    #[test]
    fn get_returns_point_in_time_clone() {
        let (registry, id) = registry_with(1);
        let before = registry.get(id).unwrap();
        registry.begin(id).unwrap();

        // The earlier clone is unaffected by the transition.
        assert_eq!(before.status(), OperationStatus::Pending);
        assert_eq!(registry.get(id).unwrap().status(), OperationStatus::Running);
    }

    #[test]
    fn begin_refuses_non_pending_records() {
        let (registry, id) = registry_with(1);
        assert!(registry.begin(id).is_some());
        assert!(registry.begin(id).is_none());
        assert!(registry.begin(OperationId::new(99)).is_none());
    }

    #[test]
    fn cancel_succeeds_only_while_pending() {
        let (registry, id) = registry_with(1);
        assert!(registry.try_cancel(id).is_some());
        // At most once per id.
        assert!(registry.try_cancel(id).is_none());
        assert_eq!(
            registry.get(id).unwrap().status(),
            OperationStatus::Cancelled
        );

        let (registry, id) = registry_with(2);
        registry.begin(id).unwrap();
        assert!(registry.try_cancel(id).is_none());
        assert_eq!(registry.get(id).unwrap().status(), OperationStatus::Running);
    }

    #[test]
    fn cancelled_record_cannot_start_or_finish() {
        let (registry, id) = registry_with(1);
        registry.try_cancel(id).unwrap();

        assert!(registry.begin(id).is_none());
        assert!(registry.complete(id, 1).is_none());
        assert!(registry.fail(id, OperationError::Failed("x".into())).is_none());
        assert_eq!(
            registry.get(id).unwrap().status(),
            OperationStatus::Cancelled
        );
    }

    #[test]
    fn complete_sets_result_end_time_and_progress() {
        let (registry, id) = registry_with(1);
        registry.begin(id).unwrap();
        let op = registry.complete(id, 42).unwrap();

        assert_eq!(op.status(), OperationStatus::Completed);
        assert_eq!(op.result(), Some(&42));
        assert!(op.end_time().is_some());
        assert_eq!(op.progress(), 100.0);
        assert!(op.duration().is_some());
    }

    #[test]
    fn fail_sets_error_and_end_time() {
        let (registry, id) = registry_with(1);
        registry.begin(id).unwrap();
        let op = registry
            .fail(id, OperationError::Failed("boom".into()))
            .unwrap();

        assert_eq!(op.status(), OperationStatus::Failed);
        assert!(op.result().is_none());
        assert!(op.error().unwrap().to_string().contains("boom"));
        assert!(op.end_time().is_some());
    }

    #[test]
    fn progress_only_applies_while_running() {
        let (registry, id) = registry_with(1);
        assert!(registry.set_progress(id, 10.0).is_none());

        registry.begin(id).unwrap();
        assert_eq!(registry.set_progress(id, 55.0).unwrap().progress(), 55.0);

        registry.complete(id, 0).unwrap();
        assert!(registry.set_progress(id, 10.0).is_none());
        assert_eq!(registry.get(id).unwrap().progress(), 100.0);
    }

    #[test]
    fn snapshot_copies_all_entries() {
        let (registry, a) = registry_with(1);
        let b = OperationId::new(2);
        registry.insert(Operation::new(b, Noop));

        let snap = registry.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap.contains_key(&a));
        assert!(snap.contains_key(&b));
    }
}
