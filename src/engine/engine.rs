//! Engine facade: submit, observe, cancel, wait, shut down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::command::{CommandClient, Request as _};
use super::operation::{Operation, OperationId, OperationStatus};
use super::queue::Queue;
use super::registry::Registry;
use super::signal::{SignalHub, SignalKind, SubscriptionId};
use super::worker::{self, WorkerContext};

/// Bounded wait applied when joining the worker during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Asynchronous execution engine over a blocking [`CommandClient`].
///
/// Callers submit requests and get an [`OperationId`] back immediately; a
/// single background worker executes them in submission order. Lifecycle
/// can be observed three ways: polling [`status`](Engine::status), blocking
/// on [`wait`](Engine::wait) / [`wait_all`](Engine::wait_all), or
/// subscribing callbacks per [`SignalKind`].
///
/// Each engine instance owns its counter, registry, queue, and worker;
/// multiple engines are independent.
///
/// # Example
///
/// ```no_run
/// use p4cmd::engine::{Engine, SignalKind};
/// use p4cmd::client::{P4Call, P4Client, ClientOptions};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Arc::new(P4Client::new("/work/depot", ClientOptions::default())?);
/// let engine = Engine::new(client);
///
/// engine.subscribe(SignalKind::Completed, |op| {
///     println!("{} finished: {}", op.id(), op.method());
/// });
///
/// let id = engine.submit(P4Call::SyncFolders {
///     folders: vec!["//depot/project".into()],
/// });
/// let result = engine.wait(id, None).await;
/// # let _ = result;
/// engine.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Engine<C: CommandClient> {
    client: Arc<C>,
    registry: Arc<Registry<C>>,
    queue: Arc<Queue>,
    signals: Arc<SignalHub<C>>,
    counter: AtomicU64,
    shutdown: AtomicBool,
    token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<C: CommandClient> Engine<C> {
    /// Creates the engine and starts its worker.
    ///
    /// Must be called from within a tokio runtime; the worker is a spawned
    /// task that lives until [`shutdown`](Engine::shutdown).
    pub fn new(client: Arc<C>) -> Self {
        let registry = Arc::new(Registry::new());
        let signals = Arc::new(SignalHub::new());
        let (queue, rx) = Queue::new();
        let token = CancellationToken::new();

        let handle = worker::spawn(
            WorkerContext {
                client: client.clone(),
                registry: registry.clone(),
                queue: queue.clone(),
                signals: signals.clone(),
                token: token.clone(),
            },
            rx,
        );

        Self {
            client,
            registry,
            queue,
            signals,
            counter: AtomicU64::new(1),
            shutdown: AtomicBool::new(false),
            token,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// The wrapped command client, for direct blocking use.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Enqueues a request for execution and returns its id immediately.
    ///
    /// Never blocks on execution and never fails. After shutdown the record
    /// is still created (so `status` keeps working) but it stays Pending
    /// forever and is never executed.
    pub fn submit(&self, request: C::Request) -> OperationId {
        let id = OperationId::new(self.counter.fetch_add(1, Ordering::SeqCst));
        debug!(op = %id, method = request.method(), "operation submitted");
        self.registry.insert(Operation::new(id, request));

        if self.shutdown.load(Ordering::SeqCst) {
            warn!(op = %id, "engine is shut down; operation will never run");
        } else {
            self.queue.enqueue(id);
        }
        id
    }

    /// Point-in-time clone of one operation record, or `None` for an
    /// unknown id.
    pub fn status(&self, id: OperationId) -> Option<Operation<C>> {
        self.registry.get(id)
    }

    /// Point-in-time clone of every operation record, keyed by id.
    pub fn operations(&self) -> HashMap<OperationId, Operation<C>> {
        self.registry.snapshot()
    }

    /// Attempts to cancel an operation.
    ///
    /// Succeeds only while the record is still Pending; a running operation
    /// cannot be interrupted and proceeds normally. On success the
    /// `Cancelled` signal is dispatched on the calling thread and `true` is
    /// returned exactly once for the id.
    pub fn cancel(&self, id: OperationId) -> bool {
        match self.registry.try_cancel(id) {
            Some(op) => {
                debug!(op = %id, "operation cancelled");
                self.signals.dispatch(SignalKind::Cancelled, &op);
                true
            }
            None => false,
        }
    }

    /// Blocks until the operation reaches a terminal status or the timeout
    /// elapses, and returns its result.
    ///
    /// Only a Completed operation yields `Some`; Failed, Cancelled, timeout,
    /// and unknown ids all yield `None`. Callers that need to tell those
    /// apart inspect [`status`](Engine::status). The timeout bounds only the
    /// caller's patience: the operation itself keeps running regardless.
    pub async fn wait(&self, id: OperationId, timeout: Option<Duration>) -> Option<C::Output> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            let notify = self.registry.notifier(id)?;
            let notified = notify.notified();
            tokio::pin!(notified);
            // Register before re-checking the status so a terminal
            // transition between the check and the await cannot be missed.
            notified.as_mut().enable();

            let op = self.registry.get(id)?;
            if op.status().is_terminal() {
                return match op.status() {
                    OperationStatus::Completed => op.result().cloned(),
                    _ => None,
                };
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Blocks until every accepted operation has been processed.
    ///
    /// Returns true once the queue is drained, false if the timeout elapses
    /// first. Without a timeout this waits indefinitely via the queue's
    /// join.
    pub async fn wait_all(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            None => {
                self.queue.join().await;
                true
            }
            Some(t) => tokio::time::timeout(t, self.queue.join()).await.is_ok(),
        }
    }

    /// Count of operations accepted but not yet processed by the worker.
    pub fn pending_operations(&self) -> usize {
        self.queue.unfinished()
    }

    /// Registers a callback for one signal kind.
    ///
    /// Callbacks for `Started`, `Progress`, `Completed`, and `Failed` run on
    /// the worker (or the collaborator's blocking thread, for `Progress`);
    /// `Cancelled` runs on the thread that issued the cancel. A callback
    /// that blocks stalls the worker and every subsequent operation.
    pub fn subscribe(
        &self,
        kind: SignalKind,
        callback: impl Fn(&Operation<C>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.signals.subscribe(kind, callback)
    }

    /// Removes a previously registered callback. Returns false if it was
    /// already gone.
    pub fn unsubscribe(&self, kind: SignalKind, id: SubscriptionId) -> bool {
        self.signals.unsubscribe(kind, id)
    }

    /// True once `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stops the worker and waits for it, bounded by a grace period.
    ///
    /// Idempotent: safe to call repeatedly and safe to call after the worker
    /// already exited. A currently running operation finishes first; queued
    /// operations behind it are never started.
    pub async fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            info!("engine shutting down");
        }
        self.token.cancel();
        self.queue.push_shutdown();

        let handle = self
            .worker
            .lock()
            .expect("worker handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("worker did not stop within the shutdown grace period");
            }
        }
    }
}

impl<C: CommandClient> Drop for Engine<C> {
    fn drop(&mut self) {
        // Best effort: make sure the worker task is not left behind when the
        // engine is dropped without an explicit shutdown.
        self.token.cancel();
    }
}
