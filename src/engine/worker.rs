//! Single-worker execution loop.
//!
//! Exactly one worker task drains the queue, so operations execute strictly
//! in submission order with at most one running at any instant. Each
//! collaborator call runs on a blocking-capable thread via `spawn_blocking`
//! and is awaited to completion before the next dequeue.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::command::{CommandClient, ProgressHandle};
use super::operation::{OperationError, OperationId};
use super::queue::{Queue, QueueItem};
use super::registry::Registry;
use super::signal::{SignalHub, SignalKind};

pub(crate) struct WorkerContext<C: CommandClient> {
    pub(crate) client: Arc<C>,
    pub(crate) registry: Arc<Registry<C>>,
    pub(crate) queue: Arc<Queue>,
    pub(crate) signals: Arc<SignalHub<C>>,
    pub(crate) token: CancellationToken,
}

pub(crate) fn spawn<C: CommandClient>(
    ctx: WorkerContext<C>,
    rx: UnboundedReceiver<QueueItem>,
) -> JoinHandle<()> {
    tokio::spawn(run(ctx, rx))
}

async fn run<C: CommandClient>(ctx: WorkerContext<C>, mut rx: UnboundedReceiver<QueueItem>) {
    debug!("operation worker started");
    loop {
        tokio::select! {
            biased;

            _ = ctx.token.cancelled() => {
                debug!("operation worker received shutdown signal");
                break;
            }

            item = rx.recv() => match item {
                None | Some(QueueItem::Shutdown) => break,
                Some(QueueItem::Run(id)) => {
                    execute(&ctx, id).await;
                    ctx.queue.task_done();
                }
            }
        }
    }
    debug!("operation worker stopped");
}

/// Runs one operation to a terminal state.
///
/// Nothing here ever propagates an error out of the worker: collaborator
/// failures and panics are captured into the record, and callback faults are
/// contained inside the signal hub.
async fn execute<C: CommandClient>(ctx: &WorkerContext<C>, id: OperationId) {
    // Pending → Running, atomically against cancel. A record that is no
    // longer Pending was cancelled before dequeue; skip it without any
    // Started/Completed/Failed dispatch.
    let Some(started) = ctx.registry.begin(id) else {
        debug!(op = %id, "skipping operation no longer pending");
        return;
    };

    debug!(op = %id, method = started.method(), "operation started");
    ctx.signals.dispatch(SignalKind::Started, &started);

    let request = started.request().clone();
    let client = ctx.client.clone();
    let registry = ctx.registry.clone();
    let signals = ctx.signals.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let progress = ProgressHandle::new(move |percent| {
            if let Some(op) = registry.set_progress(id, percent) {
                signals.dispatch(SignalKind::Progress, &op);
            }
        });
        client.invoke(request, &progress)
    })
    .await;

    match outcome {
        Ok(Ok(result)) => {
            if let Some(op) = ctx.registry.complete(id, result) {
                debug!(op = %id, "operation completed");
                ctx.signals.dispatch(SignalKind::Completed, &op);
            }
        }
        Ok(Err(e)) => {
            warn!(op = %id, error = %e, "operation failed");
            if let Some(op) = ctx.registry.fail(id, OperationError::Failed(e.to_string())) {
                ctx.signals.dispatch(SignalKind::Failed, &op);
            }
        }
        Err(join_err) => {
            // The collaborator panicked on the blocking thread. Contain it
            // as a failed operation and keep the worker alive.
            error!(op = %id, "command client panicked: {}", join_err);
            let captured = OperationError::Panicked(join_err.to_string());
            if let Some(op) = ctx.registry.fail(id, captured) {
                ctx.signals.dispatch(SignalKind::Failed, &op);
            }
        }
    }
}
