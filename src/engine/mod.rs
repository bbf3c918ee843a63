//! Asynchronous execution engine over a blocking command client.
//!
//! This is the concurrent core of the crate. Callers submit requests to an
//! [`Engine`] and receive an [`OperationId`] immediately; a single background
//! worker executes the requests in submission order against the wrapped
//! [`CommandClient`] and fans lifecycle events out to subscribers.
//!
//! Module organization, leaves first:
//! - `command`: the collaborator contract ([`CommandClient`], [`Request`],
//!   [`ProgressHandle`])
//! - `operation`: the record model ([`Operation`], [`OperationStatus`])
//! - `queue`: FIFO hand-off with sentinel and unfinished-count tracking
//! - `registry`: the single-lock concurrent record map
//! - `signal`: per-kind callback dispatch with fault isolation
//! - `worker`: the dequeue/execute/dispatch loop
//! - `engine`: the public facade composing the above

mod command;
#[allow(clippy::module_inception)]
mod engine;
mod operation;
mod queue;
mod registry;
mod signal;
mod worker;

pub use command::{BoxError, CommandClient, ProgressHandle, Request};
pub use engine::Engine;
pub use operation::{Operation, OperationError, OperationId, OperationStatus};
pub use signal::{SignalKind, SubscriptionId};
