//! Operation records: immutable identity plus mutable lifecycle state for
//! one queued unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::command::{CommandClient, Request as _};

/// Status of an operation in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Waiting to be picked up by the worker.
    Pending,
    /// Currently executing against the command client.
    Running,
    /// Finished successfully; the record carries a result.
    Completed,
    /// The command client returned an error; the record carries it.
    Failed,
    /// Cancelled before the worker dequeued it.
    Cancelled,
}

impl OperationStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::Running => "RUNNING",
            OperationStatus::Completed => "COMPLETED",
            OperationStatus::Failed => "FAILED",
            OperationStatus::Cancelled => "CANCELLED",
        }
    }

    /// Returns true for Completed, Failed, and Cancelled.
    ///
    /// No transition exists out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OperationStatus::Pending),
            "RUNNING" => Ok(OperationStatus::Running),
            "COMPLETED" => Ok(OperationStatus::Completed),
            "FAILED" => Ok(OperationStatus::Failed),
            "CANCELLED" => Ok(OperationStatus::Cancelled),
            _ => Err(format!("unknown operation status: {}", s)),
        }
    }
}

/// Identifier assigned to an operation at submission time.
///
/// Ids come from a per-engine monotonically increasing counter and are never
/// reused. [`Display`](fmt::Display) renders the fixed-width token form,
/// e.g. `op_000001`. The default id (`op_000000`) is never issued by an
/// engine, so it doubles as a guaranteed-unknown id.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OperationId(u64);

impl OperationId {
    pub(crate) fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// The fixed-width token form of this id.
    pub fn token(&self) -> String {
        format!("op_{:06}", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op_{:06}", self.0)
    }
}

/// Failure information captured into an operation record.
///
/// Nested collaborator errors are flattened to strings so the record stays
/// cloneable and serializable.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum OperationError {
    /// The command client returned an error.
    #[error("command failed: {0}")]
    Failed(String),

    /// The command client panicked while executing.
    #[error("command panicked: {0}")]
    Panicked(String),
}

/// One queued unit of work wrapping a call to the command client.
///
/// The identity (`id`, request payload) is immutable; the lifecycle state
/// (`status`, `result`, `error`, timestamps, `progress`) is mutated only by
/// the registry, under its lock. Records handed out by the engine are
/// point-in-time clones.
pub struct Operation<C: CommandClient> {
    id: OperationId,
    request: C::Request,
    status: OperationStatus,
    result: Option<C::Output>,
    error: Option<OperationError>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    progress: f64,
}

impl<C: CommandClient> Operation<C> {
    pub(crate) fn new(id: OperationId, request: C::Request) -> Self {
        Self {
            id,
            request,
            status: OperationStatus::Pending,
            result: None,
            error: None,
            start_time: None,
            end_time: None,
            progress: 0.0,
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Name of the collaborator operation this record invokes.
    pub fn method(&self) -> &str {
        self.request.method()
    }

    /// The exact request payload supplied at submission time.
    pub fn request(&self) -> &C::Request {
        &self.request
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    /// Present only when the status is `Completed`.
    pub fn result(&self) -> Option<&C::Output> {
        self.result.as_ref()
    }

    /// Present only when the status is `Failed`.
    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Best-effort completion percentage, `0.0..=100.0`.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Wall-clock execution time, or `None` while the operation has not
    /// finished executing.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    // Lifecycle mutators. Only the registry calls these, under its lock;
    // the state machine lives here so every transition site stays small.

    pub(crate) fn mark_running(&mut self, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, OperationStatus::Pending);
        self.status = OperationStatus::Running;
        self.start_time = Some(now);
    }

    pub(crate) fn mark_completed(&mut self, result: C::Output, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, OperationStatus::Running);
        self.status = OperationStatus::Completed;
        self.result = Some(result);
        self.end_time = Some(now);
        self.progress = 100.0;
    }

    pub(crate) fn mark_failed(&mut self, error: OperationError, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, OperationStatus::Running);
        self.status = OperationStatus::Failed;
        self.error = Some(error);
        self.end_time = Some(now);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        debug_assert_eq!(self.status, OperationStatus::Pending);
        self.status = OperationStatus::Cancelled;
    }

    pub(crate) fn set_progress(&mut self, percent: f64) {
        self.progress = percent.clamp(0.0, 100.0);
    }
}

impl<C: CommandClient> Clone for Operation<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            request: self.request.clone(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            progress: self.progress,
        }
    }
}

impl<C: CommandClient> fmt::Debug for Operation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("method", &self.method())
            .field("status", &self.status)
            .field("result", &self.result)
            .field("error", &self.error)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("progress", &self.progress)
            .finish()
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
        type Output = ();

        fn invoke(&self, _request: Noop, _progress: &ProgressHandle) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn id_renders_as_fixed_width_token() {
        assert_eq!(OperationId::new(1).to_string(), "op_000001");
        assert_eq!(OperationId::new(42).token(), "op_000042");
        assert_eq!(OperationId::new(1_000_000).to_string(), "op_1000000");
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OperationStatus::Pending,
            OperationStatus::Running,
            OperationStatus::Completed,
            OperationStatus::Failed,
            OperationStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OperationStatus>().unwrap(), status);
        }
        assert!("BOGUS".parse::<OperationStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Running.is_terminal());
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(OperationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn duration_requires_both_timestamps() {
        let mut op: Operation<NoopClient> = Operation::new(OperationId::new(1), Noop);
        assert!(op.duration().is_none());

        let start = Utc::now();
        op.mark_running(start);
        assert!(op.duration().is_none());

        let end = start + chrono::Duration::milliseconds(250);
        op.mark_completed((), end);
        assert_eq!(op.duration(), Some(chrono::Duration::milliseconds(250)));
        assert_eq!(op.progress(), 100.0);
    }

    #[test]
    fn completion_sets_result_and_leaves_error_absent() {
        let mut op: Operation<NoopClient> = Operation::new(OperationId::new(7), Noop);
        op.mark_running(Utc::now());
        op.mark_completed((), Utc::now());

        assert_eq!(op.status(), OperationStatus::Completed);
        assert!(op.result().is_some());
        assert!(op.error().is_none());
        assert!(op.end_time().is_some());
    }
}
