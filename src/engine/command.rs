//! Collaborator contract consumed by the engine.
//!
//! The engine knows nothing about Perforce. It executes *requests* against a
//! *command client*, a blocking collaborator that accepts a request and either
//! returns an output or fails. What requests look like, and what running one
//! means, is entirely the collaborator's business.

use std::fmt;
use std::sync::Arc;

/// A boxed error that can be sent across threads.
///
/// This is the standard error type used throughout async Rust ecosystems
/// (tokio, tower, axum, etc.). Any error implementing `std::error::Error`
/// can be automatically converted to this type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A unit of work the engine can hand to its collaborator.
///
/// Requests are self-describing: they name the collaborator operation they
/// invoke and carry the exact payload supplied at submission time. The engine
/// never inspects the payload and never validates the method name.
pub trait Request: Clone + fmt::Debug + Send + Sync + 'static {
    /// Name of the collaborator operation this request invokes.
    ///
    /// Used for logging and for the operation record; opaque to the engine.
    fn method(&self) -> &str;
}

/// Blocking command-execution client wrapped by the engine.
///
/// `invoke` blocks the calling thread for the full duration of the command.
/// The engine runs it on a blocking-capable thread via
/// [`tokio::task::spawn_blocking`], one request at a time, in submission
/// order. Implementations report best-effort progress through the supplied
/// [`ProgressHandle`]; they are free to never call it.
///
/// # Example
///
/// ```no_run
/// use p4cmd::engine::{BoxError, CommandClient, ProgressHandle, Request};
///
/// #[derive(Debug, Clone)]
/// struct Echo(String);
///
/// impl Request for Echo {
///     fn method(&self) -> &str {
///         "echo"
///     }
/// }
///
/// struct EchoClient;
///
/// impl CommandClient for EchoClient {
///     type Request = Echo;
///     type Output = String;
///
///     fn invoke(&self, request: Echo, _progress: &ProgressHandle) -> Result<String, BoxError> {
///         Ok(request.0)
///     }
/// }
/// ```
pub trait CommandClient: Send + Sync + 'static {
    /// The request type this client executes.
    type Request: Request;

    /// The value produced by a successful invocation.
    type Output: Clone + fmt::Debug + Send + Sync + 'static;

    /// Executes the request, blocking the calling thread until it finishes.
    fn invoke(
        &self,
        request: Self::Request,
        progress: &ProgressHandle,
    ) -> Result<Self::Output, BoxError>;
}

/// Best-effort progress reporting handle passed to the collaborator.
///
/// Reports are forwarded to the operation record and to `Progress`
/// subscribers. Percentages are clamped to `0.0..=100.0`. Reports arriving
/// after the operation reached a terminal state are dropped.
pub struct ProgressHandle {
    report: Arc<dyn Fn(f64) + Send + Sync>,
}

impl ProgressHandle {
    pub(crate) fn new(report: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self {
            report: Arc::new(report),
        }
    }

    /// A handle that discards all reports.
    ///
    /// Useful when calling a [`CommandClient`] directly, outside the engine.
    pub fn disabled() -> Self {
        Self::new(|_| {})
    }

    /// Reports completion of `percent` of the work, best effort.
    pub fn report(&self, percent: f64) {
        (self.report)(percent.clamp(0.0, 100.0));
    }
}

impl fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHandle").finish_non_exhaustive()
    }
}
