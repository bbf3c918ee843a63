//! Perforce command client with an asynchronous operation engine.
//!
//! The crate has two layers:
//!
//! - [`client`]: a blocking [`P4Client`](client::P4Client) that shells
//!   out to the `p4` binary, plus [`AsyncP4Client`](client::AsyncP4Client),
//!   which runs the same commands through the engine so callers get an
//!   operation id back immediately instead of blocking.
//! - [`engine`]: the generic execution core: a single worker drains a
//!   FIFO queue of submitted requests, executes them one at a time
//!   against any blocking [`CommandClient`](engine::CommandClient), and
//!   fans lifecycle signals (started, progress, completed, failed,
//!   cancelled) out to subscribers.
//!
//! # Quick start
//!
//! ```no_run
//! use p4cmd::client::{AsyncP4Client, ClientOptions};
//! use p4cmd::engine::SignalKind;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let p4 = AsyncP4Client::new("/work/depot", ClientOptions::default())?;
//!
//! p4.connect_signal(SignalKind::Failed, |op| {
//!     eprintln!("{} failed: {:?}", op.id(), op.error());
//! });
//!
//! let sync = p4.sync_folders_async(vec!["//depot/project".into()]);
//! if p4.wait_for_operation(sync, None).await.is_some() {
//!     println!("synced");
//! }
//! p4.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod engine;

pub use client::{AsyncP4Client, Changelist, ClientError, ClientOptions, P4Call, P4Client, P4File, P4Output};
pub use engine::{CommandClient, Engine, Operation, OperationId, OperationStatus, SignalKind};
