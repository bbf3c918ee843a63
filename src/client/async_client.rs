//! Asynchronous facade over [`P4Client`].
//!
//! Each `*_async` method enqueues one operation and returns its id
//! without blocking; the engine's worker runs the commands one at a time
//! in submission order. Lifecycle callbacks, waiting, cancellation, and
//! shutdown are all forwarded to the wrapped [`Engine`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{Engine, Operation, OperationId, SignalKind, SubscriptionId};

use super::call::{Changelist, P4Call, P4Output};
use super::error::Result;
use super::p4::{ClientOptions, P4Client};

/// A [`P4Client`] wrapped in an operation engine.
///
/// # Example
///
/// ```no_run
/// use p4cmd::client::{AsyncP4Client, ClientOptions};
/// use p4cmd::engine::SignalKind;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let p4 = AsyncP4Client::new("/work/depot", ClientOptions::default())?;
///
/// p4.connect_signal(SignalKind::Completed, |op| {
///     println!("{} done: {}", op.id(), op.method());
/// });
///
/// let id = p4.sync_folders_async(vec!["//depot/project".into()]);
/// let result = p4.wait_for_operation(id, None).await;
/// # let _ = result;
/// p4.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct AsyncP4Client {
    client: Arc<P4Client>,
    engine: Engine<P4Client>,
}

impl AsyncP4Client {
    /// Creates the blocking client and the engine around it.
    ///
    /// Must be called from within a tokio runtime; the engine spawns its
    /// worker task immediately.
    pub fn new(perforce_root: impl Into<std::path::PathBuf>, options: ClientOptions) -> Result<Self> {
        Ok(Self::with_client(Arc::new(P4Client::new(
            perforce_root,
            options,
        )?)))
    }

    /// Like [`new`](Self::new), rooted at the `P4ROOT` environment
    /// variable.
    pub fn from_env(options: ClientOptions) -> Result<Self> {
        Ok(Self::with_client(Arc::new(P4Client::from_env(options)?)))
    }

    /// Wraps an already constructed client.
    pub fn with_client(client: Arc<P4Client>) -> Self {
        let engine = Engine::new(client.clone());
        Self { client, engine }
    }

    /// The wrapped blocking client, for direct synchronous use.
    pub fn client(&self) -> &Arc<P4Client> {
        &self.client
    }

    /// The underlying engine, for access beyond the `*_async` surface.
    pub fn engine(&self) -> &Engine<P4Client> {
        &self.engine
    }

    // Submission. Each call returns immediately with the operation id;
    // the outcome is observed via signals, wait_for_operation, or
    // operation_status.

    /// Enqueues an arbitrary `p4` command.
    pub fn run_cmd_async(&self, cmd: impl Into<String>, args: Vec<String>) -> OperationId {
        self.engine.submit(P4Call::RunCmd {
            cmd: cmd.into(),
            args,
        })
    }

    /// Enqueues a file sync. Progress signals fire per argument chunk.
    pub fn sync_files_async(
        &self,
        files: Vec<String>,
        revision: Option<u32>,
        force: bool,
    ) -> OperationId {
        self.engine.submit(P4Call::SyncFiles {
            files,
            revision,
            force,
        })
    }

    /// Enqueues a recursive folder sync.
    pub fn sync_folders_async(&self, folders: Vec<String>) -> OperationId {
        self.engine.submit(P4Call::SyncFolders { folders })
    }

    /// Enqueues an `fstat` of the given files.
    pub fn files_to_p4files_async(&self, files: Vec<String>, allow_invalid: bool) -> OperationId {
        self.engine.submit(P4Call::FilesToP4Files {
            files,
            allow_invalid,
        })
    }

    /// Enqueues an `fstat` of everything under a folder.
    pub fn folder_to_p4files_async(
        &self,
        folder: impl Into<String>,
        include_subfolders: bool,
        allow_invalid: bool,
    ) -> OperationId {
        self.engine.submit(P4Call::FolderToP4Files {
            folder: folder.into(),
            include_subfolders,
            allow_invalid,
        })
    }

    /// Enqueues creation of a numbered changelist.
    pub fn make_new_changelist_async(&self, description: impl Into<String>) -> OperationId {
        self.engine.submit(P4Call::MakeNewChangelist {
            description: description.into(),
        })
    }

    /// Enqueues a reopen of files into another changelist.
    pub fn move_files_to_changelist_async(
        &self,
        files: Vec<String>,
        changelist: Changelist,
    ) -> OperationId {
        self.engine
            .submit(P4Call::MoveFilesToChangelist { files, changelist })
    }

    /// Enqueues opening files for edit.
    pub fn edit_files_async(&self, files: Vec<String>, changelist: Changelist) -> OperationId {
        self.engine.submit(P4Call::EditFiles { files, changelist })
    }

    /// Enqueues opening files for add.
    pub fn add_files_async(&self, files: Vec<String>, changelist: Changelist) -> OperationId {
        self.engine.submit(P4Call::AddFiles { files, changelist })
    }

    /// Enqueues marking files for delete.
    pub fn delete_files_async(&self, files: Vec<String>, changelist: Changelist) -> OperationId {
        self.engine.submit(P4Call::DeleteFiles { files, changelist })
    }

    /// Enqueues a move-rename.
    pub fn rename_file_async(
        &self,
        old_path: impl Into<String>,
        new_path: impl Into<String>,
        changelist: Changelist,
    ) -> OperationId {
        self.engine.submit(P4Call::RenameFile {
            old_path: old_path.into(),
            new_path: new_path.into(),
            changelist,
        })
    }

    /// Enqueues a copy.
    pub fn copy_file_async(
        &self,
        original_path: impl Into<String>,
        copied_path: impl Into<String>,
        changelist: Changelist,
    ) -> OperationId {
        self.engine.submit(P4Call::CopyFile {
            original_path: original_path.into(),
            copied_path: copied_path.into(),
            changelist,
        })
    }

    /// Enqueues listing the files in a changelist.
    pub fn get_files_in_changelist_async(&self, changelist: Changelist) -> OperationId {
        self.engine.submit(P4Call::GetFilesInChangelist { changelist })
    }

    /// Enqueues a revert.
    pub fn revert_files_async(&self, files: Vec<String>, unchanged_only: bool) -> OperationId {
        self.engine.submit(P4Call::RevertFiles {
            files,
            unchanged_only,
        })
    }

    /// Enqueues a changelist submit.
    pub fn submit_changelist_async(&self, changelist: u32) -> OperationId {
        self.engine.submit(P4Call::SubmitChangelist { changelist })
    }

    // Observation and control, forwarded to the engine.

    /// Registers a lifecycle callback.
    pub fn connect_signal(
        &self,
        kind: SignalKind,
        callback: impl Fn(&Operation<P4Client>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.engine.subscribe(kind, callback)
    }

    /// Removes a lifecycle callback.
    pub fn disconnect_signal(&self, kind: SignalKind, id: SubscriptionId) -> bool {
        self.engine.unsubscribe(kind, id)
    }

    /// Point-in-time record of one operation.
    pub fn operation_status(&self, id: OperationId) -> Option<Operation<P4Client>> {
        self.engine.status(id)
    }

    /// Point-in-time records of every operation submitted so far.
    pub fn operations(&self) -> HashMap<OperationId, Operation<P4Client>> {
        self.engine.operations()
    }

    /// Cancels an operation that has not started yet.
    pub fn cancel_operation(&self, id: OperationId) -> bool {
        self.engine.cancel(id)
    }

    /// Waits for one operation and returns its output if it completed.
    pub async fn wait_for_operation(
        &self,
        id: OperationId,
        timeout: Option<Duration>,
    ) -> Option<P4Output> {
        self.engine.wait(id, timeout).await
    }

    /// Waits until every accepted operation has been processed.
    pub async fn wait_for_all_operations(&self, timeout: Option<Duration>) -> bool {
        self.engine.wait_all(timeout).await
    }

    /// Count of operations accepted but not yet processed.
    pub fn pending_operations(&self) -> usize {
        self.engine.pending_operations()
    }

    /// Stops the worker. Operations still queued are never started.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.engine.is_shut_down()
    }
}
