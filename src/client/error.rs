//! Client-layer errors.

use thiserror::Error;

/// Errors produced by the blocking Perforce client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Workspace configuration could not be discovered or is invalid.
    #[error("workspace error: {0}")]
    Workspace(String),

    /// A changelist could not be created, resolved, or submitted.
    #[error("changelist error: {0}")]
    Changelist(String),

    /// The configured Perforce server did not answer the connection probe.
    #[error("server {0} is not reachable")]
    ServerOffline(String),

    /// The `p4` binary ran but the command itself failed.
    #[error("p4 {command} failed: {message}")]
    Command { command: String, message: String },

    /// Command output did not have the expected shape.
    #[error("failed to parse p4 output: {0}")]
    Parse(String),

    /// The `p4` binary could not be spawned or its pipes broke.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
