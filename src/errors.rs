//! Typed error hierarchy for the sitecraft pipeline.
//!
//! One enum per subsystem:
//! - `DecodeError`: malformed action logs (batch dropped, pipeline continues)
//! - `PathConflict`: file/folder collisions detected during synthesis
//! - `RuntimeError`: failures reported by a sandboxed runtime implementation
//! - `SandboxFailure`: terminal orchestrator failures surfaced via `last_failure()`
//! - `ChatError`: chat backend request failures
//! - `SessionError`: build-session level errors wrapping the above

use thiserror::Error;

/// Errors from decoding one action-log document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Artifact opened at byte {offset} is never closed")]
    UnterminatedArtifact { offset: usize },

    #[error("Action {index} in artifact {artifact} is never closed")]
    UnterminatedAction { artifact: usize, index: usize },

    #[error("Action {index} of type '{kind}' has no filePath attribute")]
    MissingPath { index: usize, kind: String },
}

/// A step tried to place a file where a folder lives, or to descend through a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathConflict {
    #[error("Cannot write file '{path}': a folder already exists at that path")]
    FolderExists { path: String },

    #[error("Cannot create '{path}': '{file}' is a file, not a folder")]
    FileInPath { path: String, file: String },
}

impl PathConflict {
    /// The path of the step that was rejected.
    pub fn path(&self) -> &str {
        match self {
            Self::FolderExists { path } | Self::FileInPath { path, .. } => path,
        }
    }
}

/// Errors raised by a `SandboxRuntime` implementation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Sandbox runtime is not available: {0}")]
    Unavailable(String),

    #[error("Sandbox runtime disconnected: {0}")]
    Disconnected(String),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to mount files: {0}")]
    Mount(#[source] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Terminal failure of a sandbox session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxFailure {
    #[error("Dependency installation failed after {attempts} attempts (last exit code {exit_code})")]
    InstallFailed { attempts: u32, exit_code: i32 },

    #[error("Sandbox runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Dev server did not report ready within {timeout:?}")]
    ReadyTimeout { timeout: std::time::Duration },

    #[error("Sandbox runtime error: {0}")]
    Runtime(String),
}

impl SandboxFailure {
    /// Whether an explicit reload may restart the session.
    ///
    /// A runtime that never became available has nothing to retry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::RuntimeUnavailable(_))
    }
}

impl From<RuntimeError> for SandboxFailure {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Unavailable(_) | RuntimeError::Disconnected(_) => {
                Self::RuntimeUnavailable(err.to_string())
            }
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Errors from the chat backend.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Chat backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Message must not be empty")]
    EmptyMessage,
}

/// Errors from a build session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to decode action log: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Sandbox session cannot be reloaded: {0}")]
    NotReloadable(SandboxFailure),

    #[error("No sandbox runtime attached to this session")]
    NoSandbox,

    #[error("No chat backend attached to this session")]
    NoBackend,
}
