//! Sandbox session state.

use crate::errors::SandboxFailure;

/// Lifecycle state of a sandbox session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SandboxState {
    /// Runtime not booted yet
    #[default]
    Uninitialized,
    /// Mounting files and installing dependencies
    Installing { attempt: u32 },
    /// Dev server launched, waiting for its ready signal
    Starting,
    /// Dev server listening at `url`
    Ready { url: String },
    /// Automatic installs halted until an explicit reload
    Failed(SandboxFailure),
    /// Session torn down; nothing is being served
    Stopped,
}

impl SandboxState {
    /// Check if no further automatic transitions will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Stopped)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Check if an install or start is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Installing { .. } | Self::Starting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Installing { .. } => "installing",
            Self::Starting => "starting",
            Self::Ready { .. } => "ready",
            Self::Failed(_) => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SandboxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installing { attempt } if *attempt > 1 => {
                write!(f, "installing (attempt {})", attempt)
            }
            Self::Ready { url } => write!(f, "ready at {}", url),
            Self::Failed(failure) => write!(f, "failed: {}", failure),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Observable snapshot of a sandbox session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SandboxState,
    /// Bumped by every (re)launch and by teardown; continuations from an
    /// older generation must not act.
    pub generation: u64,
    /// Retries used by the current install cycle.
    pub retry_count: u32,
    /// Installs that ran to completion over the whole session.
    pub install_attempts: u32,
    pub preview_address: Option<String>,
    pub last_failure: Option<SandboxFailure>,
}
