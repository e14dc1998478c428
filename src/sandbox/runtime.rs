//! The narrow contract the orchestrator needs from a sandboxed runtime.

use crate::errors::RuntimeError;
use crate::mount::MountDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from an argv-style list; `None` when the list is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn npm_install() -> Self {
        Self::new("npm", ["install"])
    }

    pub fn npm_run_dev() -> Self {
        Self::new("npm", ["run", "dev"])
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// The runtime's signal that its dev server is listening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerReady {
    pub port: u16,
    pub url: String,
}

impl ServerReady {
    pub fn new(port: u16, url: impl Into<String>) -> Self {
        Self {
            port,
            url: url.into(),
        }
    }
}

/// Abstraction over the sandboxed execution environment.
/// Real implementation: `LocalRuntime`. Tests use scripted doubles.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Make the runtime available. Called once per session before any other
    /// operation; an error means there is no runtime to drive.
    async fn boot(&self) -> Result<(), RuntimeError>;

    /// Replace the mounted project files with `descriptor`.
    async fn mount(&self, descriptor: &MountDescriptor) -> Result<(), RuntimeError>;

    /// Run a command to completion and return its exit code.
    async fn run(&self, command: &CommandSpec) -> Result<i32, RuntimeError>;

    /// Start a long-running command such as a dev server. Starting again
    /// while the previous one is still running is a no-op.
    async fn start(&self, command: &CommandSpec) -> Result<(), RuntimeError>;

    /// Server-ready notifications. The value is the latest announcement, or
    /// `None` while no dev server is listening. A closed channel means the
    /// runtime went away.
    fn server_ready(&self) -> watch::Receiver<Option<ServerReady>>;
}
