//! Sandbox lifecycle: the runtime contract, a local runtime, and the
//! orchestrator that drives install and dev-server start with bounded retry.

mod local;
mod orchestrator;
mod runtime;
mod state;

pub use local::{LocalRuntime, detect_server_ready};
pub use orchestrator::{DEFAULT_MAX_RETRIES, LifecyclePolicy, SandboxOrchestrator};
pub use runtime::{CommandSpec, SandboxRuntime, ServerReady};
pub use state::{SandboxState, SessionSnapshot};
