//! Sandbox lifecycle orchestration.
//!
//! Drives a `SandboxRuntime` through mount → install → dev-server start →
//! ready, with a bounded number of install retries:
//!
//! ```text
//! Uninitialized ──boot──▶ Installing ──exit 0──▶ Starting ──ready──▶ Ready
//!                          │   ▲                                     │
//!                 exit ≠ 0 │   │ retry < max          reload/remount │
//!                          ▼   │                                     ▼
//!                   Failed ◀───┘ retry ≥ max                    Installing
//! ```
//!
//! Each (re)launch runs in its own driver task tagged with a session
//! generation. Reload and teardown cancel the driver and bump the
//! generation, so a continuation from an abandoned cycle can never move the
//! session state.

use super::runtime::{CommandSpec, SandboxRuntime, ServerReady};
use super::state::{SandboxState, SessionSnapshot};
use crate::errors::SandboxFailure;
use crate::mount::MountDescriptor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default number of install retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Policy values for a sandbox session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub max_retries: u32,
    pub install: CommandSpec,
    pub dev_server: CommandSpec,
    /// Give up waiting for the ready signal after this long.
    pub ready_timeout: Option<Duration>,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            install: CommandSpec::npm_install(),
            dev_server: CommandSpec::npm_run_dev(),
            ready_timeout: None,
        }
    }
}

struct Driver {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the sandbox session and is the only issuer of runtime commands.
pub struct SandboxOrchestrator {
    runtime: Arc<dyn SandboxRuntime>,
    policy: Arc<LifecyclePolicy>,
    state: Arc<watch::Sender<SessionSnapshot>>,
    /// Subscribed once per session, on first start.
    ready: Option<watch::Receiver<Option<ServerReady>>>,
    mounted: Option<Arc<MountDescriptor>>,
    driver: Option<Driver>,
}

impl SandboxOrchestrator {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, policy: LifecyclePolicy) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            runtime,
            policy: Arc::new(policy),
            state: Arc::new(state),
            ready: None,
            mounted: None,
            driver: None,
        }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Boot the runtime and begin the first install cycle.
    ///
    /// Starting an already-started session is a no-op.
    pub async fn start(&mut self, descriptor: Arc<MountDescriptor>) -> Result<(), SandboxFailure> {
        if self.state.borrow().state != SandboxState::Uninitialized {
            debug!("sandbox already started, ignoring start");
            return Ok(());
        }

        if let Err(err) = self.runtime.boot().await {
            let failure = SandboxFailure::RuntimeUnavailable(err.to_string());
            error!(error = %failure, "sandbox runtime failed to boot");
            self.state.send_modify(|s| {
                s.state = SandboxState::Failed(failure.clone());
                s.last_failure = Some(failure.clone());
            });
            return Err(failure);
        }

        if self.ready.is_none() {
            self.ready = Some(self.runtime.server_ready());
        }

        info!("sandbox runtime booted");
        self.launch(descriptor).await;
        Ok(())
    }

    /// Remount `descriptor` and force a fresh install cycle.
    ///
    /// This is the explicit user reload: it also restarts a session that
    /// failed for a recoverable reason.
    pub async fn reload(&mut self, descriptor: Arc<MountDescriptor>) -> Result<(), SandboxFailure> {
        let current = self.state.borrow().state.clone();
        match current {
            SandboxState::Uninitialized => return self.start(descriptor).await,
            SandboxState::Failed(failure) if !failure.is_recoverable() => return Err(failure),
            _ => {}
        }

        info!(state = %current, "reloading sandbox");
        self.launch(descriptor).await;
        Ok(())
    }

    /// React to new mount contents without an explicit user request.
    ///
    /// Returns true when a new install cycle was started. Identical contents
    /// and failed sessions are left alone.
    pub async fn remount(
        &mut self,
        descriptor: Arc<MountDescriptor>,
    ) -> Result<bool, SandboxFailure> {
        if self.mounted.as_deref() == Some(descriptor.as_ref()) {
            debug!("mount contents unchanged, skipping reinstall");
            return Ok(false);
        }

        let current = self.state.borrow().state.clone();
        match current {
            SandboxState::Uninitialized => self.start(descriptor).await.map(|_| true),
            SandboxState::Failed(failure) => {
                warn!(error = %failure, "sandbox failed, waiting for explicit reload");
                Ok(false)
            }
            SandboxState::Stopped => {
                debug!("sandbox stopped, ignoring remount");
                Ok(false)
            }
            _ => {
                info!(state = %current, "mount contents changed, reinstalling");
                self.launch(descriptor).await;
                Ok(true)
            }
        }
    }

    /// Abandon any in-flight work and invalidate the session generation.
    ///
    /// The session ends `Stopped` with no preview address. An explicit
    /// reload brings it back up.
    pub async fn shutdown(&mut self) {
        self.stop_driver().await;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.state = SandboxState::Stopped;
            s.preview_address = None;
        });
        debug!("sandbox session torn down");
    }

    pub fn current_preview_address(&self) -> Option<String> {
        self.state.borrow().preview_address.clone()
    }

    pub fn last_failure(&self) -> Option<SandboxFailure> {
        self.state.borrow().last_failure.clone()
    }

    pub fn state(&self) -> SandboxState {
        self.state.borrow().state.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Watch session snapshots as they change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Descriptor most recently handed to the runtime.
    pub fn mounted(&self) -> Option<&MountDescriptor> {
        self.mounted.as_deref()
    }

    async fn launch(&mut self, descriptor: Arc<MountDescriptor>) {
        self.stop_driver().await;

        let Some(ready) = self.ready.clone() else {
            warn!("launch requested before the runtime was booted");
            return;
        };

        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.retry_count = 0;
            s.state = SandboxState::Installing { attempt: 1 };
            s.preview_address = None;
            s.last_failure = None;
            generation = s.generation;
        });
        self.mounted = Some(Arc::clone(&descriptor));

        let cycle = Cycle {
            runtime: Arc::clone(&self.runtime),
            policy: Arc::clone(&self.policy),
            state: Arc::clone(&self.state),
            ready,
            generation,
        };
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!(generation, "sandbox cycle cancelled"),
                _ = cycle.run(descriptor) => {}
            }
        });

        self.driver = Some(Driver { cancel, handle });
    }

    /// Cancel the current driver and wait until it is gone, so that at most
    /// one install is ever in flight.
    async fn stop_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.cancel.cancel();
            if let Err(err) = driver.handle.await
                && err.is_panic()
            {
                error!(error = %err, "sandbox cycle panicked");
            }
        }
    }
}

impl Drop for SandboxOrchestrator {
    fn drop(&mut self) {
        if let Some(driver) = &self.driver {
            driver.cancel.cancel();
        }
    }
}

enum InstallOutcome {
    Succeeded,
    Retry,
    Stop,
}

/// One generation's install → start → ready cycle.
struct Cycle {
    runtime: Arc<dyn SandboxRuntime>,
    policy: Arc<LifecyclePolicy>,
    state: Arc<watch::Sender<SessionSnapshot>>,
    ready: watch::Receiver<Option<ServerReady>>,
    generation: u64,
}

impl Cycle {
    async fn run(mut self, descriptor: Arc<MountDescriptor>) {
        if let Err(err) = self.runtime.mount(&descriptor).await {
            self.fail(err.into());
            return;
        }
        debug!(generation = self.generation, entries = descriptor.len(), "mounted project files");

        loop {
            let attempt = self.state.borrow().retry_count + 1;
            info!(
                generation = self.generation,
                attempt,
                command = %self.policy.install,
                "installing dependencies"
            );
            let exit_code = match self.runtime.run(&self.policy.install).await {
                Ok(code) => code,
                Err(err) => {
                    self.fail(err.into());
                    return;
                }
            };
            match self.record_install(exit_code) {
                InstallOutcome::Succeeded => break,
                InstallOutcome::Retry => continue,
                InstallOutcome::Stop => return,
            }
        }

        info!(
            generation = self.generation,
            command = %self.policy.dev_server,
            "starting dev server"
        );
        if let Err(err) = self.runtime.start(&self.policy.dev_server).await {
            self.fail(err.into());
            return;
        }

        let ready_timeout = self.policy.ready_timeout;
        let announced = match ready_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.next_announcement()).await {
                Ok(result) => result,
                Err(_) => {
                    self.fail(SandboxFailure::ReadyTimeout { timeout: limit });
                    return;
                }
            },
            None => self.next_announcement().await,
        };
        let Some(ready) = announced else {
            self.fail(SandboxFailure::RuntimeUnavailable(
                "server-ready channel closed".to_string(),
            ));
            return;
        };
        self.mark_ready(ready);

        // Keep following the runtime while ready: a moved server updates the
        // preview address, a stopped one fails the session.
        loop {
            if self.ready.changed().await.is_err() {
                self.fail(SandboxFailure::RuntimeUnavailable(
                    "sandbox runtime disconnected".to_string(),
                ));
                return;
            }
            let latest = self.ready.borrow_and_update().clone();
            match latest {
                Some(ready) => self.mark_ready(ready),
                None => {
                    self.fail(SandboxFailure::Runtime("dev server stopped".to_string()));
                    return;
                }
            }
        }
    }

    /// Wait for the current or next server-ready announcement. `None` means
    /// the runtime closed the channel.
    async fn next_announcement(&mut self) -> Option<ServerReady> {
        loop {
            let current = self.ready.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
            if self.ready.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Apply `update` only if this cycle's generation is still current.
    fn transition(&self, update: impl FnOnce(&mut SessionSnapshot)) -> bool {
        self.state.send_if_modified(|s| {
            if s.generation != self.generation {
                return false;
            }
            update(s);
            true
        })
    }

    fn record_install(&self, exit_code: i32) -> InstallOutcome {
        let max_retries = self.policy.max_retries;
        let mut outcome = InstallOutcome::Stop;
        let mut failure = None;

        self.transition(|s| {
            s.install_attempts += 1;
            if exit_code == 0 {
                s.state = SandboxState::Starting;
                outcome = InstallOutcome::Succeeded;
            } else if s.retry_count < max_retries {
                s.retry_count += 1;
                s.state = SandboxState::Installing {
                    attempt: s.retry_count + 1,
                };
                outcome = InstallOutcome::Retry;
            } else {
                let err = SandboxFailure::InstallFailed {
                    attempts: s.retry_count + 1,
                    exit_code,
                };
                s.state = SandboxState::Failed(err.clone());
                s.last_failure = Some(err.clone());
                s.preview_address = None;
                failure = Some(err);
            }
        });

        match (&outcome, failure) {
            (InstallOutcome::Retry, _) => {
                warn!(generation = self.generation, exit_code, "install failed, retrying")
            }
            (InstallOutcome::Stop, Some(err)) => {
                error!(generation = self.generation, error = %err, "install retries exhausted")
            }
            _ => {}
        }
        outcome
    }

    fn mark_ready(&self, ready: ServerReady) {
        let url = ready.url.clone();
        if self.transition(|s| {
            s.state = SandboxState::Ready { url: url.clone() };
            s.preview_address = Some(url);
        }) {
            info!(
                generation = self.generation,
                port = ready.port,
                url = %ready.url,
                "preview ready"
            );
        }
    }

    fn fail(&self, failure: SandboxFailure) {
        error!(generation = self.generation, error = %failure, "sandbox session failed");
        self.transition(|s| {
            s.state = SandboxState::Failed(failure.clone());
            s.last_failure = Some(failure);
            s.preview_address = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RuntimeError;
    use crate::steps::Step;
    use crate::tree::{FileTree, apply_pending_steps};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Scripted runtime double with call counters.
    struct ScriptedRuntime {
        boot_error: bool,
        exit_codes: Mutex<VecDeque<i32>>,
        default_exit: i32,
        hang_install: AtomicBool,
        announce_on_start: Option<ServerReady>,
        installs: AtomicU32,
        starts: AtomicU32,
        mounts: AtomicU32,
        subscriptions: AtomicU32,
        ready_tx: watch::Sender<Option<ServerReady>>,
    }

    impl ScriptedRuntime {
        fn new() -> Self {
            let (ready_tx, _) = watch::channel(None);
            Self {
                boot_error: false,
                exit_codes: Mutex::new(VecDeque::new()),
                default_exit: 0,
                hang_install: AtomicBool::new(false),
                announce_on_start: Some(ServerReady::new(3000, "http://sandbox/abc")),
                installs: AtomicU32::new(0),
                starts: AtomicU32::new(0),
                mounts: AtomicU32::new(0),
                subscriptions: AtomicU32::new(0),
                ready_tx,
            }
        }

        fn with_exit_codes(self, codes: &[i32]) -> Self {
            *self.exit_codes.lock().unwrap() = codes.iter().copied().collect();
            self
        }

        fn installs(&self) -> u32 {
            self.installs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SandboxRuntime for ScriptedRuntime {
        async fn boot(&self) -> Result<(), RuntimeError> {
            if self.boot_error {
                return Err(RuntimeError::Unavailable("not supported here".into()));
            }
            Ok(())
        }

        async fn mount(&self, _descriptor: &MountDescriptor) -> Result<(), RuntimeError> {
            self.mounts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn run(&self, _command: &CommandSpec) -> Result<i32, RuntimeError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if self.hang_install.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let next = self.exit_codes.lock().unwrap().pop_front();
            Ok(next.unwrap_or(self.default_exit))
        }

        async fn start(&self, _command: &CommandSpec) -> Result<(), RuntimeError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if let Some(ready) = &self.announce_on_start {
                self.ready_tx.send_replace(Some(ready.clone()));
            }
            Ok(())
        }

        fn server_ready(&self) -> watch::Receiver<Option<ServerReady>> {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            self.ready_tx.subscribe()
        }
    }

    fn descriptor(content: &str) -> Arc<MountDescriptor> {
        let step = Step::create_file("src/App.tsx", content);
        let tree = apply_pending_steps(&FileTree::new(), &[&step]).tree;
        Arc::new(crate::mount::compile(&tree))
    }

    fn orchestrator(runtime: &Arc<ScriptedRuntime>, max_retries: u32) -> SandboxOrchestrator {
        let policy = LifecyclePolicy {
            max_retries,
            ..LifecyclePolicy::default()
        };
        SandboxOrchestrator::new(Arc::clone(runtime) as Arc<dyn SandboxRuntime>, policy)
    }

    async fn wait_for(
        orch: &SandboxOrchestrator,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = orch.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
            .await
            .expect("timed out waiting for sandbox state")
            .expect("state channel closed");
        snapshot.clone()
    }

    async fn wait_for_installs(runtime: &ScriptedRuntime, count: u32) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while runtime.installs() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for installs");
    }

    #[tokio::test]
    async fn test_install_then_ready_sets_preview_address() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut orch = orchestrator(&runtime, 2);
        assert_eq!(orch.state(), SandboxState::Uninitialized);
        assert_eq!(orch.current_preview_address(), None);

        orch.start(descriptor("A")).await.unwrap();
        let snapshot = wait_for(&orch, |s| s.state.is_ready()).await;

        assert_eq!(
            snapshot.state,
            SandboxState::Ready {
                url: "http://sandbox/abc".to_string()
            }
        );
        assert_eq!(orch.current_preview_address().as_deref(), Some("http://sandbox/abc"));
        assert_eq!(orch.last_failure(), None);
        assert_eq!(runtime.installs(), 1);
        assert_eq!(runtime.mounts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_bound_attempts_initial_plus_retries() {
        let runtime = Arc::new(ScriptedRuntime {
            default_exit: 1,
            ..ScriptedRuntime::new()
        });
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        let snapshot = wait_for(&orch, |s| s.state.is_terminal()).await;

        assert_eq!(runtime.installs(), 3);
        assert_eq!(snapshot.install_attempts, 3);
        assert_eq!(snapshot.retry_count, 2);
        let expected = SandboxFailure::InstallFailed {
            attempts: 3,
            exit_code: 1,
        };
        assert_eq!(snapshot.state, SandboxState::Failed(expected.clone()));
        assert_eq!(orch.last_failure(), Some(expected));
        assert_eq!(runtime.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let runtime = Arc::new(ScriptedRuntime::new().with_exit_codes(&[1, 0]));
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        let snapshot = wait_for(&orch, |s| s.state.is_ready()).await;

        assert_eq!(runtime.installs(), 2);
        assert_eq!(snapshot.retry_count, 1);
        assert!(snapshot.last_failure.is_none());
    }

    #[tokio::test]
    async fn test_zero_retries_fails_after_one_attempt() {
        let runtime = Arc::new(ScriptedRuntime::new().with_exit_codes(&[127]));
        let mut orch = orchestrator(&runtime, 0);

        orch.start(descriptor("A")).await.unwrap();
        let snapshot = wait_for(&orch, |s| s.state.is_terminal()).await;
        assert_eq!(runtime.installs(), 1);
        assert_eq!(
            snapshot.last_failure,
            Some(SandboxFailure::InstallFailed {
                attempts: 1,
                exit_code: 127
            })
        );
    }

    #[tokio::test]
    async fn test_boot_failure_is_fatal_without_retries() {
        let runtime = Arc::new(ScriptedRuntime {
            boot_error: true,
            ..ScriptedRuntime::new()
        });
        let mut orch = orchestrator(&runtime, 2);

        let err = orch.start(descriptor("A")).await.unwrap_err();
        assert!(matches!(err, SandboxFailure::RuntimeUnavailable(_)));
        assert!(orch.state().is_terminal());
        assert_eq!(orch.last_failure(), Some(err.clone()));
        assert_eq!(runtime.installs(), 0);

        // Nothing to retry: reload refuses.
        assert_eq!(orch.reload(descriptor("B")).await.unwrap_err(), err);
        assert_eq!(runtime.installs(), 0);
    }

    #[tokio::test]
    async fn test_second_start_is_noop() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        wait_for(&orch, |s| s.state.is_ready()).await;
        orch.start(descriptor("A")).await.unwrap();

        assert_eq!(runtime.installs(), 1);
        assert_eq!(orch.snapshot().generation, 1);
    }

    #[tokio::test]
    async fn test_reload_reinstalls_without_resubscribing() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        wait_for(&orch, |s| s.state.is_ready()).await;

        orch.reload(descriptor("A")).await.unwrap();
        let snapshot = wait_for(&orch, |s| s.generation == 2 && s.state.is_ready()).await;

        assert_eq!(snapshot.preview_address.as_deref(), Some("http://sandbox/abc"));
        assert_eq!(runtime.installs(), 2);
        assert_eq!(runtime.mounts.load(Ordering::SeqCst), 2);
        assert_eq!(runtime.subscriptions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reload_abandons_hung_install() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.hang_install.store(true, Ordering::SeqCst);
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        wait_for_installs(&runtime, 1).await;
        assert!(orch.state().is_busy());

        runtime.hang_install.store(false, Ordering::SeqCst);
        orch.reload(descriptor("B")).await.unwrap();
        let snapshot = wait_for(&orch, |s| s.state.is_ready()).await;

        assert_eq!(snapshot.generation, 2);
        assert_eq!(runtime.installs(), 2);
        // The abandoned attempt never completed, so it is not counted.
        assert_eq!(snapshot.install_attempts, 1);
    }

    #[tokio::test]
    async fn test_remount_skips_identical_descriptor() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut orch = orchestrator(&runtime, 2);

        assert!(orch.remount(descriptor("A")).await.unwrap());
        wait_for(&orch, |s| s.state.is_ready()).await;

        assert!(!orch.remount(descriptor("A")).await.unwrap());
        assert_eq!(runtime.installs(), 1);

        assert!(orch.remount(descriptor("B")).await.unwrap());
        wait_for(&orch, |s| s.generation == 2 && s.state.is_ready()).await;
        assert_eq!(runtime.installs(), 2);
        assert_eq!(
            orch.mounted().and_then(|m| m.file_contents("src/App.tsx")),
            Some("B")
        );
    }

    #[tokio::test]
    async fn test_failed_session_waits_for_explicit_reload() {
        let runtime = Arc::new(ScriptedRuntime::new().with_exit_codes(&[1, 1, 1]));
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        wait_for(&orch, |s| s.state.is_terminal()).await;
        assert_eq!(runtime.installs(), 3);

        assert!(!orch.remount(descriptor("B")).await.unwrap());
        assert_eq!(runtime.installs(), 3);
        assert!(orch.last_failure().is_some());

        orch.reload(descriptor("B")).await.unwrap();
        let snapshot = wait_for(&orch, |s| s.state.is_ready()).await;
        assert_eq!(runtime.installs(), 4);
        assert_eq!(snapshot.retry_count, 0);
        assert!(snapshot.last_failure.is_none());
    }

    #[tokio::test]
    async fn test_dev_server_stopping_fails_session() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        wait_for(&orch, |s| s.state.is_ready()).await;

        runtime.ready_tx.send_replace(None);
        let snapshot = wait_for(&orch, |s| s.state.is_terminal()).await;
        assert_eq!(
            snapshot.last_failure,
            Some(SandboxFailure::Runtime("dev server stopped".to_string()))
        );
        assert_eq!(snapshot.preview_address, None);
    }

    #[tokio::test]
    async fn test_moved_server_updates_preview_address() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        wait_for(&orch, |s| s.state.is_ready()).await;

        runtime
            .ready_tx
            .send_replace(Some(ServerReady::new(3001, "http://sandbox/def")));
        let snapshot =
            wait_for(&orch, |s| s.preview_address.as_deref() == Some("http://sandbox/def")).await;
        assert!(snapshot.state.is_ready());
    }

    #[tokio::test]
    async fn test_ready_timeout() {
        let runtime = Arc::new(ScriptedRuntime {
            announce_on_start: None,
            ..ScriptedRuntime::new()
        });
        let policy = LifecyclePolicy {
            ready_timeout: Some(Duration::from_millis(20)),
            ..LifecyclePolicy::default()
        };
        let mut orch =
            SandboxOrchestrator::new(Arc::clone(&runtime) as Arc<dyn SandboxRuntime>, policy);

        orch.start(descriptor("A")).await.unwrap();
        let snapshot = wait_for(&orch, |s| s.state.is_terminal()).await;
        assert_eq!(
            snapshot.last_failure,
            Some(SandboxFailure::ReadyTimeout {
                timeout: Duration::from_millis(20)
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_invalidates_generation() {
        let runtime = Arc::new(ScriptedRuntime::new());
        runtime.hang_install.store(true, Ordering::SeqCst);
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        wait_for_installs(&runtime, 1).await;
        orch.shutdown().await;

        let snapshot = orch.snapshot();
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.install_attempts, 0);
        assert_eq!(snapshot.state, SandboxState::Stopped);
        assert!(!snapshot.state.is_busy());
        assert_eq!(runtime.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_clears_preview_address() {
        let runtime = Arc::new(ScriptedRuntime::new());
        let mut orch = orchestrator(&runtime, 2);

        orch.start(descriptor("A")).await.unwrap();
        wait_for(&orch, |s| s.state.is_ready()).await;
        orch.shutdown().await;

        assert_eq!(orch.state(), SandboxState::Stopped);
        assert!(!orch.state().is_ready());
        assert_eq!(orch.current_preview_address(), None);

        // Remounts stay quiet; an explicit reload brings the session back.
        assert!(!orch.remount(descriptor("B")).await.unwrap());
        assert_eq!(runtime.installs(), 1);
        orch.reload(descriptor("B")).await.unwrap();
        let snapshot = wait_for(&orch, |s| s.state.is_ready()).await;
        assert_eq!(snapshot.preview_address.as_deref(), Some("http://sandbox/abc"));
        assert_eq!(runtime.installs(), 2);
    }
}
