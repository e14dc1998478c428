//! A `SandboxRuntime` backed by a local working directory.
//!
//! Mounting materializes the descriptor under the root directory, commands
//! run as child processes there, and the dev server's output is scanned for
//! the first `http://host:port` address it prints.

use super::runtime::{CommandSpec, SandboxRuntime, ServerReady};
use crate::errors::RuntimeError;
use crate::mount::{MountDescriptor, MountEntry};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap());

static SERVER_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(https?://[A-Za-z0-9.\-\[\]:]*?:(\d{2,5})(?:/[^\s]*)?)").unwrap()
});

/// Find a dev server address in one line of process output.
///
/// Vite prints `➜  Local:   http://localhost:5173/`, Next prints
/// `- Local: http://localhost:3000`; both are matched after stripping colour
/// codes.
pub fn detect_server_ready(line: &str) -> Option<ServerReady> {
    let plain = ANSI_ESCAPE.replace_all(line, "");
    let caps = SERVER_URL.captures(&plain)?;
    let port = caps.get(2)?.as_str().parse::<u16>().ok()?;
    Some(ServerReady::new(port, caps.get(1)?.as_str()))
}

/// Runs the project in a directory on the local machine.
pub struct LocalRuntime {
    root: PathBuf,
    ready: Arc<watch::Sender<Option<ServerReady>>>,
    server: Mutex<Option<Child>>,
    /// Held by the blocking writer until it returns, so writers never overlap.
    mount_lock: Arc<Mutex<()>>,
    /// Bumped by every mount; an older writer stops at its next entry.
    mount_epoch: Arc<AtomicU64>,
}

impl LocalRuntime {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let (ready, _) = watch::channel(None);
        Self {
            root: root.as_ref().to_path_buf(),
            ready: Arc::new(ready),
            server: Mutex::new(None),
            mount_lock: Arc::new(Mutex::new(())),
            mount_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn command(&self, spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Child, RuntimeError> {
        self.command(spec)
            .spawn()
            .map_err(|source| RuntimeError::SpawnFailed {
                command: spec.to_string(),
                source,
            })
    }
}

/// Stream lines from a child pipe into `tx` until the pipe closes.
fn forward_lines<R>(pipe: Option<R>, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else { return };
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

/// Write every entry of `descriptor` below `dir`, creating empty directories too.
///
/// Stops with `ErrorKind::Interrupted` as soon as `live` turns false.
fn materialize(
    dir: &Path,
    descriptor: &MountDescriptor,
    live: &dyn Fn() -> bool,
) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for (name, entry) in descriptor.entries() {
        if !live() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "superseded by a newer mount",
            ));
        }
        let target = dir.join(name);
        match entry {
            MountEntry::File { contents } => std::fs::write(&target, contents)?,
            MountEntry::Directory(children) => materialize(&target, children, live)?,
        }
    }
    Ok(())
}

#[async_trait]
impl SandboxRuntime for LocalRuntime {
    async fn boot(&self) -> Result<(), RuntimeError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            RuntimeError::Unavailable(format!("cannot create {}: {}", self.root.display(), e))
        })?;
        debug!(root = %self.root.display(), "local runtime booted");
        Ok(())
    }

    async fn mount(&self, descriptor: &MountDescriptor) -> Result<(), RuntimeError> {
        let epoch = self.mount_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        // The guard moves into the blocking task: a cancelled caller does not
        // release it while the writer is still running.
        let guard = Arc::clone(&self.mount_lock).lock_owned().await;

        let root = self.root.clone();
        let descriptor = descriptor.clone();
        let current = Arc::clone(&self.mount_epoch);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let live = || current.load(Ordering::SeqCst) == epoch;
            materialize(&root, &descriptor, &live)
        })
        .await
        .map_err(|e| RuntimeError::Other(e.into()))?
        .map_err(|e| {
            debug!(epoch, error = %e, "mount did not complete");
            RuntimeError::Mount(e)
        })
    }

    async fn run(&self, spec: &CommandSpec) -> Result<i32, RuntimeError> {
        let mut child = self.spawn(spec)?;
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines(child.stdout.take(), tx.clone());
        forward_lines(child.stderr.take(), tx);
        while let Some(line) = rx.recv().await {
            debug!(command = %spec.program, "{}", line);
        }

        let status = child.wait().await.map_err(|e| {
            RuntimeError::Other(anyhow::Error::new(e).context("waiting for command"))
        })?;
        // Killed by a signal: no exit code.
        Ok(status.code().unwrap_or(-1))
    }

    async fn start(&self, spec: &CommandSpec) -> Result<(), RuntimeError> {
        let mut server = self.server.lock().await;
        if let Some(child) = server.as_mut()
            && matches!(child.try_wait(), Ok(None))
        {
            debug!(command = %spec, "dev server already running");
            return Ok(());
        }

        let mut child = self.spawn(spec)?;
        info!(command = %spec, pid = child.id(), "dev server spawned");
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines(child.stdout.take(), tx.clone());
        forward_lines(child.stderr.take(), tx);
        *server = Some(child);

        let ready = Arc::clone(&self.ready);
        tokio::spawn(async move {
            let mut announced = false;
            while let Some(line) = rx.recv().await {
                debug!(target: "sitecraft::dev_server", "{}", line);
                if !announced && let Some(found) = detect_server_ready(&line) {
                    info!(port = found.port, url = %found.url, "dev server listening");
                    ready.send_replace(Some(found));
                    announced = true;
                }
            }

            warn!("dev server output closed");
            ready.send_replace(None);
        });

        Ok(())
    }

    fn server_ready(&self) -> watch::Receiver<Option<ServerReady>> {
        self.ready.subscribe()
    }
}
