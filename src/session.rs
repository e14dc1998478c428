//! Build session: decode → track → synthesize → compile → (re)mount.
//!
//! A `BuildSession` owns the step tracker and the current tree snapshot.
//! Each action-log document handed to [`BuildSession::ingest`] goes through
//! one synthesis pass; when the tree changed, the compiled descriptor is
//! pushed to the sandbox orchestrator (if one is attached).

use crate::chat::{ChatBackend, Transcript};
use crate::errors::{ChatError, PathConflict, SandboxFailure, SessionError};
use crate::mount::{MountCache, MountDescriptor};
use crate::sandbox::{SandboxOrchestrator, SandboxState, SessionSnapshot};
use crate::steps::{ActionLogDecoder, Step, StepKind, StepTracker};
use crate::tree::{FileTree, apply_pending_steps};
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What one ingested document did to the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Ids assigned to the decoded steps.
    pub step_ids: Range<usize>,
    /// Whether the pass contained a tree-shaping step.
    pub changed: bool,
    /// Steps whose effect landed in the tree.
    pub applied: usize,
    pub conflicts: Vec<PathConflict>,
    /// Shell commands seen in the document, in order.
    pub commands: Vec<String>,
    /// A new install cycle was started for the updated files.
    pub remounted: bool,
    /// The sandbox refused to start for this document.
    pub sandbox_failure: Option<SandboxFailure>,
}

impl IngestReport {
    pub fn new_steps(&self) -> usize {
        self.step_ids.len()
    }
}

pub struct BuildSession {
    decoder: ActionLogDecoder,
    tracker: StepTracker,
    tree: Arc<FileTree>,
    mounts: MountCache,
    sandbox: Option<SandboxOrchestrator>,
    chat: Option<Arc<dyn ChatBackend>>,
    transcript: Transcript,
}

impl Default for BuildSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSession {
    /// A session with no sandbox or chat backend attached.
    pub fn new() -> Self {
        Self {
            decoder: ActionLogDecoder::new(),
            tracker: StepTracker::new(),
            tree: Arc::new(FileTree::new()),
            mounts: MountCache::new(),
            sandbox: None,
            chat: None,
            transcript: Transcript::new(),
        }
    }

    pub fn with_sandbox(mut self, sandbox: SandboxOrchestrator) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn with_chat(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.chat = Some(backend);
        self
    }

    /// Run one action-log document through the pipeline.
    ///
    /// A document that fails to decode is dropped as a whole; the session
    /// keeps its previous steps and tree.
    pub async fn ingest(&mut self, log: &str) -> Result<IngestReport, SessionError> {
        let batch = self.decoder.decode(log).inspect_err(|err| {
            warn!(error = %err, "dropping undecodable action log");
        })?;
        let step_ids = self.tracker.append_batch(batch.steps);

        let pending = self.tracker.pending_steps();
        let commands = pending
            .iter()
            .filter(|s| s.kind == StepKind::RunCommand)
            .map(|s| s.payload.clone())
            .collect();
        let synthesis = apply_pending_steps(&self.tree, &pending);
        let completed = self.tracker.mark_all_pending_completed();
        debug!(
            steps = step_ids.len(),
            completed,
            changed = synthesis.changed,
            version = synthesis.tree.version,
            "synthesis pass finished"
        );

        let mut report = IngestReport {
            step_ids,
            changed: synthesis.changed,
            applied: synthesis.applied,
            conflicts: synthesis.conflicts,
            commands,
            ..IngestReport::default()
        };

        if !synthesis.changed {
            return Ok(report);
        }
        self.tree = Arc::new(synthesis.tree);
        let descriptor = self.mounts.get(&self.tree);

        if let Some(sandbox) = self.sandbox.as_mut() {
            match sandbox.remount(descriptor).await {
                Ok(remounted) => report.remounted = remounted,
                Err(failure) => {
                    warn!(error = %failure, "sandbox unavailable for updated files");
                    report.sandbox_failure = Some(failure);
                }
            }
        }

        info!(
            files = self.tree.file_count(),
            folders = self.tree.folder_count(),
            remounted = report.remounted,
            "project files updated"
        );
        Ok(report)
    }

    /// Send a follow-up message and ingest the backend's reply.
    ///
    /// The first message of a session becomes the site prompt. A failed
    /// request leaves the transcript as it was.
    pub async fn send_message(&mut self, message: &str) -> Result<IngestReport, SessionError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage.into());
        }
        let backend = self.chat.clone().ok_or(SessionError::NoBackend)?;

        self.transcript.push_user(message);
        let reply = match backend.send(&self.transcript).await {
            Ok(reply) => reply,
            Err(err) => {
                self.transcript.pop_unanswered();
                return Err(err.into());
            }
        };
        self.transcript.push_assistant(reply.as_str());
        self.ingest(&reply).await
    }

    /// Explicit user reload: remount the current files and reinstall.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        let descriptor = self.mounts.get(&self.tree);
        let sandbox = self.sandbox.as_mut().ok_or(SessionError::NoSandbox)?;
        sandbox
            .reload(descriptor)
            .await
            .map_err(SessionError::NotReloadable)
    }

    /// Tear down the sandbox, abandoning any in-flight install.
    pub async fn shutdown(&mut self) {
        if let Some(sandbox) = self.sandbox.as_mut() {
            sandbox.shutdown().await;
        }
    }

    pub fn steps(&self) -> &[Step] {
        self.tracker.steps()
    }

    pub fn tree(&self) -> Arc<FileTree> {
        Arc::clone(&self.tree)
    }

    pub fn descriptor(&mut self) -> Arc<MountDescriptor> {
        self.mounts.get(&self.tree)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn sandbox_state(&self) -> Option<SandboxState> {
        self.sandbox.as_ref().map(|s| s.state())
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<SessionSnapshot>> {
        self.sandbox.as_ref().map(|s| s.subscribe())
    }

    pub fn preview_address(&self) -> Option<String> {
        self.sandbox.as_ref()?.current_preview_address()
    }

    pub fn last_failure(&self) -> Option<SandboxFailure> {
        self.sandbox.as_ref()?.last_failure()
    }
}
