//! Local preview: `sitecraft preview`.

use anyhow::{Context, Result, bail};
use sitecraft::config::SessionConfig;
use sitecraft::sandbox::{LocalRuntime, SandboxOrchestrator, SandboxRuntime};
use sitecraft::session::BuildSession;
use sitecraft::ui::{icons, render_state, render_step};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::read_log;

pub async fn cmd_preview(config: &SessionConfig, logs: &[PathBuf], workdir: &Path) -> Result<()> {
    let runtime: Arc<dyn SandboxRuntime> = Arc::new(LocalRuntime::new(workdir));
    let orchestrator = SandboxOrchestrator::new(runtime, config.lifecycle_policy());
    let mut session = BuildSession::new().with_sandbox(orchestrator);

    for log in logs {
        let text = read_log(log)?;
        let report = session
            .ingest(&text)
            .await
            .with_context(|| format!("Failed to ingest {}", log.display()))?;
        if let Some(failure) = report.sandbox_failure {
            bail!("Sandbox could not start: {}", failure);
        }
    }
    for step in session.steps() {
        println!("{}", render_step(step));
    }

    let Some(mut updates) = session.subscribe() else {
        bail!("Sandbox is not attached");
    };
    if session.tree().is_empty() {
        bail!("No files to preview: the action logs created no files");
    }

    println!("Serving from {}", workdir.display());
    let mut last_shown = None;
    loop {
        let snapshot = updates.borrow_and_update().clone();
        if last_shown.as_ref() != Some(&snapshot.state) {
            println!("{}", render_state(&snapshot.state));
            if let Some(url) = &snapshot.preview_address {
                println!("{}Preview: {}", icons::GLOBE, url);
            }
            last_shown = Some(snapshot.state.clone());
        }
        if let Some(failure) = snapshot
            .state
            .is_terminal()
            .then_some(snapshot.last_failure)
            .flatten()
        {
            session.shutdown().await;
            bail!("Preview failed: {}", failure);
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}Stopping preview", icons::SPARKLE);
                break;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}
