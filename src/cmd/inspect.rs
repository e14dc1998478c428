//! Offline commands: `sitecraft decode` and `sitecraft tree`.

use anyhow::{Context, Result};
use sitecraft::session::BuildSession;
use sitecraft::steps::decode_action_log;
use sitecraft::ui::{icons, render_tree};
use std::path::{Path, PathBuf};

use super::read_log;

pub fn cmd_decode(log: &Path) -> Result<()> {
    let text = read_log(log)?;
    let batch = decode_action_log(&text)
        .with_context(|| format!("Failed to decode {}", log.display()))?;
    println!("{}", serde_json::to_string_pretty(&batch)?);
    Ok(())
}

pub async fn cmd_tree(logs: &[PathBuf], mount: bool) -> Result<()> {
    let mut session = BuildSession::new();

    for log in logs {
        let text = read_log(log)?;
        let report = session
            .ingest(&text)
            .await
            .with_context(|| format!("Failed to ingest {}", log.display()))?;
        for conflict in &report.conflicts {
            eprintln!("{}{}", icons::WARN, conflict);
        }
    }

    if mount {
        println!("{}", serde_json::to_string_pretty(session.descriptor().as_ref())?);
    } else {
        print!("{}", render_tree(&session.tree()));
    }
    Ok(())
}
