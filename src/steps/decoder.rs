//! Action-log decoding.
//!
//! The generation backend answers with free text that embeds one or more
//! artifacts:
//!
//! ```text
//! <boltArtifact id="project-import" title="Project Files">
//!   <boltAction type="file" filePath="src/App.tsx">...</boltAction>
//!   <boltAction type="shell">npm run dev</boltAction>
//! </boltArtifact>
//! ```
//!
//! Text outside artifacts is ignored. Unknown action types are preserved as
//! `StepKind::Other` so they can still be accounted for downstream.

use super::types::{ActionBatch, Step, StepKind, StepStatus};
use crate::errors::DecodeError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

static ARTIFACT_OPEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<boltArtifact\b([^>]*)>").unwrap());

static ARTIFACT_CLOSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</boltArtifact\s*>").unwrap());

static ACTION_OPEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<boltAction\b([^>]*)>").unwrap());

static ACTION_CLOSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</boltAction\s*>").unwrap());

static ATTRIBUTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Decoder for action-log documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionLogDecoder;

impl ActionLogDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode one document into pending steps.
    ///
    /// Any structural error rejects the whole document; no partial batch is
    /// returned.
    pub fn decode(&self, text: &str) -> Result<ActionBatch, DecodeError> {
        let mut batch = ActionBatch::default();
        let mut cursor = 0;
        let mut artifact_index = 0;

        while let Some(open) = ARTIFACT_OPEN_REGEX.captures_at(text, cursor) {
            let Some(whole) = open.get(0) else { break };
            let attrs = parse_attributes(open.get(1).map_or("", |m| m.as_str()));

            let close = ARTIFACT_CLOSE_REGEX
                .find_at(text, whole.end())
                .ok_or(DecodeError::UnterminatedArtifact {
                    offset: whole.start(),
                })?;

            if batch.title.is_none() {
                batch.title = attrs.get("title").cloned();
            }

            let body = &text[whole.end()..close.start()];
            let steps = decode_actions(body, artifact_index, batch.steps.len())?;
            debug!(
                artifact = artifact_index,
                id = attrs.get("id").map(String::as_str).unwrap_or(""),
                steps = steps.len(),
                "decoded artifact"
            );
            batch.steps.extend(steps);

            cursor = close.end();
            artifact_index += 1;
        }

        Ok(batch)
    }
}

/// Convenience function to decode without creating a decoder.
pub fn decode_action_log(text: &str) -> Result<ActionBatch, DecodeError> {
    ActionLogDecoder::new().decode(text)
}

fn decode_actions(
    body: &str,
    artifact: usize,
    first_index: usize,
) -> Result<Vec<Step>, DecodeError> {
    let mut steps = Vec::new();
    let mut cursor = 0;

    while let Some(open) = ACTION_OPEN_REGEX.captures_at(body, cursor) {
        let Some(whole) = open.get(0) else { break };
        let raw_attrs = open.get(1).map_or("", |m| m.as_str());
        let index = first_index + steps.len();

        // `<boltAction ... />` carries no body.
        let (content, next) = if raw_attrs.trim_end().ends_with('/') {
            ("", whole.end())
        } else {
            let close = ACTION_CLOSE_REGEX
                .find_at(body, whole.end())
                .ok_or(DecodeError::UnterminatedAction { artifact, index })?;
            (&body[whole.end()..close.start()], close.end())
        };

        let attrs = parse_attributes(raw_attrs.trim_end().trim_end_matches('/'));
        steps.push(build_step(&attrs, content, index)?);
        cursor = next;
    }

    Ok(steps)
}

fn build_step(
    attrs: &HashMap<String, String>,
    content: &str,
    index: usize,
) -> Result<Step, DecodeError> {
    let tag = attrs.get("type").map(String::as_str).unwrap_or("");
    let kind = StepKind::from_tag(tag);
    let path = attrs
        .get("filePath")
        .or_else(|| attrs.get("path"))
        .cloned();

    if kind.requires_path() && path.is_none() {
        return Err(DecodeError::MissingPath {
            index,
            kind: tag.to_string(),
        });
    }

    let (payload, default_title) = match &kind {
        StepKind::CreateFile => (
            content.trim_start_matches(['\r', '\n']).trim_end().to_string(),
            format!("Create {}", path.as_deref().unwrap_or_default()),
        ),
        StepKind::CreateFolder => (
            String::new(),
            format!("Create folder {}", path.as_deref().unwrap_or_default()),
        ),
        StepKind::RunCommand => (content.trim().to_string(), "Run command".to_string()),
        StepKind::Other(raw) => {
            warn!(kind = %raw, index, "unrecognized action kind, keeping as no-op step");
            (content.trim().to_string(), format!("Unknown action '{}'", raw))
        }
    };

    Ok(Step {
        id: 0,
        path: if kind == StepKind::RunCommand { None } else { path },
        kind,
        payload,
        title: attrs.get("title").cloned().unwrap_or(default_title),
        description: attrs.get("description").cloned().unwrap_or_default(),
        status: StepStatus::Pending,
    })
}

fn parse_attributes(raw: &str) -> HashMap<String, String> {
    ATTRIBUTE_REGEX
        .captures_iter(raw)
        .filter_map(|cap| {
            let name = cap.get(1)?.as_str().to_string();
            let value = cap.get(2).or_else(|| cap.get(3))?.as_str().to_string();
            Some((name, value))
        })
        .collect()
}
