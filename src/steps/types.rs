//! Step types produced by the decoder and tracked across a session.

use serde::{Deserialize, Serialize};

/// What a step asks the pipeline to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    CreateFile,
    CreateFolder,
    RunCommand,
    /// An action kind this crate does not understand, kept with its raw tag.
    Other(String),
}

impl StepKind {
    /// Map a raw action `type` attribute to a kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "file" => Self::CreateFile,
            "folder" | "directory" => Self::CreateFolder,
            "shell" => Self::RunCommand,
            _ => Self::Other(tag.to_string()),
        }
    }

    /// Whether steps of this kind shape the file tree.
    pub fn touches_tree(&self) -> bool {
        matches!(self, Self::CreateFile | Self::CreateFolder)
    }

    /// Whether steps of this kind must carry a path.
    pub fn requires_path(&self) -> bool {
        self.touches_tree()
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateFile => "create_file",
            Self::CreateFolder => "create_folder",
            Self::RunCommand => "run_command",
            Self::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

/// One decoded build instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Position in the session's step sequence, assigned by the tracker.
    pub id: usize,
    pub kind: StepKind,
    /// Slash-delimited target path; present for tree-shaping kinds only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// File content or shell command.
    pub payload: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: StepStatus,
}

impl Step {
    /// A pending file-creation step.
    pub fn create_file(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: 0,
            kind: StepKind::CreateFile,
            title: format!("Create {}", path),
            path: Some(path),
            payload: content.into(),
            description: String::new(),
            status: StepStatus::Pending,
        }
    }

    /// A pending folder-creation step.
    pub fn create_folder(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: 0,
            kind: StepKind::CreateFolder,
            title: format!("Create folder {}", path),
            path: Some(path),
            payload: String::new(),
            description: String::new(),
            status: StepStatus::Pending,
        }
    }

    /// A pending shell-command step.
    pub fn run_command(command: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind: StepKind::RunCommand,
            path: None,
            payload: command.into(),
            title: "Run command".to_string(),
            description: String::new(),
            status: StepStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Steps decoded from one action-log document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBatch {
    /// Title of the first artifact in the document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub steps: Vec<Step>,
}

impl ActionBatch {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}
