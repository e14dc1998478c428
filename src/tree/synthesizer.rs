//! Folding steps into the file tree.
//!
//! Each file step walks the tree from the root, creating any missing folders
//! along its path, then overwrites or appends the terminal file. Later steps
//! for the same path win.

use super::node::{FileNode, FileTree};
use crate::errors::PathConflict;
use crate::steps::{Step, StepKind};
use tracing::{debug, warn};

/// A slash-delimited path split into clean segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    pub segments: Vec<String>,
    /// True when the raw input needed rewriting (empty, `.` or `..` segments).
    pub rewritten: bool,
}

impl NormalizedPath {
    pub fn joined(&self) -> String {
        self.segments.join("/")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Drop empty and `.` segments and resolve `..` without ever leaving the root.
pub fn normalize_path(raw: &str) -> NormalizedPath {
    let mut segments: Vec<String> = Vec::new();

    for segment in raw.split(['/', '\\']) {
        match segment.trim() {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s.to_string()),
        }
    }

    let rewritten = segments.join("/") != raw;
    NormalizedPath {
        segments,
        rewritten,
    }
}

/// Result of one synthesis pass.
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    pub tree: FileTree,
    /// True iff the pass contained at least one tree-shaping step.
    pub changed: bool,
    /// Number of steps whose effect landed in the tree.
    pub applied: usize,
    /// Steps that were rejected because of a file/folder collision.
    pub conflicts: Vec<PathConflict>,
}

/// Apply every pending step to a copy of `tree`.
///
/// Synthesis never fails: malformed paths are normalized, and colliding
/// steps are reported in `conflicts` while the tree keeps its shape.
pub fn apply_pending_steps(tree: &FileTree, pending: &[&Step]) -> Synthesis {
    let mut next = tree.clone();
    let mut changed = false;
    let mut applied = 0;
    let mut conflicts = Vec::new();

    for step in pending {
        if !step.kind.touches_tree() {
            debug!(id = step.id, kind = %step.kind, "step has no tree effect");
            continue;
        }
        changed = true;

        match apply_step(&mut next, step) {
            Ok(true) => applied += 1,
            Ok(false) => {}
            Err(conflict) => {
                warn!(id = step.id, error = %conflict, "path conflict, step skipped");
                conflicts.push(conflict);
            }
        }
    }

    if changed {
        next.version = tree.version + 1;
    }

    Synthesis {
        tree: next,
        changed,
        applied,
        conflicts,
    }
}

/// Apply a single step in place.
///
/// Returns `Ok(false)` when the step has nothing to apply (no tree effect or
/// an empty path after normalization).
pub fn apply_step(tree: &mut FileTree, step: &Step) -> Result<bool, PathConflict> {
    let raw = step.path.as_deref().unwrap_or_default();
    let path = normalize_path(raw);
    if path.rewritten {
        warn!(id = step.id, raw, normalized = %path.joined(), "normalized malformed step path");
    }
    if path.is_empty() {
        warn!(id = step.id, raw, "step path is empty after normalization, skipping");
        return Ok(false);
    }

    match step.kind {
        StepKind::CreateFile => {
            insert(&mut tree.nodes, &path, Some(step.payload.as_str())).map(|_| true)
        }
        StepKind::CreateFolder => insert(&mut tree.nodes, &path, None).map(|_| true),
        _ => Ok(false),
    }
}

/// Walk `path` from `root`, creating missing folders. With `content`, the
/// terminal segment becomes a file; without, a folder.
fn insert(
    root: &mut Vec<FileNode>,
    path: &NormalizedPath,
    content: Option<&str>,
) -> Result<(), PathConflict> {
    let full = path.joined();
    let last = path.segments.len() - 1;
    let mut level = root;
    let mut prefix = String::new();

    for (i, segment) in path.segments.iter().enumerate() {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);

        let existing = level.iter().position(|n| n.name == *segment);

        if i == last
            && let Some(text) = content
        {
            match existing {
                Some(idx) if level[idx].is_folder() => {
                    return Err(PathConflict::FolderExists { path: full });
                }
                Some(idx) => level[idx].content = Some(text.to_string()),
                None => level.push(FileNode::file(segment.as_str(), prefix.as_str(), text)),
            }
            return Ok(());
        }

        let idx = match existing {
            Some(idx) if level[idx].is_file() => {
                return Err(PathConflict::FileInPath {
                    path: full,
                    file: prefix,
                });
            }
            Some(idx) => idx,
            None => {
                level.push(FileNode::folder(segment.as_str(), prefix.as_str()));
                level.len() - 1
            }
        };
        level = &mut level[idx].children;
    }

    Ok(())
}
