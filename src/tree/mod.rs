//! Virtual file tree and the synthesizer that folds steps into it.

mod node;
mod synthesizer;

pub use node::{FileNode, FileTree, NodeKind};
pub use synthesizer::{NormalizedPath, Synthesis, apply_pending_steps, apply_step, normalize_path};
