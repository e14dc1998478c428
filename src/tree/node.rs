//! In-memory file tree model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// One entry in the virtual file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Final path segment.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Full path from the tree root, unique within a tree.
    pub path: String,
    /// Latest text; only meaningful for files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Children in creation order; only populated for folders.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            path: path.into(),
            content: Some(content.into()),
            children: Vec::new(),
        }
    }

    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder,
            path: path.into(),
            content: None,
            children: Vec::new(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

/// A versioned snapshot of the project being assembled.
///
/// The version is bumped by every synthesis pass that changes the tree, so
/// readers holding an older snapshot can detect staleness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    pub version: u64,
    pub nodes: Vec<FileNode>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by its full slash-delimited path.
    pub fn find(&self, path: &str) -> Option<&FileNode> {
        let mut level = &self.nodes;
        let mut found = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let node = level.iter().find(|n| n.name == segment)?;
            level = &node.children;
            found = Some(node);
        }
        found
    }

    /// Content of the file at `path`, if that path is a file.
    pub fn content_of(&self, path: &str) -> Option<&str> {
        self.find(path)
            .filter(|n| n.is_file())
            .and_then(|n| n.content.as_deref())
    }

    /// Depth-first, pre-order walk over every node.
    pub fn walk(&self) -> Vec<&FileNode> {
        fn visit<'a>(nodes: &'a [FileNode], out: &mut Vec<&'a FileNode>) {
            for node in nodes {
                out.push(node);
                visit(&node.children, out);
            }
        }
        let mut out = Vec::new();
        visit(&self.nodes, &mut out);
        out
    }

    pub fn file_count(&self) -> usize {
        self.walk().iter().filter(|n| n.is_file()).count()
    }

    pub fn folder_count(&self) -> usize {
        self.walk().iter().filter(|n| n.is_folder()).count()
    }
}
