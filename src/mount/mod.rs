//! Mount descriptor compilation.
//!
//! Turns a `FileTree` into the nested directory/file structure a sandboxed
//! runtime mounts. The serialized form matches the WebContainer
//! `FileSystemTree` shape:
//!
//! ```json
//! { "src": { "directory": { "App.tsx": { "file": { "contents": "..." } } } } }
//! ```

use crate::tree::{FileNode, FileTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One named entry of a mount descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountEntry {
    File { contents: String },
    Directory(MountDescriptor),
}

/// Entries aggregated by name. Names are ordered so that compiling the same
/// tree always yields the same descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountDescriptor(BTreeMap<String, MountEntry>);

impl MountDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&MountEntry> {
        self.0.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &MountEntry)> {
        self.0.iter()
    }

    /// Contents of the file at a slash-delimited path.
    pub fn file_contents(&self, path: &str) -> Option<&str> {
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
        let mut level = self;
        while let Some(segment) = segments.next() {
            match (level.0.get(segment)?, segments.peek()) {
                (MountEntry::File { contents }, None) => return Some(contents.as_str()),
                (MountEntry::Directory(children), Some(_)) => level = children,
                _ => return None,
            }
        }
        None
    }

    /// Every file as `(path, contents)`, directories first-visited in name order.
    pub fn files(&self) -> Vec<(String, &str)> {
        fn visit<'a>(prefix: &str, level: &'a MountDescriptor, out: &mut Vec<(String, &'a str)>) {
            for (name, entry) in &level.0 {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", prefix, name)
                };
                match entry {
                    MountEntry::File { contents } => out.push((path, contents.as_str())),
                    MountEntry::Directory(children) => visit(&path, children, out),
                }
            }
        }
        let mut out = Vec::new();
        visit("", self, &mut out);
        out
    }
}

/// Compile a tree into a mount descriptor.
///
/// Pure: the same tree always compiles to the same descriptor. Files with no
/// content are mounted as empty files rather than omitted.
pub fn compile(tree: &FileTree) -> MountDescriptor {
    compile_level(&tree.nodes)
}

fn compile_level(nodes: &[FileNode]) -> MountDescriptor {
    let entries = nodes
        .iter()
        .map(|node| {
            let entry = if node.is_folder() {
                MountEntry::Directory(compile_level(&node.children))
            } else {
                MountEntry::File {
                    contents: node.content.clone().unwrap_or_default(),
                }
            };
            (node.name.clone(), entry)
        })
        .collect();
    MountDescriptor(entries)
}

/// Memoizes the last compiled descriptor by tree version.
#[derive(Debug, Default)]
pub struct MountCache {
    compiled: Option<(u64, Arc<MountDescriptor>)>,
}

impl MountCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor for `tree`, recompiling only when its version moved.
    pub fn get(&mut self, tree: &FileTree) -> Arc<MountDescriptor> {
        if let Some((version, descriptor)) = &self.compiled
            && *version == tree.version
        {
            return Arc::clone(descriptor);
        }

        let descriptor = Arc::new(compile(tree));
        debug!(version = tree.version, entries = descriptor.len(), "compiled mount descriptor");
        self.compiled = Some((tree.version, Arc::clone(&descriptor)));
        descriptor
    }

    /// Version of the tree the cached descriptor was compiled from.
    pub fn version(&self) -> Option<u64> {
        self.compiled.as_ref().map(|(v, _)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::Step;
    use crate::tree::apply_pending_steps;

    fn tree_from(steps: &[Step]) -> FileTree {
        let refs: Vec<&Step> = steps.iter().collect();
        apply_pending_steps(&FileTree::new(), &refs).tree
    }

    #[test]
    fn test_empty_tree_compiles_to_empty_descriptor() {
        let descriptor = compile(&FileTree::new());
        assert!(descriptor.is_empty());
        assert_eq!(serde_json::to_string(&descriptor).unwrap(), "{}");
    }

    #[test]
    fn test_compile_nested_shape() {
        let tree = tree_from(&[
            Step::create_file("src/App.tsx", "A"),
            Step::create_file("package.json", "{}"),
        ]);
        let json = serde_json::to_value(compile(&tree)).unwrap();
        assert_eq!(json["src"]["directory"]["App.tsx"]["file"]["contents"], "A");
        assert_eq!(json["package.json"]["file"]["contents"], "{}");
    }

    #[test]
    fn test_last_write_wins_after_compile() {
        let tree = tree_from(&[
            Step::create_file("src/App.tsx", "A"),
            Step::create_file("src/main.tsx", "M"),
            Step::create_file("src/App.tsx", "B"),
        ]);
        let descriptor = compile(&tree);
        assert_eq!(descriptor.file_contents("src/App.tsx"), Some("B"));
        assert_eq!(descriptor.file_contents("src/main.tsx"), Some("M"));
    }

    #[test]
    fn test_missing_content_becomes_empty_string() {
        let mut tree = tree_from(&[Step::create_file("empty.txt", "x")]);
        tree.nodes[0].content = None;
        let descriptor = compile(&tree);
        assert_eq!(
            descriptor.get("empty.txt"),
            Some(&MountEntry::File {
                contents: String::new()
            })
        );
    }

    #[test]
    fn test_empty_folder_is_empty_directory() {
        let tree = tree_from(&[Step::create_folder("public")]);
        assert_eq!(
            compile(&tree).get("public"),
            Some(&MountEntry::Directory(MountDescriptor::new()))
        );
    }

    #[test]
    fn test_compile_is_idempotent() {
        let tree = tree_from(&[
            Step::create_file("b/z.txt", "z"),
            Step::create_file("a.txt", "a"),
        ]);
        let first = compile(&tree);
        let second = compile(&tree);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_files_lists_every_leaf() {
        let tree = tree_from(&[
            Step::create_file("src/components/Header.tsx", "h"),
            Step::create_file("index.html", "i"),
        ]);
        let descriptor = compile(&tree);
        let files = descriptor.files();
        assert_eq!(
            files,
            vec![
                ("index.html".to_string(), "i"),
                ("src/components/Header.tsx".to_string(), "h"),
            ]
        );
    }

    #[test]
    fn test_file_contents_rejects_directory_path() {
        let tree = tree_from(&[Step::create_file("src/App.tsx", "A")]);
        let descriptor = compile(&tree);
        assert_eq!(descriptor.file_contents("src"), None);
        assert_eq!(descriptor.file_contents("src/App.tsx/x"), None);
    }

    #[test]
    fn test_cache_recompiles_only_on_version_change() {
        let mut cache = MountCache::new();
        let tree = tree_from(&[Step::create_file("a.txt", "1")]);
        let first = cache.get(&tree);
        let again = cache.get(&tree);
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.version(), Some(tree.version));

        let step = Step::create_file("a.txt", "2");
        let next = apply_pending_steps(&tree, &[&step]).tree;
        let updated = cache.get(&next);
        assert!(!Arc::ptr_eq(&first, &updated));
        assert_eq!(updated.file_contents("a.txt"), Some("2"));
    }
}
