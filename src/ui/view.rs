//! Plain-text rendering of steps, trees and sandbox state.

use super::icons::{CHECK, CROSS, FILE, FOLDER, PENDING, RUNNING, SHELL};
use crate::sandbox::SandboxState;
use crate::steps::{Step, StepKind, StepStatus};
use crate::tree::{FileNode, FileTree};
use console::style;

/// One line per step: status icon, id, title and path.
pub fn render_step(step: &Step) -> String {
    let icon = match step.status {
        StepStatus::Pending => PENDING,
        StepStatus::InProgress => RUNNING,
        StepStatus::Completed => CHECK,
    };
    let detail = match &step.kind {
        StepKind::RunCommand => format!("{}{}", SHELL, step.payload),
        StepKind::Other(raw) => format!("({})", raw),
        _ => step.path.clone().unwrap_or_default(),
    };
    format!(
        "{}{:>3} {} {}",
        icon,
        step.id,
        step.title,
        style(detail).dim()
    )
}

/// Indented listing of a tree, folders before their children.
pub fn render_tree(tree: &FileTree) -> String {
    fn visit(nodes: &[FileNode], depth: usize, out: &mut String) {
        for node in nodes {
            let icon = if node.is_folder() { FOLDER } else { FILE };
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!("{}{}", icon, node.name));
            if node.is_folder() {
                out.push('/');
            }
            out.push('\n');
            visit(&node.children, depth + 1, out);
        }
    }

    let mut out = String::new();
    visit(&tree.nodes, 0, &mut out);
    out
}

pub fn render_state(state: &SandboxState) -> String {
    match state {
        SandboxState::Ready { .. } => format!("{}{}", CHECK, style(state).green()),
        SandboxState::Failed(_) => format!("{}{}", CROSS, style(state).red()),
        other => format!("{}{}", RUNNING, style(other).yellow()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::apply_pending_steps;

    #[test]
    fn test_render_tree_indents_children() {
        let a = Step::create_file("src/components/Header.tsx", "h");
        let b = Step::create_file("index.html", "i");
        let tree = apply_pending_steps(&FileTree::new(), &[&a, &b]).tree;
        let text = render_tree(&tree);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("src/"));
        assert!(lines[1].starts_with("  ") && lines[1].ends_with("components/"));
        assert!(lines[2].starts_with("    ") && lines[2].ends_with("Header.tsx"));
        assert!(!lines[3].starts_with(' ') && lines[3].ends_with("index.html"));
    }

    #[test]
    fn test_render_step_shows_command() {
        let mut step = Step::run_command("npm run dev");
        step.id = 7;
        let line = render_step(&step);
        assert!(line.contains("  7 Run command"));
        assert!(line.contains("npm run dev"));
    }
}
