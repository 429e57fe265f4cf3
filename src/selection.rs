//! Files picked in the sidebar, their tags, and how they are handed to the shell.

use std::path::{Path, PathBuf};

use crate::fs::path::{relative_path, shell_quote};

/// What the receiving tool should do with a selected file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileTag {
    #[default]
    Modify,
    DoNotModify,
    UseAsExample,
}

impl FileTag {
    pub const ALL: [FileTag; 3] = [FileTag::Modify, FileTag::DoNotModify, FileTag::UseAsExample];

    /// Heading used in composed messages.
    pub fn label(self) -> &'static str {
        match self {
            FileTag::Modify => "Modify",
            FileTag::DoNotModify => "Do not modify",
            FileTag::UseAsExample => "Use as example",
        }
    }

    /// Single-character marker for the sidebar rows.
    pub fn marker(self) -> char {
        match self {
            FileTag::Modify => 'M',
            FileTag::DoNotModify => 'D',
            FileTag::UseAsExample => 'E',
        }
    }
}

/// Selected paths in the order they were picked.
#[derive(Debug, Default)]
pub struct SelectionStore {
    items: Vec<(PathBuf, FileTag)>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `path` with the default tag, or deselect it if present.
    /// Returns whether the path is selected afterwards.
    pub fn toggle_select(&mut self, path: &Path) -> bool {
        if self.remove(path) {
            return false;
        }
        self.items.push((path.to_path_buf(), FileTag::default()));
        true
    }

    /// Retag a selected path. No effect on unselected paths.
    pub fn set_state(&mut self, path: &Path, tag: FileTag) -> bool {
        match self.items.iter_mut().find(|(p, _)| p == path) {
            Some(item) => {
                item.1 = tag;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.items.len();
        self.items.retain(|(p, _)| p != path);
        self.items.len() != before
    }

    pub fn clear_all(&mut self) {
        self.items.clear();
    }

    pub fn tag(&self, path: &Path) -> Option<FileTag> {
        self.items.iter().find(|(p, _)| p == path).map(|(_, t)| *t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, FileTag)> {
        self.items.iter().map(|(p, t)| (p.as_path(), *t))
    }

    /// The `index`-th selected path, in selection order.
    pub fn get(&self, index: usize) -> Option<(&Path, FileTag)> {
        self.iter().nth(index)
    }

    /// Selected paths carrying `tag`, in selection order.
    pub fn paths_with(&self, tag: FileTag) -> Vec<PathBuf> {
        self.items
            .iter()
            .filter(|(_, t)| *t == tag)
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Build the line sent to the shell: the user's text followed by one
    /// group per non-empty tag, groups joined by ` | `.
    ///
    /// Returns `None` when there is neither text nor selection.
    pub fn compose_message(&self, text: &str, cwd: &Path) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        let folded = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !folded.is_empty() {
            parts.push(folded);
        }
        for tag in FileTag::ALL {
            let paths = self.paths_with(tag);
            if paths.is_empty() {
                continue;
            }
            let refs = format_for_handoff(&paths, cwd).join(" ");
            parts.push(format!("{}: {}", tag.label(), refs));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }
}

/// Shell-ready references for `paths`, relative to `cwd` where possible.
pub fn format_for_handoff(paths: &[PathBuf], cwd: &Path) -> Vec<String> {
    paths
        .iter()
        .map(|p| shell_quote(&relative_path(p, cwd)))
        .collect()
}
