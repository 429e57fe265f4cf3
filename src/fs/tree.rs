use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::fs::entry::{compare_entries, DirectoryEntry};
use crate::fs::path::ancestors_of;

/// A node in a snapshot tree.
///
/// Directories always carry `Some(children)`, possibly empty; files carry
/// `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub entry: DirectoryEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn path(&self) -> &Path {
        &self.entry.path
    }

    pub fn is_dir(&self) -> bool {
        self.entry.is_dir
    }
}

/// A flattened representation of a tree node for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub depth: usize,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
}

/// Assemble the flat `entries` of a snapshot rooted at `root` into a sorted forest.
///
/// Entries whose parent is absent or equal to `root` become roots. Entries
/// whose parent directory is missing from `entries` are dropped, together
/// with everything below them.
pub fn build(entries: &[DirectoryEntry], root: &Path) -> Vec<TreeNode> {
    let dirs: HashSet<&Path> = entries
        .iter()
        .filter(|e| e.is_dir)
        .map(|e| e.path.as_path())
        .collect();

    let mut roots = Vec::new();
    let mut children_of: HashMap<&Path, Vec<usize>> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        match entry.parent_path.as_deref() {
            None => roots.push(i),
            Some(parent) if parent == root => roots.push(i),
            Some(parent) if parent != entry.path && dirs.contains(parent) => {
                children_of.entry(parent).or_default().push(i)
            }
            Some(_) => {}
        }
    }

    let mut forest: Vec<TreeNode> = roots
        .into_iter()
        .map(|i| assemble(entries, i, &children_of))
        .collect();
    sort_recursive(&mut forest);

    let kept = count_nodes(&forest);
    if kept < entries.len() {
        tracing::debug!(
            root = %root.display(),
            dropped = entries.len() - kept,
            "dropped entries without a parent in the snapshot"
        );
    }
    forest
}

fn assemble(
    entries: &[DirectoryEntry],
    index: usize,
    children_of: &HashMap<&Path, Vec<usize>>,
) -> TreeNode {
    let entry = &entries[index];
    let children = entry.is_dir.then(|| {
        children_of
            .get(entry.path.as_path())
            .map(|kids| {
                kids.iter()
                    .map(|&k| assemble(entries, k, children_of))
                    .collect()
            })
            .unwrap_or_default()
    });
    TreeNode {
        entry: entry.clone(),
        children,
    }
}

/// Sort every level, deepest first: directories before files, then by name.
pub fn sort_recursive(nodes: &mut [TreeNode]) {
    for node in nodes.iter_mut() {
        if let Some(children) = &mut node.children {
            sort_recursive(children);
        }
    }
    nodes.sort_by(|a, b| compare_entries(&a.entry, &b.entry));
}

/// Total number of nodes in the forest.
pub fn count_nodes(nodes: &[TreeNode]) -> usize {
    nodes
        .iter()
        .map(|n| 1 + n.children.as_deref().map_or(0, count_nodes))
        .sum()
}

/// Every entry that made it into the forest, parents before children.
pub fn collect_entries(nodes: &[TreeNode]) -> Vec<DirectoryEntry> {
    let mut entries = Vec::with_capacity(count_nodes(nodes));
    collect_into(nodes, &mut entries);
    entries
}

fn collect_into(nodes: &[TreeNode], entries: &mut Vec<DirectoryEntry>) {
    for node in nodes {
        entries.push(node.entry.clone());
        if let Some(children) = &node.children {
            collect_into(children, entries);
        }
    }
}

/// Prune `tree` to the nodes in `matches` and their ancestors.
///
/// Relative order is preserved. An empty `matches` set means "no filter"
/// and returns the tree unchanged.
pub fn filter(tree: &[TreeNode], matches: &HashSet<PathBuf>, root: &Path) -> Vec<TreeNode> {
    if matches.is_empty() {
        return tree.to_vec();
    }
    let mut keep: HashSet<PathBuf> = matches.clone();
    for path in matches {
        keep.extend(ancestors_of(path, root));
    }
    prune(tree, &keep)
}

fn prune(nodes: &[TreeNode], keep: &HashSet<PathBuf>) -> Vec<TreeNode> {
    nodes
        .iter()
        .filter(|n| keep.contains(n.path()))
        .map(|n| TreeNode {
            entry: n.entry.clone(),
            children: n.children.as_deref().map(|c| prune(c, keep)),
        })
        .collect()
}

/// Flatten the visible part of `tree` in display order.
///
/// Children of a directory are visible only when its path is in `expanded`.
pub fn flatten(tree: &[TreeNode], expanded: &HashSet<PathBuf>) -> Vec<FlatItem> {
    let mut items = Vec::new();
    flatten_into(tree, expanded, 0, &mut items);
    items
}

fn flatten_into(
    nodes: &[TreeNode],
    expanded: &HashSet<PathBuf>,
    depth: usize,
    items: &mut Vec<FlatItem>,
) {
    for (i, node) in nodes.iter().enumerate() {
        let is_expanded = node.is_dir() && expanded.contains(node.path());
        items.push(FlatItem {
            name: node.name().to_string(),
            path: node.path().to_path_buf(),
            is_dir: node.is_dir(),
            depth,
            is_expanded,
            is_last_sibling: i + 1 == nodes.len(),
        });
        if is_expanded {
            if let Some(children) = &node.children {
                flatten_into(children, expanded, depth + 1, items);
            }
        }
    }
}
