//! Checkpoint timeline: turns the flat checkpoint list into a forest for
//! hierarchical display, and tracks which nodes the user has expanded.

use crate::models::Checkpoint;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Tree,
    Linear,
}

impl ViewMode {
    pub fn toggle(&self) -> ViewMode {
        match self {
            ViewMode::Tree => ViewMode::Linear,
            ViewMode::Linear => ViewMode::Tree,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Tree => "Tree",
            ViewMode::Linear => "Linear",
        }
    }
}

/// Ids of expanded timeline nodes. Owned by the caller; updates return a new set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionSet {
    ids: HashSet<String>,
}

impl ExpansionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Copy of this set with `id` inserted if absent, removed if present.
    pub fn toggle(&self, id: &str) -> ExpansionSet {
        let mut ids = self.ids.clone();
        if !ids.remove(id) {
            ids.insert(id.to_string());
        }
        ExpansionSet { ids }
    }

    /// Every node in `forest` that has children.
    pub fn expand_all(forest: &[TimelineNode<'_>]) -> ExpansionSet {
        let mut ids = HashSet::new();
        let mut stack: Vec<&TimelineNode<'_>> = forest.iter().collect();
        while let Some(node) = stack.pop() {
            if node.has_children() {
                ids.insert(node.checkpoint.id.clone());
            }
            stack.extend(node.children.iter());
        }
        ExpansionSet { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl FromIterator<String> for ExpansionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        ExpansionSet {
            ids: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineNode<'a> {
    pub checkpoint: &'a Checkpoint,
    pub children: Vec<TimelineNode<'a>>,
    pub depth: usize,
    pub expanded: bool,
}

// the derived drop recurses once per level, which a long chain exhausts
impl Drop for TimelineNode<'_> {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl<'a> TimelineNode<'a> {
    pub fn id(&self) -> &'a str {
        &self.checkpoint.id
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&TimelineNode<'a>> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Depth-first search of this subtree.
    pub fn find(&self, id: &str) -> Option<&TimelineNode<'a>> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.checkpoint.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }
}

pub fn build_forest(checkpoints: &[Checkpoint]) -> Vec<TimelineNode<'_>> {
    build_forest_with(checkpoints, &ExpansionSet::default())
}

/// Build the checkpoint forest, reading each node's `expanded` flag from `expanded`.
///
/// A checkpoint is a root when its parent is absent, points at itself, or names an
/// id not present in `checkpoints`. Children keep their input order and roots are
/// returned in input order. Every checkpoint appears exactly once: members of a
/// parent cycle are never reachable from a root, so the earliest cycle member in
/// input order is promoted to a root and the edge closing the cycle is dropped.
pub fn build_forest_with<'a>(
    checkpoints: &'a [Checkpoint],
    expanded: &ExpansionSet,
) -> Vec<TimelineNode<'a>> {
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(checkpoints.len());
    for (idx, cp) in checkpoints.iter().enumerate() {
        index_of.entry(cp.id.as_str()).or_insert(idx);
    }

    let mut children_of: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (idx, cp) in checkpoints.iter().enumerate() {
        match cp.parent_id.as_deref() {
            Some(pid) if pid != cp.id && index_of.contains_key(pid) => {
                children_of.entry(pid).or_default().push(idx)
            }
            _ => roots.push(idx),
        }
    }

    let mut asm = Assembly::new(checkpoints, index_of, children_of);
    for &root in &roots {
        asm.walk(root);
    }

    let mut orphaned = 0;
    for idx in 0..checkpoints.len() {
        if !asm.visited[idx] {
            let root = asm.cycle_entry(idx);
            roots.push(root);
            asm.walk(root);
            orphaned += 1;
        }
    }
    if orphaned > 0 {
        warn!(
            orphaned,
            "checkpoint parent references form a cycle; promoted cycle members to roots"
        );
        roots.sort_unstable();
    }

    let mut slots: Vec<Option<TimelineNode<'a>>> =
        (0..checkpoints.len()).map(|_| None).collect();
    // parents precede their children in `order`
    for &idx in asm.order.iter().rev() {
        let children = asm.kids[idx]
            .iter()
            .filter_map(|&child| slots[child].take())
            .collect();
        let checkpoint = &checkpoints[idx];
        slots[idx] = Some(TimelineNode {
            checkpoint,
            children,
            depth: asm.depth[idx],
            expanded: expanded.contains(&checkpoint.id),
        });
    }

    debug!(
        checkpoints = checkpoints.len(),
        roots = roots.len(),
        "built timeline forest"
    );
    roots.iter().filter_map(|&idx| slots[idx].take()).collect()
}

struct Assembly<'a> {
    checkpoints: &'a [Checkpoint],
    index_of: HashMap<&'a str, usize>,
    children_of: HashMap<&'a str, Vec<usize>>,
    visited: Vec<bool>,
    depth: Vec<usize>,
    kids: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl<'a> Assembly<'a> {
    fn new(
        checkpoints: &'a [Checkpoint],
        index_of: HashMap<&'a str, usize>,
        children_of: HashMap<&'a str, Vec<usize>>,
    ) -> Self {
        let n = checkpoints.len();
        Assembly {
            checkpoints,
            index_of,
            children_of,
            visited: vec![false; n],
            depth: vec![0; n],
            kids: vec![Vec::new(); n],
            order: Vec::with_capacity(n),
        }
    }

    /// Attach every unvisited descendant of `root`. A node is marked visited when it
    /// is attached, so no id is ever attached twice.
    fn walk(&mut self, root: usize) {
        let checkpoints = self.checkpoints;
        self.visited[root] = true;
        self.depth[root] = 0;
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            self.order.push(idx);
            // duplicate ids: the first holder visited takes the whole bucket
            let bucket = self
                .children_of
                .remove(checkpoints[idx].id.as_str())
                .unwrap_or_default();
            for child in bucket {
                if self.visited[child] {
                    continue;
                }
                self.visited[child] = true;
                self.depth[child] = self.depth[idx] + 1;
                self.kids[idx].push(child);
                stack.push(child);
            }
        }
    }

    /// Follow parent links up from an unreachable checkpoint until they loop, and
    /// return the earliest (by input position) checkpoint on the loop.
    fn cycle_entry(&self, start: usize) -> usize {
        let mut path: Vec<usize> = Vec::new();
        let mut position: HashMap<usize, usize> = HashMap::new();
        let mut cur = start;
        loop {
            if let Some(&at) = position.get(&cur) {
                return path[at..].iter().copied().min().unwrap_or(cur);
            }
            position.insert(cur, path.len());
            path.push(cur);
            let parent = self.checkpoints[cur]
                .parent_id
                .as_deref()
                .and_then(|pid| self.index_of.get(pid))
                .copied();
            match parent {
                Some(p) if !self.visited[p] => cur = p,
                _ => return cur,
            }
        }
    }
}

/// Nodes shown in tree mode, in display order: roots always, children only under
/// expanded parents.
pub fn visible_nodes<'n, 'a>(forest: &'n [TimelineNode<'a>]) -> Vec<&'n TimelineNode<'a>> {
    let mut out = Vec::new();
    let mut stack: Vec<&'n TimelineNode<'a>> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        if node.expanded {
            stack.extend(node.children.iter().rev());
        }
    }
    out
}

/// Total number of nodes in the forest.
pub fn node_count(forest: &[TimelineNode<'_>]) -> usize {
    forest.iter().map(|n| 1 + n.descendant_count()).sum()
}
