//! Turns flat `(id, parent, label, value)` rows into a single-rooted [`Tree`].

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::{Diagnostic, HierarchyError};
use crate::model::{NodeId, NodeKind, Record, Tree, TreeNode};

const WRAPPER_PREFIX: &str = "__sunmap_root";

#[derive(Debug, Clone)]
pub struct Built {
    pub tree: Tree,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeBuilder {
    with_values: bool,
}

// Row that survived validation, plus the synthesized ones.
struct Entry {
    key: String,
    label: String,
    parent_key: String,
    value: Option<f64>,
    input_index: Option<usize>,
    kind: NodeKind,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every record must carry a finite, non-negative value
    /// or it is dropped.
    pub fn with_values(mut self, with_values: bool) -> Self {
        self.with_values = with_values;
        self
    }

    pub fn build(&self, records: &[Record]) -> Result<Built, HierarchyError> {
        let mut diagnostics = Vec::new();
        let mut entries = self.collect_entries(records, &mut diagnostics);
        for d in &diagnostics {
            warn!("{d}");
        }
        if entries.is_empty() {
            return Err(HierarchyError::EmptyHierarchy);
        }

        let declared_roots = entries.iter().filter(|e| e.parent_key.is_empty()).count();
        let mut has_multiple_roots = false;
        if declared_roots == 0 {
            let implied = implied_roots(&entries);
            if implied.len() != 1 {
                return Err(HierarchyError::AmbiguousRoot { implied });
            }
            let key = implied[0].clone();
            debug!(root = %key, "promoting implied root");
            entries.insert(
                0,
                Entry {
                    label: key.clone(),
                    key,
                    parent_key: String::new(),
                    value: None,
                    input_index: None,
                    kind: NodeKind::ImpliedRoot,
                },
            );
        } else if declared_roots > 1 {
            let key = fresh_wrapper_key(&entries);
            debug!(roots = declared_roots, wrapper = %key, "wrapping multiple roots");
            for e in entries.iter_mut().filter(|e| e.parent_key.is_empty()) {
                e.parent_key = key.clone();
            }
            entries.insert(
                0,
                Entry {
                    key,
                    label: String::new(),
                    parent_key: String::new(),
                    value: None,
                    input_index: None,
                    kind: NodeKind::Wrapper,
                },
            );
            has_multiple_roots = true;
        }

        let tree = assemble(entries, has_multiple_roots)?;
        debug!(nodes = tree.len(), multiple_roots = has_multiple_roots, "hierarchy built");
        Ok(Built { tree, diagnostics })
    }

    fn collect_entries(&self, records: &[Record], diagnostics: &mut Vec<Diagnostic>) -> Vec<Entry> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut entries = Vec::with_capacity(records.len());
        for (index, r) in records.iter().enumerate() {
            if r.id.is_empty() {
                diagnostics.push(Diagnostic::InvalidId { index });
                continue;
            }
            if self.with_values && !matches!(r.value, Some(v) if v.is_finite() && v >= 0.0) {
                diagnostics.push(Diagnostic::InvalidValue {
                    index,
                    id: r.id.clone(),
                });
                continue;
            }
            if !seen.insert(r.id.as_str()) {
                diagnostics.push(Diagnostic::DuplicateId {
                    index,
                    id: r.id.clone(),
                });
                continue;
            }
            entries.push(Entry {
                key: r.id.clone(),
                label: if r.label.is_empty() { r.id.clone() } else { r.label.clone() },
                parent_key: r.parent_id.clone(),
                value: if self.with_values { r.value } else { None },
                input_index: Some(index),
                kind: NodeKind::Record,
            });
        }
        entries
    }
}

/// Convenience for `TreeBuilder::new().with_values(..).build(..)`.
pub fn build(records: &[Record], with_values: bool) -> Result<Built, HierarchyError> {
    TreeBuilder::new().with_values(with_values).build(records)
}

// Parents that are referenced but never declared, in first-seen order.
fn implied_roots(entries: &[Entry]) -> Vec<String> {
    let declared: HashSet<&str> = entries.iter().map(|e| e.key.as_str()).collect();
    let mut out: Vec<String> = Vec::new();
    for e in entries {
        if !declared.contains(e.parent_key.as_str()) && !out.contains(&e.parent_key) {
            out.push(e.parent_key.clone());
        }
    }
    out
}

fn fresh_wrapper_key(entries: &[Entry]) -> String {
    let taken: HashSet<&str> = entries
        .iter()
        .flat_map(|e| [e.key.as_str(), e.parent_key.as_str()])
        .collect();
    let mut n = 0u32;
    loop {
        let key = format!("{WRAPPER_PREFIX}{n}");
        if !taken.contains(key.as_str()) {
            return key;
        }
        n += 1;
    }
}

// Expects exactly one entry with an empty parent key.
fn assemble(entries: Vec<Entry>, has_multiple_roots: bool) -> Result<Tree, HierarchyError> {
    let mut children_of: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut root = None;
    for (i, e) in entries.iter().enumerate() {
        if e.parent_key.is_empty() {
            root = Some(i);
        } else {
            children_of.entry(e.parent_key.as_str()).or_default().push(i);
        }
    }
    let Some(root) = root else {
        return Err(HierarchyError::EmptyHierarchy);
    };

    let mut nodes: Vec<TreeNode> = Vec::with_capacity(entries.len());
    let mut reached = vec![false; entries.len()];
    // (entry index, parent node, depth)
    let mut stack: Vec<(usize, Option<NodeId>, u32)> = vec![(root, None, 0)];
    while let Some((ei, parent, depth)) = stack.pop() {
        reached[ei] = true;
        let e = &entries[ei];
        let id = NodeId(nodes.len() as u64);
        nodes.push(TreeNode {
            id,
            key: e.key.clone(),
            label: e.label.clone(),
            parent_key: e.parent_key.clone(),
            parent,
            children: Vec::new(),
            kind: e.kind,
            input_index: e.input_index,
            declared: e.value,
            value: 0.0,
            depth,
            height: 0,
            leaf_ordinal: None,
        });
        if let Some(pid) = parent {
            if let Some(p) = nodes.get_mut(pid.index()) {
                p.children.push(id);
            }
        }
        if let Some(kids) = children_of.get(e.key.as_str()) {
            stack.extend(kids.iter().rev().map(|&k| (k, Some(id), depth + 1)));
        }
    }

    if let Some(i) = reached.iter().position(|r| !r) {
        return Err(HierarchyError::CycleOrOrphan {
            id: entries[i].key.clone(),
        });
    }

    // children always follow their parent in the arena
    for i in (0..nodes.len()).rev() {
        let h = nodes[i]
            .children
            .iter()
            .map(|c| nodes[c.index()].height + 1)
            .max()
            .unwrap_or(0);
        nodes[i].height = h;
    }

    Ok(Tree::from_nodes(NodeId(0), nodes, has_multiple_roots))
}
