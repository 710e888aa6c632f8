use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl Default for NodeId {
    fn default() -> Self {
        NodeId(0)
    }
}

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One flat input row. An empty `parent_id` marks a candidate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default, alias = "parent")]
    pub parent_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: Option<f64>,
}

impl Record {
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            parent_id: parent_id.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Parallel input columns. Without `ids`, labels double as ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Columns {
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub parents: Vec<String>,
    #[serde(default)]
    pub values: Option<Vec<f64>>,
}

impl Columns {
    pub fn into_records(self) -> Vec<Record> {
        let mut len = self.parents.len();
        match &self.ids {
            Some(ids) => len = len.min(ids.len()),
            None => len = len.min(self.labels.len()),
        }
        if let Some(values) = &self.values {
            len = len.min(values.len());
        }

        (0..len)
            .map(|i| {
                let label = self.labels.get(i).cloned().unwrap_or_default();
                let id = match &self.ids {
                    Some(ids) => ids[i].clone(),
                    None => label.clone(),
                };
                Record {
                    id,
                    parent_id: self.parents[i].clone(),
                    label,
                    value: self.values.as_ref().map(|v| v[i]),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Record,
    /// Referenced only as a parent, promoted to root.
    ImpliedRoot,
    /// Hidden wrapper above several declared roots.
    Wrapper,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub key: String,
    pub label: String,
    pub parent_key: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
    /// Position in the input, `None` for synthesized nodes.
    pub input_index: Option<usize>,
    pub declared: Option<f64>,
    pub value: f64,
    pub depth: u32,
    pub height: u32,
    pub leaf_ordinal: Option<u32>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena-backed hierarchy. Children and parents are stored as indices,
/// and every child sits at a higher index than its parent.
#[derive(Debug, Clone, Serialize)]
pub struct Tree {
    pub root: NodeId,
    pub nodes: Vec<TreeNode>,
    pub has_multiple_roots: bool,
    #[serde(skip)]
    index: HashMap<String, NodeId>,
}

impl Tree {
    pub(crate) fn from_nodes(root: NodeId, nodes: Vec<TreeNode>, has_multiple_roots: bool) -> Self {
        let index = nodes.iter().map(|n| (n.key.clone(), n.id)).collect();
        Self {
            root,
            nodes,
            has_multiple_roots,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.index()]
    }

    pub fn root_node(&self) -> &TreeNode {
        self.node(self.root)
    }

    pub fn find(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &str) -> Option<&TreeNode> {
        self.find(key).map(|id| self.node(id))
    }

    /// True for the synthetic wrapper that holds several declared roots.
    pub fn is_wrapper(&self, id: NodeId) -> bool {
        self.has_multiple_roots && id == self.root
    }

    /// `id` and its ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut cur = self.node(id).parent;
        while let Some(p) = cur {
            out.push(p);
            cur = self.node(p).parent;
        }
        out
    }

    /// Pre-order walk of the subtree under `from`, following child order.
    pub fn preorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    /// `(index, sibling_count)` of every node among its parent's children,
    /// indexed like `nodes`. `None` for the root.
    pub fn sibling_slots(&self) -> Vec<Option<(usize, usize)>> {
        let mut slots = vec![None; self.nodes.len()];
        for node in &self.nodes {
            let n = node.children.len();
            for (i, c) in node.children.iter().enumerate() {
                slots[c.index()] = Some((i, n));
            }
        }
        slots
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [TreeNode] {
        &mut self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_without_ids_use_labels() {
        let cols = Columns {
            ids: None,
            labels: vec!["root".into(), "a".into(), "b".into()],
            parents: vec!["".into(), "root".into(), "root".into(), "extra".into()],
            values: None,
        };
        let records = cols.into_records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].id, "a");
        assert_eq!(records[1].parent_id, "root");
        assert_eq!(records[2].value, None);
    }

    #[test]
    fn columns_truncate_to_shortest() {
        let cols = Columns {
            ids: Some(vec!["r".into(), "x".into()]),
            labels: vec!["Root".into(), "X".into()],
            parents: vec!["".into(), "r".into()],
            values: Some(vec![1.0]),
        };
        let records = cols.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "Root");
        assert_eq!(records[0].value, Some(1.0));
    }

    #[test]
    fn sibling_slots_follow_child_order() {
        let node = |id: u64, parent: Option<u64>, children: Vec<u64>| TreeNode {
            id: NodeId(id),
            key: format!("n{id}"),
            label: String::new(),
            parent_key: String::new(),
            parent: parent.map(NodeId),
            children: children.into_iter().map(NodeId).collect(),
            kind: NodeKind::Record,
            input_index: None,
            declared: None,
            value: 0.0,
            depth: 0,
            height: 0,
            leaf_ordinal: None,
        };
        let tree = Tree::from_nodes(
            NodeId(0),
            vec![
                node(0, None, vec![2, 1]),
                node(1, Some(0), vec![3]),
                node(2, Some(0), vec![]),
                node(3, Some(1), vec![]),
            ],
            false,
        );
        let slots = tree.sibling_slots();
        assert_eq!(slots, vec![None, Some((1, 2)), Some((0, 2)), Some((0, 1))]);
    }
}
