use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ValueError;
use crate::model::{NodeId, Tree};

/// How declared values on branches relate to their descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchValues {
    /// Branch values are extra weight on top of their children.
    #[default]
    Remainder,
    /// Branch values already include their children.
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateMode {
    Remainder,
    Total,
    /// No values supplied: leaves weigh 1, branches add `branch_increment`.
    Count { branch_increment: f64 },
}

impl AggregateMode {
    pub fn from_config(has_values: bool, branch_values: BranchValues, count_branches: bool) -> Self {
        match (has_values, branch_values) {
            (true, BranchValues::Remainder) => AggregateMode::Remainder,
            (true, BranchValues::Total) => AggregateMode::Total,
            (false, _) => AggregateMode::Count {
                branch_increment: if count_branches { 1.0 } else { 0.0 },
            },
        }
    }
}

/// Fills in `value`, `height` and (in count mode) `leaf_ordinal` for
/// every node, then orders siblings by descending value. Takes the tree
/// by value so a failed pass never leaves half-written weights behind.
pub fn aggregate(mut tree: Tree, mode: AggregateMode) -> Result<Tree, ValueError> {
    if mode == AggregateMode::Total {
        check_totals(&tree)?;
    }

    let len = tree.len();
    let mut values = vec![0.0f64; len];
    let mut heights = vec![0u32; len];
    // children sit at higher indices, so a reverse sweep is post-order
    for i in (0..len).rev() {
        let node = &tree.nodes[i];
        let children_sum: f64 = node.children.iter().map(|c| values[c.index()]).sum();
        heights[i] = node
            .children
            .iter()
            .map(|c| heights[c.index()] + 1)
            .max()
            .unwrap_or(0);
        values[i] = match mode {
            AggregateMode::Remainder => node.declared.unwrap_or(0.0) + children_sum,
            AggregateMode::Total => node.declared.unwrap_or(children_sum),
            AggregateMode::Count { branch_increment } => {
                if node.is_leaf() {
                    1.0
                } else {
                    children_sum + branch_increment
                }
            }
        };
    }

    for (node, (value, height)) in tree.nodes_mut().iter_mut().zip(values.into_iter().zip(heights)) {
        node.value = value;
        node.height = height;
    }
    sort_children(&mut tree);

    if matches!(mode, AggregateMode::Count { .. }) {
        let mut ordinal = 0u32;
        for id in tree.preorder(tree.root) {
            let node = &mut tree.nodes_mut()[id.index()];
            if node.is_leaf() {
                ordinal += 1;
                node.leaf_ordinal = Some(ordinal);
            }
        }
    }

    debug!(root_value = tree.root_node().value, ?mode, "values aggregated");
    Ok(tree)
}

// A declared total must cover its direct children's declared values.
fn check_totals(tree: &Tree) -> Result<(), ValueError> {
    for node in &tree.nodes {
        let Some(declared) = node.declared else {
            continue;
        };
        if node.is_leaf() {
            continue;
        }
        let children_sum: f64 = node
            .children
            .iter()
            .map(|c| tree.node(*c).declared.unwrap_or(0.0))
            .sum();
        if declared < children_sum {
            warn!(id = %node.key, declared, children_sum, "total value smaller than children");
            return Err(ValueError::InvalidTotalValue {
                id: node.key.clone(),
                declared,
                children_sum,
            });
        }
    }
    Ok(())
}

// Stable sort: equal values keep their input order.
fn sort_children(tree: &mut Tree) {
    let values: Vec<f64> = tree.nodes.iter().map(|n| n.value).collect();
    for node in tree.nodes_mut() {
        node.children
            .sort_by(|a: &NodeId, b: &NodeId| values[b.index()].total_cmp(&values[a.index()]));
    }
}
