use serde::Serialize;
use tracing::debug;

use crate::geometry::{GeometrySnapshot, MaxDepth, Sector, TAU};
use crate::model::{NodeId, Tree};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SunburstLayout {
    pub snapshot: GeometrySnapshot<Sector>,
    /// Number of equally thick rings the radius is divided into.
    pub rings: u32,
}

impl SunburstLayout {
    /// Inscribed-circle fraction of every visible sector, for text fitting.
    pub fn inscribed_radius_fractions(&self) -> impl Iterator<Item = (&str, f64)> {
        self.snapshot
            .iter()
            .map(|e| (e.id.as_str(), e.geometry.inscribed_radius_fraction()))
    }
}

/// Angular partition of the subtree under `focus`. The focus spans the
/// full circle and each child gets a share of its parent's span
/// proportional to its value. Ring `k` below the focus covers radii
/// `[k / rings, (k + 1) / rings)`.
pub fn partition(tree: &Tree, focus: NodeId, max_depth: MaxDepth) -> SunburstLayout {
    let focus_node = tree.node(focus);
    let mut levels = focus_node.height + 1;
    let mut offset = 0;
    let mut cutoff = max_depth;
    let skip_wrapper = tree.is_wrapper(focus);
    if skip_wrapper {
        levels -= 1;
        offset = 1;
        cutoff = cutoff.extended(1);
    }
    let rings = max_depth.min_with(levels).max(1);
    let ring = 1.0 / f64::from(rings);

    let mut snapshot = GeometrySnapshot::new(focus_node.key.clone());
    // (node, depth below focus, start angle, end angle)
    let mut stack = vec![(focus, 0u32, 0.0f64, TAU)];
    while let Some((id, depth, a0, a1)) = stack.pop() {
        let node = tree.node(id);
        if !(skip_wrapper && depth == 0) {
            let shown = depth - offset;
            let slot = f64::from(shown);
            snapshot.push(
                node.key.clone(),
                id,
                shown,
                Sector {
                    angle_start: a0,
                    angle_end: a1,
                    radius_inner: slot * ring,
                    radius_outer: (slot + 1.0) * ring,
                },
            );
        }
        if node.is_leaf() || !cutoff.admits(depth + 1) {
            continue;
        }

        let k = if node.value > 0.0 { (a1 - a0) / node.value } else { 0.0 };
        let mut spans = Vec::with_capacity(node.children.len());
        let mut a = a0;
        for &c in &node.children {
            let end = a + tree.node(c).value * k;
            spans.push((c, depth + 1, a, end));
            a = end;
        }
        stack.extend(spans.into_iter().rev());
    }

    debug!(focus = %focus_node.key, entries = snapshot.len(), rings, "sunburst partitioned");
    SunburstLayout { snapshot, rings }
}
