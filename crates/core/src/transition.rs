use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

use crate::geometry::{lerp, GeometrySnapshot, Lerp, Rect, Sector, SnapshotEntry, Viewport, TAU};
use crate::model::Tree;
use crate::treemap::TreemapLayout;

/// Start and end geometry of one node over a redraw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tween<G> {
    pub from: G,
    pub to: G,
}

impl<G: Lerp> Tween<G> {
    pub fn new(from: G, to: G) -> Self {
        Self { from, to }
    }

    /// Geometry at `t`, clamped to `[0, 1]`. The endpoints are returned
    /// as stored, without rounding through the interpolation.
    pub fn at(&self, t: f64) -> G {
        if t.is_nan() || t <= 0.0 {
            self.from
        } else if t >= 1.0 {
            self.to
        } else {
            G::lerp(&self.from, &self.to, t)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition<G> {
    /// One tween per node of the new layout.
    pub updates: BTreeMap<String, Tween<G>>,
    /// Nodes only in the old layout, heading for their collapse target.
    pub exits: BTreeMap<String, Tween<G>>,
}

impl<G: Lerp> Transition<G> {
    pub fn frame(&self, t: f64) -> impl Iterator<Item = (&str, G)> + '_ {
        self.exits
            .iter()
            .chain(self.updates.iter())
            .map(move |(id, tween)| (id.as_str(), tween.at(t)))
    }

    /// `count` evenly spaced frames, the last one at `t = 1`.
    pub fn sample(&self, count: usize) -> Vec<BTreeMap<String, G>> {
        (0..count)
            .map(|i| {
                let t = if count > 1 {
                    i as f64 / (count - 1) as f64
                } else {
                    1.0
                };
                self.frame(t).map(|(id, g)| (id.to_string(), g)).collect()
            })
            .collect()
    }
}

fn assemble<G: Lerp>(
    prev: Option<&GeometrySnapshot<G>>,
    next: &GeometrySnapshot<G>,
    mut enter: impl FnMut(&SnapshotEntry<G>) -> G,
    mut exit: impl FnMut(&SnapshotEntry<G>) -> G,
) -> Transition<G> {
    let updates = next
        .iter()
        .map(|e| {
            let from = match prev.and_then(|p| p.get(&e.id)) {
                Some(g) => *g,
                None => enter(e),
            };
            (e.id.clone(), Tween::new(from, e.geometry))
        })
        .collect();
    let exits = prev
        .into_iter()
        .flat_map(|p| p.iter())
        .filter(|q| !next.contains(&q.id))
        .map(|q| (q.id.clone(), Tween::new(q.geometry, exit(q))))
        .collect();
    Transition { updates, exits }
}

/// `(index, sibling_count)` per node, from `Tree::sibling_slots`.
type Slots = [Option<(usize, usize)>];

// Previous geometry of the entry's parent plus its slot among the siblings.
fn parent_before<G: Copy>(
    e: &SnapshotEntry<G>,
    prev: &GeometrySnapshot<G>,
    tree: &Tree,
    slots: &Slots,
) -> Option<(G, usize, usize)> {
    let parent = tree.node(e.node).parent?;
    let (i, n) = slots[e.node.index()]?;
    prev.get(&tree.node(parent).key).map(|g| (*g, i, n))
}

pub fn radial_transition(
    prev: Option<&GeometrySnapshot<Sector>>,
    next: &GeometrySnapshot<Sector>,
    tree: &Tree,
) -> Transition<Sector> {
    let Some(prev) = prev else {
        trace!(focus = %next.focus, "radial: first appearance");
        return assemble(
            None,
            next,
            |e| Sector {
                angle_start: 0.0,
                angle_end: 0.0,
                ..e.geometry
            },
            |q| q.geometry,
        );
    };

    // end angle the old focus ends up at, and where the new focus was
    let pivot = next.get(&prev.focus).map(|s| s.angle_end);
    let focus_before = prev.get(&next.focus).copied();
    let slots = tree.sibling_slots();

    assemble(
        Some(prev),
        next,
        |e| radial_origin(e, prev, &next.focus, tree, &slots, pivot),
        |q| radial_exit(q, next, tree, &slots, focus_before),
    )
}

fn radial_origin(
    e: &SnapshotEntry<Sector>,
    prev: &GeometrySnapshot<Sector>,
    focus: &str,
    tree: &Tree,
    slots: &Slots,
    pivot: Option<f64>,
) -> Sector {
    let to = e.geometry;
    if e.id == focus {
        trace!(id = %e.id, "radial: grow focus from the centre");
        return Sector {
            radius_inner: 0.0,
            radius_outer: 0.0,
            ..to
        };
    }
    if let Some((p, i, n)) = parent_before(e, prev, tree, slots) {
        trace!(id = %e.id, "radial: squeeze out of parent");
        let (f0, f1) = (i as f64 / n as f64, (i + 1) as f64 / n as f64);
        return Sector {
            angle_start: lerp(p.angle_start, p.angle_end, f0),
            angle_end: lerp(p.angle_start, p.angle_end, f1),
            radius_inner: p.radius_outer,
            radius_outer: p.radius_outer,
        };
    }
    if let Some(pivot) = pivot {
        trace!(id = %e.id, "radial: twist in");
        let a = if to.angle_end > pivot { TAU } else { 0.0 };
        return Sector {
            angle_start: a,
            angle_end: a,
            ..to
        };
    }
    trace!(id = %e.id, "radial: no reference, start at the rim");
    Sector {
        angle_start: 0.0,
        angle_end: 0.0,
        radius_inner: 1.0,
        radius_outer: 1.0,
    }
}

fn radial_exit(
    q: &SnapshotEntry<Sector>,
    next: &GeometrySnapshot<Sector>,
    tree: &Tree,
    slots: &Slots,
    focus_before: Option<Sector>,
) -> Sector {
    let from = q.geometry;
    if let Some(f) = focus_before {
        if from.radius_outer < f.radius_outer {
            trace!(id = %q.id, "radial: collapse inward");
            return Sector {
                radius_inner: 0.0,
                radius_outer: 0.0,
                ..from
            };
        }
        trace!(id = %q.id, "radial: twist out");
        let a = if from.angle_end > f.angle_end { TAU } else { 0.0 };
        return Sector {
            angle_start: a,
            angle_end: a,
            ..from
        };
    }

    // trimmed by the depth limit under a focus that was not drawn before
    let slot = tree.find(&q.id).and_then(|id| {
        let parent = tree.node(id).parent?;
        let (i, n) = slots[id.index()]?;
        next.get(&tree.node(parent).key).map(|p| (*p, i, n))
    });
    match slot {
        Some((p, i, n)) => {
            trace!(id = %q.id, "radial: fold back into parent");
            Sector {
                angle_start: lerp(p.angle_start, p.angle_end, i as f64 / n as f64),
                angle_end: lerp(p.angle_start, p.angle_end, (i + 1) as f64 / n as f64),
                radius_inner: 1.0,
                radius_outer: 1.0,
            }
        }
        None => Sector {
            angle_start: 0.0,
            angle_end: 0.0,
            ..from
        },
    }
}

/// Which frame edges an entering or exiting rectangle may collapse onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSet {
    All,
    /// Left and right only, for one-row bands.
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Left,
    Top,
    Right,
    Bottom,
}

/// Tweens between two rectangle layouts drawn in a frame of `size`.
pub fn rect_transition(
    prev: Option<&GeometrySnapshot<Rect>>,
    next: &GeometrySnapshot<Rect>,
    tree: &Tree,
    size: Viewport,
    edges: EdgeSet,
) -> Transition<Rect> {
    let Some(prev) = prev else {
        trace!(focus = %next.focus, "rect: first appearance");
        return assemble(None, next, |_| Rect::ZERO, |q| q.geometry);
    };

    let frame = Rect::from_size(size.width, size.height);
    let zoom = prev
        .get(&next.focus)
        .or_else(|| next.get(&prev.focus))
        .copied()
        .unwrap_or(frame);
    let slots = tree.sibling_slots();

    assemble(
        Some(prev),
        next,
        |e| match parent_before(e, prev, tree, &slots) {
            Some((p, i, n)) => {
                trace!(id = %e.id, "rect: squeeze out of parent");
                Rect::lerp(&p, &e.geometry, i as f64 / n as f64)
            }
            None => edge_origin(&e.id, e.geometry, zoom, frame, edges),
        },
        |q| edge_origin(&q.id, q.geometry, zoom, frame, edges),
    )
}

/// Collapse target on the nearest frame edge lying outward from the zoom
/// rectangle, or on a corner when the rectangle overlaps the zoom area.
fn edge_origin(id: &str, r: Rect, zoom: Rect, frame: Rect, edges: EdgeSet) -> Rect {
    let (w, h) = (frame.width(), frame.height());
    let (mx, my) = r.center();
    let vertical = edges == EdgeSet::All;

    let mut candidates = Vec::with_capacity(4);
    if r.x0 <= zoom.x0 && r.x1 <= zoom.x0 {
        candidates.push((Edge::Left, 0.0, h / 2.0));
    }
    if vertical && r.y0 <= zoom.y0 && r.y1 <= zoom.y0 {
        candidates.push((Edge::Top, w / 2.0, 0.0));
    }
    if r.x0 >= zoom.x1 && r.x1 >= zoom.x1 {
        candidates.push((Edge::Right, w, h / 2.0));
    }
    if vertical && r.y0 >= zoom.y1 && r.y1 >= zoom.y1 {
        candidates.push((Edge::Bottom, w / 2.0, h));
    }

    if candidates.is_empty() {
        trace!(id, "rect: collapse to corner");
        return Rect::new(
            if mx <= w / 2.0 { 0.0 } else { w },
            if my <= h / 2.0 { 0.0 } else { h },
            if mx < w / 2.0 { 0.0 } else { w },
            if my < h / 2.0 { 0.0 } else { h },
        );
    }
    if r == frame {
        return r;
    }

    let dist = |x: f64, y: f64| (x - mx).hypot(y - my);
    let nearest = candidates
        .into_iter()
        .min_by(|a, b| dist(a.1, a.2).total_cmp(&dist(b.1, b.2)))
        .map(|(edge, _, _)| edge);
    trace!(id, edge = ?nearest, "rect: collapse to edge");
    match nearest {
        Some(Edge::Left) => Rect::new(0.0, r.y0, 0.0, r.y1),
        Some(Edge::Top) => Rect::new(r.x0, 0.0, r.x1, 0.0),
        Some(Edge::Right) => Rect::new(w, r.y0, w, r.y1),
        Some(Edge::Bottom) => Rect::new(r.x0, h, r.x1, h),
        None => r,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreemapTransition {
    pub tiles: Transition<Rect>,
    pub breadcrumb: Option<Transition<Rect>>,
}

/// Tiles and breadcrumb band of a treemap, each in its own frame.
pub fn treemap_transition(prev: Option<&TreemapLayout>, next: &TreemapLayout, tree: &Tree) -> TreemapTransition {
    let frame = next.tiles_frame;
    let tiles = rect_transition(
        prev.map(|p| &p.tiles),
        &next.tiles,
        tree,
        Viewport::new(frame.width(), frame.height()),
        EdgeSet::All,
    );
    let breadcrumb = next
        .breadcrumb
        .as_ref()
        .zip(next.breadcrumb_frame)
        .map(|(band, frame)| {
            rect_transition(
                prev.and_then(|p| p.breadcrumb.as_ref()),
                band,
                tree,
                Viewport::new(frame.width(), frame.height()),
                EdgeSet::Horizontal,
            )
        });
    TreemapTransition { tiles, breadcrumb }
}
