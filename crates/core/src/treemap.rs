use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::geometry::{GeometrySnapshot, MaxDepth, Rect, Viewport};
use crate::model::{NodeId, Tree};
use crate::tiling::{non_negative, tile, Mirror, Padding, TilingSpec, TilingStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbSide {
    #[default]
    Top,
    Bottom,
}

/// Band above or below the tiles showing the root-to-focus path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreadcrumbSpec {
    #[serde(default)]
    pub side: BreadcrumbSide,
    #[serde(default = "default_band_height")]
    pub height: f64,
    #[serde(default)]
    pub right_to_left: bool,
}

fn default_band_height() -> f64 {
    20.0
}

impl Default for BreadcrumbSpec {
    fn default() -> Self {
        Self {
            side: BreadcrumbSide::Top,
            height: default_band_height(),
            right_to_left: false,
        }
    }
}

impl BreadcrumbSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("breadcrumb.height", self.height)
    }
}

/// Tiles are relative to `tiles_frame`, the band strips to `breadcrumb_frame`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreemapLayout {
    pub tiles: GeometrySnapshot<Rect>,
    pub tiles_frame: Rect,
    pub breadcrumb: Option<GeometrySnapshot<Rect>>,
    pub breadcrumb_frame: Option<Rect>,
}

impl TreemapLayout {
    /// A tile moved into viewport coordinates.
    pub fn absolute(&self, id: &str) -> Option<Rect> {
        self.tiles
            .get(id)
            .map(|r| r.translate(self.tiles_frame.x0, self.tiles_frame.y0))
    }
}

pub fn partition(
    tree: &Tree,
    focus: NodeId,
    max_depth: MaxDepth,
    tiling: &TilingSpec,
    viewport: Viewport,
    breadcrumb: Option<&BreadcrumbSpec>,
) -> TreemapLayout {
    let (tiles_frame, breadcrumb_frame) = frames(viewport, breadcrumb);
    let tiles = tile_subtree(tree, focus, max_depth, tiling, tiles_frame.width(), tiles_frame.height());
    let breadcrumb = breadcrumb
        .zip(breadcrumb_frame)
        .map(|(crumb, frame)| breadcrumb_strips(tree, focus, crumb, frame.width(), frame.height()));

    debug!(
        focus = %tree.node(focus).key,
        tiles = tiles.len(),
        strategy = %tiling.strategy,
        "treemap partitioned"
    );
    TreemapLayout {
        tiles,
        tiles_frame,
        breadcrumb,
        breadcrumb_frame,
    }
}

fn frames(viewport: Viewport, breadcrumb: Option<&BreadcrumbSpec>) -> (Rect, Option<Rect>) {
    let w = viewport.width.max(0.0);
    let h = viewport.height.max(0.0);
    let Some(crumb) = breadcrumb else {
        return (Rect::from_size(w, h), None);
    };
    let band = crumb.height.clamp(0.0, h);
    match crumb.side {
        BreadcrumbSide::Top => (Rect::new(0.0, band, w, h), Some(Rect::new(0.0, 0.0, w, band))),
        BreadcrumbSide::Bottom => (
            Rect::new(0.0, 0.0, w, h - band),
            Some(Rect::new(0.0, h - band, w, h)),
        ),
    }
}

// Tiling happens in canonical orientation; mirroring and the axis swap
// are applied once over the finished set.
fn tile_subtree(
    tree: &Tree,
    focus: NodeId,
    max_depth: MaxDepth,
    tiling: &TilingSpec,
    width: f64,
    height: f64,
) -> GeometrySnapshot<Rect> {
    let swap = tiling.mirror.xy ^ (tiling.strategy == TilingStrategy::DiceSlice);
    let (w, h) = if swap { (height, width) } else { (width, height) };
    let aspect = tiling.aspect_ratio;
    let pad = canonical_padding(&tiling.outer, tiling.mirror, swap, aspect);
    let half = tiling.inner / 2.0;

    let skip_wrapper = tree.is_wrapper(focus);
    let cutoff = if skip_wrapper { max_depth.extended(1) } else { max_depth };

    let mut snapshot = GeometrySnapshot::new(tree.node(focus).key.clone());
    let mut stack = vec![(focus, 0u32, Rect::from_size(w, h / aspect))];
    while let Some((id, depth, slot)) = stack.pop() {
        let node = tree.node(id);
        let p = if depth == 0 { 0.0 } else { half };
        let rect = inset(slot, p, p, p, p);
        if !(skip_wrapper && depth == 0) {
            let shown = if skip_wrapper { depth - 1 } else { depth };
            snapshot.push(node.key.clone(), id, shown, rect);
        }
        if node.is_leaf() || !cutoff.admits(depth + 1) {
            continue;
        }

        let area = inset(
            rect,
            pad.top - half,
            pad.right - half,
            pad.bottom - half,
            pad.left - half,
        );
        let values: Vec<f64> = node.children.iter().map(|c| tree.node(*c).value).collect();
        let rects = tile(tiling.strategy, tiling.squarify_ratio, depth, &values, node.value, area);
        stack.extend(
            node.children
                .iter()
                .zip(rects)
                .rev()
                .map(|(&c, r)| (c, depth + 1, r)),
        );
    }

    let mirror = tiling.mirror;
    let round = tiling.round;
    snapshot.map_geometry(|r| {
        if round {
            *r = Rect::new(r.x0.round(), r.y0.round(), r.x1.round(), r.y1.round());
        }
        r.y0 *= aspect;
        r.y1 *= aspect;
        if swap {
            *r = Rect::new(r.y0, r.x0, r.y1, r.x1);
        }
        if mirror.x {
            *r = Rect::new(width - r.x1, r.y0, width - r.x0, r.y1);
        }
        if mirror.y {
            *r = Rect::new(r.x0, height - r.y1, r.x1, height - r.y0);
        }
    });
    snapshot
}

// Padding as seen from canonical space, so the final mirror lands each
// requested side where it was asked for.
fn canonical_padding(outer: &Padding, mirror: Mirror, swap: bool, aspect: f64) -> Padding {
    let mut p = Padding {
        top: if mirror.y { outer.bottom } else { outer.top },
        right: if mirror.x { outer.left } else { outer.right },
        bottom: if mirror.y { outer.top } else { outer.bottom },
        left: if mirror.x { outer.right } else { outer.left },
    };
    if swap {
        p = Padding {
            top: p.left,
            right: p.bottom,
            bottom: p.right,
            left: p.top,
        };
    }
    p.top /= aspect;
    p.bottom /= aspect;
    p
}

/// Shrinks a rectangle, collapsing an axis to its midpoint instead of
/// letting it invert.
fn inset(r: Rect, top: f64, right: f64, bottom: f64, left: f64) -> Rect {
    let (mut x0, mut x1) = (r.x0 + left, r.x1 - right);
    let (mut y0, mut y1) = (r.y0 + top, r.y1 - bottom);
    if x1 < x0 {
        x0 = (x0 + x1) / 2.0;
        x1 = x0;
    }
    if y1 < y0 {
        y0 = (y0 + y1) / 2.0;
        y1 = y0;
    }
    Rect::new(x0, y0, x1, y1)
}

/// Root-to-focus chain as nested strips: level `k` starts `k` steps of
/// `width / chain_len` in from the leading edge.
fn breadcrumb_strips(
    tree: &Tree,
    focus: NodeId,
    crumb: &BreadcrumbSpec,
    width: f64,
    height: f64,
) -> GeometrySnapshot<Rect> {
    let chain: Vec<NodeId> = tree
        .ancestors(focus)
        .into_iter()
        .rev()
        .filter(|id| !tree.is_wrapper(*id))
        .collect();
    let mut snapshot = GeometrySnapshot::new(tree.node(focus).key.clone());
    if chain.is_empty() {
        return snapshot;
    }
    let step = width / chain.len() as f64;
    for (k, id) in chain.into_iter().enumerate() {
        let lead = k as f64 * step;
        let strip = if crumb.right_to_left {
            Rect::new(0.0, 0.0, width - lead, height)
        } else {
            Rect::new(lead, 0.0, width, height)
        };
        snapshot.push(tree.node(id).key.clone(), id, k as u32, strip);
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AggregateMode};
    use crate::builder::build;
    use crate::geometry::Lerp;
    use crate::model::Record;
    use approx::assert_abs_diff_eq;

    fn tree(rows: &[(&str, &str, f64)]) -> Tree {
        let records: Vec<Record> = rows
            .iter()
            .map(|(id, p, v)| Record::new(*id, *p).with_value(*v))
            .collect();
        aggregate(build(&records, true).unwrap().tree, AggregateMode::Remainder).unwrap()
    }

    fn abc() -> Tree {
        tree(&[("A", "", 0.0), ("B", "A", 3.0), ("C", "A", 7.0)])
    }

    fn tiled(strategy: TilingStrategy, inner: f64) -> TilingSpec {
        TilingSpec {
            inner,
            ..TilingSpec::with_strategy(strategy)
        }
    }

    fn layout(t: &Tree, tiling: &TilingSpec) -> TreemapLayout {
        partition(t, t.root, MaxDepth::Unlimited, tiling, Viewport::new(100.0, 50.0), None)
    }

    #[test]
    fn dice_splits_width_by_value() {
        let t = abc();
        let out = layout(&t, &tiled(TilingStrategy::Dice, 0.0));
        assert_eq!(out.tiles.get("A"), Some(&Rect::from_size(100.0, 50.0)));
        let c = out.tiles.get("C").unwrap();
        let b = out.tiles.get("B").unwrap();
        assert_abs_diff_eq!(c.x1, 70.0, epsilon = 1e-9);
        assert_abs_diff_eq!(b.x0, 70.0, epsilon = 1e-9);
        assert_eq!(b.x1, 100.0);
        assert_eq!(c.height(), 50.0);
    }

    #[test]
    fn inner_padding_splits_between_siblings() {
        let t = abc();
        let out = layout(&t, &tiled(TilingStrategy::Dice, 4.0));
        let c = out.tiles.get("C").unwrap();
        let b = out.tiles.get("B").unwrap();
        // outer edges stay flush, neighbours are a full gap apart
        assert_abs_diff_eq!(c.x0, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(b.x1, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(b.x0 - c.x1, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.y0, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.y1, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn squarify_areas_follow_values() {
        let t = tree(&[
            ("R", "", 0.0),
            ("a", "R", 6.0),
            ("b", "R", 6.0),
            ("c", "R", 4.0),
            ("d", "R", 3.0),
            ("e", "R", 2.0),
            ("f", "R", 2.0),
            ("g", "R", 1.0),
        ]);
        let out = layout(&t, &tiled(TilingStrategy::Squarify, 0.0));
        let total = 100.0 * 50.0;
        let mut sum = 0.0;
        for key in ["a", "b", "c", "d", "e", "f", "g"] {
            let node = t.get(key).unwrap();
            let r = out.tiles.get(key).unwrap();
            assert_abs_diff_eq!(r.area(), total * node.value / 24.0, epsilon = 1e-6);
            assert!(r.x0 >= -1e-9 && r.x1 <= 100.0 + 1e-9);
            sum += r.area();
        }
        assert_abs_diff_eq!(sum, total, epsilon = 1e-6);
    }

    #[test]
    fn depth_cutoff_omits_deep_tiles() {
        let t = tree(&[("A", "", 0.0), ("B", "A", 1.0), ("B1", "B", 1.0)]);
        let out = partition(
            &t,
            t.root,
            MaxDepth::Limited(2),
            &TilingSpec::default(),
            Viewport::default(),
            None,
        );
        assert!(out.tiles.contains("B"));
        assert!(!out.tiles.contains("B1"));
    }

    #[test]
    fn mirror_x_is_applied_after_tiling() {
        let t = abc();
        let tiling = TilingSpec {
            mirror: Mirror {
                x: true,
                ..Mirror::default()
            },
            ..tiled(TilingStrategy::Dice, 0.0)
        };
        let out = layout(&t, &tiling);
        let c = out.tiles.get("C").unwrap();
        assert_abs_diff_eq!(c.x0, 30.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.x1, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out.tiles.get("B").unwrap().x0, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn mirrored_padding_keeps_requested_side() {
        let t = abc();
        let tiling = TilingSpec {
            outer: Padding {
                left: 10.0,
                ..Padding::default()
            },
            mirror: Mirror {
                x: true,
                ..Mirror::default()
            },
            ..tiled(TilingStrategy::Dice, 0.0)
        };
        let out = layout(&t, &tiling);
        let min_x = ["B", "C"]
            .iter()
            .map(|k| out.tiles.get(k).unwrap().x0)
            .fold(f64::INFINITY, f64::min);
        assert_abs_diff_eq!(min_x, 10.0, epsilon = 1e-9);
    }

    fn assert_rect(actual: &Rect, expected: Rect) {
        for ((_, a), (_, e)) in actual.fields().into_iter().zip(expected.fields()) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn mirror_y_flips_rows_and_keeps_top_padding() {
        let t = abc();
        let tiling = TilingSpec {
            outer: Padding {
                top: 10.0,
                ..Padding::default()
            },
            mirror: Mirror {
                y: true,
                ..Mirror::default()
            },
            ..tiled(TilingStrategy::Slice, 0.0)
        };
        let out = layout(&t, &tiling);
        assert_rect(out.tiles.get("C").unwrap(), Rect::new(0.0, 22.0, 100.0, 50.0));
        assert_rect(out.tiles.get("B").unwrap(), Rect::new(0.0, 10.0, 100.0, 22.0));
    }

    #[test]
    fn mirror_xy_turns_dice_into_rows() {
        let t = abc();
        let tiling = TilingSpec {
            outer: Padding {
                left: 5.0,
                ..Padding::default()
            },
            mirror: Mirror {
                xy: true,
                ..Mirror::default()
            },
            ..tiled(TilingStrategy::Dice, 0.0)
        };
        let out = layout(&t, &tiling);
        assert_eq!(out.tiles.get("A"), Some(&Rect::from_size(100.0, 50.0)));
        assert_rect(out.tiles.get("C").unwrap(), Rect::new(5.0, 0.0, 100.0, 35.0));
        assert_rect(out.tiles.get("B").unwrap(), Rect::new(5.0, 35.0, 100.0, 50.0));
    }

    #[test]
    fn every_mirror_keeps_padding_on_its_side() {
        let t = abc();
        let tiling = TilingSpec {
            outer: Padding {
                top: 10.0,
                left: 5.0,
                ..Padding::default()
            },
            mirror: Mirror {
                x: true,
                y: true,
                xy: true,
            },
            ..tiled(TilingStrategy::Dice, 0.0)
        };
        let out = layout(&t, &tiling);
        assert_rect(out.tiles.get("C").unwrap(), Rect::new(5.0, 22.0, 100.0, 50.0));
        assert_rect(out.tiles.get("B").unwrap(), Rect::new(5.0, 10.0, 100.0, 22.0));
    }

    #[test]
    fn dice_slice_starts_with_horizontal_bands() {
        let t = abc();
        let out = layout(&t, &tiled(TilingStrategy::DiceSlice, 0.0));
        let c = out.tiles.get("C").unwrap();
        assert_abs_diff_eq!(c.y0, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.y1, 35.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.width(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn aspect_ratio_preserves_the_frame() {
        let t = abc();
        let tiling = TilingSpec {
            aspect_ratio: 2.0,
            outer: Padding {
                top: 10.0,
                ..Padding::default()
            },
            ..tiled(TilingStrategy::Slice, 0.0)
        };
        let out = layout(&t, &tiling);
        assert_eq!(out.tiles.get("A").unwrap().y1, 50.0);
        assert_abs_diff_eq!(out.tiles.get("C").unwrap().y0, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn oversized_padding_collapses_to_midpoint() {
        let t = abc();
        let tiling = TilingSpec {
            outer: Padding::uniform(80.0),
            ..tiled(TilingStrategy::Squarify, 0.0)
        };
        let out = layout(&t, &tiling);
        for e in out.tiles.iter() {
            assert!(e.geometry.is_finite());
            assert!(e.geometry.width() >= 0.0 && e.geometry.height() >= 0.0);
        }
        assert_abs_diff_eq!(out.tiles.get("C").unwrap().x0, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn rounding_snaps_to_integers() {
        let t = tree(&[("A", "", 0.0), ("B", "A", 1.0), ("C", "A", 2.0)]);
        let tiling = TilingSpec {
            round: true,
            ..tiled(TilingStrategy::Dice, 0.0)
        };
        let out = layout(&t, &tiling);
        for e in out.tiles.iter() {
            for (_, v) in e.geometry.fields() {
                assert_eq!(v, v.round());
            }
        }
    }

    #[test]
    fn wrapper_is_not_drawn() {
        let t = tree(&[("A", "", 1.0), ("B", "", 1.0)]);
        let out = layout(&t, &tiled(TilingStrategy::Dice, 0.0));
        assert_eq!(out.tiles.len(), 2);
        assert_eq!(out.tiles.entry("A").unwrap().depth, 0);
        assert_abs_diff_eq!(out.tiles.get("A").unwrap().x1, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn breadcrumb_band_nests_the_path() {
        let t = tree(&[("R", "", 0.0), ("B", "R", 1.0), ("B1", "B", 1.0), ("C", "R", 1.0)]);
        let band = BreadcrumbSpec::default();
        let b1 = t.find("B1").unwrap();
        let out = partition(
            &t,
            b1,
            MaxDepth::Unlimited,
            &TilingSpec::default(),
            Viewport::new(90.0, 100.0),
            Some(&band),
        );
        assert_eq!(out.tiles_frame, Rect::new(0.0, 20.0, 90.0, 100.0));
        assert_eq!(out.breadcrumb_frame, Some(Rect::new(0.0, 0.0, 90.0, 20.0)));
        assert_eq!(out.tiles.get("B1"), Some(&Rect::from_size(90.0, 80.0)));
        assert_eq!(out.absolute("B1"), Some(Rect::new(0.0, 20.0, 90.0, 100.0)));

        let strips = out.breadcrumb.unwrap();
        let ids: Vec<&str> = strips.ids().collect();
        assert_eq!(ids, ["R", "B", "B1"]);
        assert_abs_diff_eq!(strips.get("B").unwrap().x0, 30.0, epsilon = 1e-9);
        assert_abs_diff_eq!(strips.get("B1").unwrap().x0, 60.0, epsilon = 1e-9);
        assert_eq!(strips.get("R").unwrap().x1, 90.0);
    }

    #[test]
    fn breadcrumb_bottom_right_to_left() {
        let t = tree(&[("R", "", 0.0), ("B", "R", 1.0)]);
        let band = BreadcrumbSpec {
            side: BreadcrumbSide::Bottom,
            height: 10.0,
            right_to_left: true,
        };
        let b = t.find("B").unwrap();
        let out = partition(
            &t,
            b,
            MaxDepth::Unlimited,
            &TilingSpec::default(),
            Viewport::new(100.0, 60.0),
            Some(&band),
        );
        assert_eq!(out.tiles_frame, Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(out.breadcrumb_frame, Some(Rect::new(0.0, 50.0, 100.0, 60.0)));
        let strips = out.breadcrumb.unwrap();
        assert_eq!(strips.get("B"), Some(&Rect::new(0.0, 0.0, 50.0, 10.0)));
    }

    #[test]
    fn breadcrumb_band_parses_with_defaults() {
        let crumb: BreadcrumbSpec = serde_json::from_str(r#"{"side":"bottom"}"#).unwrap();
        assert_eq!(crumb.side, BreadcrumbSide::Bottom);
        assert_eq!(crumb.height, 20.0);
        assert!(serde_json::from_str::<BreadcrumbSpec>(r#"{"side":"left"}"#).is_err());
    }
}
