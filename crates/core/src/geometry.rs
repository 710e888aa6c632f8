use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;

use tracing::warn;

use crate::model::{NodeId, Tree};

pub const TAU: f64 = 2.0 * PI;

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Field-wise linear interpolation between two geometry entries.
pub trait Lerp: Copy {
    fn lerp(from: &Self, to: &Self, t: f64) -> Self;

    /// Named scalar fields, in a fixed order, for export and checks.
    fn fields(&self) -> [(&'static str, f64); 4];

    fn is_finite(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_finite())
    }
}

/// Annular sector. Angles in radians, radii as a fraction of the
/// available radius.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sector {
    pub angle_start: f64,
    pub angle_end: f64,
    pub radius_inner: f64,
    pub radius_outer: f64,
}

impl Sector {
    pub fn span(&self) -> f64 {
        self.angle_end - self.angle_start
    }

    pub fn mid_angle(&self) -> f64 {
        (self.angle_start + self.angle_end) / 2.0
    }

    pub fn is_full_circle(&self) -> bool {
        self.span().abs() >= TAU - 1e-9
    }

    /// Radius of the largest circle fitting inside the sector, as a
    /// fraction of the outer radius. Used for fitting text.
    pub fn inscribed_radius_fraction(&self) -> f64 {
        let span = self.span().abs();
        if span < 1e-12 {
            return 0.0;
        }
        if self.is_full_circle() {
            return if self.radius_inner == 0.0 { 1.0 } else { self.ring_fraction(PI) };
        }
        self.ring_fraction(span % TAU)
    }

    fn ring_fraction(&self, delta: f64) -> f64 {
        let half_angle = 0.5 * delta.min(PI);
        let ring = if self.radius_outer > 0.0 {
            1.0 - self.radius_inner / self.radius_outer
        } else {
            0.0
        };
        (1.0 / (1.0 + 1.0 / half_angle.sin())).min(ring / 2.0).max(0.0)
    }
}

impl Lerp for Sector {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Sector {
            angle_start: lerp(a.angle_start, b.angle_start, t),
            angle_end: lerp(a.angle_end, b.angle_end, t),
            radius_inner: lerp(a.radius_inner, b.radius_inner, t),
            radius_outer: lerp(a.radius_outer, b.radius_outer, t),
        }
    }

    fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("angle_start", self.angle_start),
            ("angle_end", self.angle_end),
            ("radius_inner", self.radius_inner),
            ("radius_outer", self.radius_outer),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x0: 0.0,
        x1: 0.0,
        y0: 0.0,
        y1: 0.0,
    };

    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, x1, y0, y1 }
    }

    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }
}

impl Lerp for Rect {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Rect {
            x0: lerp(a.x0, b.x0, t),
            x1: lerp(a.x1, b.x1, t),
            y0: lerp(a.y0, b.y0, t),
            y1: lerp(a.y1, b.y1, t),
        }
    }

    fn fields(&self) -> [(&'static str, f64); 4] {
        [("x0", self.x0), ("x1", self.x1), ("y0", self.y0), ("y1", self.y1)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Pixel radius a sunburst fraction of 1 maps to.
    pub fn radius(&self) -> f64 {
        0.5 * self.width.min(self.height).max(0.0)
    }
}

/// Number of levels drawn below (and including) the focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MaxDepth {
    Limited(u32),
    #[default]
    Unlimited,
}

impl From<i64> for MaxDepth {
    fn from(v: i64) -> Self {
        if v <= 0 {
            MaxDepth::Unlimited
        } else {
            MaxDepth::Limited(u32::try_from(v).unwrap_or(u32::MAX))
        }
    }
}

impl From<MaxDepth> for i64 {
    fn from(d: MaxDepth) -> Self {
        match d {
            MaxDepth::Limited(n) => i64::from(n),
            MaxDepth::Unlimited => -1,
        }
    }
}

impl MaxDepth {
    /// Whether a node `relative_depth` levels below the focus is drawn.
    pub fn admits(self, relative_depth: u32) -> bool {
        match self {
            MaxDepth::Limited(n) => relative_depth < n,
            MaxDepth::Unlimited => true,
        }
    }

    pub fn extended(self, by: u32) -> Self {
        match self {
            MaxDepth::Limited(n) => MaxDepth::Limited(n.saturating_add(by)),
            MaxDepth::Unlimited => MaxDepth::Unlimited,
        }
    }

    pub fn min_with(self, levels: u32) -> u32 {
        match self {
            MaxDepth::Limited(n) => n.min(levels),
            MaxDepth::Unlimited => levels,
        }
    }
}

/// Requested zoom level. Re-validated against the tree on every pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusState {
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub max_depth: MaxDepth,
}

impl FocusState {
    pub fn new(focus: Option<&str>, max_depth: MaxDepth) -> Self {
        Self {
            focus: focus.map(str::to_string),
            max_depth,
        }
    }

    /// The requested focus if it still exists, else `previous`, else the root.
    pub fn resolve(&self, tree: &Tree, previous: Option<&str>) -> NodeId {
        let Some(want) = self.focus.as_deref().filter(|f| !f.is_empty()) else {
            return tree.root;
        };
        if let Some(id) = tree.find(want) {
            return id;
        }
        let fallback = previous.and_then(|p| tree.find(p)).unwrap_or(tree.root);
        warn!(focus = want, fallback = %tree.node(fallback).key, "focus not found in hierarchy");
        fallback
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry<G> {
    pub id: String,
    pub node: NodeId,
    /// Depth below the focus.
    pub depth: u32,
    pub geometry: G,
}

/// Layout state at one instant: entries in tree order, keyed by node id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometrySnapshot<G> {
    pub focus: String,
    entries: Vec<SnapshotEntry<G>>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl<G> GeometrySnapshot<G> {
    pub fn new(focus: impl Into<String>) -> Self {
        Self {
            focus: focus.into(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn push(&mut self, id: impl Into<String>, node: NodeId, depth: u32, geometry: G) {
        let id = id.into();
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(SnapshotEntry {
            id,
            node,
            depth,
            geometry,
        });
    }

    pub fn get(&self, id: &str) -> Option<&G> {
        self.entry(id).map(|e| &e.geometry)
    }

    pub fn entry(&self, id: &str) -> Option<&SnapshotEntry<G>> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry<G>> {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn map_geometry(&mut self, mut f: impl FnMut(&mut G)) {
        for e in &mut self.entries {
            f(&mut e.geometry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn full_disc_inscribes_fully() {
        let s = Sector {
            angle_start: 0.0,
            angle_end: TAU,
            radius_inner: 0.0,
            radius_outer: 0.5,
        };
        assert_eq!(s.inscribed_radius_fraction(), 1.0);
    }

    #[test]
    fn ring_sector_is_limited_by_thickness() {
        let s = Sector {
            angle_start: 0.0,
            angle_end: PI,
            radius_inner: 0.5,
            radius_outer: 1.0,
        };
        // half angle pi/2 gives 1/2, ring thickness 1/2 gives 1/4
        assert_abs_diff_eq!(s.inscribed_radius_fraction(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn narrow_sector_is_limited_by_angle() {
        let s = Sector {
            angle_start: 0.0,
            angle_end: 0.2,
            radius_inner: 0.0,
            radius_outer: 1.0,
        };
        let half: f64 = 0.1;
        assert_abs_diff_eq!(
            s.inscribed_radius_fraction(),
            1.0 / (1.0 + 1.0 / half.sin()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn full_ring_with_hole_uses_half_pi() {
        let s = Sector {
            angle_start: 0.0,
            angle_end: TAU,
            radius_inner: 0.9,
            radius_outer: 1.0,
        };
        assert_abs_diff_eq!(s.inscribed_radius_fraction(), 0.05, epsilon = 1e-9);
    }

    #[test]
    fn zero_width_sector_fits_nothing() {
        for radius_inner in [0.0, 0.5] {
            let s = Sector {
                angle_start: 1.0,
                angle_end: 1.0,
                radius_inner,
                radius_outer: 1.0,
            };
            assert_eq!(s.inscribed_radius_fraction(), 0.0);
        }
    }

    #[test]
    fn mid_angle_and_viewport_radius() {
        let s = Sector {
            angle_start: 1.0,
            angle_end: 2.0,
            radius_inner: 0.0,
            radius_outer: 1.0,
        };
        assert_eq!(s.mid_angle(), 1.5);
        assert_eq!(Viewport::new(800.0, 600.0).radius(), 300.0);
        assert_eq!(Viewport::new(100.0, 400.0).radius(), 50.0);
        assert_eq!(Viewport::new(-5.0, 10.0).radius(), 0.0);
    }

    #[test]
    fn max_depth_parsing() {
        assert_eq!(MaxDepth::from(-1), MaxDepth::Unlimited);
        assert_eq!(MaxDepth::from(0), MaxDepth::Unlimited);
        assert_eq!(MaxDepth::from(3), MaxDepth::Limited(3));
        assert!(MaxDepth::Limited(2).admits(1));
        assert!(!MaxDepth::Limited(2).admits(2));
        assert_eq!(MaxDepth::Limited(2).extended(1), MaxDepth::Limited(3));
        let parsed: MaxDepth = serde_json::from_str("-1").unwrap();
        assert_eq!(parsed, MaxDepth::Unlimited);
    }

    #[test]
    fn rect_lerp_endpoints() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 7.0, 9.0);
        assert_eq!(Rect::lerp(&a, &b, 0.0), a);
        assert_eq!(Rect::lerp(&a, &b, 1.0), b);
        assert_eq!(Rect::lerp(&a, &b, 0.5), Rect::new(2.5, 2.5, 8.5, 9.5));
    }
}
