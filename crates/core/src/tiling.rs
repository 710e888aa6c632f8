//! Rectangle tiling strategies and their configuration.
//!
//! Each kernel lays out a parent's children inside `rect`, giving child
//! `i` an area proportional to `values[i] / total`. `total` is the
//! parent's own weight, which may exceed the children's sum (remainder
//! values); the unclaimed share stays empty.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::geometry::Rect;

pub const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TilingStrategy {
    #[default]
    Squarify,
    Binary,
    /// Horizontal bands stacked top to bottom.
    Slice,
    /// Vertical bands left to right.
    Dice,
    /// Dice at even depths, slice at odd ones.
    SliceDice,
    /// Slice-dice with the axes swapped.
    DiceSlice,
}

impl FromStr for TilingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "squarify" => Ok(Self::Squarify),
            "binary" => Ok(Self::Binary),
            "slice" => Ok(Self::Slice),
            "dice" => Ok(Self::Dice),
            "slice-dice" => Ok(Self::SliceDice),
            "dice-slice" => Ok(Self::DiceSlice),
            _ => Err(ConfigError::UnknownTiling(s.to_string())),
        }
    }
}

impl fmt::Display for TilingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Squarify => "squarify",
            Self::Binary => "binary",
            Self::Slice => "slice",
            Self::Dice => "dice",
            Self::SliceDice => "slice-dice",
            Self::DiceSlice => "dice-slice",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Padding {
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub left: f64,
}

impl Padding {
    pub fn uniform(p: f64) -> Self {
        Self {
            top: p,
            right: p,
            bottom: p,
            left: p,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mirror {
    #[serde(default)]
    pub x: bool,
    #[serde(default)]
    pub y: bool,
    #[serde(default)]
    pub xy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTilingSpec")]
pub struct TilingSpec {
    pub strategy: TilingStrategy,
    pub squarify_ratio: f64,
    /// Gap between siblings.
    pub inner: f64,
    /// Padding inside every branch, per side.
    pub outer: Padding,
    pub aspect_ratio: f64,
    pub mirror: Mirror,
    pub round: bool,
}

impl Default for TilingSpec {
    fn default() -> Self {
        Self {
            strategy: TilingStrategy::Squarify,
            squarify_ratio: GOLDEN_RATIO,
            inner: 3.0,
            outer: Padding::default(),
            aspect_ratio: 1.0,
            mirror: Mirror::default(),
            round: false,
        }
    }
}

impl TilingSpec {
    pub fn with_strategy(strategy: TilingStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("tiling.inner", self.inner)?;
        non_negative("tiling.outer.top", self.outer.top)?;
        non_negative("tiling.outer.right", self.outer.right)?;
        non_negative("tiling.outer.bottom", self.outer.bottom)?;
        non_negative("tiling.outer.left", self.outer.left)?;
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "tiling.aspect_ratio",
                expected: "a positive number",
                got: self.aspect_ratio,
            });
        }
        if !(self.squarify_ratio.is_finite() && self.squarify_ratio >= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "tiling.squarify_ratio",
                expected: "at least 1",
                got: self.squarify_ratio,
            });
        }
        Ok(())
    }
}

pub(crate) fn non_negative(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "a non-negative number",
            got: v,
        })
    }
}

#[derive(Deserialize)]
struct RawTilingSpec {
    #[serde(default, alias = "packing")]
    strategy: TilingStrategy,
    #[serde(default = "golden")]
    squarify_ratio: f64,
    #[serde(default = "default_inner", alias = "pad")]
    inner: f64,
    #[serde(default)]
    outer: Padding,
    #[serde(default = "one")]
    aspect_ratio: f64,
    #[serde(default)]
    mirror: Mirror,
    #[serde(default)]
    round: bool,
}

fn golden() -> f64 {
    GOLDEN_RATIO
}

fn default_inner() -> f64 {
    3.0
}

fn one() -> f64 {
    1.0
}

impl TryFrom<RawTilingSpec> for TilingSpec {
    type Error = ConfigError;

    fn try_from(raw: RawTilingSpec) -> Result<Self, Self::Error> {
        let tiling = TilingSpec {
            strategy: raw.strategy,
            squarify_ratio: raw.squarify_ratio,
            inner: raw.inner,
            outer: raw.outer,
            aspect_ratio: raw.aspect_ratio,
            mirror: raw.mirror,
            round: raw.round,
        };
        tiling.validate()?;
        Ok(tiling)
    }
}

/// Lays out one level. `depth` is relative to the focus and only
/// matters for the alternating strategies.
pub(crate) fn tile(strategy: TilingStrategy, ratio: f64, depth: u32, values: &[f64], total: f64, rect: Rect) -> Vec<Rect> {
    let mut out = vec![Rect::ZERO; values.len()];
    if values.is_empty() {
        return out;
    }
    match strategy {
        TilingStrategy::Squarify => squarify(ratio, values, total, rect, &mut out),
        TilingStrategy::Binary => binary(values, total, rect, &mut out),
        TilingStrategy::Slice => slice(values, total, rect, &mut out),
        TilingStrategy::Dice => dice(values, total, rect, &mut out),
        TilingStrategy::SliceDice | TilingStrategy::DiceSlice => {
            if depth % 2 == 1 {
                slice(values, total, rect, &mut out)
            } else {
                dice(values, total, rect, &mut out)
            }
        }
    }
    out
}

pub(crate) fn dice(values: &[f64], total: f64, rect: Rect, out: &mut [Rect]) {
    let k = if total > 0.0 { rect.width() / total } else { 0.0 };
    let mut x = rect.x0;
    for (v, r) in values.iter().zip(out.iter_mut()) {
        let x1 = x + v * k;
        *r = Rect::new(x, rect.y0, x1, rect.y1);
        x = x1;
    }
}

pub(crate) fn slice(values: &[f64], total: f64, rect: Rect, out: &mut [Rect]) {
    let k = if total > 0.0 { rect.height() / total } else { 0.0 };
    let mut y = rect.y0;
    for (v, r) in values.iter().zip(out.iter_mut()) {
        let y1 = y + v * k;
        *r = Rect::new(rect.x0, y, rect.x1, y1);
        y = y1;
    }
}

/// Squarified rows: keep adding the next child to the current row while
/// the worst aspect ratio in the row does not get worse.
fn squarify(ratio: f64, values: &[f64], total: f64, rect: Rect, out: &mut [Rect]) {
    let n = values.len();
    let (mut x0, mut y0, x1, y1) = (rect.x0, rect.y0, rect.x1, rect.y1);
    let mut remaining = total;
    let mut i0 = 0;
    let mut i1 = 0;

    while i0 < n {
        let dx = x1 - x0;
        let dy = y1 - y0;

        // skip leading zero-weight children into this row
        let mut sum;
        loop {
            sum = values[i1];
            i1 += 1;
            if sum != 0.0 || i1 >= n {
                break;
            }
        }
        let mut min_v = sum;
        let mut max_v = sum;
        let alpha = (dy / dx).max(dx / dy) / (remaining * ratio);
        let mut beta = sum * sum * alpha;
        let mut min_ratio = (max_v / beta).max(beta / min_v);

        while i1 < n {
            let v = values[i1];
            sum += v;
            min_v = min_v.min(v);
            max_v = max_v.max(v);
            beta = sum * sum * alpha;
            let new_ratio = (max_v / beta).max(beta / min_v);
            if new_ratio > min_ratio {
                sum -= v;
                break;
            }
            min_ratio = new_ratio;
            i1 += 1;
        }

        let row = &values[i0..i1];
        if dx < dy {
            let y_end = if remaining != 0.0 { y0 + dy * sum / remaining } else { y1 };
            dice(row, sum, Rect::new(x0, y0, x1, y_end), &mut out[i0..i1]);
            y0 = y_end;
        } else {
            let x_end = if remaining != 0.0 { x0 + dx * sum / remaining } else { x1 };
            slice(row, sum, Rect::new(x0, y0, x_end, y1), &mut out[i0..i1]);
            x0 = x_end;
        }
        remaining -= sum;
        i0 = i1;
    }
}

/// Recursive halving by weight along the longer side.
fn binary(values: &[f64], total: f64, rect: Rect, out: &mut [Rect]) {
    let mut sums = Vec::with_capacity(values.len() + 1);
    let mut acc = 0.0;
    sums.push(acc);
    for v in values {
        acc += v;
        sums.push(acc);
    }
    split(&sums, 0, values.len(), total, rect, out);
}

fn split(sums: &[f64], i: usize, j: usize, value: f64, rect: Rect, out: &mut [Rect]) {
    if i + 1 >= j {
        out[i] = rect;
        return;
    }

    let offset = sums[i];
    let target = value / 2.0 + offset;
    let mut k = i + 1;
    let mut hi = j - 1;
    while k < hi {
        let mid = (k + hi) / 2;
        if sums[mid] < target {
            k = mid + 1;
        } else {
            hi = mid;
        }
    }
    if target - sums[k - 1] < sums[k] - target && i + 1 < k {
        k -= 1;
    }

    let left = sums[k] - offset;
    let right = value - left;
    if rect.width() > rect.height() {
        let xk = if value != 0.0 { (rect.x0 * right + rect.x1 * left) / value } else { rect.x1 };
        split(sums, i, k, left, Rect::new(rect.x0, rect.y0, xk, rect.y1), out);
        split(sums, k, j, right, Rect::new(xk, rect.y0, rect.x1, rect.y1), out);
    } else {
        let yk = if value != 0.0 { (rect.y0 * right + rect.y1 * left) / value } else { rect.y1 };
        split(sums, i, k, left, Rect::new(rect.x0, rect.y0, rect.x1, yk), out);
        split(sums, k, j, right, Rect::new(rect.x0, yk, rect.x1, rect.y1), out);
    }
}
