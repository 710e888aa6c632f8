//! One full layout pass per chart: build, aggregate, color, partition.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::{aggregate, AggregateMode};
use crate::builder::TreeBuilder;
use crate::color::{resolve_colors, ColorMemo, NodeColors};
use crate::config::{ChartConfig, ChartKind};
use crate::error::{Diagnostic, LayoutError};
use crate::geometry::{Rect, Sector};
use crate::model::{Record, Tree};
use crate::sunburst::{self, SunburstLayout};
use crate::transition::{radial_transition, treemap_transition, Transition, TreemapTransition};
use crate::treemap::{self, TreemapLayout};

#[derive(Debug, Clone)]
pub struct TraceInput {
    pub records: Vec<Record>,
    pub config: ChartConfig,
}

/// An aggregated hierarchy, ready for coloring and partitioning.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub tree: Tree,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartLayout {
    Sunburst(SunburstLayout),
    Treemap(TreemapLayout),
}

impl ChartLayout {
    pub fn focus(&self) -> &str {
        match self {
            ChartLayout::Sunburst(l) => &l.snapshot.focus,
            ChartLayout::Treemap(l) => &l.tiles.focus,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChartLayout::Sunburst(l) => l.snapshot.len(),
            ChartLayout::Treemap(l) => l.tiles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartTransition {
    Sunburst(Transition<Sector>),
    Treemap(TreemapTransition),
}

#[derive(Debug, Clone)]
pub struct Chart {
    pub tree: Tree,
    pub colors: NodeColors,
    pub diagnostics: Vec<Diagnostic>,
    pub layout: ChartLayout,
}

impl Chart {
    /// Lays the same tree out again, e.g. after a focus change, keeping
    /// the current focus as fallback for an unknown one.
    pub fn relayout(&self, config: &ChartConfig) -> ChartLayout {
        partition(&self.tree, config, Some(self.layout.focus()))
    }

    pub fn transition_to(&self, next: &ChartLayout) -> ChartTransition {
        transition(Some(&self.layout), next, &self.tree)
    }
}

/// Builds and aggregates. Values are in use as soon as one record has one;
/// records lacking a value are then dropped with a diagnostic.
pub fn prepare(records: &[Record], config: &ChartConfig) -> Result<Prepared, LayoutError> {
    build_and_aggregate(records, config).map_err(|e| {
        warn!(error = %e, "chart skipped");
        e
    })
}

fn build_and_aggregate(records: &[Record], config: &ChartConfig) -> Result<Prepared, LayoutError> {
    let has_values = records.iter().any(|r| r.value.is_some());
    let built = TreeBuilder::new().with_values(has_values).build(records)?;
    let mode = AggregateMode::from_config(has_values, config.branch_values, config.count_branches);
    let tree = aggregate(built.tree, mode)?;
    Ok(Prepared {
        tree,
        diagnostics: built.diagnostics,
    })
}

pub fn partition(tree: &Tree, config: &ChartConfig, previous_focus: Option<&str>) -> ChartLayout {
    let focus = config.focus_state().resolve(tree, previous_focus);
    match config.kind {
        ChartKind::Sunburst => ChartLayout::Sunburst(sunburst::partition(tree, focus, config.max_depth)),
        ChartKind::Treemap => ChartLayout::Treemap(treemap::partition(
            tree,
            focus,
            config.max_depth,
            &config.tiling,
            config.viewport,
            config.breadcrumb.as_ref(),
        )),
    }
}

/// Tweens from `prev` to `next`. A previous layout of another chart kind
/// counts as no previous layout.
pub fn transition(prev: Option<&ChartLayout>, next: &ChartLayout, tree: &Tree) -> ChartTransition {
    match next {
        ChartLayout::Sunburst(n) => {
            let p = match prev {
                Some(ChartLayout::Sunburst(p)) => Some(&p.snapshot),
                _ => None,
            };
            ChartTransition::Sunburst(radial_transition(p, &n.snapshot, tree))
        }
        ChartLayout::Treemap(n) => {
            let p = match prev {
                Some(ChartLayout::Treemap(p)) => Some(p),
                _ => None,
            };
            ChartTransition::Treemap(treemap_transition(p, n, tree))
        }
    }
}

pub fn layout(records: &[Record], config: &ChartConfig, memo: &mut ColorMemo) -> Result<Chart, LayoutError> {
    let prepared = prepare(records, config)?;
    let colors = resolve_colors(&prepared.tree, &config.colors, &config.palette, memo);
    let layout = partition(&prepared.tree, config, None);
    debug!(kind = %config.kind, entries = layout.len(), focus = layout.focus(), "chart laid out");
    Ok(Chart {
        tree: prepared.tree,
        colors,
        diagnostics: prepared.diagnostics,
        layout,
    })
}

/// Lays out independent charts side by side. Building and partitioning run
/// in parallel; colors are resolved in input order so the shared memo has
/// one writer and default colors do not depend on scheduling.
pub fn layout_traces(inputs: &[TraceInput], memo: &mut ColorMemo) -> Vec<Result<Chart, LayoutError>> {
    let prepared: Vec<Result<Prepared, LayoutError>> = inputs
        .par_iter()
        .map(|input| prepare(&input.records, &input.config))
        .collect();

    let colored: Vec<Result<(Prepared, NodeColors), LayoutError>> = prepared
        .into_iter()
        .zip(inputs)
        .map(|(result, input)| {
            result.map(|p| {
                let colors = resolve_colors(&p.tree, &input.config.colors, &input.config.palette, memo);
                (p, colors)
            })
        })
        .collect();

    colored
        .into_par_iter()
        .zip(inputs.par_iter())
        .map(|(result, input)| {
            result.map(|(p, colors)| {
                let layout = partition(&p.tree, &input.config, None);
                Chart {
                    tree: p.tree,
                    colors,
                    diagnostics: p.diagnostics,
                    layout,
                }
            })
        })
        .collect()
}

/// Where a tile sits in the full viewport, for treemap charts.
pub fn absolute_tile(layout: &ChartLayout, id: &str) -> Option<Rect> {
    match layout {
        ChartLayout::Treemap(t) => t.absolute(id),
        ChartLayout::Sunburst(_) => None,
    }
}
