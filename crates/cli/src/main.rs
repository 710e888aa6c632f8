use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use sunmap_core::chart::{self, ChartLayout, ChartTransition};
use sunmap_core::color::ColorMemo;
use sunmap_core::geometry::{MaxDepth, Viewport};
use sunmap_core::tiling::TilingStrategy;
use sunmap_core::{export, ChartConfig, ChartKind, Columns, Record};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sunmap-cli", about = "Sunburst and treemap layout generator")]
struct Args {
    /// Records as JSON (array of records or parallel columns) or CSV
    input: PathBuf,
    /// JSON chart configuration; the flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    kind: Option<ChartKind>,
    /// Node to center the chart on
    #[arg(long)]
    focus: Option<String>,
    /// Levels to draw below the focus; zero or negative for all
    #[arg(long, allow_hyphen_values = true)]
    max_depth: Option<i64>,
    #[arg(long)]
    tiling: Option<TilingStrategy>,
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    height: Option<f64>,
    /// Output JSON layout path
    #[arg(short, long)]
    json: Option<PathBuf>,
    /// Output CSV layout path
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Also sample a zoom transition starting from this focus
    #[arg(long)]
    from_focus: Option<String>,
    #[arg(long, default_value_t = 10)]
    frames: usize,
    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonInput {
    Records(Vec<Record>),
    Columns(Columns),
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    config.validate().context("invalid chart configuration")?;
    let records = read_records(&args.input)?;
    debug!(records = records.len(), kind = %config.kind, "input loaded");

    let mut memo = ColorMemo::new();
    let chart = chart::layout(&records, &config, &mut memo)
        .with_context(|| format!("cannot lay out {}", args.input.display()))?;

    let frames = match &args.from_focus {
        Some(from) => {
            let start = ChartConfig {
                focus: Some(from.clone()),
                ..config.clone()
            };
            let prev = chart::partition(&chart.tree, &start, None);
            let tr = chart::transition(Some(&prev), &chart.layout, &chart.tree);
            info!(from = prev.focus(), to = chart.layout.focus(), frames = args.frames, "sampling transition");
            Some(match tr {
                ChartTransition::Sunburst(t) => serde_json::to_value(t.sample(args.frames))?,
                ChartTransition::Treemap(t) => serde_json::to_value(t.tiles.sample(args.frames))?,
            })
        }
        None => None,
    };

    if let Some(path) = &args.json {
        let mut json = match &chart.layout {
            ChartLayout::Sunburst(l) => {
                let mut v = export::to_json(&l.snapshot, &chart.tree, &chart.colors);
                v["rings"] = serde_json::json!(l.rings);
                v
            }
            ChartLayout::Treemap(l) => {
                let mut v = export::to_json(&l.tiles, &chart.tree, &chart.colors);
                v["frame"] = serde_json::to_value(l.tiles_frame)?;
                if let (Some(band), Some(frame)) = (&l.breadcrumb, l.breadcrumb_frame) {
                    v["breadcrumb"] = export::to_json(band, &chart.tree, &chart.colors);
                    v["breadcrumb"]["frame"] = serde_json::to_value(frame)?;
                }
                v
            }
        };
        json["kind"] = serde_json::json!(config.kind);
        json["diagnostics"] = chart.diagnostics.iter().map(|d| d.to_string()).collect();
        if let Some(frames) = frames {
            json["frames"] = frames;
        }
        std::fs::write(path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("cannot write {}", path.display()))?;
    }

    if let Some(path) = &args.csv {
        let file = std::fs::File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
        match &chart.layout {
            ChartLayout::Sunburst(l) => export::to_csv(&l.snapshot, &chart.tree, &chart.colors, file)?,
            ChartLayout::Treemap(l) => export::to_csv(&l.tiles, &chart.tree, &chart.colors, file)?,
        }
    }

    println!(
        "{} of {} nodes, focus `{}`: {} visible, {} records skipped",
        config.kind,
        chart.tree.len(),
        chart.layout.focus(),
        chart.layout.len(),
        chart.diagnostics.len()
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<ChartConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("cannot parse {}", path.display()))?
        }
        None => ChartConfig::default(),
    };
    if let Some(kind) = args.kind {
        config.kind = kind;
    }
    if let Some(focus) = &args.focus {
        config.focus = Some(focus.clone());
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = MaxDepth::from(depth);
    }
    if let Some(strategy) = args.tiling {
        config.tiling.strategy = strategy;
    }
    if args.width.is_some() || args.height.is_some() {
        config.viewport = Viewport::new(
            args.width.unwrap_or(config.viewport.width),
            args.height.unwrap_or(config.viewport.height),
        );
    }
    Ok(config)
}

fn read_records(path: &Path) -> Result<Vec<Record>> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        let mut reader = csv::Reader::from_path(path).with_context(|| format!("cannot open {}", path.display()))?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<Record>, _>>()
            .with_context(|| format!("cannot parse {}", path.display()))?;
        return Ok(records);
    }

    let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let input: JsonInput = serde_json::from_str(&text).with_context(|| format!("cannot parse {}", path.display()))?;
    Ok(match input {
        JsonInput::Records(records) => records,
        JsonInput::Columns(columns) => columns.into_records(),
    })
}
