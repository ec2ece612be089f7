//! snaptrace-bench: CLI tool for tracing over linework files and collecting diagnostics.
//!
//! Loads a JSON file of geometries into a single in-memory layer, traces
//! the shortest path between two points along it, and prints per-stage
//! diagnostics for the graph build and the query. Useful for:
//!
//! - Checking whether two points are connected by the linework
//! - Comparing traces with and without noding
//! - Tuning offset distance and corner joins
//! - Measuring build and query durations on large inputs
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin snaptrace-bench -- --from 0,0 --to 10,5 [OPTIONS] <LINEWORK_PATH>
//! ```
//!
//! The input file holds a JSON array of geometries, for example
//! `[{"type": "LineString", "coordinates": [{"x": 0, "y": 0}, {"x": 10, "y": 0}]}]`.
//! Set `RUST_LOG=debug` to see what the tracer is doing.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use snaptrace::{
    BuildDiagnostics, Feature, FeatureSource, Geometry, JoinStyle, MemoryLayer, OffsetParams,
    Point, Polyline, QueryDiagnostics, Rect, SegmentNoder, Tracer, TracerConfig,
};

/// Shortest-path tracing over linework, with diagnostics.
///
/// Builds the tracing graph from a linework file, finds the path between
/// `--from` and `--to`, and prints timing and count diagnostics for the
/// build and the query.
#[derive(Parser)]
#[command(name = "snaptrace-bench", version)]
struct Cli {
    /// Path to a JSON array of geometries.
    linework_path: PathBuf,

    /// Start point as `x,y`.
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    from: Point,

    /// End point as `x,y`.
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    to: Point,

    /// Matching tolerance in coordinate units.
    #[arg(long, default_value_t = TracerConfig::DEFAULT_EPSILON)]
    epsilon: f64,

    /// Maximum number of features to build the graph from (0 = unlimited).
    #[arg(long, default_value_t = TracerConfig::DEFAULT_MAX_FEATURE_COUNT)]
    max_features: usize,

    /// Only use features intersecting `min_x,min_y,max_x,max_y`.
    #[arg(long, value_parser = parse_rect, allow_hyphen_values = true)]
    extent: Option<Rect>,

    /// Node the linework so lines that cross or touch mid-line connect.
    #[arg(long)]
    noding: bool,

    /// Signed offset distance applied to the found path.
    #[arg(long, default_value_t = OffsetParams::DEFAULT_DISTANCE, allow_hyphen_values = true)]
    offset: f64,

    /// Segments per quarter circle for round joins.
    #[arg(long, default_value_t = OffsetParams::DEFAULT_QUAD_SEGMENTS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    quad_segments: u32,

    /// Corner join style for offset paths.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_JOIN)]
    join_style: Join,

    /// Longest allowed miter, as a multiple of the offset distance.
    #[arg(long, default_value_t = OffsetParams::DEFAULT_MITER_LIMIT)]
    miter_limit: f64,

    /// Write SVG output to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full tracer config as a JSON string.
    ///
    /// When provided, all other tracer parameter flags are ignored.
    /// The JSON must be a valid `TracerConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Offset corner join selection.
#[derive(Clone, Copy, ValueEnum)]
enum Join {
    /// Circular arc around outer corners.
    Round,
    /// Sharp corner, beveled past the miter limit.
    Miter,
    /// Straight cut across outer corners.
    Bevel,
}

/// Maps a [`JoinStyle`] to the local CLI [`Join`] enum.
const fn join_from_style(style: JoinStyle) -> Join {
    match style {
        JoinStyle::Round => Join::Round,
        JoinStyle::Miter => Join::Miter,
        JoinStyle::Bevel => Join::Bevel,
    }
}

/// The CLI default join, derived from [`OffsetParams::DEFAULT_JOIN_STYLE`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_JOIN: Join = join_from_style(OffsetParams::DEFAULT_JOIN_STYLE);

/// Parse two comma-separated numbers.
fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("bad x in `{s}`: {e}"))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("bad y in `{s}`: {e}"))?;
    Ok((x, y))
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = parse_pair(s)?;
    Ok(Point::new(x, y))
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("bad extent `{s}`: {e}"))?;
    match parts[..] {
        [min_x, min_y, max_x, max_y] => Ok(Rect::new(min_x, min_y, max_x, max_y)),
        _ => Err(format!("expected `min_x,min_y,max_x,max_y`, got `{s}`")),
    }
}

/// Build a [`TracerConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<TracerConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(TracerConfig {
        max_feature_count: cli.max_features,
        epsilon: cli.epsilon,
        extent: cli.extent,
        offset: OffsetParams {
            distance: cli.offset,
            quad_segments: cli.quad_segments,
            join_style: match cli.join_style {
                Join::Round => JoinStyle::Round,
                Join::Miter => JoinStyle::Miter,
                Join::Bevel => JoinStyle::Bevel,
            },
            miter_limit: cli.miter_limit,
        },
        ..TracerConfig::default()
    })
}

/// Load the linework file into a single memory layer.
fn load_layer(cli: &Cli) -> Result<MemoryLayer, String> {
    let text = std::fs::read_to_string(&cli.linework_path)
        .map_err(|e| format!("Error reading {}: {e}", cli.linework_path.display()))?;
    let geometries: Vec<Geometry> = serde_json::from_str(&text)
        .map_err(|e| format!("Error parsing {}: {e}", cli.linework_path.display()))?;

    let name = cli
        .linework_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("linework");
    let layer = MemoryLayer::new(name);
    for (id, geometry) in (0u64..).zip(geometries) {
        layer.push(Feature::new(id, geometry));
    }
    Ok(layer)
}

/// Diagnostics collected from one run.
#[derive(Serialize)]
struct RunDiagnostics {
    build: Option<BuildDiagnostics>,
    query: Option<QueryDiagnostics>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let layer: Rc<dyn FeatureSource> = match load_layer(&cli) {
        Ok(layer) => {
            eprintln!(
                "Linework: {} ({} features)",
                cli.linework_path.display(),
                layer.len(),
            );
            Rc::new(layer)
        }
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Config: {config:#?}");
    eprintln!("Noding: {}", cli.noding);
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        // A fresh session per run, so every run pays for the graph build.
        let mut tracer = Tracer::with_config(config.clone());
        tracer.set_layers(vec![Rc::clone(&layer)]);
        if cli.noding {
            tracer.set_noder(Some(Box::new(SegmentNoder)));
        }

        let path = match tracer.find_shortest_path(cli.from, cli.to) {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Trace error: {e}");
                return ExitCode::FAILURE;
            }
        };

        let diagnostics = RunDiagnostics {
            build: tracer.last_build_diagnostics().cloned(),
            query: tracer.last_query_diagnostics().cloned(),
        };

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            if let Some(ref build) = diagnostics.build {
                println!("{}", build.report());
            }
            if let Some(ref query) = diagnostics.query {
                println!("{}", query.report());
            }
        }

        // Write SVG on the first run only.
        if run == 0
            && let Some(ref svg_path) = cli.svg
        {
            write_svg(&cli, svg_path, &layer, &config, &path);
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Export the layer's linework with the trace drawn on top.
fn write_svg(
    cli: &Cli,
    svg_path: &std::path::Path,
    layer: &Rc<dyn FeatureSource>,
    config: &TracerConfig,
    path: &Polyline,
) {
    let mut linework = Vec::new();
    for feature in layer.features(&snaptrace::FeatureRequest::default()) {
        if let Some(ref geometry) = feature.geometry {
            snaptrace::extract_linework(geometry, &mut linework);
        }
    }

    let title = cli
        .linework_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bench");
    let desc = format!(
        "from {},{} to {},{}",
        cli.from.x, cli.from.y, cli.to.x, cli.to.y
    );
    let config_json = serde_json::to_string(config).ok();
    let metadata = snaptrace_export::SvgMetadata {
        title: Some(title),
        description: Some(&desc),
        config_json: config_json.as_deref(),
    };
    let svg = snaptrace_export::to_svg(&linework, Some(path), &metadata);
    match std::fs::write(svg_path, &svg) {
        Ok(()) => {
            eprintln!(
                "SVG written to {} ({} bytes)",
                svg_path.display(),
                svg.len(),
            );
        }
        Err(e) => {
            eprintln!("Error writing SVG to {}: {e}", svg_path.display());
        }
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&RunDiagnostics) -> Option<std::time::Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[RunDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .filter_map(|d| d.build.as_ref())
        .map(|b| b.total.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };

    println!("Build duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Extract", |d| d.build.as_ref().map(|b| b.extract)),
        ("Noding", |d| d.build.as_ref().and_then(|b| b.noding)),
        ("Make Graph", |d| d.build.as_ref().map(|b| b.make_graph)),
        ("Prepare", |d| d.query.as_ref().map(|q| q.prepare)),
        ("Search", |d| d.query.as_ref().map(|q| q.search)),
        ("Offset", |d| d.query.as_ref().and_then(|q| q.offset)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
