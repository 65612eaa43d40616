//! `trajectory-analysis` command-line tool.
//!
//! Reads participant traces and waypoint anchors, writes per-participant
//! walked distances, and optionally exports the walked legs and a density
//! heat map as JSON.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::Deserialize;

use trajectory_analysis::{
    write_distances, write_distances_to_path, write_paths_json, write_snapshot_json, Anchor,
    DensityGrid, FailurePolicy, HeatmapConfig, NavGraph, NavGraphConfig, NavGraphSpec,
    NavigationService, ResultSet, StraightLineNavigator, TraceAggregator, TraceConfig,
    WaypointIndex,
};

#[derive(Parser, Debug)]
#[command(
    name = "trajectory-analysis",
    version,
    about = "Reconstruct walked distances from participant route traces"
)]
struct Args {
    /// Trace records: two metadata fields, then waypoint IDs
    #[arg(long, value_name = "PATH")]
    traces: PathBuf,

    /// Waypoint anchors CSV with an `id,x,y,z` header
    #[arg(long, value_name = "PATH")]
    anchors: PathBuf,

    /// Navigation graph JSON (`nodes` + `edges`); straight lines when omitted
    #[arg(long, value_name = "PATH")]
    navgraph: Option<PathBuf>,

    /// Distances CSV output (stdout when omitted)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Walked legs JSON output
    #[arg(long, value_name = "PATH")]
    paths: Option<PathBuf>,

    /// Position samples CSV with an `x,z` header, added to the heat map
    #[arg(long, value_name = "PATH")]
    samples: Option<PathBuf>,

    /// Also sample every walked leg at this spacing into the heat map
    #[arg(long, value_name = "UNITS", value_parser = parse_spacing)]
    path_spacing: Option<f64>,

    /// Heat map JSON output
    #[arg(long, value_name = "PATH")]
    heatmap: Option<PathBuf>,

    /// Heat map cells per axis
    #[arg(long, value_name = "N", default_value_t = 10)]
    grid_size: usize,

    /// Heat map cell edge length in world units
    #[arg(long, value_name = "UNITS", default_value_t = 1.0)]
    cell_size: f64,

    /// Trace field separator
    #[arg(long, value_name = "CHAR", default_value_t = ',')]
    delimiter: char,

    /// Log and skip malformed trace records instead of aborting
    #[arg(long)]
    skip_bad_records: bool,

    /// Navigation graph snap radius in world units
    #[arg(long, value_name = "UNITS", default_value_t = 1.0)]
    snap_radius: f64,

    /// Per-leg path search budget in milliseconds (0 = unbounded)
    #[arg(long, value_name = "MS", default_value_t = 500)]
    timeout_ms: u64,

    /// Resolve participants on all cores
    #[cfg(feature = "parallel")]
    #[arg(long)]
    parallel: bool,
}

/// Smallest accepted `--path-spacing`
const MIN_PATH_SPACING: f64 = 1e-3;

fn parse_spacing(value: &str) -> Result<f64, String> {
    let spacing: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if spacing.is_finite() && spacing >= MIN_PATH_SPACING {
        Ok(spacing)
    } else {
        Err(format!("spacing must be a finite number of at least {MIN_PATH_SPACING}"))
    }
}

#[derive(Debug, Deserialize)]
struct SampleRow {
    x: f64,
    z: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let anchors = load_anchors(&args.anchors)?;
    let index = WaypointIndex::from_anchors(&anchors);
    info!("[CLI] Loaded {} waypoints from {}", index.len(), args.anchors.display());

    let nav: Box<dyn NavigationService + Sync> = match &args.navgraph {
        Some(path) => Box::new(load_navgraph(path, &args)?),
        None => {
            info!("[CLI] No navigation graph given, using straight-line distances");
            Box::new(StraightLineNavigator)
        }
    };

    let config = TraceConfig {
        delimiter: args.delimiter,
        failure_policy: if args.skip_bad_records {
            FailurePolicy::SkipRecord
        } else {
            FailurePolicy::FailFast
        },
        ..TraceConfig::default()
    };

    let results = run_traces(&args, nav.as_ref(), &index, &config)?;

    if !results.skipped().is_empty() {
        warn!("[CLI] {} malformed records skipped", results.skipped().len());
    }
    let diagnostics = results.diagnostics();
    if !diagnostics.is_empty() {
        warn!("[CLI] {} legs contributed no distance", diagnostics.len());
    }

    match &args.output {
        Some(path) => write_distances_to_path(&results, path)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            write_distances(&results, stdout.lock()).context("failed to write distances")?;
        }
    }

    if let Some(path) = &args.paths {
        write_paths_json(&results, create(path)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("[CLI] Wrote walked legs to {}", path.display());
    }

    if let Some(path) = &args.heatmap {
        let grid = DensityGrid::new(HeatmapConfig {
            grid_size: args.grid_size,
            cell_size: args.cell_size,
        });
        if let Some(samples) = &args.samples {
            let added = load_samples(samples, &grid)?;
            info!("[CLI] Added {} samples from {}", added, samples.display());
        }
        if let Some(spacing) = args.path_spacing {
            let added: usize = results
                .iter()
                .flat_map(|p| p.legs.iter())
                .map(|leg| grid.add_path(&leg.corners, spacing))
                .sum();
            info!("[CLI] Added {} samples along walked legs", added);
        }

        write_snapshot_json(&grid.snapshot(), create(path)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("[CLI] Wrote heat map to {}", path.display());
    } else if args.samples.is_some() || args.path_spacing.is_some() {
        warn!("[CLI] Heat map inputs given without --heatmap, nothing to write");
    }

    Ok(())
}

fn run_traces(
    args: &Args,
    nav: &(dyn NavigationService + Sync),
    index: &WaypointIndex,
    config: &TraceConfig,
) -> Result<ResultSet> {
    let aggregator = TraceAggregator::new(index, nav, config);

    let file = File::open(&args.traces)
        .with_context(|| format!("failed to open {}", args.traces.display()))?;
    let reader = BufReader::new(file);

    #[cfg(feature = "parallel")]
    if args.parallel {
        return aggregator
            .run_reader_parallel(reader)
            .with_context(|| format!("failed to process {}", args.traces.display()));
    }

    aggregator
        .run_reader(reader)
        .with_context(|| format!("failed to process {}", args.traces.display()))
}

fn load_anchors(path: &Path) -> Result<Vec<Anchor>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let anchors = reader
        .deserialize()
        .collect::<Result<Vec<Anchor>, _>>()
        .with_context(|| format!("failed to parse anchors in {}", path.display()))?;

    if let Some(anchor) = anchors.iter().find(|a| !a.position().is_valid()) {
        bail!("anchor {} has a non-finite coordinate", anchor.id);
    }
    Ok(anchors)
}

fn load_navgraph(path: &Path, args: &Args) -> Result<NavGraph> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let spec: NavGraphSpec = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let config = NavGraphConfig {
        snap_radius: args.snap_radius,
        query_timeout: (args.timeout_ms > 0).then(|| Duration::from_millis(args.timeout_ms)),
    };
    let graph = NavGraph::from_spec(&spec, config)
        .with_context(|| format!("invalid navigation graph {}", path.display()))?;

    info!(
        "[CLI] Loaded navigation graph: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

fn load_samples(path: &Path, grid: &DensityGrid) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut added = 0;
    for row in reader.deserialize() {
        let row: SampleRow = row.with_context(|| format!("failed to parse samples in {}", path.display()))?;
        grid.add_sample(row.x, row.z);
        added += 1;
    }
    Ok(added)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from([
            "trajectory-analysis",
            "--traces",
            "traces.csv",
            "--anchors",
            "anchors.csv",
        ])
        .unwrap();

        assert_eq!(args.grid_size, 10);
        assert_eq!(args.cell_size, 1.0);
        assert_eq!(args.delimiter, ',');
        assert!(!args.skip_bad_records);
        assert_eq!(args.timeout_ms, 500);
        assert!(args.navgraph.is_none());
    }

    #[test]
    fn test_args_require_traces() {
        assert!(Args::try_parse_from(["trajectory-analysis", "--anchors", "a.csv"]).is_err());
    }

    #[test]
    fn test_path_spacing_bounds() {
        let parse = |spacing: &str| {
            Args::try_parse_from([
                "trajectory-analysis",
                "--traces",
                "t.csv",
                "--anchors",
                "a.csv",
                "--path-spacing",
                spacing,
            ])
        };

        assert_eq!(parse("0.5").unwrap().path_spacing, Some(0.5));
        for bad in ["0", "-1", "1e-12", "NaN", "inf", "wide"] {
            assert!(parse(bad).is_err(), "accepted spacing {bad}");
        }
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("trajectory-analysis-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_anchors() {
        let path = temp_file("anchors.csv", "id,x,y,z\n1, 0.0, 0.0, 0.0\n2,3.0,0.0,4.0\n");
        let anchors = load_anchors(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[1].id, 2);
        assert_eq!(anchors[1].z, 4.0);
    }

    #[test]
    fn test_load_anchors_rejects_bad_row() {
        let path = temp_file("bad-anchors.csv", "id,x,y,z\n1,0.0,zero,0.0\n");
        let result = load_anchors(&path);
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_samples() {
        let path = temp_file("samples.csv", "x,z\n0.5,0.5\n0.7,0.2\n9.0,9.0\n");
        let grid = DensityGrid::default();
        let added = load_samples(&path, &grid).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(added, 3);
        assert_eq!(grid.count_at(0, 0), Some(2));
        assert_eq!(grid.count_at(9, 9), Some(1));
    }
}
