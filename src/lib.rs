//! # Trajectory Analysis
//!
//! Walked-distance reconstruction and positional density maps for recorded
//! participant routes.
//!
//! This library provides:
//! - Parsing of per-participant route records (delimited waypoint ID lists)
//! - Walked distance per participant, following walkable paths between
//!   consecutive waypoints instead of straight lines
//! - A navigation graph with R-tree snapping and A* search, behind a
//!   pluggable [`NavigationService`] trait
//! - A thread-safe density grid for heat maps
//!
//! ## Features
//!
//! - **`parallel`** - Resolve participant routes in parallel with rayon
//! - **`serde`** - Serde derives and JSON export of paths and density snapshots
//! - **`cli`** - The `trajectory-analysis` command-line tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trajectory_analysis::{
//!     analyze_traces, write_distances, Point3, StraightLineNavigator, TraceConfig, WaypointIndex,
//! };
//!
//! // Anchor positions the trace IDs refer to
//! let index = WaypointIndex::build([
//!     (1, Point3::new(0.0, 0.0, 0.0)),
//!     (2, Point3::new(3.0, 0.0, 4.0)),
//!     (3, Point3::new(3.0, 0.0, 10.0)),
//! ]);
//!
//! let traces = "P01,Group A,Route,\"1,2,3\"\nP02,Group B,3,2\n";
//! let results = analyze_traces(
//!     traces.as_bytes(),
//!     &index,
//!     &StraightLineNavigator,
//!     &TraceConfig::default(),
//! )
//! .unwrap();
//!
//! let mut csv = Vec::new();
//! write_distances(&results, &mut csv).unwrap();
//! assert_eq!(
//!     String::from_utf8(csv).unwrap(),
//!     "ParticipantID,TotalDistance\n0,11\n1,6\n"
//! );
//! ```

use std::io::BufRead;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{GraphError, ParseError, TraceError, WriteError};

pub mod geometry;

// Trace record parsing
pub mod record;
pub use record::{parse_record, RecordParser};

pub mod waypoints;
pub use waypoints::{Anchor, WaypointIndex};

// Walkable-space queries (navigation graph, straight-line fallback)
pub mod navigation;
pub use navigation::{
    NavGraph, NavGraphConfig, NavGraphSpec, NavigationService, PathFailure, StraightLineNavigator,
};

pub mod route;
pub use route::{compute_route, LegStatus, PathLeg, RouteDistanceCalculator, RouteReport};

pub mod aggregate;
pub use aggregate::{Diagnostic, ParticipantResult, ResultSet, SkippedRecord, TraceAggregator};

pub mod output;
pub use output::{write_distances, write_distances_to_path, DISTANCE_HEADER};

#[cfg(feature = "serde")]
pub use output::{write_paths_json, write_snapshot_json};

// Heatmap generation module
pub mod heatmap;
pub use heatmap::{CellQuery, DensityGrid, DensitySnapshot, HeatmapConfig};

// ============================================================================
// Core Types
// ============================================================================

/// Stable integer identifier of a waypoint anchor.
pub type WaypointId = i32;

/// Dense participant identifier, assigned 0, 1, 2, ... in input order.
pub type ParticipantId = usize;

/// Ordered waypoint IDs one participant visited.
pub type Route = Vec<WaypointId>;

/// A world-space position (`y` up).
///
/// # Example
/// ```
/// use trajectory_analysis::Point3;
/// let point = Point3::new(3.0, 0.0, 4.0);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// Create a new point.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Check that every coordinate is finite.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// What to do with a trace record that fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FailurePolicy {
    /// Abort the whole run on the first malformed record
    #[default]
    FailFast,
    /// Log the record, list it in [`ResultSet::skipped`] and carry on
    SkipRecord,
}

/// Configuration for reading trace records
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceConfig {
    /// Field separator (default: ',')
    pub delimiter: char,
    /// Leading metadata fields to ignore (default: 2)
    pub reserved_fields: usize,
    /// Column label that may appear among the waypoint fields and is skipped
    /// (default: "Route")
    pub header_token: String,
    /// Handling of malformed records (default: fail fast)
    pub failure_policy: FailurePolicy,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            reserved_fields: 2,
            header_token: "Route".to_string(),
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

// ============================================================================
// Batch Entry Point
// ============================================================================

/// Parse every record of `reader` and resolve each participant's walked
/// distance.
///
/// Shorthand for [`TraceAggregator::run_reader`].
pub fn analyze_traces<R, N>(
    reader: R,
    index: &WaypointIndex,
    nav: &N,
    config: &TraceConfig,
) -> Result<ResultSet, TraceError>
where
    R: BufRead,
    N: NavigationService + ?Sized,
{
    TraceAggregator::new(index, nav, config).run_reader(reader)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> WaypointIndex {
        WaypointIndex::build([
            (10, Point3::new(0.0, 0.0, 0.0)),
            (20, Point3::new(0.0, 0.0, 8.0)),
            (30, Point3::new(6.0, 0.0, 8.0)),
        ])
    }

    #[test]
    fn test_point_validity() {
        assert!(Point3::new(1.0, 2.0, 3.0).is_valid());
        assert!(!Point3::new(f64::NAN, 0.0, 0.0).is_valid());
        assert!(!Point3::new(0.0, f64::INFINITY, 0.0).is_valid());
    }

    #[test]
    fn test_trace_config_defaults() {
        let config = TraceConfig::default();
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.reserved_fields, 2);
        assert_eq!(config.header_token, "Route");
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn test_analyze_traces() {
        let input = "id,group,Route\nP1,A,10,20,30\nP2,B,\"30,10\"\n";
        let results =
            analyze_traces(input.as_bytes(), &index(), &StraightLineNavigator, &TraceConfig::default())
                .unwrap();

        // The header row is a participant with an empty route
        assert_eq!(
            results.distances().collect::<Vec<_>>(),
            vec![(0, 0.0), (1, 14.0), (2, 10.0)]
        );
    }

    #[test]
    fn test_analyze_traces_custom_layout() {
        let config = TraceConfig {
            delimiter: ';',
            reserved_fields: 1,
            ..TraceConfig::default()
        };
        let results =
            analyze_traces("P1;10;20".as_bytes(), &index(), &StraightLineNavigator, &config).unwrap();
        assert_eq!(results.get(0).map(|p| p.total_distance), Some(8.0));
    }

    #[test]
    fn test_analyze_traces_fail_fast() {
        let err = analyze_traces(
            "P1,A,10,20\nP2,B,ten\n".as_bytes(),
            &index(),
            &StraightLineNavigator,
            &TraceConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TraceError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_dyn_navigation_service() {
        let nav: Box<dyn NavigationService> = Box::new(StraightLineNavigator);
        let report = compute_route(&[10, 20], &index(), nav.as_ref());
        assert_eq!(report.total_distance, 8.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_trace_config_from_json() {
        let json = r#"{
            "delimiter": ";",
            "reserved_fields": 1,
            "header_token": "Path",
            "failure_policy": "SkipRecord"
        }"#;
        let config: TraceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.failure_policy, FailurePolicy::SkipRecord);
    }
}
