//! Result output.
//!
//! Distances go out as delimited text with a `ParticipantID,TotalDistance`
//! header, one row per participant in ID order. With the `serde` feature the
//! walked leg polylines and density snapshots can also be exported as JSON
//! for a renderer.
//!
//! Writing never touches the [`ResultSet`], so a failed write can simply be
//! retried against another sink.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::aggregate::ResultSet;
use crate::error::WriteError;

#[cfg(feature = "serde")]
use crate::heatmap::DensitySnapshot;

/// Header row of the distances table
pub const DISTANCE_HEADER: [&str; 2] = ["ParticipantID", "TotalDistance"];

/// Write participant distances as CSV.
///
/// Distances use the shortest representation that reads back to the same
/// value (`5`, `12.5`).
///
/// # Example
/// ```
/// use trajectory_analysis::{write_distances, Point3, StraightLineNavigator, TraceAggregator, TraceConfig, WaypointIndex};
///
/// let index = WaypointIndex::build([
///     (1, Point3::new(0.0, 0.0, 0.0)),
///     (2, Point3::new(3.0, 0.0, 4.0)),
/// ]);
/// let results = TraceAggregator::new(&index, &StraightLineNavigator, &TraceConfig::default())
///     .run(["p0,a,1,2"])
///     .unwrap();
///
/// let mut out = Vec::new();
/// write_distances(&results, &mut out).unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), "ParticipantID,TotalDistance\n0,5\n");
/// ```
pub fn write_distances<W: Write>(results: &ResultSet, sink: W) -> Result<(), WriteError> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(DISTANCE_HEADER)?;

    for (participant_id, distance) in results.distances() {
        writer.write_record([participant_id.to_string(), distance.to_string()])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write participant distances to a file, replacing it if it exists.
pub fn write_distances_to_path<P: AsRef<Path>>(results: &ResultSet, path: P) -> Result<(), WriteError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_distances(results, BufWriter::new(file))?;
    info!("[ResultWriter] Wrote {} distances to {}", results.len(), path.display());
    Ok(())
}

/// Write every participant with its legs (corners, length, status) as a
/// JSON array.
#[cfg(feature = "serde")]
pub fn write_paths_json<W: Write>(results: &ResultSet, sink: W) -> Result<(), WriteError> {
    let participants: Vec<_> = results.iter().collect();
    let mut sink = sink;
    serde_json::to_writer_pretty(&mut sink, &participants)?;
    sink.flush()?;
    Ok(())
}

/// Write a density snapshot as JSON.
#[cfg(feature = "serde")]
pub fn write_snapshot_json<W: Write>(snapshot: &DensitySnapshot, sink: W) -> Result<(), WriteError> {
    let mut sink = sink;
    serde_json::to_writer_pretty(&mut sink, snapshot)?;
    sink.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::StraightLineNavigator;
    use crate::waypoints::WaypointIndex;
    use crate::{Point3, TraceAggregator, TraceConfig};

    fn results(lines: &[&str]) -> ResultSet {
        let index = WaypointIndex::build([
            (1, Point3::new(0.0, 0.0, 0.0)),
            (2, Point3::new(3.0, 0.0, 4.0)),
            (3, Point3::new(3.0, 0.0, 10.5)),
        ]);
        TraceAggregator::new(&index, &StraightLineNavigator, &TraceConfig::default())
            .run(lines)
            .unwrap()
    }

    fn render(results: &ResultSet) -> String {
        let mut out = Vec::new();
        write_distances(results, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_and_rows_in_id_order() {
        let results = results(&["a,b,1,2", "a,b,2,3", "a,b,1,2,3", "a,b"]);
        assert_eq!(
            render(&results),
            "ParticipantID,TotalDistance\n0,5\n1,6.5\n2,11.5\n3,0\n"
        );
    }

    #[test]
    fn test_empty_results_write_header_only() {
        assert_eq!(render(&ResultSet::new()), "ParticipantID,TotalDistance\n");
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_failed_write_keeps_results() {
        let results = results(&["a,b,1,2"]);
        assert!(write_distances(&results, BrokenSink).is_err());

        // Retry against a working sink
        assert_eq!(render(&results), "ParticipantID,TotalDistance\n0,5\n");
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let results = results(&["a,b,1,2"]);
        let path = std::env::temp_dir().join("trajectory-analysis-missing-dir").join("out.csv");
        assert!(matches!(
            write_distances_to_path(&results, path),
            Err(WriteError::Io(_))
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_paths_json_contains_legs() {
        let results = results(&["a,b,1,2,9"]);
        let mut out = Vec::new();
        write_paths_json(&results, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let legs = &value[0]["legs"];
        assert_eq!(value[0]["participant_id"], 0);
        assert_eq!(legs.as_array().map(Vec::len), Some(2));
        assert_eq!(legs[0]["length"], 5.0);
        assert_eq!(legs[0]["corners"][1]["z"], 4.0);
        assert_eq!(legs[1]["status"]["UnresolvedWaypoint"]["missing"], 9);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_snapshot_json() {
        use crate::heatmap::{DensityGrid, HeatmapConfig};

        let grid = DensityGrid::new(HeatmapConfig { grid_size: 2, cell_size: 1.0 });
        grid.add_sample(0.5, 1.5);
        let mut out = Vec::new();
        write_snapshot_json(&grid.snapshot(), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["max_count"], 1);
        assert_eq!(value["cells"][0][1], 1.0);
        assert_eq!(value["cells"][1][0], 0.0);
    }
}
