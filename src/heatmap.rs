//! Positional density grid ("heat map").
//!
//! Accumulates raw ground-plane samples into a fixed square grid of counters:
//! - Samples are projected onto `x`/`z` and binned by `cell_size`
//! - Positions outside the grid land in the nearest edge cell
//! - Snapshots are max-normalized to 0.0-1.0 for color mapping
//!
//! The grid can be fed from several threads at once. A snapshot is taken
//! under the same lock as the writes, so it never mixes counts from before
//! and after a concurrent sample.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::sample_polyline;
use crate::Point3;

/// Configuration for heatmap generation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeatmapConfig {
    /// Number of cells along each axis (default: 10)
    pub grid_size: usize,
    /// Cell edge length in world units (default: 1.0)
    pub cell_size: f64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            grid_size: 10,
            cell_size: 1.0,
        }
    }
}

/// Normalized view of the grid at one point in time
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DensitySnapshot {
    pub grid_size: usize,
    pub cell_size: f64,
    /// Highest cell count, the normalization divisor (0 for an empty grid)
    pub max_count: u32,
    pub total_samples: u64,
    /// Normalized density (0.0-1.0) indexed `[x_index][z_index]`
    pub cells: Vec<Vec<f32>>,
}

impl DensitySnapshot {
    pub fn density(&self, x_index: usize, z_index: usize) -> Option<f32> {
        self.cells.get(x_index)?.get(z_index).copied()
    }
}

/// A single cell looked up by world position
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellQuery {
    pub x_index: usize,
    pub z_index: usize,
    /// Raw sample count
    pub visit_count: u32,
    /// Normalized density (0.0-1.0)
    pub density: f32,
}

/// Thread-safe 2D histogram of ground-plane positions.
///
/// # Example
/// ```
/// use trajectory_analysis::{DensityGrid, HeatmapConfig};
///
/// let grid = DensityGrid::new(HeatmapConfig::default());
/// grid.add_sample(2.5, 3.5);
/// grid.add_sample(2.7, 3.1);
/// grid.add_sample(8.0, 8.0);
///
/// let snapshot = grid.snapshot();
/// assert_eq!(snapshot.density(2, 3), Some(1.0));
/// assert_eq!(snapshot.density(8, 8), Some(0.5));
/// ```
#[derive(Debug)]
pub struct DensityGrid {
    config: HeatmapConfig,
    /// Row-major counts, `x_index * grid_size + z_index`
    counts: Mutex<Vec<u32>>,
}

impl Default for DensityGrid {
    fn default() -> Self {
        Self::new(HeatmapConfig::default())
    }
}

impl DensityGrid {
    /// Create an empty grid.
    ///
    /// A zero `grid_size` is raised to 1 and a non-positive or non-finite
    /// `cell_size` falls back to 1.0.
    pub fn new(config: HeatmapConfig) -> Self {
        let mut config = config;
        if config.grid_size == 0 {
            warn!("[DensityGrid] grid_size 0 is invalid, using 1");
            config.grid_size = 1;
        }
        if !config.cell_size.is_finite() || config.cell_size <= 0.0 {
            warn!("[DensityGrid] cell_size {} is invalid, using 1.0", config.cell_size);
            config.cell_size = 1.0;
        }

        let cells = config.grid_size * config.grid_size;
        Self {
            config,
            counts: Mutex::new(vec![0; cells]),
        }
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    // Counts stay valid if a writer panicked mid-update, so poisoning is ignored
    fn counts(&self) -> MutexGuard<'_, Vec<u32>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Convert a ground-plane position to grid indices, clamped into the grid
    pub fn cell_index(&self, x: f64, z: f64) -> (usize, usize) {
        let max = (self.config.grid_size - 1) as f64;
        let to_index = |v: f64| (v / self.config.cell_size).floor().clamp(0.0, max) as usize;
        (to_index(x), to_index(z))
    }

    /// Count one sample in the cell containing `(x, z)`
    pub fn add_sample(&self, x: f64, z: f64) {
        let (xi, zi) = self.cell_index(x, z);
        let idx = xi * self.config.grid_size + zi;
        let mut counts = self.counts();
        counts[idx] = counts[idx].saturating_add(1);
    }

    /// Count a world position, using its ground-plane `x`/`z`
    pub fn add_position(&self, position: Point3) {
        self.add_sample(position.x, position.z);
    }

    /// Count a batch of `(x, z)` samples under a single lock
    pub fn add_samples<I>(&self, samples: I)
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let indices: Vec<usize> = samples
            .into_iter()
            .map(|(x, z)| {
                let (xi, zi) = self.cell_index(x, z);
                xi * self.config.grid_size + zi
            })
            .collect();

        let mut counts = self.counts();
        for idx in indices {
            counts[idx] = counts[idx].saturating_add(1);
        }
    }

    /// Count positions sampled every `spacing` units along a walked polyline.
    ///
    /// Returns the number of samples added.
    pub fn add_path(&self, corners: &[Point3], spacing: f64) -> usize {
        let samples = sample_polyline(corners, spacing);
        let added = samples.len();
        self.add_samples(samples.iter().map(|p| (p.x, p.z)));
        debug!("[DensityGrid] Added {} samples from a {}-corner path", added, corners.len());
        added
    }

    pub fn count_at(&self, x_index: usize, z_index: usize) -> Option<u32> {
        let size = self.config.grid_size;
        if x_index >= size || z_index >= size {
            return None;
        }
        Some(self.counts()[x_index * size + z_index])
    }

    pub fn total_samples(&self) -> u64 {
        self.counts().iter().map(|&c| c as u64).sum()
    }

    /// Normalized copy of the grid.
    ///
    /// Every cell is `count / max_count`; an empty grid is all zeros. The
    /// underlying counts are left untouched.
    pub fn snapshot(&self) -> DensitySnapshot {
        let size = self.config.grid_size;
        let counts = self.counts().clone();

        let max_count = counts.iter().copied().max().unwrap_or(0);
        let total_samples = counts.iter().map(|&c| c as u64).sum();

        let cells = counts
            .chunks(size)
            .map(|row| row.iter().map(|&c| normalize(c, max_count)).collect())
            .collect();

        DensitySnapshot {
            grid_size: size,
            cell_size: self.config.cell_size,
            max_count,
            total_samples,
            cells,
        }
    }

    /// Look up the cell containing a world position
    pub fn query_cell(&self, x: f64, z: f64) -> CellQuery {
        let (x_index, z_index) = self.cell_index(x, z);
        let counts = self.counts();
        let max_count = counts.iter().copied().max().unwrap_or(0);
        let visit_count = counts[x_index * self.config.grid_size + z_index];

        CellQuery {
            x_index,
            z_index,
            visit_count,
            density: normalize(visit_count, max_count),
        }
    }

    /// Reset all counters to zero
    pub fn clear(&self) {
        self.counts().iter_mut().for_each(|c| *c = 0);
    }
}

fn normalize(count: u32, max_count: u32) -> f32 {
    if max_count == 0 {
        0.0
    } else {
        count as f32 / max_count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_cells(snapshot: &DensitySnapshot) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        snapshot
            .cells
            .iter()
            .enumerate()
            .flat_map(|(x, row)| row.iter().enumerate().map(move |(z, &d)| (x, z, d)))
    }

    #[test]
    fn test_empty_snapshot_is_all_zero() {
        let grid = DensityGrid::default();
        let snapshot = grid.snapshot();

        assert_eq!(snapshot.max_count, 0);
        assert_eq!(snapshot.cells.len(), 10);
        assert!(snapshot.cells.iter().all(|row| row.len() == 10));
        assert!(all_cells(&snapshot).all(|(_, _, d)| d == 0.0));
    }

    #[test]
    fn test_single_cell_normalizes_to_one() {
        let grid = DensityGrid::default();
        for _ in 0..7 {
            grid.add_sample(4.2, 6.9);
        }
        let snapshot = grid.snapshot();

        assert_eq!(snapshot.max_count, 7);
        for (x, z, d) in all_cells(&snapshot) {
            if (x, z) == (4, 6) {
                assert_eq!(d, 1.0);
            } else {
                assert_eq!(d, 0.0);
            }
        }
    }

    #[test]
    fn test_out_of_bounds_clamps_to_edge() {
        let grid = DensityGrid::default();
        grid.add_sample(1_000.0, -1_000.0);
        grid.add_sample(-3.0, 55.0);

        assert_eq!(grid.count_at(9, 0), Some(1));
        assert_eq!(grid.count_at(0, 9), Some(1));
        assert_eq!(grid.total_samples(), 2);
    }

    #[test]
    fn test_infinite_position_clamps() {
        let grid = DensityGrid::default();
        grid.add_sample(f64::INFINITY, f64::NEG_INFINITY);
        assert_eq!(grid.count_at(9, 0), Some(1));
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let grid = DensityGrid::default();
        grid.add_sample(1.0, 1.0);
        grid.add_sample(1.0, 1.0);
        grid.add_sample(3.0, 2.0);

        let first = grid.snapshot();
        let second = grid.snapshot();
        assert_eq!(first, second);
        assert_eq!(grid.total_samples(), 3);
    }

    #[test]
    fn test_sample_order_does_not_matter() {
        let samples = [(0.5, 0.5), (2.5, 7.5), (0.5, 0.5), (9.9, 9.9), (2.5, 7.1)];

        let forward = DensityGrid::default();
        forward.add_samples(samples.iter().copied());

        let backward = DensityGrid::default();
        for &(x, z) in samples.iter().rev() {
            backward.add_sample(x, z);
        }

        assert_eq!(forward.snapshot(), backward.snapshot());
    }

    #[test]
    fn test_custom_cell_size() {
        let grid = DensityGrid::new(HeatmapConfig { grid_size: 4, cell_size: 2.5 });
        assert_eq!(grid.cell_index(2.4, 2.6), (0, 1));
        assert_eq!(grid.cell_index(9.99, 10.0), (3, 3));
    }

    #[test]
    fn test_invalid_config_sanitized() {
        let grid = DensityGrid::new(HeatmapConfig { grid_size: 0, cell_size: -1.0 });
        assert_eq!(grid.config().grid_size, 1);
        assert_eq!(grid.config().cell_size, 1.0);
        grid.add_sample(5.0, 5.0);
        assert_eq!(grid.snapshot().cells, vec![vec![1.0]]);
    }

    #[test]
    fn test_add_position_uses_ground_plane() {
        let grid = DensityGrid::default();
        grid.add_position(Point3::new(3.5, 100.0, 2.5));
        assert_eq!(grid.count_at(3, 2), Some(1));
    }

    #[test]
    fn test_add_path_samples_along_polyline() {
        let grid = DensityGrid::default();
        let corners = [Point3::new(0.5, 0.0, 0.5), Point3::new(4.5, 0.0, 0.5)];
        let added = grid.add_path(&corners, 1.0);

        assert_eq!(added, 5);
        for x in 0..5 {
            assert_eq!(grid.count_at(x, 0), Some(1));
        }
    }

    #[test]
    fn test_query_cell() {
        let grid = DensityGrid::default();
        grid.add_samples([(1.5, 1.5), (1.5, 1.5), (1.5, 1.5), (1.5, 1.5), (6.0, 2.0)]);

        let hot = grid.query_cell(1.9, 1.1);
        assert_eq!((hot.x_index, hot.z_index, hot.visit_count), (1, 1, 4));
        assert_eq!(hot.density, 1.0);

        let warm = grid.query_cell(6.5, 2.5);
        assert_eq!(warm.density, 0.25);
    }

    #[test]
    fn test_clear() {
        let grid = DensityGrid::default();
        grid.add_sample(1.0, 1.0);
        grid.clear();
        assert_eq!(grid.total_samples(), 0);
        assert_eq!(grid.snapshot().max_count, 0);
    }

    #[test]
    fn test_concurrent_producers() {
        let grid = DensityGrid::default();

        std::thread::scope(|scope| {
            for t in 0..4 {
                let grid = &grid;
                scope.spawn(move || {
                    for i in 0..250 {
                        grid.add_sample((t * 2) as f64 + 0.5, (i % 10) as f64 + 0.5);
                    }
                });
            }
        });

        let snapshot = grid.snapshot();
        assert_eq!(snapshot.total_samples, 1000);
        assert_eq!(snapshot.max_count, 25);
        assert_eq!(snapshot.density(6, 9), Some(1.0));
        assert_eq!(snapshot.density(1, 0), Some(0.0));
    }

    #[test]
    fn test_count_at_out_of_range() {
        let grid = DensityGrid::default();
        assert_eq!(grid.count_at(10, 0), None);
    }
}
