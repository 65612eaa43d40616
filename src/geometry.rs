//! # Geometry Utilities
//!
//! World-space computations shared by the route calculator, the navigation
//! graph and the density grid.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`euclidean_distance`] | Straight-line distance between two world points |
//! | [`polyline_length`] | Total length of a corner polyline |
//! | [`sample_polyline`] | Evenly spaced points along a polyline |
//!
//! ## Example
//!
//! ```rust
//! use trajectory_analysis::{Point3, geometry};
//!
//! let corners = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(3.0, 0.0, 4.0),
//!     Point3::new(3.0, 0.0, 10.0),
//! ];
//!
//! assert_eq!(geometry::polyline_length(&corners), 11.0);
//! assert_eq!(geometry::euclidean_distance(&corners[0], &corners[1]), 5.0);
//! ```
//!
//! ## Coordinate System
//!
//! Points are engine world coordinates with `y` up. Walked distances use all
//! three axes so stairs and ramps count; the density grid projects onto the
//! `x`/`z` ground plane.

use crate::Point3;

// =============================================================================
// Distance Functions
// =============================================================================

/// Straight-line distance between two points in world units.
///
/// # Example
///
/// ```rust
/// use trajectory_analysis::{Point3, geometry};
///
/// let a = Point3::new(1.0, 2.0, 3.0);
/// let b = Point3::new(1.0, 2.0, 3.0);
/// assert_eq!(geometry::euclidean_distance(&a, &b), 0.0);
/// ```
#[inline]
pub fn euclidean_distance(p1: &Point3, p2: &Point3) -> f64 {
    squared_distance(p1, p2).sqrt()
}

#[inline]
pub(crate) fn squared_distance(p1: &Point3, p2: &Point3) -> f64 {
    let dx = p1.x - p2.x;
    let dy = p1.y - p2.y;
    let dz = p1.z - p2.z;
    dx * dx + dy * dy + dz * dz
}

/// Total length of a polyline: the sum of distances between consecutive
/// corners.
///
/// Empty and single-corner polylines have length 0.0.
pub fn polyline_length(points: &[Point3]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| euclidean_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Resampling
// =============================================================================

/// Upper bound on the points [`sample_polyline`] returns.
pub const MAX_POLYLINE_SAMPLES: usize = 100_000;

/// Sample points along a polyline every `spacing` world units.
///
/// The first corner is always included, and the last corner is appended if
/// the final sample did not land on it. A non-positive or non-finite spacing
/// returns the corners unchanged. Sampling stops after
/// [`MAX_POLYLINE_SAMPLES`] points, so a tiny spacing over a long path is
/// truncated rather than unbounded.
///
/// # Example
///
/// ```rust
/// use trajectory_analysis::{Point3, geometry};
///
/// let line = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 0.0, 0.0)];
/// let samples = geometry::sample_polyline(&line, 1.0);
/// assert_eq!(samples.len(), 5);
/// assert_eq!(samples[2], Point3::new(2.0, 0.0, 0.0));
/// ```
pub fn sample_polyline(points: &[Point3], spacing: f64) -> Vec<Point3> {
    if points.len() < 2 || !spacing.is_finite() || spacing <= 0.0 {
        return points.to_vec();
    }

    let mut samples = vec![points[0]];
    // Distance from the current segment start to the next sample
    let mut offset = spacing;

    'segments: for w in points.windows(2) {
        let (start, end) = (&w[0], &w[1]);
        let seg_len = euclidean_distance(start, end);
        if seg_len == 0.0 {
            continue;
        }

        while offset <= seg_len {
            if samples.len() >= MAX_POLYLINE_SAMPLES {
                log::warn!(
                    "[Geometry] Polyline sampling capped at {} points (spacing {})",
                    MAX_POLYLINE_SAMPLES,
                    spacing
                );
                break 'segments;
            }
            let t = offset / seg_len;
            samples.push(Point3::new(
                start.x + t * (end.x - start.x),
                start.y + t * (end.y - start.y),
                start.z + t * (end.z - start.z),
            ));
            offset += spacing;
        }
        offset -= seg_len;
    }

    let last = points[points.len() - 1];
    if samples.last() != Some(&last) {
        samples.push(last);
    }

    samples
}

// =============================================================================
// Unit Tests
// =============================================================================
