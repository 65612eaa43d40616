//! Walked-distance reconstruction for a single participant.
//!
//! Each consecutive pair of waypoints in a route is a leg. A leg is resolved
//! by looking both waypoints up in the [`WaypointIndex`], snapping them onto
//! walkable space and asking the [`NavigationService`] for the shortest
//! walkable polyline between them. The leg length is the length of that
//! polyline; the route total is the sum over all legs.
//!
//! Legs that cannot be resolved contribute zero distance and keep a
//! [`LegStatus`] saying why. They never fail the route.

use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::polyline_length;
use crate::navigation::{NavigationService, PathFailure};
use crate::waypoints::WaypointIndex;
use crate::{Point3, WaypointId};

/// Outcome of resolving one leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LegStatus {
    /// A walkable path was found
    Resolved,
    /// A waypoint of the leg is not in the index
    UnresolvedWaypoint { missing: WaypointId },
    /// The navigation service found no walkable path
    NoPath,
    /// The path search ran out of time
    TimedOut,
}

impl LegStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(self, LegStatus::Resolved)
    }
}

impl From<PathFailure> for LegStatus {
    fn from(failure: PathFailure) -> Self {
        match failure {
            PathFailure::NoPath => LegStatus::NoPath,
            PathFailure::TimedOut => LegStatus::TimedOut,
        }
    }
}

/// The walked path between two consecutive waypoints.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathLeg {
    pub from: WaypointId,
    pub to: WaypointId,
    /// Corner polyline (empty unless resolved)
    pub corners: Vec<Point3>,
    /// Polyline length in world units (0.0 unless resolved)
    pub length: f64,
    pub status: LegStatus,
}

impl PathLeg {
    fn failed(from: WaypointId, to: WaypointId, status: LegStatus) -> Self {
        Self { from, to, corners: Vec::new(), length: 0.0, status }
    }
}

/// Total walked distance of a route and the legs it is made of.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteReport {
    pub total_distance: f64,
    pub legs: Vec<PathLeg>,
}

impl RouteReport {
    /// Legs that did not resolve, with their index in the route
    pub fn failed_legs(&self) -> impl Iterator<Item = (usize, &PathLeg)> + '_ {
        self.legs.iter().enumerate().filter(|(_, leg)| !leg.status.is_resolved())
    }

    pub fn resolved_count(&self) -> usize {
        self.legs.iter().filter(|leg| leg.status.is_resolved()).count()
    }
}

/// Resolves routes against a fixed waypoint index and navigation service.
pub struct RouteDistanceCalculator<'a, N: NavigationService + ?Sized> {
    index: &'a WaypointIndex,
    nav: &'a N,
}

impl<'a, N: NavigationService + ?Sized> RouteDistanceCalculator<'a, N> {
    pub fn new(index: &'a WaypointIndex, nav: &'a N) -> Self {
        Self { index, nav }
    }

    /// Compute the walked distance of a route.
    ///
    /// Routes with fewer than two waypoints have no legs and never touch the
    /// navigation service.
    pub fn compute(&self, route: &[WaypointId]) -> RouteReport {
        let legs: Vec<PathLeg> = route
            .windows(2)
            .map(|pair| self.resolve_leg(pair[0], pair[1]))
            .collect();

        let total_distance = legs.iter().fold(0.0, |acc, leg| acc + leg.length);

        RouteReport { total_distance, legs }
    }

    /// Resolve a single leg between two waypoints.
    pub fn resolve_leg(&self, from: WaypointId, to: WaypointId) -> PathLeg {
        let start = match self.index.lookup(from) {
            Some(p) => p,
            None => return PathLeg::failed(from, to, LegStatus::UnresolvedWaypoint { missing: from }),
        };
        let end = match self.index.lookup(to) {
            Some(p) => p,
            None => return PathLeg::failed(from, to, LegStatus::UnresolvedWaypoint { missing: to }),
        };

        debug!("[RouteDistance] Leg {} -> {}: {:?} -> {:?}", from, to, start, end);

        let snapped_start = self.nav.snap_to_walkable(start);
        let snapped_end = self.nav.snap_to_walkable(end);
        debug!(
            "[RouteDistance] Snapped to walkable: {:?} -> {:?}",
            snapped_start, snapped_end
        );

        match self.nav.shortest_path(snapped_start, snapped_end) {
            Ok(corners) => {
                debug!("[RouteDistance] Path has {} corners", corners.len());
                let length = polyline_length(&corners);
                PathLeg { from, to, corners, length, status: LegStatus::Resolved }
            }
            Err(failure) => {
                debug!("[RouteDistance] Leg {} -> {} failed: {}", from, to, failure);
                PathLeg::failed(from, to, failure.into())
            }
        }
    }
}

/// Compute the walked distance of `route`.
///
/// # Example
/// ```
/// use trajectory_analysis::{compute_route, Point3, StraightLineNavigator, WaypointIndex};
///
/// let index = WaypointIndex::build([
///     (1, Point3::new(0.0, 0.0, 0.0)),
///     (2, Point3::new(3.0, 0.0, 4.0)),
/// ]);
/// let report = compute_route(&[1, 2], &index, &StraightLineNavigator);
/// assert_eq!(report.total_distance, 5.0);
/// assert_eq!(report.legs.len(), 1);
/// ```
pub fn compute_route<N: NavigationService + ?Sized>(
    route: &[WaypointId],
    index: &WaypointIndex,
    nav: &N,
) -> RouteReport {
    RouteDistanceCalculator::new(index, nav).compute(route)
}
