//! Waypoint anchors: the fixed world positions trace IDs refer to.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Point3, WaypointId};

/// A named anchor point supplied by the embedding environment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Anchor {
    pub id: WaypointId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Anchor {
    pub fn new(id: WaypointId, position: Point3) -> Self {
        Self { id, x: position.x, y: position.y, z: position.z }
    }

    pub fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

/// Immutable lookup from waypoint ID to world coordinate.
///
/// Built once before any trace is processed. When the anchor set repeats an
/// ID the last occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct WaypointIndex {
    positions: HashMap<WaypointId, Point3>,
}

impl WaypointIndex {
    /// Build the index from an ordered anchor set.
    ///
    /// # Example
    /// ```
    /// use trajectory_analysis::{Point3, WaypointIndex};
    ///
    /// let index = WaypointIndex::build([
    ///     (1, Point3::new(0.0, 0.0, 0.0)),
    ///     (2, Point3::new(3.0, 0.0, 4.0)),
    /// ]);
    /// assert_eq!(index.lookup(2), Some(Point3::new(3.0, 0.0, 4.0)));
    /// assert_eq!(index.lookup(9), None);
    /// ```
    pub fn build<I>(anchors: I) -> Self
    where
        I: IntoIterator<Item = (WaypointId, Point3)>,
    {
        let mut positions = HashMap::new();
        for (id, position) in anchors {
            if positions.insert(id, position).is_some() {
                log::debug!("[WaypointIndex] Duplicate anchor {}, keeping the later position", id);
            }
        }
        Self { positions }
    }

    pub fn from_anchors(anchors: &[Anchor]) -> Self {
        Self::build(anchors.iter().map(|a| (a.id, a.position())))
    }

    pub fn lookup(&self, id: WaypointId) -> Option<Point3> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: WaypointId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
