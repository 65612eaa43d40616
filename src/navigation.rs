//! Navigation service: snapping points onto walkable space and finding
//! walkable shortest paths between them.
//!
//! The route calculator only depends on the [`NavigationService`] trait.
//! Two implementations ship with the crate:
//! - [`NavGraph`] - a walkable graph of world-space nodes, searched with A*
//!   and indexed with an R-tree for snapping
//! - [`StraightLineNavigator`] - treats all space as walkable; every path is
//!   the direct segment between its endpoints

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use log::{debug, trace};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::geometry::{euclidean_distance, squared_distance};
use crate::Point3;

/// Why a path query produced no polyline.
///
/// Both variants are non-fatal for the caller: the leg contributes zero
/// distance and is marked failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PathFailure {
    #[error("no walkable path between the endpoints")]
    NoPath,
    #[error("path search exceeded its time budget")]
    TimedOut,
}

/// Walkable-space queries needed to reconstruct a walked route.
pub trait NavigationService {
    /// Nearest walkable point to `point`, or `point` itself when nothing
    /// walkable lies within the service's tolerance.
    fn snap_to_walkable(&self, point: Point3) -> Point3;

    /// Corner polyline of the shortest walkable path from `from` to `to`.
    fn shortest_path(&self, from: Point3, to: Point3) -> Result<Vec<Point3>, PathFailure>;
}

/// Navigation without obstacles: walked distance equals straight-line distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineNavigator;

impl NavigationService for StraightLineNavigator {
    fn snap_to_walkable(&self, point: Point3) -> Point3 {
        point
    }

    fn shortest_path(&self, from: Point3, to: Point3) -> Result<Vec<Point3>, PathFailure> {
        Ok(vec![from, to])
    }
}

// =============================================================================
// Navigation Graph
// =============================================================================

/// Configuration for [`NavGraph`] queries
#[derive(Debug, Clone)]
pub struct NavGraphConfig {
    /// Maximum distance from a query point to the graph for it to count as
    /// walkable (default: 1.0 world units)
    pub snap_radius: f64,
    /// Upper bound on a single shortest-path search (default: 500ms).
    /// `None` searches until the open set is exhausted.
    pub query_timeout: Option<Duration>,
}

impl Default for NavGraphConfig {
    fn default() -> Self {
        Self {
            snap_radius: 1.0,
            query_timeout: Some(Duration::from_millis(500)),
        }
    }
}

/// Serializable graph definition: node positions and undirected edges
/// between node indices.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavGraphSpec {
    pub nodes: Vec<Point3>,
    pub edges: Vec<(usize, usize)>,
}

/// A graph node with its index for R-tree queries
#[derive(Debug, Clone, Copy)]
struct IndexedNode {
    idx: usize,
    position: [f64; 3],
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedNode {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// A walkable edge segment for R-tree queries
#[derive(Debug, Clone, Copy)]
struct IndexedEdge {
    a: usize,
    b: usize,
    start: Point3,
    end: Point3,
}

impl IndexedEdge {
    /// Closest point of the segment to `point`
    fn project(&self, point: &Point3) -> Point3 {
        let (dx, dy, dz) = (
            self.end.x - self.start.x,
            self.end.y - self.start.y,
            self.end.z - self.start.z,
        );
        let len2 = dx * dx + dy * dy + dz * dz;
        if len2 == 0.0 {
            return self.start;
        }

        let t = ((point.x - self.start.x) * dx
            + (point.y - self.start.y) * dy
            + (point.z - self.start.z) * dz)
            / len2;
        if t <= 0.0 {
            self.start
        } else if t >= 1.0 {
            self.end
        } else {
            Point3::new(self.start.x + t * dx, self.start.y + t * dy, self.start.z + t * dz)
        }
    }
}

impl RTreeObject for IndexedEdge {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.start.x, self.start.y, self.start.z],
            [self.end.x, self.end.y, self.end.z],
        )
    }
}

impl PointDistance for IndexedEdge {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let point = Point3::new(point[0], point[1], point[2]);
        squared_distance(&self.project(&point), &point)
    }
}

/// Where a query point enters the graph
#[derive(Debug, Clone, Copy, PartialEq)]
enum GraphEntry {
    Node(usize),
    /// Interior point of the edge between two nodes
    Edge { a: usize, b: usize },
}

/// A query point snapped onto the graph
#[derive(Debug, Clone, Copy)]
struct Located {
    entry: GraphEntry,
    point: Point3,
}

impl Located {
    /// Graph nodes reachable directly from the snapped point, with the
    /// walking cost to each
    fn portals(&self, nodes: &[Point3]) -> Vec<(usize, f64)> {
        match self.entry {
            GraphEntry::Node(idx) => vec![(idx, 0.0)],
            GraphEntry::Edge { a, b } => vec![
                (a, euclidean_distance(&self.point, &nodes[a])),
                (b, euclidean_distance(&self.point, &nodes[b])),
            ],
        }
    }

    fn same_edge(&self, other: &Located) -> bool {
        match (self.entry, other.entry) {
            (GraphEntry::Edge { a, b }, GraphEntry::Edge { a: c, b: d }) => {
                (a, b) == (c, d) || (a, b) == (d, c)
            }
            _ => false,
        }
    }
}

/// Entry in the A* open set
#[derive(Debug, Clone, Copy)]
struct SearchNode {
    idx: usize,
    f_cost: f64,
}

impl Eq for SearchNode {}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Walkable graph built from a baked navigation mesh.
///
/// Nodes are walkable positions (mesh vertices, portal midpoints, ...) and
/// edges are walkable straight segments between them, weighted by length.
/// Query points snap to the closest point on any node or edge, so a point in
/// the middle of a long corridor is on the graph.
#[derive(Debug, Clone)]
pub struct NavGraph {
    nodes: Vec<Point3>,
    adjacency: Vec<Vec<(usize, f64)>>,
    node_tree: RTree<IndexedNode>,
    edge_tree: RTree<IndexedEdge>,
    config: NavGraphConfig,
}

impl NavGraph {
    /// Build a graph from node positions and undirected edges.
    ///
    /// # Example
    /// ```
    /// use trajectory_analysis::{NavGraph, NavGraphConfig, NavigationService, Point3};
    ///
    /// // An L-shaped corridor
    /// let graph = NavGraph::new(
    ///     vec![
    ///         Point3::new(0.0, 0.0, 0.0),
    ///         Point3::new(10.0, 0.0, 0.0),
    ///         Point3::new(10.0, 0.0, 10.0),
    ///     ],
    ///     &[(0, 1), (1, 2)],
    ///     NavGraphConfig::default(),
    /// ).unwrap();
    ///
    /// let path = graph
    ///     .shortest_path(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 10.0))
    ///     .unwrap();
    /// assert_eq!(path.len(), 3);
    /// ```
    pub fn new(
        nodes: Vec<Point3>,
        edges: &[(usize, usize)],
        config: NavGraphConfig,
    ) -> Result<Self, GraphError> {
        if let Some(node) = nodes.iter().position(|p| !p.is_valid()) {
            return Err(GraphError::InvalidNode { node });
        }

        let mut adjacency = vec![Vec::new(); nodes.len()];
        let mut segments = Vec::with_capacity(edges.len());
        for (edge, &(a, b)) in edges.iter().enumerate() {
            for node in [a, b] {
                if node >= nodes.len() {
                    return Err(GraphError::EdgeOutOfRange {
                        edge,
                        node,
                        node_count: nodes.len(),
                    });
                }
            }
            let cost = euclidean_distance(&nodes[a], &nodes[b]);
            adjacency[a].push((b, cost));
            adjacency[b].push((a, cost));
            segments.push(IndexedEdge { a, b, start: nodes[a], end: nodes[b] });
        }

        let indexed: Vec<IndexedNode> = nodes
            .iter()
            .enumerate()
            .map(|(idx, p)| IndexedNode { idx, position: [p.x, p.y, p.z] })
            .collect();

        debug!("[NavGraph] Built graph with {} nodes, {} edges", nodes.len(), edges.len());

        Ok(Self {
            nodes,
            adjacency,
            node_tree: RTree::bulk_load(indexed),
            edge_tree: RTree::bulk_load(segments),
            config,
        })
    }

    pub fn from_spec(spec: &NavGraphSpec, config: NavGraphConfig) -> Result<Self, GraphError> {
        Self::new(spec.nodes.clone(), &spec.edges, config)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn config(&self) -> &NavGraphConfig {
        &self.config
    }

    /// Closest point on the graph within the snap radius.
    ///
    /// Nodes win ties, so a projection that lands on an edge endpoint
    /// enters through that node.
    fn locate(&self, point: &Point3) -> Option<Located> {
        let query = [point.x, point.y, point.z];
        let radius2 = self.config.snap_radius * self.config.snap_radius;

        let node = self
            .node_tree
            .nearest_neighbor(&query)
            .map(|n| (n.idx, squared_distance(&self.nodes[n.idx], point)))
            .filter(|&(_, d2)| d2 <= radius2);

        let edge = self
            .edge_tree
            .nearest_neighbor(&query)
            .map(|e| {
                let projected = e.project(point);
                (e, projected, squared_distance(&projected, point))
            })
            .filter(|&(_, _, d2)| d2 <= radius2);

        match (node, edge) {
            (Some((_, node_d2)), Some((e, projected, edge_d2))) if edge_d2 < node_d2 => Some(Located {
                entry: GraphEntry::Edge { a: e.a, b: e.b },
                point: projected,
            }),
            (Some((idx, _)), _) => Some(Located {
                entry: GraphEntry::Node(idx),
                point: self.nodes[idx],
            }),
            (None, Some((e, projected, _))) => Some(Located {
                entry: GraphEntry::Edge { a: e.a, b: e.b },
                point: projected,
            }),
            (None, None) => None,
        }
    }

    /// A* over the node graph with a straight-line heuristic to `target`.
    ///
    /// The search starts from every `(node, cost)` in `starts` and finishes
    /// through any `(node, cost)` in `goals`, where the cost is the walk
    /// between the node and the snapped endpoint.
    fn search(
        &self,
        starts: &[(usize, f64)],
        goals: &[(usize, f64)],
        target: &Point3,
    ) -> Result<Vec<usize>, PathFailure> {
        let started = Instant::now();
        let heuristic = |idx: usize| euclidean_distance(&self.nodes[idx], target);

        // One extra slot for the snapped goal point
        let finish = self.nodes.len();
        let mut g_cost = vec![f64::INFINITY; finish + 1];
        let mut came_from: Vec<Option<usize>> = vec![None; finish + 1];
        let mut closed = vec![false; finish + 1];
        let mut open = BinaryHeap::new();

        for &(idx, cost) in starts {
            if cost < g_cost[idx] {
                g_cost[idx] = cost;
                open.push(SearchNode { idx, f_cost: cost + heuristic(idx) });
            }
        }

        let mut expanded = 0usize;
        while let Some(SearchNode { idx, .. }) = open.pop() {
            if let Some(limit) = self.config.query_timeout {
                if expanded % 64 == 0 && started.elapsed() >= limit {
                    debug!("[NavGraph] Search timed out after {} expansions", expanded);
                    return Err(PathFailure::TimedOut);
                }
            }

            if closed[idx] {
                continue;
            }
            closed[idx] = true;
            expanded += 1;

            if idx == finish {
                trace!("[NavGraph] Reached goal after {} expansions", expanded);
                let mut path = Vec::new();
                let mut current = came_from[finish];
                while let Some(node) = current {
                    path.push(node);
                    current = came_from[node];
                }
                path.reverse();
                return Ok(path);
            }

            let exits = goals.iter().filter(|(goal, _)| *goal == idx).map(|&(_, cost)| (finish, cost));
            let neighbors = self.adjacency[idx].iter().copied().chain(exits);
            for (next, cost) in neighbors {
                if closed[next] {
                    continue;
                }
                let tentative = g_cost[idx] + cost;
                if tentative < g_cost[next] {
                    g_cost[next] = tentative;
                    came_from[next] = Some(idx);
                    let h = if next == finish { 0.0 } else { heuristic(next) };
                    open.push(SearchNode { idx: next, f_cost: tentative + h });
                }
            }
        }

        trace!("[NavGraph] Open set exhausted after {} expansions", expanded);
        Err(PathFailure::NoPath)
    }
}

impl NavigationService for NavGraph {
    fn snap_to_walkable(&self, point: Point3) -> Point3 {
        match self.locate(&point) {
            Some(located) => located.point,
            None => point,
        }
    }

    fn shortest_path(&self, from: Point3, to: Point3) -> Result<Vec<Point3>, PathFailure> {
        let (Some(start), Some(goal)) = (self.locate(&from), self.locate(&to)) else {
            debug!("[NavGraph] Endpoint off the graph: {:?} -> {:?}", from, to);
            return Err(PathFailure::NoPath);
        };

        // Straight along a shared edge never needs a node
        let node_path = if start.same_edge(&goal) {
            Vec::new()
        } else {
            self.search(&start.portals(&self.nodes), &goal.portals(&self.nodes), &goal.point)?
        };

        let mut corners = Vec::with_capacity(node_path.len() + 4);
        let waypoints = [from, start.point]
            .into_iter()
            .chain(node_path.iter().map(|&idx| self.nodes[idx]))
            .chain([goal.point, to]);
        for point in waypoints {
            if corners.last() != Some(&point) {
                corners.push(point);
            }
        }

        Ok(corners)
    }
}

// =============================================================================
// Test Support
// =============================================================================
