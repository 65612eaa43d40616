//! Example of resolving many participants in parallel.
//!
//! Run with: cargo run --release --example parallel_batch --features parallel

use std::time::Instant;

use trajectory_analysis::{NavGraph, NavGraphConfig, Point3, TraceAggregator, TraceConfig, WaypointIndex};

fn main() {
    println!("Parallel Batch Example\n");

    // 20x20 lattice of walkable nodes, one unit apart
    let side = 20usize;
    let nodes: Vec<Point3> = (0..side * side)
        .map(|i| Point3::new((i % side) as f64, 0.0, (i / side) as f64))
        .collect();
    let mut edges = Vec::new();
    for i in 0..side * side {
        if i % side + 1 < side {
            edges.push((i, i + 1));
        }
        if i + side < side * side {
            edges.push((i, i + side));
        }
    }
    let graph = NavGraph::new(nodes, &edges, NavGraphConfig::default()).expect("valid graph");

    // One waypoint on each lattice corner and the centre
    let index = WaypointIndex::build([
        (1, Point3::new(0.0, 0.0, 0.0)),
        (2, Point3::new(19.0, 0.0, 0.0)),
        (3, Point3::new(19.0, 0.0, 19.0)),
        (4, Point3::new(0.0, 0.0, 19.0)),
        (5, Point3::new(10.0, 0.0, 10.0)),
    ]);

    let traces: Vec<String> = (0..2_000)
        .map(|i| match i % 4 {
            0 => format!("P{i},A,1,2,3,4"),
            1 => format!("P{i},B,\"5,1,5,3\""),
            2 => format!("P{i},C,Route,4,2,5"),
            _ => format!("P{i},D,3,1"),
        })
        .collect();

    let aggregator = TraceAggregator::new(&index, &graph, &TraceConfig::default());

    let start = Instant::now();
    let sequential = aggregator.run(&traces).expect("traces parse");
    let sequential_time = start.elapsed();

    let start = Instant::now();
    let parallel = aggregator.run_parallel(&traces).expect("traces parse");
    let parallel_time = start.elapsed();

    println!("Participants: {}", parallel.len());
    println!("Sequential:   {:?}", sequential_time);
    println!("Parallel:     {:?}", parallel_time);
    println!("Identical:    {}", sequential == parallel);

    let total: f64 = parallel.distances().map(|(_, d)| d).sum();
    println!("Mean walked:  {:.2} units", total / parallel.len() as f64);
}
