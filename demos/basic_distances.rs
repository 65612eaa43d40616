//! Basic example of computing walked distances for a few participants.
//!
//! Run with: cargo run --example basic_distances

use trajectory_analysis::{
    write_distances, NavGraph, NavGraphConfig, Point3, StraightLineNavigator, TraceAggregator,
    TraceConfig, WaypointIndex,
};

fn main() {
    // Four waypoints around a wall running along x = 5
    let index = WaypointIndex::build([
        (1, Point3::new(0.0, 0.0, 0.0)),
        (2, Point3::new(10.0, 0.0, 0.0)),
        (3, Point3::new(10.0, 0.0, 10.0)),
        (4, Point3::new(0.0, 0.0, 10.0)),
    ]);

    // Walkable corridor: the only way from 1 to 2 is through the gap at (5, 0, -5)
    let graph = NavGraph::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(5.0, 0.0, -5.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 10.0),
            Point3::new(0.0, 0.0, 10.0),
        ],
        &[(0, 1), (1, 2), (2, 3), (3, 4)],
        NavGraphConfig::default(),
    )
    .expect("valid graph");

    let traces = [
        "P01,Group A,Route,\"1,2,3\"",
        "P02,Group A,4,3,2",
        "P03,Group B,1,2,99,4",
        "P04,Group B,1",
    ];

    let config = TraceConfig::default();

    println!("Walked Distance Example\n");

    println!("1. Straight lines:");
    let straight = TraceAggregator::new(&index, &StraightLineNavigator, &config)
        .run(traces)
        .expect("traces parse");
    for participant in &straight {
        println!("   Participant {}: {:.2}", participant.participant_id, participant.total_distance);
    }

    println!("\n2. Navigation graph:");
    let walked = TraceAggregator::new(&index, &graph, &config)
        .run(traces)
        .expect("traces parse");
    for participant in &walked {
        println!(
            "   Participant {}: {:.2} ({} legs)",
            participant.participant_id,
            participant.total_distance,
            participant.legs.len()
        );
    }

    println!("\n3. Diagnostics:");
    for diagnostic in walked.diagnostics() {
        println!(
            "   Participant {} leg {} ({} -> {}): {:?}",
            diagnostic.participant_id, diagnostic.leg_index, diagnostic.from, diagnostic.to, diagnostic.status
        );
    }

    println!("\n4. CSV output:");
    let mut csv = Vec::new();
    write_distances(&walked, &mut csv).expect("write to memory");
    print!("{}", String::from_utf8_lossy(&csv));
}
