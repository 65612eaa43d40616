//! Example of building a density heat map from walked paths.
//!
//! Run with: cargo run --example heatmap_grid

use trajectory_analysis::{compute_route, DensityGrid, HeatmapConfig, Point3, StraightLineNavigator, WaypointIndex};

fn main() {
    let index = WaypointIndex::build([
        (1, Point3::new(1.0, 0.0, 1.0)),
        (2, Point3::new(8.0, 0.0, 1.0)),
        (3, Point3::new(8.0, 0.0, 8.0)),
        (4, Point3::new(1.0, 0.0, 8.0)),
    ]);

    let routes = [vec![1, 2, 3], vec![1, 2, 3, 4], vec![2, 3], vec![4, 1]];

    let grid = DensityGrid::new(HeatmapConfig::default());
    for route in &routes {
        let report = compute_route(route, &index, &StraightLineNavigator);
        for leg in &report.legs {
            grid.add_path(&leg.corners, 0.5);
        }
    }

    // A few raw position samples, one far outside the grid
    grid.add_samples([(4.5, 4.5), (4.6, 4.4), (-20.0, 50.0)]);

    let snapshot = grid.snapshot();
    println!("Heatmap Example\n");
    println!(
        "Grid: {}x{} cells of {} units, {} samples, max {} per cell\n",
        snapshot.grid_size, snapshot.grid_size, snapshot.cell_size, snapshot.total_samples, snapshot.max_count
    );

    // Rows printed top (high z) to bottom
    for z in (0..snapshot.grid_size).rev() {
        let row: String = (0..snapshot.grid_size)
            .map(|x| shade(snapshot.density(x, z).unwrap_or(0.0)))
            .collect();
        println!("   {}", row);
    }

    let corner = grid.query_cell(8.2, 1.3);
    println!(
        "\nCell ({}, {}): {} visits, density {:.2}",
        corner.x_index, corner.z_index, corner.visit_count, corner.density
    );
}

fn shade(density: f32) -> char {
    match density {
        d if d >= 0.75 => '#',
        d if d >= 0.5 => '+',
        d if d >= 0.25 => '-',
        d if d > 0.0 => '.',
        _ => ' ',
    }
}
