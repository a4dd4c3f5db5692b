#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Seeded random fill followed by cellular-automaton smoothing.
//!
//! The refiner is a pure function of the parameter set and the random stream
//! it is handed. Every smoothing pass reads the previous grid and writes a
//! fresh one, so no cell observes a neighbour updated in the same pass. The
//! border ring is never written and therefore stays solid.

use cave_core::{Cell, CellType, ParameterSet, RefinementStep};
use cave_world::Grid;
use log::debug;
use rand::Rng;

/// Grid produced by the refiner together with its resolution bookkeeping.
#[derive(Clone, Debug)]
pub struct RefinedGrid {
    grid: Grid,
    original_width: u32,
    subdivisions: u32,
}

impl RefinedGrid {
    /// Refined cells.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Consumes the result, yielding the refined cells.
    #[must_use]
    pub fn into_grid(self) -> Grid {
        self.grid
    }

    /// Number of resolution doublings applied.
    #[must_use]
    pub const fn subdivisions(&self) -> u32 {
        self.subdivisions
    }

    /// Scale that maps current grid units back to unsubdivided units,
    /// `original width / current width`.
    #[must_use]
    pub fn position_multiplier(&self) -> f32 {
        if self.grid.width() == 0 {
            return 1.0;
        }
        self.original_width as f32 / self.grid.width() as f32
    }
}

/// Runs the random fill and every refinement step of the parameter set.
///
/// The caller owns the random stream; identical streams yield identical grids.
pub fn generate<R: Rng>(params: &ParameterSet, rng: &mut R) -> RefinedGrid {
    let mut grid = Grid::new(params.width, params.height);
    random_fill(&mut grid, params.fill_density, rng);
    debug!(
        "filled {}x{} grid, {} floor cells",
        grid.width(),
        grid.height(),
        grid.count(CellType::Floor)
    );
    refine(grid, &params.refinement_steps)
}

/// Sets every interior cell to floor with probability `fill_density`,
/// visiting cells in row-major order.
pub fn random_fill<R: Rng>(grid: &mut Grid, fill_density: f32, rng: &mut R) {
    let interior: Vec<_> = grid.interior_coords().collect();
    for coord in interior {
        let cell_type = if rng.gen::<f32>() < fill_density {
            CellType::Floor
        } else {
            CellType::Wall
        };
        grid.set_cell(coord, Cell::new(cell_type));
    }
}

/// Applies the refinement steps in order, subdividing where requested.
#[must_use]
pub fn refine(grid: Grid, steps: &[RefinementStep]) -> RefinedGrid {
    let original_width = grid.width();
    let mut grid = grid;
    let mut subdivisions = 0;

    for (index, step) in steps.iter().enumerate() {
        if step.subdivide_first {
            grid = grid.subdivided(1);
            subdivisions += 1;
        }
        for _ in 0..step.iterations {
            grid = smooth(&grid, step);
        }
        debug!(
            "refinement step {index}: {}x{} grid, {} floor cells",
            grid.width(),
            grid.height(),
            grid.count(CellType::Floor)
        );
    }

    RefinedGrid {
        grid,
        original_width,
        subdivisions,
    }
}

/// Performs one smoothing pass into a fresh buffer.
///
/// A floor cell with fewer than `death_threshold` floor neighbours turns into
/// wall; a wall cell with more than `live_threshold` floor neighbours turns
/// into floor. Border cells are left as walls.
#[must_use]
pub fn smooth(grid: &Grid, step: &RefinementStep) -> Grid {
    let mut next = Grid::new(grid.width(), grid.height());

    for coord in grid.interior_coords() {
        let Some(cell) = grid.cell(coord) else {
            continue;
        };
        let floor_neighbors = grid.count_neighbors(coord, 1, CellType::Floor);
        let cell_type = match cell.cell_type() {
            CellType::Floor if floor_neighbors < step.death_threshold => CellType::Wall,
            CellType::Wall if floor_neighbors > step.live_threshold => CellType::Floor,
            unchanged => unchanged,
        };
        next.set_cell(coord, Cell::new(cell_type));
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use cave_core::CellCoord;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid_from(rows: &[&str]) -> Grid {
        let mut grid = Grid::new(rows[0].len() as u32, rows.len() as u32);
        for (row, line) in rows.iter().enumerate() {
            for (column, symbol) in line.chars().enumerate() {
                if symbol == '.' {
                    grid.set_cell(CellCoord::new(column as u32, row as u32), Cell::FLOOR);
                }
            }
        }
        grid
    }

    #[test]
    fn isolated_floor_cell_dies() {
        let grid = grid_from(&[
            "#####", //
            "#...#", //
            "##.##", //
            "#####", //
            "#####",
        ]);

        let next = smooth(&grid, &RefinementStep::new(1, 4, 4));

        assert_eq!(next.count(CellType::Floor), 0);
    }

    #[test]
    fn enclosed_wall_cell_comes_alive() {
        let grid = grid_from(&[
            "#######", //
            "#.....#", //
            "#.....#", //
            "#..#..#", //
            "#.....#", //
            "#.....#", //
            "#######",
        ]);

        let next = smooth(&grid, &RefinementStep::new(1, 4, 4));

        assert!(next.is(CellCoord::new(3, 3), CellType::Floor));
    }

    #[test]
    fn smoothing_reads_only_the_previous_generation() {
        // (2, 2) turns into floor; (3, 2) must still count it as wall.
        let grid = grid_from(&[
            "#######", //
            "#...###", //
            "#.#####", //
            "#...###", //
            "#######",
        ]);

        let next = smooth(&grid, &RefinementStep::new(1, 4, 4));

        assert!(next.is(CellCoord::new(2, 2), CellType::Floor));
        assert!(next.is(CellCoord::new(3, 2), CellType::Wall));
    }

    #[test]
    fn full_density_keeps_the_border_solid() {
        let params = ParameterSet {
            width: 20,
            height: 18,
            fill_density: 1.0,
            ..ParameterSet::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let refined = generate(&params, &mut rng);
        let grid = refined.grid();

        assert!(grid.count(CellType::Floor) > 0);
        for row in 0..grid.height() {
            for column in 0..grid.width() {
                let coord = CellCoord::new(column, row);
                if grid.is_border(coord) {
                    assert!(grid.is(coord, CellType::Wall), "border opened at {coord:?}");
                }
            }
        }
    }

    #[test]
    fn identical_streams_produce_identical_grids() {
        let params = ParameterSet {
            width: 40,
            height: 30,
            ..ParameterSet::default()
        };

        let first = generate(&params, &mut ChaCha8Rng::seed_from_u64(77));
        let second = generate(&params, &mut ChaCha8Rng::seed_from_u64(77));

        assert_eq!(first.grid(), second.grid());
    }

    #[test]
    fn subdivision_doubles_resolution_and_tracks_multiplier() {
        let step = RefinementStep::new(1, 4, 4);
        let params = ParameterSet {
            width: 16,
            height: 20,
            refinement_steps: vec![step, step.subdivided(), step.subdivided()],
            ..ParameterSet::default()
        };

        let refined = generate(&params, &mut ChaCha8Rng::seed_from_u64(3));

        assert_eq!(refined.subdivisions(), 2);
        assert_eq!((refined.grid().width(), refined.grid().height()), (64, 80));
        assert!((refined.position_multiplier() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_iterations_leave_the_fill_untouched() {
        let params = ParameterSet {
            width: 24,
            height: 24,
            refinement_steps: vec![RefinementStep::new(0, 4, 4)],
            ..ParameterSet::default()
        };
        let mut fill_rng = ChaCha8Rng::seed_from_u64(5);
        let mut expected = Grid::new(24, 24);
        random_fill(&mut expected, params.fill_density, &mut fill_rng);

        let refined = generate(&params, &mut ChaCha8Rng::seed_from_u64(5));

        assert_eq!(refined.grid(), &expected);
    }
}
