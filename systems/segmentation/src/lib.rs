#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Flood-fill partition of a refined grid into contiguous regions.
//!
//! Regions grow through cardinal neighbours only, so two floor cells that
//! touch diagonally belong to different rooms. Perimeters, by contrast, look
//! at all eight neighbours. Only interior cells are ever assigned; the border
//! ring stays unowned.

use std::collections::BTreeSet;

use cave_core::{CellCoord, CellType, RegionId};
use cave_world::{Grid, Region, RegionCatalog};
use log::debug;

/// Partitions every interior cell into numbered regions.
///
/// Existing stamps are discarded first. Cells are scanned in row-major order
/// and each unassigned cell seeds a new region whose number continues the
/// count for its cell type, starting at one.
pub fn segment(grid: &mut Grid) -> RegionCatalog {
    grid.clear_regions();

    let mut walls = Vec::new();
    let mut floors = Vec::new();
    let interior: Vec<_> = grid.interior_coords().collect();

    for coord in interior {
        let Some(cell) = grid.cell(coord) else {
            continue;
        };
        if cell.region().is_some() {
            continue;
        }

        let regions = match cell.cell_type() {
            CellType::Wall => &mut walls,
            CellType::Floor => &mut floors,
        };
        let id = RegionId::from_index(cell.cell_type(), regions.len());
        let cells = flood_fill(grid, coord, id);
        regions.push(Region::new(id, cells));
    }

    debug!(
        "segmented {} wall regions and {} rooms",
        walls.len(),
        floors.len()
    );

    let mut catalog = RegionCatalog::from_regions(walls, floors);
    catalog.recompute_perimeters(grid);
    catalog
}

/// Stamps `id` onto the unassigned cardinal component of matching type that
/// contains `start`, returning the visited coordinates.
pub fn flood_fill(grid: &mut Grid, start: CellCoord, id: RegionId) -> BTreeSet<CellCoord> {
    let mut visited = BTreeSet::new();
    let mut pending = vec![start];

    while let Some(coord) = pending.pop() {
        if !grid.is_interior(coord) {
            continue;
        }
        let Some(cell) = grid.cell_mut(coord) else {
            continue;
        };
        if cell.cell_type() != id.cell_type() || cell.region().is_some() {
            continue;
        }

        cell.set_region_number(id.number());
        let _ = visited.insert(coord);
        pending.extend(grid.neighbors4(coord));
    }

    visited
}
