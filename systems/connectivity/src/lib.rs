#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Links every room into one navigable network.
//!
//! Callers run the steps in order: [`compute_nearest_points`],
//! [`link_isolated_rooms`], [`select_spawn`] and [`repair_reachability`].
//! The builder records the closest perimeter points between every pair of
//! rooms, carves a path from each isolated room to its nearest neighbour,
//! picks a spawn room and finally bridges every linked component that the
//! spawn room cannot reach yet. Carving transfers cell ownership through
//! [`RegionCatalog::absorb_disc`], so the grid stamps, region coordinate sets
//! and perimeters stay consistent after every path.

use std::collections::BTreeSet;

use cave_core::{CellCoord, CellType, RegionId};
use cave_world::{Grid, NearestPoint, RegionCatalog};
use log::{debug, warn};
use rand::Rng;

/// Upper bound on bridging attempts spent on a single unreachable room.
pub const MAX_REPAIR_ATTEMPTS: usize = 32;

/// Radius, in unsubdivided cells, that a spawn point keeps clear of walls.
pub const SPAWN_CLEARANCE: u32 = 1;

/// Spawn region together with the cell a player starts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spawn {
    region: RegionId,
    point: CellCoord,
}

impl Spawn {
    /// Creates a new spawn descriptor.
    #[must_use]
    pub const fn new(region: RegionId, point: CellCoord) -> Self {
        Self { region, point }
    }

    /// Room the spawn point lies in.
    #[must_use]
    pub const fn region(&self) -> RegionId {
        self.region
    }

    /// Cell the player starts on.
    #[must_use]
    pub const fn point(&self) -> CellCoord {
        self.point
    }
}

/// Radius of the disc stamped along a carved path on a grid subdivided
/// `subdivisions` times.
#[must_use]
pub const fn path_radius(subdivisions: u32) -> u32 {
    let shift = if subdivisions > 16 { 16 } else { subdivisions };
    1 << shift
}

/// Records, for every unordered pair of rooms, the closest pair of perimeter
/// cells into both rooms' nearest-point maps.
///
/// Ties keep the first pair found in row-major order.
pub fn compute_nearest_points(catalog: &mut RegionCatalog) {
    let rooms: Vec<RegionId> = catalog.room_ids().collect();

    for (position, &first) in rooms.iter().enumerate() {
        for &second in &rooms[position + 1..] {
            let (Some(a), Some(b)) = (catalog.region(first), catalog.region(second)) else {
                continue;
            };
            let Some((from, to, distance)) = closest_pair(a.perimeter(), b.perimeter()) else {
                continue;
            };
            if let Some(region) = catalog.region_mut(first) {
                region.record_nearest_point(second, NearestPoint::new(from, distance));
            }
            if let Some(region) = catalog.region_mut(second) {
                region.record_nearest_point(first, NearestPoint::new(to, distance));
            }
        }
    }
}

fn closest_pair(
    first: &BTreeSet<CellCoord>,
    second: &BTreeSet<CellCoord>,
) -> Option<(CellCoord, CellCoord, f32)> {
    let mut best: Option<(CellCoord, CellCoord, f32)> = None;
    for &from in first {
        for &to in second {
            let distance = from.distance(to);
            if best.map_or(true, |(_, _, current)| distance < current) {
                best = Some((from, to, distance));
            }
        }
    }
    best
}

/// Links every room that has no link yet to its nearest room. Returns the
/// number of paths carved.
pub fn link_isolated_rooms(grid: &mut Grid, catalog: &mut RegionCatalog, radius: u32) -> usize {
    let rooms: Vec<RegionId> = catalog.room_ids().collect();
    let mut carved = 0;

    for room in rooms {
        let Some(region) = catalog.region(room) else {
            continue;
        };
        if !region.links().is_empty() {
            continue;
        }
        let Some((nearest, _)) = region.nearest_region() else {
            continue;
        };
        if carve_path(grid, catalog, room, nearest, radius) {
            carved += 1;
        }
    }

    debug!("carved {carved} initial paths between {} rooms", catalog.room_count());
    carved
}

/// Carves a path between the recorded nearest points of two rooms and links
/// them.
///
/// The rasterised line is split at its midpoint: the first half is absorbed
/// into `from`, the rest into `to`, each point widened to a disc of `radius`.
/// Returns `false` when either room has no nearest-point record towards the
/// other, in which case nothing changes.
pub fn carve_path(
    grid: &mut Grid,
    catalog: &mut RegionCatalog,
    from: RegionId,
    to: RegionId,
    radius: u32,
) -> bool {
    let start = recorded_point(catalog, from, to);
    let end = recorded_point(catalog, to, from);
    let (Some(start), Some(end)) = (start, end) else {
        return false;
    };

    let line = bresenham_line(start, end);
    let split = line.len() / 2;
    for (index, &coord) in line.iter().enumerate() {
        let owner = if index < split { from } else { to };
        catalog.absorb_disc(grid, owner, coord, radius);
    }

    catalog.link(from, to);
    true
}

fn recorded_point(catalog: &RegionCatalog, owner: RegionId, towards: RegionId) -> Option<CellCoord> {
    catalog
        .region(owner)?
        .nearest_points()
        .get(&towards)
        .map(NearestPoint::coord)
}

/// Every cell on the 8-connected line from `from` to `to`, both included.
#[must_use]
pub fn bresenham_line(from: CellCoord, to: CellCoord) -> Vec<CellCoord> {
    let (mut x, mut y) = (i64::from(from.column()), i64::from(from.row()));
    let (end_x, end_y) = (i64::from(to.column()), i64::from(to.row()));
    let dx = (end_x - x).abs();
    let dy = -(end_y - y).abs();
    let step_x = if x < end_x { 1 } else { -1 };
    let step_y = if y < end_y { 1 } else { -1 };
    let mut error = dx + dy;

    let capacity = usize::try_from(dx.max(-dy) + 1).unwrap_or(0);
    let mut points = Vec::with_capacity(capacity);

    loop {
        let (Ok(column), Ok(row)) = (u32::try_from(x), u32::try_from(y)) else {
            break;
        };
        points.push(CellCoord::new(column, row));
        if x == end_x && y == end_y {
            break;
        }
        let doubled = 2 * error;
        if doubled >= dy {
            error += dy;
            x += step_x;
        }
        if doubled <= dx {
            error += dx;
            y += step_y;
        }
    }

    points
}

/// Picks the spawn room uniformly among non-empty rooms, then a cell inside
/// it whose `clearance` square lies entirely within the room. Falls back to the room's first
/// cell in row-major order when no cell has that much space.
pub fn select_spawn<R: Rng>(
    catalog: &RegionCatalog,
    clearance: u32,
    rng: &mut R,
) -> Option<Spawn> {
    let rooms: Vec<_> = catalog
        .rooms()
        .iter()
        .filter(|region| !region.is_empty())
        .collect();
    if rooms.is_empty() {
        return None;
    }

    let region = rooms[rng.gen_range(0..rooms.len())];
    let open: Vec<CellCoord> = region
        .cells()
        .iter()
        .copied()
        .filter(|&coord| has_clearance(region.cells(), coord, clearance))
        .collect();

    let point = if open.is_empty() {
        region.cells().first().copied()?
    } else {
        open[rng.gen_range(0..open.len())]
    };

    Some(Spawn::new(region.id(), point))
}

fn has_clearance(cells: &BTreeSet<CellCoord>, center: CellCoord, clearance: u32) -> bool {
    let reach = i32::try_from(clearance).unwrap_or(i32::MAX);
    (-reach..=reach).all(|dy| {
        (-reach..=reach).all(|dx| {
            center
                .offset(dx, dy)
                .is_some_and(|coord| cells.contains(&coord))
        })
    })
}

/// Bridges linked components until every room reaches `spawn`, spending at
/// most [`MAX_REPAIR_ATTEMPTS`] carves per room.
///
/// Each attempt carves the cheapest recorded pair leaving the room's linked
/// component, which merges two components. Returns the rooms still
/// unreachable once every attempt is spent.
pub fn repair_reachability(
    grid: &mut Grid,
    catalog: &mut RegionCatalog,
    spawn: RegionId,
    radius: u32,
) -> Vec<RegionId> {
    let rooms: Vec<RegionId> = catalog.room_ids().collect();
    let mut carved = 0;

    for &room in &rooms {
        let mut attempts = 0;
        while !catalog.reachable_from(spawn).contains(&room) {
            if attempts == MAX_REPAIR_ATTEMPTS {
                warn!("giving up on room {room:?} after {attempts} repair attempts");
                break;
            }
            attempts += 1;

            let component = catalog.reachable_from(room);
            let Some((from, to)) = cheapest_bridge(catalog, &component) else {
                warn!("room {room:?} has no recorded neighbour outside its component");
                break;
            };
            if !carve_path(grid, catalog, from, to, radius) {
                break;
            }
            carved += 1;
        }
    }
    debug!("reachability repair carved {carved} paths");

    let reachable = catalog.reachable_from(spawn);
    rooms
        .into_iter()
        .filter(|room| !reachable.contains(room))
        .collect()
}

fn cheapest_bridge(
    catalog: &RegionCatalog,
    component: &BTreeSet<RegionId>,
) -> Option<(RegionId, RegionId)> {
    let mut best: Option<(RegionId, RegionId, f32)> = None;
    for &member in component {
        let Some(region) = catalog.region(member) else {
            continue;
        };
        for (&other, point) in region.nearest_points() {
            if component.contains(&other) || other.cell_type() != CellType::Floor {
                continue;
            }
            if best.map_or(true, |(_, _, current)| point.distance() < current) {
                best = Some((member, other, point.distance()));
            }
        }
    }
    best.map(|(from, to, _)| (from, to))
}
