//! Contiguous regions of equal cell type and the catalog that numbers them.
//!
//! A region owns a set of coordinates, never the cells themselves. The grid
//! carries the back-reference: every interior cell is stamped with the number
//! of the region that owns it, and [`RegionCatalog::id_at`] resolves that
//! stamp into a [`RegionId`]. Keeping the stamp and the coordinate sets in
//! sync is the catalog's job; [`RegionCatalog::verify`] checks it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use cave_core::{Cell, CellCoord, CellType, RegionId};
use thiserror::Error;

use crate::Grid;

/// Closest perimeter coordinate of one region towards another.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearestPoint {
    coord: CellCoord,
    distance: f32,
}

impl NearestPoint {
    /// Creates a new nearest-point record.
    #[must_use]
    pub const fn new(coord: CellCoord, distance: f32) -> Self {
        Self { coord, distance }
    }

    /// Perimeter coordinate of the region holding the record.
    #[must_use]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Euclidean distance to the other region's closest perimeter coordinate.
    #[must_use]
    pub const fn distance(&self) -> f32 {
        self.distance
    }
}

/// Maximal connected set of same-type cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    id: RegionId,
    cells: BTreeSet<CellCoord>,
    perimeter: BTreeSet<CellCoord>,
    links: BTreeSet<RegionId>,
    nearest: BTreeMap<RegionId, NearestPoint>,
}

impl Region {
    /// Creates a region over the provided coordinates. The perimeter stays
    /// empty until [`Region::recompute_perimeter`] runs.
    #[must_use]
    pub fn new(id: RegionId, cells: BTreeSet<CellCoord>) -> Self {
        Self {
            id,
            cells,
            perimeter: BTreeSet::new(),
            links: BTreeSet::new(),
            nearest: BTreeMap::new(),
        }
    }

    /// Identifier under which the region is stamped into the grid.
    #[must_use]
    pub const fn id(&self) -> RegionId {
        self.id
    }

    /// Cell type shared by every cell of the region.
    #[must_use]
    pub const fn cell_type(&self) -> CellType {
        self.id.cell_type()
    }

    /// Region number stamped into the grid.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.id.number()
    }

    /// Number of cells owned by the region.
    #[must_use]
    pub fn area(&self) -> usize {
        self.cells.len()
    }

    /// Whether the region owns no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Coordinates owned by the region, in row-major order.
    #[must_use]
    pub fn cells(&self) -> &BTreeSet<CellCoord> {
        &self.cells
    }

    /// Owned coordinates that touch a different region or cell type.
    #[must_use]
    pub fn perimeter(&self) -> &BTreeSet<CellCoord> {
        &self.perimeter
    }

    /// Regions a carved path connects this region to.
    #[must_use]
    pub fn links(&self) -> &BTreeSet<RegionId> {
        &self.links
    }

    /// Whether a path has been carved between this region and `other`.
    #[must_use]
    pub fn is_linked(&self, other: RegionId) -> bool {
        self.links.contains(&other)
    }

    /// Whether the region owns the coordinate.
    #[must_use]
    pub fn contains(&self, coord: CellCoord) -> bool {
        self.cells.contains(&coord)
    }

    /// Closest perimeter coordinates recorded towards other regions.
    #[must_use]
    pub fn nearest_points(&self) -> &BTreeMap<RegionId, NearestPoint> {
        &self.nearest
    }

    /// Records the closest perimeter coordinate towards `other`.
    pub fn record_nearest_point(&mut self, other: RegionId, point: NearestPoint) {
        let _ = self.nearest.insert(other, point);
    }

    /// Closest recorded region. Ties resolve to the lowest identifier.
    #[must_use]
    pub fn nearest_region(&self) -> Option<(RegionId, NearestPoint)> {
        closest(self.nearest.iter())
    }

    /// Closest recorded region that is not linked yet.
    #[must_use]
    pub fn nearest_unlinked_region(&self) -> Option<(RegionId, NearestPoint)> {
        closest(
            self.nearest
                .iter()
                .filter(|(other, _)| !self.links.contains(other)),
        )
    }

    /// Restamps every owned cell with a new region number.
    pub fn renumber(&mut self, grid: &mut Grid, number: u32) {
        self.id = RegionId::new(self.cell_type(), number);
        for &coord in &self.cells {
            if let Some(cell) = grid.cell_mut(coord) {
                cell.set_region_number(number);
            }
        }
    }

    /// Moves every cell of `other` into this region, stamping them with this
    /// region's type and number. `other` is left empty. Perimeters are not
    /// touched; callers recompute them once all merges are applied.
    pub fn absorb(&mut self, grid: &mut Grid, other: &mut Region) {
        for &coord in &other.cells {
            grid.set_cell(coord, Cell::owned_by(self.id));
        }
        self.cells.append(&mut other.cells);
        other.perimeter.clear();
    }

    /// Recomputes the perimeter from scratch and refreshes the grid's edge
    /// flags for every owned cell.
    pub fn recompute_perimeter(&mut self, grid: &mut Grid) {
        self.perimeter.clear();
        for &coord in &self.cells {
            let edge = is_perimeter_cell(grid, coord);
            if let Some(cell) = grid.cell_mut(coord) {
                cell.set_edge(edge);
            }
            if edge {
                let _ = self.perimeter.insert(coord);
            }
        }
    }

    /// Regions of any type stamped in the 8-neighbourhood of this region.
    ///
    /// Every owned cell is scanned, so the result stays exact while the
    /// recorded perimeter is stale.
    #[must_use]
    pub fn touching_regions(&self, grid: &Grid) -> BTreeSet<RegionId> {
        let mut touching = BTreeSet::new();
        for &coord in &self.cells {
            for neighbor in grid.neighbors8(coord) {
                let Some(other) = grid.cell(neighbor).and_then(|cell| cell.region()) else {
                    continue;
                };
                if other != self.id {
                    let _ = touching.insert(other);
                }
            }
        }
        touching
    }

    fn release(&mut self, coord: CellCoord) {
        let _ = self.cells.remove(&coord);
        let _ = self.perimeter.remove(&coord);
    }

    fn set_perimeter_membership(&mut self, coord: CellCoord, edge: bool) {
        if edge {
            let _ = self.perimeter.insert(coord);
        } else {
            let _ = self.perimeter.remove(&coord);
        }
    }
}

fn closest<'a>(
    candidates: impl Iterator<Item = (&'a RegionId, &'a NearestPoint)>,
) -> Option<(RegionId, NearestPoint)> {
    let mut best: Option<(RegionId, NearestPoint)> = None;
    for (&other, &point) in candidates {
        let replace = match best {
            None => true,
            Some((_, current)) => point.distance() < current.distance(),
        };
        if replace {
            best = Some((other, point));
        }
    }
    best
}

/// Whether the cell at `coord` has an in-bounds 8-neighbour of a different
/// type or region number.
#[must_use]
pub fn is_perimeter_cell(grid: &Grid, coord: CellCoord) -> bool {
    let Some(cell) = grid.cell(coord) else {
        return false;
    };
    grid.neighbors8(coord).any(|neighbor| {
        grid.cell(neighbor).is_some_and(|other| {
            other.cell_type() != cell.cell_type() || other.region_number() != cell.region_number()
        })
    })
}

/// Broken bookkeeping between the grid stamps and the region catalog.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A border cell is not an unassigned wall.
    #[error("border cell {0:?} is not an unassigned wall")]
    OpenBorder(CellCoord),
    /// A region is stored at a list position that disagrees with its number.
    #[error("region {id:?} is stored at index {index}")]
    MisnumberedRegion {
        /// Identifier the region carries.
        id: RegionId,
        /// Position the region occupies in its list.
        index: usize,
    },
    /// A region claims a cell whose grid stamp names a different owner.
    #[error("cell {coord:?} claimed by {claimed_by:?} is stamped {stamped:?}")]
    StampMismatch {
        /// Coordinate of the inconsistent cell.
        coord: CellCoord,
        /// Region listing the coordinate.
        claimed_by: RegionId,
        /// Owner recorded in the grid.
        stamped: Option<RegionId>,
    },
    /// Two regions claim the same cell.
    #[error("cell {0:?} is claimed by more than one region")]
    OverlappingRegions(CellCoord),
    /// An interior cell is owned by no region.
    #[error("interior cell {0:?} belongs to no region")]
    UnclaimedCell(CellCoord),
}

/// Regions of both cell types, indexed so that position `i` holds number `i + 1`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionCatalog {
    walls: Vec<Region>,
    floors: Vec<Region>,
}

impl RegionCatalog {
    /// Builds a catalog from per-type region lists.
    ///
    /// # Panics
    ///
    /// Panics when a region's number disagrees with its list position.
    #[must_use]
    pub fn from_regions(walls: Vec<Region>, floors: Vec<Region>) -> Self {
        let mut catalog = Self::default();
        catalog.replace(CellType::Wall, walls);
        catalog.replace(CellType::Floor, floors);
        catalog
    }

    /// Regions of the provided type in number order.
    #[must_use]
    pub fn regions(&self, cell_type: CellType) -> &[Region] {
        match cell_type {
            CellType::Wall => &self.walls,
            CellType::Floor => &self.floors,
        }
    }

    /// Floor regions in number order.
    #[must_use]
    pub fn rooms(&self) -> &[Region] {
        &self.floors
    }

    /// Number of floor regions.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.floors.len()
    }

    /// Identifiers of every floor region in number order.
    pub fn room_ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.floors.iter().map(Region::id)
    }

    /// Looks up a region by identifier.
    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions(id.cell_type())
            .get(id.index())
            .filter(|region| region.id() == id)
    }

    /// Looks up a region by identifier for mutation.
    pub fn region_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.list_mut(id.cell_type())
            .get_mut(id.index())
            .filter(|region| region.id() == id)
    }

    /// Resolves the grid stamp at the coordinate into a catalogued region.
    #[must_use]
    pub fn id_at(&self, grid: &Grid, coord: CellCoord) -> Option<RegionId> {
        let id = grid.cell(coord)?.region()?;
        self.region(id).map(Region::id)
    }

    /// Replaces every region of a type.
    ///
    /// # Panics
    ///
    /// Panics when a region's number disagrees with its list position.
    pub fn replace(&mut self, cell_type: CellType, regions: Vec<Region>) {
        for (index, region) in regions.iter().enumerate() {
            assert!(
                region.id() == RegionId::from_index(cell_type, index),
                "region {:?} cannot be stored at {cell_type:?} index {index}",
                region.id(),
            );
        }
        *self.list_mut(cell_type) = regions;
    }

    /// Removes and returns every region of a type.
    pub fn take(&mut self, cell_type: CellType) -> Vec<Region> {
        std::mem::take(self.list_mut(cell_type))
    }

    /// Total number of cells owned by regions of a type.
    #[must_use]
    pub fn total_area(&self, cell_type: CellType) -> usize {
        self.regions(cell_type).iter().map(Region::area).sum()
    }

    /// Records an undirected link between two regions.
    ///
    /// # Panics
    ///
    /// Panics when either region is missing or both identifiers are equal.
    pub fn link(&mut self, first: RegionId, second: RegionId) {
        assert!(first != second, "region {first:?} cannot link to itself");
        for (from, to) in [(first, second), (second, first)] {
            let region = self
                .region_mut(from)
                .unwrap_or_else(|| panic!("linking unknown region {from:?}"));
            let _ = region.links.insert(to);
        }
    }

    /// Every region reachable from `start` through links, `start` included.
    #[must_use]
    pub fn reachable_from(&self, start: RegionId) -> BTreeSet<RegionId> {
        let mut visited = BTreeSet::new();
        if self.region(start).is_none() {
            return visited;
        }

        let mut queue = VecDeque::new();
        let _ = visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let Some(region) = self.region(current) else {
                continue;
            };
            for &linked in region.links() {
                if visited.insert(linked) {
                    queue.push_back(linked);
                }
            }
        }

        visited
    }

    /// Recomputes the perimeter of every region in one pass.
    pub fn recompute_perimeters(&mut self, grid: &mut Grid) {
        grid.clear_edges();
        for region in self.walls.iter_mut().chain(self.floors.iter_mut()) {
            region.recompute_perimeter(grid);
        }
    }

    /// Stamps every interior cell within `radius` of `center` into region
    /// `into`, removing each from its previous owner. Perimeters of every
    /// region bordering the changed cells are refreshed in place.
    ///
    /// # Panics
    ///
    /// Panics when `into` is not catalogued.
    pub fn absorb_disc(&mut self, grid: &mut Grid, into: RegionId, center: CellCoord, radius: u32) {
        assert!(
            self.region(into).is_some(),
            "cannot absorb cells into unknown region {into:?}"
        );

        let reach = i32::try_from(radius).unwrap_or(i32::MAX);
        let reach_squared = i64::from(reach) * i64::from(reach);
        let mut claimed = Vec::new();

        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if i64::from(dx) * i64::from(dx) + i64::from(dy) * i64::from(dy) > reach_squared {
                    continue;
                }
                let Some(coord) = center.offset(dx, dy) else {
                    continue;
                };
                if !grid.is_interior(coord) {
                    continue;
                }
                let previous = grid.cell(coord).and_then(|cell| cell.region());
                if previous == Some(into) {
                    continue;
                }
                if let Some(owner) = previous.and_then(|id| self.region_mut(id)) {
                    owner.release(coord);
                }
                grid.set_cell(coord, Cell::owned_by(into));
                claimed.push(coord);
            }
        }

        if claimed.is_empty() {
            return;
        }

        if let Some(region) = self.region_mut(into) {
            region.cells.extend(claimed.iter().copied());
        }
        self.refresh_perimeters_around(grid, &claimed);
    }

    /// Checks that grid stamps and region coordinate sets describe the same
    /// partition of the interior and that the border is untouched.
    pub fn verify(&self, grid: &Grid) -> Result<(), InvariantViolation> {
        for coord in border_coords(grid) {
            if grid.cell(coord) != Some(Cell::WALL) {
                return Err(InvariantViolation::OpenBorder(coord));
            }
        }

        let mut claimed = BTreeSet::new();
        for cell_type in [CellType::Wall, CellType::Floor] {
            for (index, region) in self.regions(cell_type).iter().enumerate() {
                if region.id() != RegionId::from_index(cell_type, index) {
                    return Err(InvariantViolation::MisnumberedRegion {
                        id: region.id(),
                        index,
                    });
                }
                for &coord in region.cells() {
                    let stamped = grid.cell(coord).and_then(|cell| cell.region());
                    if stamped != Some(region.id()) {
                        return Err(InvariantViolation::StampMismatch {
                            coord,
                            claimed_by: region.id(),
                            stamped,
                        });
                    }
                    if !claimed.insert(coord) {
                        return Err(InvariantViolation::OverlappingRegions(coord));
                    }
                }
            }
        }

        for coord in grid.interior_coords() {
            if !claimed.contains(&coord) {
                return Err(InvariantViolation::UnclaimedCell(coord));
            }
        }

        Ok(())
    }

    fn list_mut(&mut self, cell_type: CellType) -> &mut Vec<Region> {
        match cell_type {
            CellType::Wall => &mut self.walls,
            CellType::Floor => &mut self.floors,
        }
    }

    fn refresh_perimeters_around(&mut self, grid: &mut Grid, changed: &[CellCoord]) {
        let mut affected = BTreeSet::new();
        for &coord in changed {
            let _ = affected.insert(coord);
            affected.extend(grid.neighbors8(coord));
        }

        for coord in affected {
            let Some(owner) = grid.cell(coord).and_then(|cell| cell.region()) else {
                continue;
            };
            let edge = is_perimeter_cell(grid, coord);
            if let Some(cell) = grid.cell_mut(coord) {
                cell.set_edge(edge);
            }
            if let Some(region) = self.region_mut(owner) {
                region.set_perimeter_membership(coord, edge);
            }
        }
    }
}

fn border_coords(grid: &Grid) -> impl Iterator<Item = CellCoord> + '_ {
    let width = grid.width();
    let height = grid.height();
    (0..height)
        .flat_map(move |row| (0..width).map(move |column| CellCoord::new(column, row)))
        .filter(move |&coord| grid.is_border(coord))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a grid from rows of `#` (wall) and `.` (floor) and stamps
    /// regions by hand: every floor cell belongs to room 1, every interior
    /// wall cell to wall region 1.
    fn single_room(rows: &[&str]) -> (Grid, RegionCatalog) {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mut grid = Grid::new(width, height);
        let mut floor_cells = BTreeSet::new();
        let mut wall_cells = BTreeSet::new();
        let room = RegionId::new(CellType::Floor, 1);
        let rock = RegionId::new(CellType::Wall, 1);

        for (row, line) in rows.iter().enumerate() {
            for (column, symbol) in line.chars().enumerate() {
                let coord = CellCoord::new(column as u32, row as u32);
                if !grid.is_interior(coord) {
                    continue;
                }
                if symbol == '.' {
                    grid.set_cell(coord, Cell::owned_by(room));
                    let _ = floor_cells.insert(coord);
                } else {
                    grid.set_cell(coord, Cell::owned_by(rock));
                    let _ = wall_cells.insert(coord);
                }
            }
        }

        let mut catalog = RegionCatalog::from_regions(
            vec![Region::new(rock, wall_cells)],
            vec![Region::new(room, floor_cells)],
        );
        catalog.recompute_perimeters(&mut grid);
        (grid, catalog)
    }

    #[test]
    fn perimeter_uses_diagonal_neighbours() {
        let (grid, catalog) = single_room(&[
            "#######", //
            "#.....#", //
            "#.....#", //
            "#.....#", //
            "#######",
        ]);
        let room = &catalog.rooms()[0];

        assert_eq!(room.area(), 15);
        assert_eq!(room.perimeter().len(), 12);
        assert!(grid.cell(CellCoord::new(1, 2)).is_some_and(|cell| cell.is_edge()));
        assert!(!grid.cell(CellCoord::new(3, 2)).is_some_and(|cell| cell.is_edge()));
    }

    #[test]
    fn interior_cells_are_not_perimeter() {
        let (grid, catalog) = single_room(&[
            "#######", //
            "#######", //
            "##...##", //
            "##...##", //
            "##...##", //
            "#######", //
            "#######",
        ]);
        let room = &catalog.rooms()[0];

        assert_eq!(room.perimeter().len(), 8);
        assert!(!room.perimeter().contains(&CellCoord::new(3, 3)));
        assert!(!grid.cell(CellCoord::new(3, 3)).is_some_and(|cell| cell.is_edge()));
    }

    #[test]
    fn verify_accepts_consistent_catalog() {
        let (grid, catalog) = single_room(&[
            "######", //
            "#..#.#", //
            "#....#", //
            "######",
        ]);
        assert_eq!(catalog.verify(&grid), Ok(()));
    }

    #[test]
    fn verify_rejects_stale_stamp() {
        let (mut grid, catalog) = single_room(&[
            "######", //
            "#..#.#", //
            "#....#", //
            "######",
        ]);
        grid.set_cell(CellCoord::new(1, 1), Cell::WALL);
        assert!(matches!(
            catalog.verify(&grid),
            Err(InvariantViolation::StampMismatch { .. })
        ));
    }

    #[test]
    fn absorb_disc_transfers_ownership() {
        let (mut grid, mut catalog) = single_room(&[
            "#########", //
            "#...#####", //
            "#...#####", //
            "#...#####", //
            "#########",
        ]);
        let room = RegionId::new(CellType::Floor, 1);
        let rock = RegionId::new(CellType::Wall, 1);
        let wall_area = catalog.region(rock).map(Region::area).unwrap_or_default();

        catalog.absorb_disc(&mut grid, room, CellCoord::new(5, 2), 1);

        let region = catalog.region(room).expect("room");
        assert_eq!(region.area(), 9 + 5);
        assert!(region.contains(CellCoord::new(6, 2)));
        assert_eq!(
            catalog.region(rock).map(Region::area),
            Some(wall_area - 5)
        );
        assert_eq!(catalog.id_at(&grid, CellCoord::new(5, 1)), Some(room));
        assert_eq!(catalog.verify(&grid), Ok(()));
    }

    #[test]
    fn absorb_disc_refreshes_perimeters_incrementally() {
        let (mut grid, mut catalog) = single_room(&[
            "#########", //
            "#...#####", //
            "#...#####", //
            "#...#####", //
            "#########",
        ]);
        let room = RegionId::new(CellType::Floor, 1);

        catalog.absorb_disc(&mut grid, room, CellCoord::new(5, 2), 1);
        let incremental = catalog.clone();
        catalog.recompute_perimeters(&mut grid);

        for cell_type in [CellType::Wall, CellType::Floor] {
            for (updated, rebuilt) in incremental
                .regions(cell_type)
                .iter()
                .zip(catalog.regions(cell_type))
            {
                assert_eq!(updated.perimeter(), rebuilt.perimeter());
            }
        }
    }

    #[test]
    fn absorb_disc_never_touches_the_border() {
        let (mut grid, mut catalog) = single_room(&[
            "######", //
            "#....#", //
            "#....#", //
            "######",
        ]);
        let room = RegionId::new(CellType::Floor, 1);

        catalog.absorb_disc(&mut grid, room, CellCoord::new(1, 1), 2);

        assert!(grid.is(CellCoord::new(0, 0), CellType::Wall));
        assert!(grid.is(CellCoord::new(0, 1), CellType::Wall));
        assert_eq!(catalog.verify(&grid), Ok(()));
    }

    #[test]
    fn links_are_undirected_and_reachability_is_transitive() {
        let rooms = (1..=4)
            .map(|number| Region::new(RegionId::new(CellType::Floor, number), BTreeSet::new()))
            .collect();
        let mut catalog = RegionCatalog::from_regions(Vec::new(), rooms);
        let id = |number| RegionId::new(CellType::Floor, number);

        catalog.link(id(1), id(2));
        catalog.link(id(2), id(3));

        assert!(catalog.region(id(2)).is_some_and(|region| region.is_linked(id(1))));
        let reachable = catalog.reachable_from(id(3));
        assert!(reachable.contains(&id(1)));
        assert!(!reachable.contains(&id(4)));
    }

    #[test]
    fn nearest_region_prefers_lowest_identifier_on_ties() {
        let mut region = Region::new(RegionId::new(CellType::Floor, 1), BTreeSet::new());
        let coord = CellCoord::new(1, 1);
        region.record_nearest_point(RegionId::new(CellType::Floor, 3), NearestPoint::new(coord, 2.0));
        region.record_nearest_point(RegionId::new(CellType::Floor, 2), NearestPoint::new(coord, 2.0));
        region.record_nearest_point(RegionId::new(CellType::Floor, 4), NearestPoint::new(coord, 5.0));
        region.links.extend([RegionId::new(CellType::Floor, 2)]);

        assert_eq!(
            region.nearest_region().map(|(id, _)| id.number()),
            Some(2)
        );
        assert_eq!(
            region.nearest_unlinked_region().map(|(id, _)| id.number()),
            Some(3)
        );
    }
}
