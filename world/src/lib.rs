#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative cell storage for a generated cave.
//!
//! The [`Grid`] owns every [`Cell`] in a dense row-major buffer. Regions never
//! point into the buffer; they hold coordinate sets and find their cells
//! again through the stamped region number, see [`region::RegionCatalog`].

use cave_core::{Cell, CellCoord, CellType};

pub mod region;

pub use region::{is_perimeter_cell, InvariantViolation, NearestPoint, Region, RegionCatalog};

const NEIGHBOR_OFFSETS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

const NEIGHBOR_OFFSETS_4: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Dense `height × width` cell storage with an always-solid border ring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Allocates a grid filled with unassigned wall cells.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let capacity_u64 = u64::from(width) * u64::from(height);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            width,
            height,
            cells: vec![Cell::WALL; capacity],
        }
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Dense cells stored in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Iterator over the rows of the grid, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        let width = usize::try_from(self.width).unwrap_or(usize::MAX).max(1);
        self.cells.chunks(width)
    }

    /// Reports whether the coordinate lies within the grid.
    #[must_use]
    pub const fn contains(&self, coord: CellCoord) -> bool {
        coord.column() < self.width && coord.row() < self.height
    }

    /// Reports whether the coordinate lies on the outer ring.
    #[must_use]
    pub fn is_border(&self, coord: CellCoord) -> bool {
        self.contains(coord)
            && (coord.column() == 0
                || coord.row() == 0
                || coord.column() + 1 == self.width
                || coord.row() + 1 == self.height)
    }

    /// Reports whether the coordinate lies strictly inside the border ring.
    #[must_use]
    pub fn is_interior(&self, coord: CellCoord) -> bool {
        self.contains(coord) && !self.is_border(coord)
    }

    /// Returns a copy of the cell at the coordinate.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<Cell> {
        self.index(coord)
            .and_then(|index| self.cells.get(index).copied())
    }

    /// Returns a mutable handle to the cell at the coordinate.
    pub fn cell_mut(&mut self, coord: CellCoord) -> Option<&mut Cell> {
        let index = self.index(coord)?;
        self.cells.get_mut(index)
    }

    /// Overwrites the cell at the coordinate. Out-of-bounds writes are ignored.
    pub fn set_cell(&mut self, coord: CellCoord, cell: Cell) {
        if let Some(slot) = self.cell_mut(coord) {
            *slot = cell;
        }
    }

    /// Reports whether the cell at the coordinate has the provided type.
    #[must_use]
    pub fn is(&self, coord: CellCoord, cell_type: CellType) -> bool {
        self.cell(coord).is_some_and(|cell| cell.is(cell_type))
    }

    /// Interior coordinates in row-major order.
    pub fn interior_coords(&self) -> impl Iterator<Item = CellCoord> {
        let width = self.width;
        let height = self.height;
        (1..height.saturating_sub(1)).flat_map(move |row| {
            (1..width.saturating_sub(1)).map(move |column| CellCoord::new(column, row))
        })
    }

    /// In-bounds cardinal and diagonal neighbours of the coordinate.
    pub fn neighbors8(&self, coord: CellCoord) -> impl Iterator<Item = CellCoord> + '_ {
        NEIGHBOR_OFFSETS_8
            .iter()
            .filter_map(move |&(dx, dy)| coord.offset(dx, dy))
            .filter(move |neighbor| self.contains(*neighbor))
    }

    /// In-bounds cardinal neighbours of the coordinate.
    pub fn neighbors4(&self, coord: CellCoord) -> impl Iterator<Item = CellCoord> + '_ {
        NEIGHBOR_OFFSETS_4
            .iter()
            .filter_map(move |&(dx, dy)| coord.offset(dx, dy))
            .filter(move |neighbor| self.contains(*neighbor))
    }

    /// Counts cells of `cell_type` within the square of `radius` around the
    /// coordinate, excluding the coordinate itself. Out-of-bounds positions
    /// never match.
    #[must_use]
    pub fn count_neighbors(&self, coord: CellCoord, radius: u32, cell_type: CellType) -> u32 {
        let radius = i32::try_from(radius).unwrap_or(i32::MAX);
        let mut found = 0;

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let Some(neighbor) = coord.offset(dx, dy) else {
                    continue;
                };
                if self.is(neighbor, cell_type) {
                    found += 1;
                }
            }
        }

        found
    }

    /// Returns a copy with every cell replicated into a `2^times × 2^times`
    /// block. Region stamps are copied verbatim.
    #[must_use]
    pub fn subdivided(&self, times: u32) -> Self {
        let factor = 1_u32 << times.min(16);
        let mut scaled = Self::new(self.width * factor, self.height * factor);

        for row in 0..self.height {
            for column in 0..self.width {
                let Some(cell) = self.cell(CellCoord::new(column, row)) else {
                    continue;
                };
                for scaled_row in row * factor..(row + 1) * factor {
                    for scaled_column in column * factor..(column + 1) * factor {
                        scaled.set_cell(CellCoord::new(scaled_column, scaled_row), cell);
                    }
                }
            }
        }

        scaled
    }

    /// Resets every region stamp and perimeter flag, keeping cell types.
    pub fn clear_regions(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::new(cell.cell_type());
        }
    }

    /// Clears the perimeter flag of every cell.
    pub fn clear_edges(&mut self) {
        for cell in &mut self.cells {
            cell.set_edge(false);
        }
    }

    /// Number of cells with the provided type.
    #[must_use]
    pub fn count(&self, cell_type: CellType) -> usize {
        self.cells.iter().filter(|cell| cell.is(cell_type)).count()
    }

    fn index(&self, coord: CellCoord) -> Option<usize> {
        if !self.contains(coord) {
            return None;
        }
        let row = usize::try_from(coord.row()).ok()?;
        let column = usize::try_from(coord.column()).ok()?;
        let width = usize::try_from(self.width).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }
}
