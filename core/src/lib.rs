#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the cave generator.
//!
//! This crate defines the value types every stage of the pipeline agrees on.
//! The [`ParameterSet`] describes a generation run, [`Cell`] values are the
//! dense payload of the grid, and [`RegionId`] names a contiguous region by
//! its cell type and stamped region number. Systems never hold references
//! into each other's storage; they exchange coordinates and identifiers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest permitted width or height of a map, border included.
pub const MIN_DIMENSION: u32 = 16;

/// Largest permitted width or height once every subdivision has been applied.
pub const MAX_SUBDIVIDED_DIMENSION: u32 = 8_192;

/// Largest neighbour count a cell can observe in an 8-neighbourhood, minus one.
pub const MAX_THRESHOLD: u32 = 7;

/// Upper bound on smoothing iterations for a single refinement step.
pub const MAX_ITERATIONS: u32 = 20;

/// Classification of a single cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellType {
    /// Solid rock that blocks movement.
    Wall,
    /// Open ground that can be walked on.
    Floor,
}

impl CellType {
    /// Returns the other cell type.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Wall => Self::Floor,
            Self::Floor => Self::Wall,
        }
    }
}

/// Dense payload stored for every grid position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    cell_type: CellType,
    region_number: u32,
    edge: bool,
}

impl Cell {
    /// Region number carried by cells that no region has claimed yet.
    pub const UNASSIGNED: u32 = 0;

    /// Unassigned wall cell, the value every fresh grid is filled with.
    pub const WALL: Self = Self::new(CellType::Wall);

    /// Unassigned floor cell.
    pub const FLOOR: Self = Self::new(CellType::Floor);

    /// Creates an unassigned, non-edge cell of the provided type.
    #[must_use]
    pub const fn new(cell_type: CellType) -> Self {
        Self {
            cell_type,
            region_number: Self::UNASSIGNED,
            edge: false,
        }
    }

    /// Creates a cell stamped with the identity of the provided region.
    #[must_use]
    pub const fn owned_by(region: RegionId) -> Self {
        Self {
            cell_type: region.cell_type(),
            region_number: region.number(),
            edge: false,
        }
    }

    /// Type of the cell.
    #[must_use]
    pub const fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Number of the region owning the cell, or [`Cell::UNASSIGNED`].
    #[must_use]
    pub const fn region_number(&self) -> u32 {
        self.region_number
    }

    /// Whether the cell lies on the perimeter of its region.
    #[must_use]
    pub const fn is_edge(&self) -> bool {
        self.edge
    }

    /// Identifier of the owning region, if the cell has been assigned one.
    #[must_use]
    pub const fn region(&self) -> Option<RegionId> {
        if self.region_number == Self::UNASSIGNED {
            None
        } else {
            Some(RegionId::new(self.cell_type, self.region_number))
        }
    }

    /// Reports whether the cell has the provided type.
    #[must_use]
    pub fn is(&self, cell_type: CellType) -> bool {
        self.cell_type == cell_type
    }

    /// Replaces the cell type, keeping the region stamp untouched.
    pub fn set_cell_type(&mut self, cell_type: CellType) {
        self.cell_type = cell_type;
    }

    /// Replaces the region number, keeping the cell type untouched.
    pub fn set_region_number(&mut self, region_number: u32) {
        self.region_number = region_number;
    }

    /// Marks or clears the perimeter flag.
    pub fn set_edge(&mut self, edge: bool) {
        self.edge = edge;
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::WALL
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    row: u32,
    column: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { row, column }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Computes the Euclidean distance between two cell coordinates.
    #[must_use]
    pub fn distance(self, other: CellCoord) -> f32 {
        let dx = self.column().abs_diff(other.column()) as f32;
        let dy = self.row().abs_diff(other.row()) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns the coordinate shifted by the provided signed offsets, if it
    /// stays within non-negative space.
    #[must_use]
    pub fn offset(self, delta_column: i32, delta_row: i32) -> Option<CellCoord> {
        let column = self.column.checked_add_signed(delta_column)?;
        let row = self.row.checked_add_signed(delta_row)?;
        Some(CellCoord::new(column, row))
    }
}

/// Identifies a region by its cell type and stamped region number.
///
/// Region numbers are counted separately per cell type and start at one, so
/// the region stored at index `i` of a type's list carries number `i + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId {
    cell_type: CellType,
    number: u32,
}

impl RegionId {
    /// Creates a new region identifier.
    #[must_use]
    pub const fn new(cell_type: CellType, number: u32) -> Self {
        Self { cell_type, number }
    }

    /// Creates the identifier of the region stored at `index` in its type's list.
    #[must_use]
    pub const fn from_index(cell_type: CellType, index: usize) -> Self {
        Self {
            cell_type,
            number: index as u32 + 1,
        }
    }

    /// Cell type shared by every cell of the region.
    #[must_use]
    pub const fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Region number stamped into the grid.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Position of the region inside its type's list.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.number.saturating_sub(1) as usize
    }
}

/// One stage of cellular-automaton smoothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementStep {
    /// Number of smoothing passes applied after the optional subdivision.
    pub iterations: u32,
    /// A wall cell with more floor neighbours than this turns into floor.
    pub live_threshold: u32,
    /// A floor cell with fewer floor neighbours than this turns into wall.
    pub death_threshold: u32,
    /// Doubles the grid resolution before smoothing when set.
    pub subdivide_first: bool,
}

impl RefinementStep {
    /// Creates a refinement step without subdivision.
    #[must_use]
    pub const fn new(iterations: u32, live_threshold: u32, death_threshold: u32) -> Self {
        Self {
            iterations,
            live_threshold,
            death_threshold,
            subdivide_first: false,
        }
    }

    /// Returns a copy of the step that subdivides the grid before smoothing.
    #[must_use]
    pub const fn subdivided(self) -> Self {
        Self {
            subdivide_first: true,
            ..self
        }
    }
}

impl Default for RefinementStep {
    fn default() -> Self {
        Self::new(5, 4, 4)
    }
}

/// Immutable generation configuration.
///
/// The host constructs a new set for every run; the generator only reads it.
/// Missing fields deserialize to their [`Default`] values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    /// Seed for the deterministic random stream.
    pub seed: i64,
    /// Number of columns before subdivision, border included.
    pub width: u32,
    /// Number of rows before subdivision, border included.
    pub height: u32,
    /// Extrusion height used by geometry consumers; the generator ignores it.
    pub wall_height: f32,
    /// Probability that an interior cell starts out as floor.
    pub fill_density: f32,
    /// Smoothing stages applied in order.
    pub refinement_steps: Vec<RefinementStep>,
    /// Floor regions smaller than this (before subdivision scaling) are removed.
    pub min_room_area: u32,
    /// Wall regions smaller than this (before subdivision scaling) are removed.
    pub min_wall_area: u32,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 128,
            height: 128,
            wall_height: 5.0,
            fill_density: 0.5,
            refinement_steps: vec![RefinementStep::default()],
            min_room_area: 24,
            min_wall_area: 12,
        }
    }
}

impl ParameterSet {
    /// Checks every bound the generator relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (axis, value) in [(Axis::Width, self.width), (Axis::Height, self.height)] {
            if value < MIN_DIMENSION {
                return Err(ConfigError::DimensionTooSmall { axis, value });
            }
        }

        if !self.fill_density.is_finite() || !(0.0..=1.0).contains(&self.fill_density) {
            return Err(ConfigError::FillDensityOutOfRange(self.fill_density));
        }

        if !self.wall_height.is_finite() || self.wall_height < 0.0 {
            return Err(ConfigError::InvalidWallHeight(self.wall_height));
        }

        if self.refinement_steps.is_empty() {
            return Err(ConfigError::NoRefinementSteps);
        }

        for (index, step) in self.refinement_steps.iter().enumerate() {
            for threshold in [step.live_threshold, step.death_threshold] {
                if !(1..=MAX_THRESHOLD).contains(&threshold) {
                    return Err(ConfigError::ThresholdOutOfRange {
                        step: index,
                        threshold,
                    });
                }
            }
            if step.iterations > MAX_ITERATIONS {
                return Err(ConfigError::TooManyIterations {
                    step: index,
                    iterations: step.iterations,
                });
            }
        }

        let subdivisions = self.total_subdivisions();
        for (axis, value) in [(Axis::Width, self.width), (Axis::Height, self.height)] {
            let scaled = subdivided_size(value, subdivisions);
            if scaled.map_or(true, |scaled| scaled > MAX_SUBDIVIDED_DIMENSION) {
                return Err(ConfigError::DimensionTooLarge {
                    axis,
                    value,
                    subdivisions,
                });
            }
        }

        Ok(())
    }

    /// Number of refinement steps that subdivide the grid.
    #[must_use]
    pub fn total_subdivisions(&self) -> u32 {
        self.refinement_steps
            .iter()
            .filter(|step| step.subdivide_first)
            .count() as u32
    }

    /// Width of the grid once every subdivision has been applied.
    #[must_use]
    pub fn subdivided_width(&self) -> u32 {
        subdivided_size(self.width, self.total_subdivisions()).unwrap_or(u32::MAX)
    }

    /// Height of the grid once every subdivision has been applied.
    #[must_use]
    pub fn subdivided_height(&self) -> u32 {
        subdivided_size(self.height, self.total_subdivisions()).unwrap_or(u32::MAX)
    }

    /// Minimum room area expressed in subdivided cells.
    #[must_use]
    pub fn scaled_min_room_area(&self) -> usize {
        scaled_area(self.min_room_area, self.total_subdivisions())
    }

    /// Minimum wall area expressed in subdivided cells.
    #[must_use]
    pub fn scaled_min_wall_area(&self) -> usize {
        scaled_area(self.min_wall_area, self.total_subdivisions())
    }

    /// Minimum area for regions of the provided type, in subdivided cells.
    #[must_use]
    pub fn scaled_min_area(&self, cell_type: CellType) -> usize {
        match cell_type {
            CellType::Floor => self.scaled_min_room_area(),
            CellType::Wall => self.scaled_min_wall_area(),
        }
    }
}

/// Doubles `value` once per subdivision, returning `None` on overflow.
#[must_use]
pub fn subdivided_size(value: u32, subdivisions: u32) -> Option<u32> {
    let factor = 1_u32.checked_shl(subdivisions)?;
    value.checked_mul(factor)
}

fn scaled_area(area: u32, subdivisions: u32) -> usize {
    let area = usize::try_from(area).unwrap_or(usize::MAX);
    area.saturating_mul(1_usize << subdivisions.min(usize::BITS - 1))
}

/// Grid axis named by a configuration error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Column count.
    Width,
    /// Row count.
    Height,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Width => f.write_str("width"),
            Self::Height => f.write_str("height"),
        }
    }
}

/// Reasons a [`ParameterSet`] is rejected before generation begins.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// A dimension cannot hold an interior behind the one-cell border.
    #[error("{axis} {value} is below the minimum of {}", MIN_DIMENSION)]
    DimensionTooSmall {
        /// Offending axis.
        axis: Axis,
        /// Requested size.
        value: u32,
    },
    /// A dimension grows past the supported size once subdivided.
    #[error("{axis} {value} exceeds {} after {subdivisions} subdivisions", MAX_SUBDIVIDED_DIMENSION)]
    DimensionTooLarge {
        /// Offending axis.
        axis: Axis,
        /// Requested size before subdivision.
        value: u32,
        /// Number of subdividing refinement steps.
        subdivisions: u32,
    },
    /// The fill density is not a probability.
    #[error("fill density {0} is outside [0, 1]")]
    FillDensityOutOfRange(f32),
    /// The wall height is negative or not a number.
    #[error("wall height {0} must be a finite, non-negative value")]
    InvalidWallHeight(f32),
    /// No smoothing stage was configured.
    #[error("at least one refinement step is required")]
    NoRefinementSteps,
    /// A live or death threshold cannot be met by an 8-neighbourhood.
    #[error("refinement step {step} uses threshold {threshold}, expected 1..={}", MAX_THRESHOLD)]
    ThresholdOutOfRange {
        /// Index of the offending step.
        step: usize,
        /// Offending threshold.
        threshold: u32,
    },
    /// A refinement step requests more passes than supported.
    #[error("refinement step {step} requests {iterations} iterations, expected at most {}", MAX_ITERATIONS)]
    TooManyIterations {
        /// Index of the offending step.
        step: usize,
        /// Requested iteration count.
        iterations: u32,
    },
}

/// Failures that prevent a generation run from starting.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GenerationError {
    /// The parameter set violates a bound; nothing was generated.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
}

/// Recoverable conditions reported alongside a finished map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationWarning {
    /// Refinement left no floor at all; the room catalog is empty.
    DegenerateResult,
    /// Reachability repair exhausted its attempts for some rooms.
    PartiallyReachable {
        /// Rooms that cannot reach the spawn region through links.
        unreachable: Vec<RegionId>,
    },
}

impl std::fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateResult => f.write_str("no floor regions survived generation"),
            Self::PartiallyReachable { unreachable } => {
                write!(f, "{} room(s) unreachable from spawn:", unreachable.len())?;
                for region in unreachable {
                    write!(f, " {}", region.number())?;
                }
                Ok(())
            }
        }
    }
}
