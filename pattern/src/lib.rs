#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! End-to-end cave generation.
//!
//! [`MapPattern::generate`] validates a [`ParameterSet`], seeds one random
//! stream from it and runs every stage in order: fill, refinement,
//! segmentation, cleanup, initial linking and reachability repair. The
//! finished pattern is read-only; regenerating means calling `generate`
//! again with a new parameter set.

use std::collections::BTreeSet;

use cave_core::{
    CellCoord, CellType, GenerationError, GenerationWarning, ParameterSet, RegionId,
};
use cave_system_connectivity::{path_radius, Spawn, SPAWN_CLEARANCE};
use cave_world::{Grid, Region, RegionCatalog};
use glam::{Vec2, Vec3};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Progress of a generation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Grid allocated, every cell still wall.
    Unfilled,
    /// Interior randomly seeded with floor.
    Filled,
    /// Every refinement step applied.
    Refined,
    /// Interior partitioned into regions.
    Segmented,
    /// Undersized regions folded away.
    Cleaned,
    /// Every room linked to at least its nearest neighbour.
    InitiallyLinked,
    /// Every room reaches the spawn room.
    FullyReachable,
    /// Repair gave up on at least one room.
    PartiallyReachable,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Unfilled => "unfilled",
            Self::Filled => "filled",
            Self::Refined => "refined",
            Self::Segmented => "segmented",
            Self::Cleaned => "cleaned",
            Self::InitiallyLinked => "initially linked",
            Self::FullyReachable => "fully reachable",
            Self::PartiallyReachable => "partially reachable",
        };
        f.write_str(label)
    }
}

/// Finished cave: grid, regions and spawn, plus the world mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct MapPattern {
    params: ParameterSet,
    grid: Grid,
    regions: RegionCatalog,
    spawn: Option<Spawn>,
    subdivisions: u32,
    position_multiplier: f32,
    stage: Stage,
    warnings: Vec<GenerationWarning>,
}

impl MapPattern {
    /// Runs the full pipeline for `params`.
    ///
    /// Fails only when the parameter set is invalid. Degenerate or partially
    /// connected caves are still returned and carry a warning.
    pub fn generate(params: ParameterSet) -> Result<Self, GenerationError> {
        params.validate()?;

        let mut stage = Stage::Unfilled;
        info!(
            "generating {}x{} cave from seed {}",
            params.width, params.height, params.seed
        );
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed as u64);

        let mut grid = Grid::new(params.width, params.height);
        cave_system_automaton::random_fill(&mut grid, params.fill_density, &mut rng);
        advance(&mut stage, Stage::Filled);

        let refined = cave_system_automaton::refine(grid, &params.refinement_steps);
        let subdivisions = refined.subdivisions();
        let position_multiplier = refined.position_multiplier();
        let mut grid = refined.into_grid();
        advance(&mut stage, Stage::Refined);

        let mut regions = cave_system_segmentation::segment(&mut grid);
        advance(&mut stage, Stage::Segmented);

        let report = cave_system_cleanup::clean(&mut grid, &mut regions, &params);
        debug!(
            "cleanup merged {} regions, {} unresolved",
            report.merged(),
            report.unresolved()
        );
        advance(&mut stage, Stage::Cleaned);

        let radius = path_radius(subdivisions);
        cave_system_connectivity::compute_nearest_points(&mut regions);
        let _ = cave_system_connectivity::link_isolated_rooms(&mut grid, &mut regions, radius);
        advance(&mut stage, Stage::InitiallyLinked);

        let mut warnings = Vec::new();
        let spawn = cave_system_connectivity::select_spawn(
            &regions,
            SPAWN_CLEARANCE * radius,
            &mut rng,
        );

        match spawn {
            Some(spawn) => {
                let unreachable = cave_system_connectivity::repair_reachability(
                    &mut grid,
                    &mut regions,
                    spawn.region(),
                    radius,
                );
                if unreachable.is_empty() {
                    advance(&mut stage, Stage::FullyReachable);
                } else {
                    warn!("{} rooms unreachable from spawn", unreachable.len());
                    warnings.push(GenerationWarning::PartiallyReachable { unreachable });
                    advance(&mut stage, Stage::PartiallyReachable);
                }
            }
            None => {
                warn!("no floor regions survived; the cave is empty");
                warnings.push(GenerationWarning::DegenerateResult);
                advance(&mut stage, Stage::FullyReachable);
            }
        }

        debug_assert_eq!(regions.verify(&grid), Ok(()));

        Ok(Self {
            params,
            grid,
            regions,
            spawn,
            subdivisions,
            position_multiplier,
            stage,
            warnings,
        })
    }

    /// Parameter set the cave was generated from.
    #[must_use]
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Refined cell grid at its final resolution.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Number of columns of the final grid.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.grid.width()
    }

    /// Number of rows of the final grid.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.grid.height()
    }

    /// Wall and floor regions of the finished cave.
    #[must_use]
    pub fn regions(&self) -> &RegionCatalog {
        &self.regions
    }

    /// Region owning the cell, if any.
    #[must_use]
    pub fn region_at(&self, coord: CellCoord) -> Option<&Region> {
        let id = self.regions.id_at(&self.grid, coord)?;
        self.regions.region(id)
    }

    /// Room the player spawns in; `None` for a degenerate cave.
    #[must_use]
    pub fn spawn_region(&self) -> Option<RegionId> {
        self.spawn.map(|spawn| spawn.region())
    }

    /// Cell the player spawns on; `None` for a degenerate cave.
    #[must_use]
    pub fn spawn_point(&self) -> Option<CellCoord> {
        self.spawn.map(|spawn| spawn.point())
    }

    /// Number of resolution doublings applied during refinement.
    #[must_use]
    pub const fn subdivisions(&self) -> u32 {
        self.subdivisions
    }

    /// Scale from final grid units to unsubdivided world units, `2^-subdivisions`.
    #[must_use]
    pub const fn position_multiplier(&self) -> f32 {
        self.position_multiplier
    }

    /// Last stage the run reached.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Recoverable conditions raised during generation.
    #[must_use]
    pub fn warnings(&self) -> &[GenerationWarning] {
        &self.warnings
    }

    /// Rooms connected to the spawn room through carved links.
    #[must_use]
    pub fn reachability(&self) -> BTreeSet<RegionId> {
        self.spawn
            .map(|spawn| self.regions.reachable_from(spawn.region()))
            .unwrap_or_default()
    }

    /// Whether the cell at the coordinate is open floor.
    #[must_use]
    pub fn is_floor(&self, coord: CellCoord) -> bool {
        self.grid.is(coord, CellType::Floor)
    }

    /// World position of a cell corner: x follows columns, z follows rows.
    #[must_use]
    pub fn coord_to_pos(&self, coord: CellCoord) -> Vec3 {
        Vec3::new(
            coord.column() as f32 * self.position_multiplier,
            0.0,
            coord.row() as f32 * self.position_multiplier,
        )
    }

    /// World position of the spawn point.
    #[must_use]
    pub fn spawn_position(&self) -> Option<Vec3> {
        self.spawn_point().map(|coord| self.coord_to_pos(coord))
    }

    /// Size of the cave in world units along x and z.
    #[must_use]
    pub fn world_extent(&self) -> Vec2 {
        Vec2::new(
            self.grid.width() as f32 * self.position_multiplier,
            self.grid.height() as f32 * self.position_multiplier,
        )
    }

    /// Normalises a world position into `[0, 1]` texture space over the cave.
    #[must_use]
    pub fn pos_to_uv01(&self, pos: Vec3) -> Vec2 {
        Vec2::new(pos.x, pos.z) / self.world_extent()
    }

    /// Inverse of [`MapPattern::pos_to_uv01`], on the ground plane.
    #[must_use]
    pub fn uv01_to_pos(&self, uv: Vec2) -> Vec3 {
        let planar = uv * self.world_extent();
        Vec3::new(planar.x, 0.0, planar.y)
    }

    /// Cell containing the world position, or `None` outside the grid.
    #[must_use]
    pub fn pos_to_coord(&self, pos: Vec3) -> Option<CellCoord> {
        let column = (pos.x / self.position_multiplier).floor();
        let row = (pos.z / self.position_multiplier).floor();
        if !column.is_finite() || !row.is_finite() || column < 0.0 || row < 0.0 {
            return None;
        }
        let coord = CellCoord::new(column as u32, row as u32);
        self.grid.contains(coord).then_some(coord)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    info!("stage {stage} -> {next}");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels_are_lowercase() {
        assert_eq!(Stage::InitiallyLinked.to_string(), "initially linked");
        assert_eq!(Stage::PartiallyReachable.to_string(), "partially reachable");
    }

    #[test]
    fn pos_to_coord_rejects_positions_outside_the_grid() {
        let pattern = MapPattern::generate(ParameterSet {
            width: 20,
            height: 16,
            ..ParameterSet::default()
        })
        .expect("valid parameters");

        assert_eq!(pattern.pos_to_coord(Vec3::new(-0.5, 0.0, 3.0)), None);
        assert_eq!(pattern.pos_to_coord(Vec3::new(20.0, 0.0, 3.0)), None);
        assert_eq!(
            pattern.pos_to_coord(Vec3::new(19.5, 0.0, 15.2)),
            Some(CellCoord::new(19, 15))
        );
    }
}
