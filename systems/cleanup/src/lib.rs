#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Removal of undersized regions by folding them into their neighbours.
//!
//! Wall regions are resolved first, then floor regions. For each type a merge
//! plan is drawn up against the topology left by the previous type and then
//! applied in one go. Survivors are renumbered once both types are done and
//! every perimeter is rebuilt in a single batched pass at the very end.

use std::collections::{BTreeMap, BTreeSet};

use cave_core::{CellType, ParameterSet, RegionId};
use cave_world::{Grid, Region, RegionCatalog};
use log::{debug, warn};

/// Number of region hops a merge-target search may take through regions that
/// are themselves being removed.
pub const MAX_SEARCH_DEPTH: usize = 3;

/// Outcome of a cleanup pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    merged: usize,
    unresolved: usize,
}

impl CleanupReport {
    /// Number of regions folded into another region.
    #[must_use]
    pub const fn merged(&self) -> usize {
        self.merged
    }

    /// Number of undersized regions kept because no merge target was found.
    #[must_use]
    pub const fn unresolved(&self) -> usize {
        self.unresolved
    }
}

/// Fold plan for one cell type: absorbed region to the region receiving it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergePlan {
    merges: BTreeMap<RegionId, RegionId>,
    unresolved: Vec<RegionId>,
}

impl MergePlan {
    /// Planned merges keyed by the absorbed region.
    #[must_use]
    pub fn merges(&self) -> &BTreeMap<RegionId, RegionId> {
        &self.merges
    }

    /// Undersized regions for which no surviving neighbour was found.
    #[must_use]
    pub fn unresolved(&self) -> &[RegionId] {
        &self.unresolved
    }

    /// Region that receives `absorbed`, if it is scheduled for merging.
    #[must_use]
    pub fn target_of(&self, absorbed: RegionId) -> Option<RegionId> {
        self.merges.get(&absorbed).copied()
    }
}

/// Removes every undersized region of both types.
///
/// Minimum areas come from the parameter set, scaled by the number of
/// subdivisions. The largest region of each type always survives.
pub fn clean(grid: &mut Grid, catalog: &mut RegionCatalog, params: &ParameterSet) -> CleanupReport {
    let mut report = CleanupReport::default();

    for cell_type in [CellType::Wall, CellType::Floor] {
        let minimum = params.scaled_min_area(cell_type);
        let plan = plan_merges(grid, catalog, cell_type, minimum);
        debug!(
            "{cell_type:?} cleanup: {} merges planned below area {minimum}",
            plan.merges.len()
        );
        for id in &plan.unresolved {
            warn!("no merge target found for undersized region {id:?}");
        }

        apply_merges(grid, catalog, &plan);
        report.merged += plan.merges.len();
        report.unresolved += plan.unresolved.len();
    }

    for cell_type in [CellType::Wall, CellType::Floor] {
        renumber_survivors(grid, catalog, cell_type);
    }
    catalog.recompute_perimeters(grid);

    debug!(
        "cleanup left {} wall regions and {} rooms",
        catalog.regions(CellType::Wall).len(),
        catalog.room_count()
    );
    report
}

/// Decides, against the current grid stamps, where every undersized region of
/// `cell_type` goes.
///
/// Regions are visited by ascending area. Each one is folded into the touching
/// survivor with the largest perimeter; when it touches none, the search
/// continues through other removed regions up to [`MAX_SEARCH_DEPTH`] hops.
/// A removed room also drags along every smaller touching wall region, which
/// swallows wall islands instead of leaving them stranded.
#[must_use]
pub fn plan_merges(
    grid: &Grid,
    catalog: &RegionCatalog,
    cell_type: CellType,
    minimum_area: usize,
) -> MergePlan {
    let mut plan = MergePlan::default();
    let Some(largest) = largest_region(catalog, cell_type) else {
        return plan;
    };
    let largest_other = largest_region(catalog, cell_type.opposite());

    let mut undersized: Vec<&Region> = catalog
        .regions(cell_type)
        .iter()
        .filter(|region| region.area() < minimum_area && region.id() != largest)
        .collect();
    undersized.sort_by_key(|region| (region.area(), region.id()));

    let removed: BTreeSet<RegionId> = undersized.iter().map(|region| region.id()).collect();
    let mut targets = BTreeSet::new();

    for region in undersized {
        let excluded =
            |id: RegionId| removed.contains(&id) || plan.merges.contains_key(&id);
        let Some(target) = find_target(grid, catalog, region, excluded) else {
            plan.unresolved.push(region.id());
            continue;
        };
        let _ = plan.merges.insert(region.id(), target);
        let _ = targets.insert(target);

        if cell_type != CellType::Floor {
            continue;
        }
        for other in region.touching_regions(grid) {
            if other.cell_type() == cell_type
                || Some(other) == largest_other
                || targets.contains(&other)
                || plan.merges.contains_key(&other)
            {
                continue;
            }
            let smaller = catalog
                .region(other)
                .is_some_and(|island| island.area() < region.area());
            if smaller {
                let _ = plan.merges.insert(other, target);
            }
        }
    }

    plan
}

/// Folds every planned region into its target. Absorbed regions stay in the
/// catalog, emptied, until survivors are renumbered.
pub fn apply_merges(grid: &mut Grid, catalog: &mut RegionCatalog, plan: &MergePlan) {
    for (&absorbed, &target) in &plan.merges {
        if catalog.region(target).is_none() {
            continue;
        }
        let Some(source) = catalog.region_mut(absorbed) else {
            continue;
        };
        let mut source = std::mem::replace(source, Region::new(absorbed, BTreeSet::new()));
        if let Some(receiver) = catalog.region_mut(target) {
            receiver.absorb(grid, &mut source);
        }
    }
}

/// Drops emptied regions of `cell_type` and renumbers the rest from one,
/// preserving their order and restamping the grid.
pub fn renumber_survivors(grid: &mut Grid, catalog: &mut RegionCatalog, cell_type: CellType) {
    let mut survivors = Vec::new();
    for mut region in catalog.take(cell_type) {
        if region.is_empty() {
            continue;
        }
        let number = RegionId::from_index(cell_type, survivors.len()).number();
        if region.number() != number {
            region.renumber(grid, number);
        }
        survivors.push(region);
    }
    catalog.replace(cell_type, survivors);
}

fn largest_region(catalog: &RegionCatalog, cell_type: CellType) -> Option<RegionId> {
    catalog
        .regions(cell_type)
        .iter()
        .max_by(|a, b| a.area().cmp(&b.area()).then(b.id().cmp(&a.id())))
        .map(Region::id)
}

fn find_target(
    grid: &Grid,
    catalog: &RegionCatalog,
    start: &Region,
    excluded: impl Fn(RegionId) -> bool,
) -> Option<RegionId> {
    let mut visited = BTreeSet::from([start.id()]);
    let mut frontier = vec![start.id()];

    for _ in 0..MAX_SEARCH_DEPTH {
        let mut candidates = BTreeSet::new();
        let mut next = Vec::new();

        for id in frontier {
            let Some(region) = catalog.region(id) else {
                continue;
            };
            for other in region.touching_regions(grid) {
                if !visited.insert(other) {
                    continue;
                }
                if excluded(other) {
                    next.push(other);
                } else {
                    let _ = candidates.insert(other);
                }
            }
        }

        let best = candidates.into_iter().max_by(|a, b| {
            perimeter_len(catalog, *a)
                .cmp(&perimeter_len(catalog, *b))
                .then(b.cmp(a))
        });
        if best.is_some() {
            return best;
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    None
}

fn perimeter_len(catalog: &RegionCatalog, id: RegionId) -> usize {
    catalog.region(id).map_or(0, |region| region.perimeter().len())
}
