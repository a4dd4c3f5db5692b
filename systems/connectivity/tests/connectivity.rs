use cave_core::{Cell, CellCoord, CellType, RegionId};
use cave_system_connectivity::{
    carve_path, compute_nearest_points, link_isolated_rooms, repair_reachability, select_spawn,
};
use cave_system_segmentation::segment;
use cave_world::{Grid, RegionCatalog};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Two pairs of 3×3 rooms: the rooms of a pair sit close together, the pairs
/// sit far apart.
fn paired_rooms() -> (Grid, RegionCatalog) {
    let mut grid = Grid::new(30, 7);
    for first_column in [2, 7, 20, 25] {
        for row in 2..=4 {
            for column in first_column..first_column + 3 {
                grid.set_cell(CellCoord::new(column, row), Cell::FLOOR);
            }
        }
    }
    let catalog = segment(&mut grid);
    (grid, catalog)
}

fn room(number: u32) -> RegionId {
    RegionId::new(CellType::Floor, number)
}

#[test]
fn nearest_points_are_recorded_symmetrically() {
    let (_, mut catalog) = paired_rooms();

    compute_nearest_points(&mut catalog);

    let first = catalog.region(room(1)).and_then(|r| r.nearest_points().get(&room(2)).copied());
    let second = catalog.region(room(2)).and_then(|r| r.nearest_points().get(&room(1)).copied());
    let (Some(first), Some(second)) = (first, second) else {
        panic!("missing nearest-point records");
    };
    assert!((first.distance() - 3.0).abs() < f32::EPSILON);
    assert!((first.distance() - second.distance()).abs() < f32::EPSILON);
    assert_eq!(first.coord(), CellCoord::new(4, 2));
    assert_eq!(second.coord(), CellCoord::new(7, 2));
}

#[test]
fn carving_opens_floor_and_links_both_rooms() {
    let (mut grid, mut catalog) = paired_rooms();
    compute_nearest_points(&mut catalog);

    assert!(carve_path(&mut grid, &mut catalog, room(1), room(2), 1));

    assert!(grid.is(CellCoord::new(5, 2), CellType::Floor));
    assert!(grid.is(CellCoord::new(6, 2), CellType::Floor));
    assert_eq!(catalog.id_at(&grid, CellCoord::new(5, 1)), Some(room(1)));
    assert_eq!(catalog.id_at(&grid, CellCoord::new(6, 2)), Some(room(2)));
    // Later discs along the line reclaim cells stamped by earlier ones.
    assert_eq!(catalog.id_at(&grid, CellCoord::new(5, 2)), Some(room(2)));
    assert!(catalog.region(room(1)).is_some_and(|r| r.is_linked(room(2))));
    assert!(catalog.region(room(2)).is_some_and(|r| r.is_linked(room(1))));
    assert!(grid.is(CellCoord::new(5, 0), CellType::Wall));
    assert_eq!(catalog.verify(&grid), Ok(()));
}

#[test]
fn initial_links_leave_distant_pairs_apart() {
    let (mut grid, mut catalog) = paired_rooms();
    compute_nearest_points(&mut catalog);

    let carved = link_isolated_rooms(&mut grid, &mut catalog, 1);

    assert_eq!(carved, 2);
    let reachable = catalog.reachable_from(room(1));
    assert!(reachable.contains(&room(2)));
    assert!(!reachable.contains(&room(3)));
}

#[test]
fn repair_bridges_disconnected_components() {
    let (mut grid, mut catalog) = paired_rooms();
    compute_nearest_points(&mut catalog);
    let _ = link_isolated_rooms(&mut grid, &mut catalog, 1);

    let unreachable = repair_reachability(&mut grid, &mut catalog, room(1), 1);

    assert!(unreachable.is_empty());
    let reachable = catalog.reachable_from(room(1));
    for number in 1..=4 {
        assert!(reachable.contains(&room(number)), "room {number}");
    }
    assert!(grid.is(CellCoord::new(14, 2), CellType::Floor));
    assert_eq!(catalog.verify(&grid), Ok(()));
}

#[test]
fn spawn_lands_inside_its_room() {
    let (_, catalog) = paired_rooms();
    let mut rng = ChaCha8Rng::seed_from_u64(4);

    let spawn = select_spawn(&catalog, 1, &mut rng).expect("rooms exist");

    let region = catalog.region(spawn.region()).expect("spawn room");
    assert!(region.contains(spawn.point()));
    assert_eq!(spawn.point().row(), 3, "only the centre cell is fully enclosed");
    assert!(!region.perimeter().contains(&spawn.point()));
}

#[test]
fn spawn_requires_a_room() {
    let catalog = RegionCatalog::default();
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    assert_eq!(select_spawn(&catalog, 1, &mut rng), None);
}

#[test]
fn every_step_in_order_reaches_every_room() {
    let (mut grid, mut catalog) = paired_rooms();
    let mut rng = ChaCha8Rng::seed_from_u64(99);

    compute_nearest_points(&mut catalog);
    let _ = link_isolated_rooms(&mut grid, &mut catalog, 1);
    let spawn = select_spawn(&catalog, 1, &mut rng).expect("spawn");
    let unreachable = repair_reachability(&mut grid, &mut catalog, spawn.region(), 1);

    assert!(unreachable.is_empty());
    assert_eq!(catalog.reachable_from(spawn.region()).len(), 4);
    assert!(grid.is(spawn.point(), CellType::Floor));
}
