//! Test fixtures and helpers.
//!
//! Pre-built grids, maps and battles for consistent testing.

use fixed::types::I32F32;
use skirmish_core::battle::Battle;
use skirmish_core::config::{BattleConfig, RoleTable};
use skirmish_core::events::TickEvents;
use skirmish_core::math::Vec2Fixed;
use skirmish_core::navigation::{MapDescription, NavigationGrid, TileLayer};
use skirmish_core::unit::{Archetype, Role, TeamId, UnitId};

/// Cell size used by every fixture grid.
pub const CELL: i32 = 32;

/// Tick length used by fixture battles.
pub const TICK_MS: u32 = 50;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a vector from integer coordinates.
#[must_use]
pub fn vec2(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// World-space center of a grid cell in fixture grids.
#[must_use]
pub fn cell_center(x: i32, y: i32) -> Vec2Fixed {
    vec2(x * CELL + CELL / 2, y * CELL + CELL / 2)
}

/// Open grid with no obstacles.
#[must_use]
pub fn open_grid(width: u32, height: u32) -> NavigationGrid {
    NavigationGrid::new(width, height, fixed(CELL))
}

/// Build a grid from rows where `#` is blocked.
///
/// # Panics
///
/// Panics if the rows are ragged or empty.
#[must_use]
pub fn grid_from_rows(rows: &[&str]) -> NavigationGrid {
    let map = MapDescription {
        width: rows.first().map_or(0, |r| r.len()) as u32,
        height: rows.len() as u32,
        tile_size: fixed(CELL),
        layers: vec![TileLayer::from_rows("fixture", rows)],
        obstacles: vec![],
    };
    NavigationGrid::build(&map).expect("fixture rows must form a valid map")
}

/// 20×20 grid split by a wall at x = 10 with a gap in the bottom rows.
#[must_use]
pub fn walled_grid() -> NavigationGrid {
    let mut grid = open_grid(20, 20);
    for y in 0..16 {
        grid.set_blocked(10, y, true);
    }
    grid
}

/// Hand-authored arena: outer walls, a central pillar and an obstacle object.
pub const ARENA_RON: &str = "(
    width: 20,
    height: 12,
    tile_size: 32.0,
    layers: [
        (
            name: \"walls\",
            rows: [
                \"####################\",
                \"#..................#\",
                \"#..................#\",
                \"#.......##.........#\",
                \"#.......##.........#\",
                \"#..................#\",
                \"#..................#\",
                \"#..................#\",
                \"#..................#\",
                \"#..................#\",
                \"#..................#\",
                \"####################\",
            ],
        ),
    ],
    obstacles: [
        (x: 416.0, y: 224.0, width: 64.0, height: 32.0),
    ],
)";

/// Parse [`ARENA_RON`].
///
/// # Panics
///
/// Panics if the fixture text is malformed.
#[must_use]
pub fn arena_map() -> MapDescription {
    ron::from_str(ARENA_RON).expect("arena fixture must parse")
}

/// Empty battle on an open 32×32 grid.
#[must_use]
pub fn open_battle(seed: u64) -> Battle {
    Battle::new(open_grid(32, 32), RoleTable::default(), BattleConfig::with_seed(seed))
}

/// Spawn a unit, panicking on failure.
///
/// # Panics
///
/// Panics if the unit cannot be spawned.
pub fn spawn(
    battle: &mut Battle,
    team: TeamId,
    role: Role,
    archetype: Archetype,
    position: Vec2Fixed,
) -> UnitId {
    battle
        .spawn_unit(team, role, archetype, position)
        .expect("fixture spawn must succeed")
}

/// Two small squads within sight of each other in the arena.
///
/// # Panics
///
/// Panics if the arena fixture is invalid.
#[must_use]
pub fn skirmish_battle(seed: u64) -> Battle {
    let mut battle = Battle::from_map(&arena_map(), RoleTable::default(), BattleConfig::with_seed(seed))
        .expect("arena fixture must build");

    spawn(&mut battle, 0, Role::Tanker, Archetype::Squad, cell_center(3, 5) + vec2(16, 16));
    spawn(&mut battle, 0, Role::Warrior, Archetype::Squad, cell_center(3, 8));
    spawn(&mut battle, 0, Role::Archer, Archetype::Squad, cell_center(2, 3));
    spawn(&mut battle, 0, Role::Healer, Archetype::Squad, cell_center(2, 9));

    spawn(&mut battle, 1, Role::Warrior, Archetype::Patrol, cell_center(10, 6));
    spawn(&mut battle, 1, Role::Warrior, Archetype::Patrol, cell_center(10, 9));
    spawn(&mut battle, 1, Role::Archer, Archetype::Patrol, cell_center(12, 8));
    spawn(&mut battle, 1, Role::Healer, Archetype::Patrol, cell_center(12, 10));

    battle
}

/// Run `ticks` fixed-length ticks, collecting events.
pub fn run_ticks(battle: &mut Battle, ticks: usize) -> Vec<TickEvents> {
    (0..ticks).map(|_| battle.tick(TICK_MS)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_parses_and_builds() {
        let map = arena_map();
        assert_eq!(map.obstacles.len(), 1);

        let grid = NavigationGrid::build(&map).unwrap();
        assert!(grid.is_blocked(0, 0));
        assert!(grid.is_blocked(8, 3));
        assert!(grid.is_blocked(13, 7), "obstacle object covers (13, 7)");
        assert!(!grid.is_blocked(5, 5));
    }

    #[test]
    fn test_grid_from_rows() {
        let grid = grid_from_rows(&["..#", "...", "#.."]);
        assert!(grid.is_blocked(2, 0));
        assert!(grid.is_blocked(0, 2));
        assert!(!grid.is_blocked(1, 1));
    }

    #[test]
    fn test_skirmish_battle_spawns_both_teams() {
        let battle = skirmish_battle(1);
        assert_eq!(battle.roster(0).len(), 4);
        assert_eq!(battle.roster(1).len(), 4);
    }
}
