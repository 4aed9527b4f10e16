//! Benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use skirmish_core::math::Vec2Fixed;
use skirmish_core::navigation::NavigationGrid;
use skirmish_core::unit::{Archetype, Role};
use skirmish_test_utils::fixtures::{open_battle, skirmish_battle, spawn, vec2, TICK_MS};

fn maze() -> NavigationGrid {
    let mut grid = NavigationGrid::new(64, 64, skirmish_test_utils::fixtures::fixed(32));
    for x in (8..64).step_by(8) {
        let gap = if (x / 8) % 2 == 0 { 2 } else { 60 };
        for y in 0..64 {
            if y != gap && y != gap + 1 {
                grid.set_blocked(x, y, true);
            }
        }
    }
    grid
}

pub fn pathfinding_benchmark(c: &mut Criterion) {
    let grid = maze();
    let start = Vec2Fixed::from_ints(48, 1000);
    let goal = Vec2Fixed::from_ints(1990, 1000);

    c.bench_function("find_path_maze_fp1", |b| {
        b.iter(|| black_box(grid.find_path_with_budget(start, goal, 1, 4096)));
    });
    c.bench_function("find_path_maze_fp2", |b| {
        b.iter(|| black_box(grid.find_path_with_budget(start, goal, 2, 4096)));
    });
    c.bench_function("line_of_sight_long", |b| {
        b.iter(|| black_box(grid.is_line_clear(start, goal, 1)));
    });
}

pub fn battle_benchmark(c: &mut Criterion) {
    c.bench_function("arena_tick", |b| {
        let mut battle = skirmish_battle(1);
        b.iter(|| black_box(battle.tick(TICK_MS)));
    });

    c.bench_function("open_field_40_units_tick", |b| {
        let mut battle = open_battle(2);
        for i in 0..20 {
            let role = Role::ALL[i as usize % Role::ALL.len()];
            spawn(&mut battle, 0, role, Archetype::Squad, vec2(100, 100 + i * 40));
            spawn(&mut battle, 1, role, Archetype::Patrol, vec2(300, 100 + i * 40));
        }
        b.iter(|| black_box(battle.tick(TICK_MS)));
    });
}

criterion_group!(benches, pathfinding_benchmark, battle_benchmark);
criterion_main!(benches);
