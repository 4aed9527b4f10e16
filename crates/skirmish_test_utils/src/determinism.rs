//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a battle produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Battles must be fully reproducible from their seed so that replays and
//! regression tests hold. Sources of non-determinism include:
//!
//! - **Floating-point math**: positions and distances use
//!   [`skirmish_core::math::Fixed`] throughout the tick loop.
//!
//! - **HashMap iteration order**: units are always visited in roster
//!   order or sorted id order.
//!
//! - **System randomness**: the battle owns a single seeded RNG.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual modules (navigation, targeting, combat)
//! 2. **Property tests**: random inputs must still respect invariants
//! 3. **Integration tests**: full battles are reproducible
//! 4. **Parallel tests**: N battles on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use skirmish_core::battle::Battle;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs were deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use skirmish_test_utils::determinism::verify_determinism;
/// use skirmish_test_utils::fixtures::skirmish_battle;
///
/// let result = verify_determinism(
///     3,
///     40,
///     || skirmish_battle(7),
///     |battle| {
///         battle.tick(50);
///     },
///     |battle| battle.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a battle twice with identical setup and compare final hashes.
///
/// Returns `true` if both runs produced identical state hashes.
pub fn verify_battle_determinism<F>(setup_fn: F, num_ticks: u64, dt_ms: u32) -> bool
where
    F: Fn() -> Battle,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |battle| {
            battle.tick(dt_ms);
        },
        Battle::state_hash,
    );
    result.is_deterministic
}

/// Run N battles on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// or memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_battles<F>(
    setup_fn: F,
    num_battles: usize,
    num_ticks: u64,
    dt_ms: u32,
) -> DeterminismResult
where
    F: Fn() -> Battle + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_battles)
            .map(|_| {
                s.spawn(|| {
                    let mut battle = setup_fn();
                    for _ in 0..num_ticks {
                        battle.tick(dt_ms);
                    }
                    battle.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("battle thread panicked"))
            .collect()
    });

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// Returns `None` if the runs never differ, `Some(tick)` otherwise.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64, dt_ms: u32) -> Option<u64>
where
    F: Fn() -> Battle,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        a.tick(dt_ms);
        b.tick(dt_ms);

        if a.state_hash() != b.state_hash() {
            tracing::warn!(tick, "Battles diverged");
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot round trip preserves state and future ticks.
///
/// The battle is run for `num_ticks`, snapshotted, and then both the
/// original and the restored copy run another `num_ticks`.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64, dt_ms: u32) -> bool
where
    F: Fn() -> Battle,
{
    let mut battle = setup_fn();

    for _ in 0..num_ticks {
        battle.tick(dt_ms);
    }

    let Ok(bytes) = battle.serialize() else {
        return false;
    };
    let Ok(mut restored) = Battle::deserialize(&bytes) else {
        return false;
    };

    if battle.state_hash() != restored.state_hash() {
        return false;
    }

    for _ in 0..num_ticks {
        battle.tick(dt_ms);
        restored.tick(dt_ms);
    }

    battle.state_hash() == restored.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::math::{Fixed, Vec2Fixed};
    use skirmish_core::targeting::TargetCandidate;
    use skirmish_core::unit::Role;

    /// World coordinate inside a 32×32 grid of 32-unit cells.
    pub fn arb_coordinate() -> impl Strategy<Value = Fixed> {
        (0i32..1024i32).prop_map(Fixed::from_num)
    }

    /// World position inside a 32×32 grid of 32-unit cells.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_coordinate(), arb_coordinate()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Footprint size in cells.
    pub fn arb_footprint() -> impl Strategy<Value = u32> {
        1u32..=3u32
    }

    /// Any role.
    pub fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Warrior),
            Just(Role::Archer),
            Just(Role::Tanker),
            Just(Role::Healer),
        ]
    }

    /// A set of blocked cells on a `size`×`size` grid.
    pub fn arb_blocked_cells(size: i32, max: usize) -> impl Strategy<Value = Vec<(i32, i32)>> {
        prop::collection::vec((0..size, 0..size), 0..max)
    }

    /// Candidate list with distinct ids, some of them inactive or aggroed.
    pub fn arb_candidates(max: usize) -> impl Strategy<Value = Vec<TargetCandidate>> {
        prop::collection::vec(
            (arb_position(), 1u32..200u32, any::<bool>(), prop::bool::weighted(0.9)),
            1..max,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (position, hp, aggro, active))| TargetCandidate {
                    id: i as u64 + 1,
                    position,
                    hp,
                    max_hp: 200,
                    aggro,
                    active,
                })
                .collect()
        })
    }
}
