//! Battle tick driver.
//!
//! A [`Battle`] owns every unit, the team rosters, the navigation grid,
//! configuration, the seeded RNG and the clock. Nothing is global: the
//! whole state is passed around explicitly and can be snapshotted with
//! [`Battle::serialize`].
//!
//! # Determinism
//!
//! - Fixed-point math only
//! - One seeded `ChaCha8Rng` for every random draw
//! - Units are always visited teams-first in creation order, then in
//!   roster order within a team
//!
//! # Example
//!
//! ```
//! use skirmish_core::battle::Battle;
//! use skirmish_core::behavior::BehaviorState;
//! use skirmish_core::config::{BattleConfig, RoleTable};
//! use skirmish_core::math::{Fixed, Vec2Fixed};
//! use skirmish_core::navigation::NavigationGrid;
//! use skirmish_core::unit::{Archetype, Role};
//!
//! let grid = NavigationGrid::new(32, 32, Fixed::from_num(32));
//! let mut battle = Battle::new(grid, RoleTable::default(), BattleConfig::with_seed(7));
//!
//! let a = battle
//!     .spawn_unit(0, Role::Warrior, Archetype::Squad, Vec2Fixed::from_ints(100, 100))
//!     .unwrap();
//! battle
//!     .spawn_unit(1, Role::Warrior, Archetype::Squad, Vec2Fixed::from_ints(200, 100))
//!     .unwrap();
//!
//! for _ in 0..10 {
//!     battle.tick(50);
//! }
//! assert_eq!(battle.clock(), 500);
//! assert_eq!(battle.unit(a).unwrap().state(), BehaviorState::Combat);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorContext, BehaviorState, UnitBehaviorStateMachine};
use crate::combat::CombatResolver;
use crate::config::{BattleConfig, RoleTable};
use crate::error::{Result, SkirmishError};
use crate::events::{AggroBroadcast, TickEvents};
use crate::math::{Fixed, Vec2Fixed};
use crate::navigation::{MapDescription, NavigationGrid};
use crate::targeting::{select_heal_target, TargetCandidate};
use crate::unit::{Archetype, BodyExtent, Role, TeamId, Unit, UnitId, UnitStorage};
use crate::wall_recovery::WallRecoveryController;

/// Ordered list of a team's units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Team identifier.
    pub team: TeamId,
    /// Unit handles in iteration order.
    pub units: Vec<UnitId>,
}

/// A running battle.
///
/// # Tick phases
///
/// 1. **Behavior** - every unit decides its state, target and velocity
/// 2. **Movement** - velocities are integrated against the grid
/// 3. **Attack** - units in range strike (or heal)
/// 4. **Cleanup** - dying units past their linger time are removed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    clock: u64,
    tick_count: u64,
    units: UnitStorage,
    rosters: Vec<Roster>,
    grid: NavigationGrid,
    roles: RoleTable,
    config: BattleConfig,
    rng: ChaCha8Rng,
}

impl Battle {
    /// Create an empty battle on a prebuilt grid.
    #[must_use]
    pub fn new(grid: NavigationGrid, roles: RoleTable, config: BattleConfig) -> Self {
        Self {
            clock: 0,
            tick_count: 0,
            units: UnitStorage::new(),
            rosters: Vec::new(),
            grid,
            roles,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
        }
    }

    /// Build the grid from a map description and create an empty battle.
    pub fn from_map(map: &MapDescription, roles: RoleTable, config: BattleConfig) -> Result<Self> {
        Ok(Self::new(NavigationGrid::build(map)?, roles, config))
    }

    /// Battle clock in milliseconds.
    #[must_use]
    pub const fn clock(&self) -> u64 {
        self.clock
    }

    /// Number of ticks run.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// All units, including dying ones not yet removed.
    #[must_use]
    pub fn units(&self) -> &UnitStorage {
        &self.units
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// A team's roster, empty if the team has never had a unit.
    #[must_use]
    pub fn roster(&self, team: TeamId) -> &[UnitId] {
        self.rosters
            .iter()
            .find(|r| r.team == team)
            .map_or(&[], |r| r.units.as_slice())
    }

    /// All rosters in team creation order.
    #[must_use]
    pub fn rosters(&self) -> &[Roster] {
        &self.rosters
    }

    /// Navigation grid.
    #[must_use]
    pub fn grid(&self) -> &NavigationGrid {
        &self.grid
    }

    /// Role table.
    #[must_use]
    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    /// Battle configuration.
    #[must_use]
    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// Set the global time scale. Negative values are treated as zero.
    pub fn set_speed_multiplier(&mut self, multiplier: Fixed) {
        self.config.speed_multiplier = multiplier.max(Fixed::ZERO);
    }

    /// Teams that still have at least one living unit.
    #[must_use]
    pub fn surviving_teams(&self) -> Vec<TeamId> {
        self.rosters
            .iter()
            .filter(|r| {
                r.units
                    .iter()
                    .any(|id| self.units.get(*id).is_some_and(Unit::is_active))
            })
            .map(|r| r.team)
            .collect()
    }

    /// Handles in update order: teams in creation order, roster order within.
    #[must_use]
    pub fn iteration_order(&self) -> Vec<UnitId> {
        self.rosters
            .iter()
            .flat_map(|r| r.units.iter().copied())
            .collect()
    }

    /// Add a unit at the end of its team's roster.
    ///
    /// Fails if the role is missing from the table or the unit's footprint
    /// does not fit at `position`.
    pub fn spawn_unit(
        &mut self,
        team: TeamId,
        role: Role,
        archetype: Archetype,
        position: Vec2Fixed,
    ) -> Result<UnitId> {
        let stats = *self.roles.get(role)?;
        if !self.grid.fits_at(position, stats.footprint) {
            return Err(SkirmishError::InvalidState(format!(
                "{role} does not fit at ({}, {})",
                position.x, position.y
            )));
        }

        let mut unit = Unit::new(team, role, archetype, stats, position);
        let ai = &self.config.ai;
        let think_spread = ai.think_interval_max_ms.max(ai.think_interval_min_ms);
        unit.brain.next_think_at = self.clock + u64::from(self.rng.gen_range(0..=think_spread));

        let id = self.units.insert(unit);
        match self.rosters.iter_mut().find(|r| r.team == team) {
            Some(roster) => roster.units.push(id),
            None => self.rosters.push(Roster {
                team,
                units: vec![id],
            }),
        }

        tracing::debug!(unit = id, team, %role, ?archetype, "Unit spawned");
        Ok(id)
    }

    /// Force `unit` to target `by` for `duration_ms` (taunt effect).
    pub fn provoke(&mut self, unit: UnitId, by: UnitId, duration_ms: u32) -> Result<()> {
        if unit == by {
            return Err(SkirmishError::InvalidState(format!(
                "unit {unit} cannot provoke itself"
            )));
        }
        if !self.units.contains(by) {
            return Err(SkirmishError::UnitNotFound(by));
        }

        let until = self.clock + u64::from(duration_ms);
        let target = self
            .units
            .get_mut(unit)
            .ok_or(SkirmishError::UnitNotFound(unit))?;
        if target.is_dying() {
            return Err(SkirmishError::InvalidState(format!("unit {unit} is dying")));
        }

        target.brain.provoke(unit, by, until);
        tracing::debug!(unit, by, until, "Unit provoked");
        Ok(())
    }

    /// Report a collision with a static obstacle detected outside the core.
    pub fn notify_collision(&mut self, unit: UnitId, obstacle_center: Vec2Fixed) -> Result<()> {
        let now = self.clock;
        let target = self
            .units
            .get_mut(unit)
            .ok_or(SkirmishError::UnitNotFound(unit))?;
        if target.is_dying() {
            return Ok(());
        }

        let recovery = WallRecoveryController::new(&self.config.ai).on_collision(
            now,
            target.position,
            obstacle_center,
            target.brain.move_goal(),
        );
        target.brain.apply_wall_recovery(recovery);
        Ok(())
    }

    /// Advance the battle by `dt_ms` real milliseconds, scaled by the
    /// speed multiplier.
    pub fn tick(&mut self, dt_ms: u32) -> TickEvents {
        let dt = Fixed::saturating_from_num(dt_ms)
            .saturating_mul(self.config.speed_multiplier)
            .floor()
            .saturating_to_num::<u32>();
        self.clock += u64::from(dt);
        self.tick_count += 1;

        let mut events = TickEvents::default();
        let order = self.iteration_order();

        self.run_behavior_phase(&order, &mut events);
        self.run_movement_phase(&order, dt);
        self.run_attack_phase(&order, &mut events);
        self.run_cleanup_phase(&mut events);

        tracing::debug!(
            tick = self.tick_count,
            clock = self.clock,
            hash = self.state_hash(),
            "Tick complete"
        );

        events
    }

    fn run_behavior_phase(&mut self, order: &[UnitId], events: &mut TickEvents) {
        let now = self.clock;

        for &id in order {
            let Some(mut unit) = self.units.take(id) else {
                continue;
            };

            let outcome = {
                let ctx = BehaviorContext {
                    now,
                    units: &self.units,
                    grid: &self.grid,
                    ai: &self.config.ai,
                };
                UnitBehaviorStateMachine::new(ctx).update(&mut unit, &mut self.rng, events)
            };

            let team = unit.team;
            let position = unit.position;
            let taunt_radius = unit.stats.taunt_radius;
            self.units.restore(unit);

            if let Some(target) = outcome.aggro_target {
                self.broadcast_aggro(id, team, position, target, events);
            }
            if outcome.taunt {
                self.taunt(id, team, position, taunt_radius, events);
            }
        }
    }

    /// Pull idle allies near `source` into the fight against `target`.
    fn broadcast_aggro(
        &mut self,
        source: UnitId,
        team: TeamId,
        position: Vec2Fixed,
        target: UnitId,
        events: &mut TickEvents,
    ) {
        let radius = self.config.ai.aggro_radius;
        let radius_sq = radius.saturating_mul(radius);
        let allies: Vec<UnitId> = self.roster(team).to_vec();

        let mut recruited = Vec::new();
        for ally_id in allies {
            if ally_id == source {
                continue;
            }
            let Some(ally) = self.units.get_mut(ally_id) else {
                continue;
            };
            if !ally.is_active()
                || !ally.brain.is_recruitable()
                || ally.position.distance_squared(position) > radius_sq
            {
                continue;
            }

            events.push_transition(ally.brain.recruit(ally_id, target));
            recruited.push(ally_id);
        }

        tracing::debug!(source, target, recruited = recruited.len(), "Aggro broadcast");
        events.aggro.push(AggroBroadcast {
            source,
            target,
            recruited,
        });
    }

    /// Provoke every enemy within `radius` of a taunting unit.
    fn taunt(
        &mut self,
        source: UnitId,
        team: TeamId,
        position: Vec2Fixed,
        radius: Fixed,
        events: &mut TickEvents,
    ) {
        let until = self.clock + u64::from(self.config.ai.provoke_duration_ms);
        let radius_sq = radius.saturating_mul(radius);

        for id in self.iteration_order() {
            let Some(enemy) = self.units.get_mut(id) else {
                continue;
            };
            if enemy.team == team
                || !enemy.is_active()
                || enemy.position.distance_squared(position) > radius_sq
            {
                continue;
            }
            events.push_transition(enemy.brain.provoke(id, source, until));
        }

        tracing::debug!(source, until, "Taunt");
    }

    fn run_movement_phase(&mut self, order: &[UnitId], dt_ms: u32) {
        let now = self.clock;
        let dt_seconds = Fixed::saturating_from_num(dt_ms) / 1000;
        let ai = &self.config.ai;
        let grid = &self.grid;

        for &id in order {
            let Some(unit) = self.units.get_mut(id) else {
                continue;
            };
            if unit.is_dying() {
                continue;
            }

            let mut velocity = unit.velocity;
            if let Some(knockback) = unit.knockback {
                if now < knockback.until {
                    velocity += knockback.velocity;
                } else {
                    unit.knockback = None;
                }
            }

            let start = unit.position;
            let step = velocity.scale(dt_seconds);
            let (end, obstacle) = if unit.collision_enabled {
                integrate(grid, start, step, unit.footprint())
            } else {
                (start + step, None)
            };
            unit.position = end;

            if !unit.velocity.is_zero() {
                unit.facing = unit.velocity.normalize();
            }

            if unit.brain.observe_motion(start.distance(end), dt_ms, now, ai) {
                tracing::debug!(unit = id, "Unit stuck, repathing");
            }

            if let Some(obstacle) = obstacle {
                let recovery = WallRecoveryController::new(ai).on_collision(
                    now,
                    end,
                    obstacle,
                    unit.brain.move_goal(),
                );
                tracing::trace!(unit = id, direction = ?recovery.slide.direction, "Wall collision");
                unit.brain.apply_wall_recovery(recovery);
            }
        }
    }

    fn run_attack_phase(&mut self, order: &[UnitId], events: &mut TickEvents) {
        let now = self.clock;
        let cell_size = self.grid.cell_size();

        // Everyone alive when the phase starts gets to act, even if an
        // earlier unit kills them during it.
        let attackers: Vec<(UnitId, BehaviorState, Option<UnitId>)> = order
            .iter()
            .filter_map(|id| self.units.get(*id))
            .filter(|unit| unit.is_active())
            .map(|unit| (unit.id, unit.state(), unit.brain.current_target()))
            .collect();

        for (id, state, target) in attackers {
            if self.try_heal(id, state, events) {
                continue;
            }
            if !matches!(state, BehaviorState::Combat | BehaviorState::Provoked) {
                continue;
            }
            let Some(target_id) = target else {
                continue;
            };
            let (Some(attacker), Some(defender)) = (self.units.get(id), self.units.get(target_id))
            else {
                continue;
            };
            if defender.is_dying() || defender.team == attacker.team || !attacker.attack_ready(now) {
                continue;
            }

            let reach = BodyExtent::of(defender, cell_size).reach(attacker.stats.attack_range, cell_size);
            if attacker.position.distance(defender.position) > reach
                || !self.grid.is_line_clear(attacker.position, defender.position, 1)
            {
                continue;
            }

            let roll = Fixed::from_bits(i64::from(self.rng.gen::<u32>()));
            if let Some((attacker, defender)) = self.units.pair_mut(id, target_id) {
                CombatResolver::new(&self.config.ai).resolve_attack(
                    attacker, defender, now, roll, events,
                );
            }
        }
    }

    /// Heal the most wounded ally in range. Returns `true` if the unit
    /// used its turn.
    fn try_heal(&mut self, id: UnitId, state: BehaviorState, events: &mut TickEvents) -> bool {
        let now = self.clock;
        let Some(healer) = self.units.get(id) else {
            return false;
        };
        if healer.stats.heal_power == 0
            || !matches!(
                state,
                BehaviorState::Roaming | BehaviorState::Combat | BehaviorState::Provoked
            )
            || !healer.attack_ready(now)
        {
            return false;
        }

        let allies: Vec<TargetCandidate> = self
            .roster(healer.team)
            .iter()
            .filter(|ally| **ally != id)
            .filter_map(|ally| self.units.get(*ally))
            .map(|ally| TargetCandidate::from_unit(ally, id))
            .collect();
        let Some(ally) = select_heal_target(healer.position, &allies, healer.stats.attack_range)
        else {
            return false;
        };

        let resolver = CombatResolver::new(&self.config.ai);
        self.units
            .pair_mut(id, ally)
            .and_then(|(healer, ally)| resolver.resolve_heal(healer, ally, now, events))
            .is_some()
    }

    fn run_cleanup_phase(&mut self, events: &mut TickEvents) {
        let linger = u64::from(self.config.ai.death_linger_ms);
        let now = self.clock;

        let expired: Vec<UnitId> = self
            .units
            .sorted_ids()
            .into_iter()
            .filter(|id| {
                self.units
                    .get(*id)
                    .and_then(|unit| unit.death)
                    .is_some_and(|death| death.at + linger <= now)
            })
            .collect();

        for id in expired {
            self.units.remove(id);
            for roster in &mut self.rosters {
                roster.units.retain(|unit| *unit != id);
            }
            tracing::debug!(unit = id, "Unit removed");
            events.removed.push(id);
        }
    }

    /// Hash of the simulation state for divergence checks. Equal battles
    /// produce equal hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.clock.hash(&mut hasher);
        self.tick_count.hash(&mut hasher);

        let ids = self.units.sorted_ids();
        ids.len().hash(&mut hasher);

        for id in ids {
            if let Some(unit) = self.units.get(id) {
                id.hash(&mut hasher);
                unit.team.hash(&mut hasher);
                unit.position.x.to_bits().hash(&mut hasher);
                unit.position.y.to_bits().hash(&mut hasher);
                unit.velocity.x.to_bits().hash(&mut hasher);
                unit.velocity.y.to_bits().hash(&mut hasher);
                unit.hp.hash(&mut hasher);
                unit.state().hash(&mut hasher);
                unit.brain.current_target().hash(&mut hasher);
                unit.last_attack_at.hash(&mut hasher);
            }
        }

        for roster in &self.rosters {
            roster.team.hash(&mut hasher);
            roster.units.hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Snapshot the whole battle.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| SkirmishError::Serialization(format!("Failed to serialize battle: {e}")))
    }

    /// Restore a snapshot produced by [`serialize`](Self::serialize).
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| SkirmishError::Serialization(format!("Failed to deserialize battle: {e}")))
    }
}

/// Move by `step` one axis at a time so a unit slides along walls.
/// Returns the new position and the center of the blocking cell, if any.
fn integrate(
    grid: &NavigationGrid,
    start: Vec2Fixed,
    step: Vec2Fixed,
    footprint: u32,
) -> (Vec2Fixed, Option<Vec2Fixed>) {
    let mut position = start;
    let mut obstacle = None;

    let candidates = [
        Vec2Fixed::new(step.x, Fixed::ZERO),
        Vec2Fixed::new(Fixed::ZERO, step.y),
    ];
    for delta in candidates {
        if delta.is_zero() {
            continue;
        }
        let next = position + delta;
        if grid.fits_at(next, footprint) {
            position = next;
        } else {
            let (x, y) = grid.anchor_cell(next, footprint);
            obstacle = obstacle.or_else(|| {
                grid.first_blocked_cell(x, y, footprint)
                    .map(|(cx, cy)| grid.cell_center(cx, cy))
            });
        }
    }

    (position, obstacle)
}
