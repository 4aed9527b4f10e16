//! Per-unit behavior state machine.
//!
//! Each unit carries a [`Brain`] holding its primary [`BehaviorState`],
//! current target handle, cached path and timers. Once per tick the
//! battle hands the unit to [`UnitBehaviorStateMachine::update`], which
//! reads the rest of the battle through a [`BehaviorContext`] and leaves a
//! desired velocity on the unit.
//!
//! # States
//!
//! - **Roaming** (initial): wanders near the spawn anchor and scans for
//!   visible enemies on a jittered think interval. Spotting one switches
//!   to Combat and asks the battle to broadcast aggro to nearby allies.
//! - **Combat**: re-evaluates its target on the think interval and moves
//!   to a role-specific range. Patrol units leash back when the target
//!   strays from their spawn or stays out of sight.
//! - **Fleeing**: below the flee threshold; runs from the nearest enemy.
//! - **Returning**: walks back to the spawn anchor and heals on arrival.
//! - **Provoked**: target forced by a taunt until it expires.
//! - **Dying**: terminal.
//!
//! A wall slide overlays any of these for a short window after a collision.

use std::collections::VecDeque;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::events::{StateTransition, TickEvents};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::navigation::{smooth_path, NavigationGrid};
use crate::targeting::{select_best_target, select_heal_target, TargetCandidate};
use crate::unit::{Archetype, BodyExtent, Unit, UnitId, UnitStorage};
use crate::wall_recovery::{WallRecovery, WallSlide};

/// Primary behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorState {
    /// Wandering near the spawn anchor, looking for enemies.
    #[default]
    Roaming,
    /// Engaging a target.
    Combat,
    /// Running from the nearest enemy.
    Fleeing,
    /// Walking back to the spawn anchor.
    Returning,
    /// Forced onto a target by a taunt.
    Provoked,
    /// Terminal.
    Dying,
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Roaming => "roaming",
            Self::Combat => "combat",
            Self::Fleeing => "fleeing",
            Self::Returning => "returning",
            Self::Provoked => "provoked",
            Self::Dying => "dying",
        };
        f.write_str(name)
    }
}

/// External taunt forcing a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provocation {
    /// Unit that issued the taunt.
    pub by: UnitId,
    /// Battle time at which the effect ends.
    pub until: u64,
}

/// Detects a unit that is commanded to move but is not getting anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StuckDetector {
    stationary_ms: u32,
}

impl StuckDetector {
    /// Feed one tick of motion.
    ///
    /// A tick counts as stationary when the unit covered less than
    /// `stuck_speed_ratio` of what `commanded_speed` would have carried it.
    /// Stationary time accumulates across ticks and any real movement
    /// clears it. Returns `true` exactly once the accumulated time exceeds
    /// `stuck_threshold_ms`, resetting the timer to zero.
    pub fn observe(&mut self, commanded_speed: Fixed, moved: Fixed, dt_ms: u32, ai: &AiConfig) -> bool {
        if commanded_speed <= Fixed::ZERO || dt_ms == 0 {
            self.reset();
            return false;
        }

        let expected = commanded_speed.saturating_mul(Fixed::saturating_from_num(dt_ms)) / 1000;
        if moved >= expected.saturating_mul(ai.stuck_speed_ratio) {
            self.reset();
            return false;
        }

        self.stationary_ms = self.stationary_ms.saturating_add(dt_ms);
        if self.stationary_ms > ai.stuck_threshold_ms {
            self.reset();
            return true;
        }
        false
    }

    /// Clear accumulated stationary time.
    pub fn reset(&mut self) {
        self.stationary_ms = 0;
    }

    /// Accumulated stationary time.
    #[must_use]
    pub const fn stationary_ms(&self) -> u32 {
        self.stationary_ms
    }
}

/// Decision state carried by every unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Brain {
    pub(crate) state: BehaviorState,
    pub(crate) target: Option<UnitId>,
    /// Remaining waypoints, next first.
    pub(crate) path: VecDeque<Vec2Fixed>,
    pub(crate) following_path: bool,
    pub(crate) next_think_at: u64,
    pub(crate) path_refresh_at: u64,
    pub(crate) force_path_until: u64,
    pub(crate) wall_slide: Option<WallSlide>,
    pub(crate) stuck: StuckDetector,
    pub(crate) provoked: Option<Provocation>,
    pub(crate) los_lost_since: Option<u64>,
    pub(crate) roam_goal: Option<Vec2Fixed>,
    pub(crate) move_goal: Option<Vec2Fixed>,
    #[serde(with = "fixed_serde")]
    pub(crate) commanded_speed: Fixed,
}

impl Brain {
    /// Current primary state.
    #[must_use]
    pub const fn state(&self) -> BehaviorState {
        self.state
    }

    /// Unit this brain is currently going after.
    #[must_use]
    pub const fn current_target(&self) -> Option<UnitId> {
        self.target
    }

    /// Remaining waypoints.
    #[must_use]
    pub fn path(&self) -> &VecDeque<Vec2Fixed> {
        &self.path
    }

    /// Whether movement is currently steered by a searched path.
    #[must_use]
    pub const fn is_following_path(&self) -> bool {
        self.following_path
    }

    /// Active taunt, if any.
    #[must_use]
    pub const fn provocation(&self) -> Option<Provocation> {
        self.provoked
    }

    /// End of the forced-pathfinding window.
    #[must_use]
    pub const fn force_path_until(&self) -> u64 {
        self.force_path_until
    }

    /// Active or expired wall slide.
    #[must_use]
    pub const fn wall_slide(&self) -> Option<WallSlide> {
        self.wall_slide
    }

    /// Where the unit was last heading.
    #[must_use]
    pub const fn move_goal(&self) -> Option<Vec2Fixed> {
        self.move_goal
    }

    /// Stuck detector state.
    #[must_use]
    pub const fn stuck(&self) -> &StuckDetector {
        &self.stuck
    }

    /// Change primary state. Returns the transition if the state changed.
    pub fn set_state(&mut self, unit: UnitId, to: BehaviorState) -> Option<StateTransition> {
        let from = self.state;
        if from == to || from == BehaviorState::Dying {
            return None;
        }

        tracing::debug!(unit, %from, %to, "State transition");
        self.state = to;
        self.los_lost_since = None;
        self.roam_goal = None;
        self.drop_path();
        Some(StateTransition { unit, from, to })
    }

    /// Switch to a new target, discarding the path to the old one.
    pub fn set_target(&mut self, target: UnitId) {
        if self.target != Some(target) {
            self.target = Some(target);
            self.los_lost_since = None;
            self.drop_path();
        }
    }

    /// Forget the current target.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.los_lost_since = None;
        self.drop_path();
    }

    /// Discard the path and make a new search due immediately.
    pub fn drop_path(&mut self) {
        self.path.clear();
        self.following_path = false;
        self.path_refresh_at = 0;
        self.stuck.reset();
    }

    /// Whether an ally in this state can be pulled into a fight.
    #[must_use]
    pub const fn is_recruitable(&self) -> bool {
        matches!(self.state, BehaviorState::Roaming)
    }

    /// Join an ally's fight against `target`.
    pub fn recruit(&mut self, unit: UnitId, target: UnitId) -> Option<StateTransition> {
        self.set_target(target);
        self.set_state(unit, BehaviorState::Combat)
    }

    /// Force `by` as the target until `until`.
    pub fn provoke(&mut self, unit: UnitId, by: UnitId, until: u64) -> Option<StateTransition> {
        if self.state == BehaviorState::Dying {
            return None;
        }
        self.provoked = Some(Provocation { by, until });
        self.set_target(by);
        self.set_state(unit, BehaviorState::Provoked)
    }

    /// Install the override velocity and forced-pathfinding window from a
    /// collision.
    pub fn apply_wall_recovery(&mut self, recovery: WallRecovery) {
        self.wall_slide = Some(recovery.slide);
        self.force_path_until = self.force_path_until.max(recovery.force_path_until);
    }

    /// Feed one tick of actual motion. Only path-following counts toward
    /// being stuck. On detection the path is discarded, a new search is
    /// due at once, and the direct-line shortcut is disabled for the
    /// forced-pathfinding window. Returns `true` when that happened.
    pub fn observe_motion(&mut self, moved: Fixed, dt_ms: u32, now: u64, ai: &AiConfig) -> bool {
        if !self.following_path {
            self.stuck.reset();
            return false;
        }

        if self.stuck.observe(self.commanded_speed, moved, dt_ms, ai) {
            self.drop_path();
            self.force_path_until = now + u64::from(ai.force_path_window_ms);
            return true;
        }
        false
    }
}

/// Read-only view of the battle while one unit is updated.
///
/// `units` holds every unit except the one being updated.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorContext<'a> {
    /// Battle clock.
    pub now: u64,
    /// Other units.
    pub units: &'a UnitStorage,
    /// Static geometry.
    pub grid: &'a NavigationGrid,
    /// Tuning.
    pub ai: &'a AiConfig,
}

/// Requests the battle carries out after a unit's update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BehaviorOutcome {
    /// The unit just engaged this target; recruit nearby allies.
    pub aggro_target: Option<UnitId>,
    /// The unit taunts enemies within its taunt radius.
    pub taunt: bool,
}

/// Drives one unit's [`Brain`] for one tick.
#[derive(Debug, Clone, Copy)]
pub struct UnitBehaviorStateMachine<'a> {
    ctx: BehaviorContext<'a>,
}

impl<'a> UnitBehaviorStateMachine<'a> {
    /// Create a state machine over a battle view.
    #[must_use]
    pub const fn new(ctx: BehaviorContext<'a>) -> Self {
        Self { ctx }
    }

    /// Run one tick of decisions for `unit`, leaving its desired velocity
    /// in `unit.velocity`.
    pub fn update<R: Rng + ?Sized>(
        &self,
        unit: &mut Unit,
        rng: &mut R,
        events: &mut TickEvents,
    ) -> BehaviorOutcome {
        let mut outcome = BehaviorOutcome::default();

        if unit.is_dying() {
            unit.velocity = Vec2Fixed::ZERO;
            return outcome;
        }

        self.expire_provocation(unit, events);
        self.validate_target(unit);
        self.check_flee(unit, events);

        let now = self.ctx.now;
        let thinking = now >= unit.brain.next_think_at;
        if thinking {
            unit.brain.next_think_at = now
                + jitter(
                    rng,
                    self.ctx.ai.think_interval_min_ms,
                    self.ctx.ai.think_interval_max_ms,
                );
        }

        match unit.brain.state {
            BehaviorState::Roaming => self.roam(unit, thinking, rng, events, &mut outcome),
            BehaviorState::Combat => self.fight(unit, thinking, rng, events),
            BehaviorState::Fleeing => self.flee(unit, events),
            BehaviorState::Returning => self.return_to_anchor(unit, rng, events),
            BehaviorState::Provoked => self.pursue(unit, rng),
            BehaviorState::Dying => unit.velocity = Vec2Fixed::ZERO,
        }

        if thinking && self.should_taunt(unit) {
            unit.last_taunt_at = Some(now);
            outcome.taunt = true;
        }

        outcome
    }

    fn is_valid_enemy(&self, unit: &Unit, id: UnitId) -> bool {
        self.ctx
            .units
            .get(id)
            .is_some_and(|other| other.is_active() && other.team != unit.team)
    }

    fn expire_provocation(&self, unit: &mut Unit, events: &mut TickEvents) {
        let Some(provocation) = unit.brain.provoked else {
            return;
        };
        if self.ctx.now < provocation.until && self.is_valid_enemy(unit, provocation.by) {
            return;
        }

        unit.brain.provoked = None;
        if unit.brain.state == BehaviorState::Provoked {
            let next = if unit
                .brain
                .target
                .is_some_and(|target| self.is_valid_enemy(unit, target))
            {
                BehaviorState::Combat
            } else {
                BehaviorState::Roaming
            };
            events.push_transition(unit.brain.set_state(unit.id, next));
        }
    }

    /// Drop a target that died, left, or was never an enemy.
    fn validate_target(&self, unit: &mut Unit) {
        if let Some(target) = unit.brain.target {
            if !self.is_valid_enemy(unit, target) {
                tracing::trace!(unit = unit.id, target, "Dropping invalid target");
                unit.brain.clear_target();
            }
        }
    }

    fn check_flee(&self, unit: &mut Unit, events: &mut TickEvents) {
        let ratio = unit.hp_ratio();
        let ai = self.ctx.ai;

        match unit.brain.state {
            BehaviorState::Fleeing if ratio > ai.flee_recover_ratio => {
                let next = if unit.brain.target.is_some() {
                    BehaviorState::Combat
                } else {
                    BehaviorState::Roaming
                };
                events.push_transition(unit.brain.set_state(unit.id, next));
            }
            BehaviorState::Roaming | BehaviorState::Combat
                if !unit.stats.indomitable
                    && unit.brain.provoked.is_none()
                    && ratio <= ai.flee_threshold =>
            {
                events.push_transition(unit.brain.set_state(unit.id, BehaviorState::Fleeing));
            }
            _ => {}
        }
    }

    /// Visible enemies within detection radius, current target first, then
    /// by handle.
    fn visible_enemies(&self, unit: &Unit) -> Vec<TargetCandidate> {
        let radius_sq = self.ctx.ai.detection_radius.saturating_mul(self.ctx.ai.detection_radius);

        let mut candidates: Vec<TargetCandidate> = self
            .ctx
            .units
            .sorted_ids()
            .into_iter()
            .filter_map(|id| self.ctx.units.get(id))
            .filter(|other| other.is_active() && other.team != unit.team)
            .filter(|other| unit.position.distance_squared(other.position) <= radius_sq)
            .filter(|other| self.ctx.grid.is_line_clear(unit.position, other.position, 1))
            .map(|other| TargetCandidate::from_unit(other, unit.id))
            .collect();

        if let Some(current) = unit.brain.target {
            if let Some(index) = candidates.iter().position(|c| c.id == current) {
                let incumbent = candidates.remove(index);
                candidates.insert(0, incumbent);
            }
        }

        candidates
    }

    fn scan(&self, unit: &Unit) -> Option<UnitId> {
        let candidates = self.visible_enemies(unit);
        select_best_target(unit.position, &candidates, self.ctx.ai.target_hysteresis)
    }

    fn roam<R: Rng + ?Sized>(
        &self,
        unit: &mut Unit,
        thinking: bool,
        rng: &mut R,
        events: &mut TickEvents,
        outcome: &mut BehaviorOutcome,
    ) {
        if thinking {
            if let Some(target) = self.scan(unit) {
                unit.brain.set_target(target);
                events.push_transition(unit.brain.set_state(unit.id, BehaviorState::Combat));
                outcome.aggro_target = Some(target);
                self.fight(unit, false, rng, events);
                return;
            }

            if unit.brain.roam_goal.is_none() {
                unit.brain.roam_goal = self.pick_roam_point(unit, rng);
                unit.brain.drop_path();
            }
        }

        let Some(goal) = unit.brain.roam_goal else {
            self.stop(unit);
            return;
        };

        if unit.position.distance(goal) <= self.ctx.ai.arrival_radius {
            unit.brain.roam_goal = None;
            self.stop(unit);
            return;
        }

        let speed = unit.stats.move_speed / 2;
        self.navigate(unit, goal, speed, rng);
    }

    fn pick_roam_point<R: Rng + ?Sized>(&self, unit: &Unit, rng: &mut R) -> Option<Vec2Fixed> {
        let radius: i32 = self.ctx.ai.wander_radius.to_num();
        if radius <= 0 {
            return None;
        }

        (0..4).find_map(|_| {
            let dx = rng.gen_range(-radius..=radius);
            let dy = rng.gen_range(-radius..=radius);
            let point = unit.spawn_anchor + Vec2Fixed::from_ints(dx, dy);
            self.ctx.grid.fits_at(point, unit.footprint()).then_some(point)
        })
    }

    fn fight<R: Rng + ?Sized>(
        &self,
        unit: &mut Unit,
        thinking: bool,
        rng: &mut R,
        events: &mut TickEvents,
    ) {
        let now = self.ctx.now;
        let ai = self.ctx.ai;

        if thinking {
            if let Some(best) = self.scan(unit) {
                if unit.brain.target != Some(best) {
                    tracing::trace!(unit = unit.id, from = ?unit.brain.target, to = best, "Retargeting");
                    unit.brain.set_target(best);
                }
            }
        }

        let Some(target) = unit.brain.target.and_then(|id| self.ctx.units.get(id)) else {
            let away = unit.position.distance(unit.spawn_anchor) > ai.arrival_radius;
            let next = if unit.archetype == Archetype::Patrol && away {
                BehaviorState::Returning
            } else {
                BehaviorState::Roaming
            };
            events.push_transition(unit.brain.set_state(unit.id, next));
            self.stop(unit);
            return;
        };

        if unit.archetype == Archetype::Patrol
            && target.position.distance(unit.spawn_anchor) > ai.leash_range
        {
            tracing::debug!(unit = unit.id, target = target.id, "Target beyond leash");
            self.give_up(unit, events);
            return;
        }

        let visible = self.ctx.grid.is_line_clear(unit.position, target.position, 1);
        if visible {
            unit.brain.los_lost_since = None;
        } else {
            let since = *unit.brain.los_lost_since.get_or_insert(now);
            if unit.archetype == Archetype::Patrol
                && now - since > u64::from(ai.los_check_interval_ms)
            {
                tracing::debug!(unit = unit.id, target = target.id, "Line of sight lost");
                self.give_up(unit, events);
                return;
            }
        }

        if unit.stats.heal_power > 0 {
            if let Some(ally) = self.wounded_ally(unit) {
                if unit.position.distance(ally) > unit.stats.attack_range {
                    self.navigate(unit, ally, unit.stats.move_speed, rng);
                } else {
                    self.stop(unit);
                }
                return;
            }
        }

        let target_position = target.position;
        let reach = BodyExtent::of(target, self.ctx.grid.cell_size())
            .reach(unit.stats.attack_range, self.ctx.grid.cell_size());
        self.engage(unit, target_position, reach, visible, true, rng);
    }

    fn give_up(&self, unit: &mut Unit, events: &mut TickEvents) {
        unit.brain.clear_target();
        events.push_transition(unit.brain.set_state(unit.id, BehaviorState::Returning));
        self.stop(unit);
    }

    /// Close to `reach` of the target (or back off to kite distance).
    fn engage<R: Rng + ?Sized>(
        &self,
        unit: &mut Unit,
        target: Vec2Fixed,
        reach: Fixed,
        visible: bool,
        allow_kite: bool,
        rng: &mut R,
    ) {
        let distance = unit.position.distance(target);
        let speed = unit.stats.move_speed;

        if allow_kite && unit.stats.kites() && visible && distance < unit.stats.kite_distance {
            let away = target.direction_to(unit.position);
            unit.brain.drop_path();
            unit.brain.move_goal = Some(unit.position + away.scale(unit.stats.kite_distance));
            self.set_velocity(unit, away, speed);
            return;
        }

        if visible && distance <= reach {
            let toward = unit.position.direction_to(target);
            self.stop(unit);
            if !toward.is_zero() {
                unit.facing = toward;
            }
            return;
        }

        self.navigate(unit, target, speed, rng);
    }

    fn wounded_ally(&self, unit: &Unit) -> Option<Vec2Fixed> {
        let allies: Vec<TargetCandidate> = self
            .ctx
            .units
            .sorted_ids()
            .into_iter()
            .filter_map(|id| self.ctx.units.get(id))
            .filter(|other| other.team == unit.team)
            .map(|other| TargetCandidate::from_unit(other, unit.id))
            .collect();

        select_heal_target(unit.position, &allies, self.ctx.ai.detection_radius)
            .and_then(|id| self.ctx.units.get(id))
            .map(|ally| ally.position)
    }

    fn flee(&self, unit: &mut Unit, events: &mut TickEvents) {
        let nearest = self
            .ctx
            .units
            .sorted_ids()
            .into_iter()
            .filter_map(|id| self.ctx.units.get(id))
            .filter(|other| other.is_active() && other.team != unit.team)
            .min_by_key(|other| unit.position.distance_squared(other.position));

        match nearest {
            Some(enemy) if unit.position.distance(enemy.position) <= self.ctx.ai.detection_radius => {
                let mut away = enemy.position.direction_to(unit.position);
                if away.is_zero() {
                    away = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);
                }
                unit.brain.drop_path();
                unit.brain.move_goal = Some(unit.position + away.scale(self.ctx.ai.detection_radius));
                self.set_velocity(unit, away, unit.stats.move_speed);
            }
            _ => {
                self.stop(unit);
                if unit.archetype == Archetype::Patrol {
                    unit.brain.clear_target();
                    events.push_transition(unit.brain.set_state(unit.id, BehaviorState::Returning));
                }
            }
        }
    }

    fn return_to_anchor<R: Rng + ?Sized>(&self, unit: &mut Unit, rng: &mut R, events: &mut TickEvents) {
        let anchor = unit.spawn_anchor;
        if unit.position.distance(anchor) > self.ctx.ai.arrival_radius {
            self.navigate(unit, anchor, unit.stats.move_speed, rng);
            return;
        }

        self.stop(unit);
        let heal = (Fixed::from_num(unit.stats.max_hp) * self.ctx.ai.return_heal_ratio)
            .round()
            .saturating_to_num::<u32>();
        let amount = unit.heal(heal);
        if amount > 0 {
            events.combat.push(crate::events::CombatEvent::Healed {
                healer: unit.id,
                target: unit.id,
                amount,
            });
        }
        events.push_transition(unit.brain.set_state(unit.id, BehaviorState::Roaming));
    }

    fn pursue<R: Rng + ?Sized>(&self, unit: &mut Unit, rng: &mut R) {
        let Some(target) = unit.brain.target.and_then(|id| self.ctx.units.get(id)) else {
            self.stop(unit);
            return;
        };

        let target_position = target.position;
        let reach = BodyExtent::of(target, self.ctx.grid.cell_size())
            .reach(unit.stats.attack_range, self.ctx.grid.cell_size());
        let visible = self.ctx.grid.is_line_clear(unit.position, target_position, 1);
        self.engage(unit, target_position, reach, visible, false, rng);
    }

    fn should_taunt(&self, unit: &Unit) -> bool {
        let stats = &unit.stats;
        if stats.taunt_radius <= Fixed::ZERO
            || !matches!(unit.brain.state, BehaviorState::Combat | BehaviorState::Provoked)
        {
            return false;
        }

        let ready = unit.last_taunt_at.map_or(true, |last| {
            self.ctx.now >= last + u64::from(stats.taunt_cooldown_ms)
        });
        if !ready {
            return false;
        }

        let radius_sq = stats.taunt_radius.saturating_mul(stats.taunt_radius);
        self.ctx.units.iter().any(|(_, other)| {
            other.is_active()
                && other.team != unit.team
                && unit.position.distance_squared(other.position) <= radius_sq
        })
    }

    fn stop(&self, unit: &mut Unit) {
        unit.velocity = Vec2Fixed::ZERO;
        unit.brain.commanded_speed = Fixed::ZERO;
        unit.brain.following_path = false;
    }

    fn set_velocity(&self, unit: &mut Unit, direction: Vec2Fixed, speed: Fixed) {
        unit.velocity = direction.scale(speed);
        unit.brain.commanded_speed = if direction.is_zero() { Fixed::ZERO } else { speed };
    }

    /// Steer toward `goal`.
    ///
    /// Order of preference: an active wall slide, the direct line when it
    /// is clear (unless a forced-pathfinding window is open), the cached
    /// path while it is fresh, a new search when the refresh is due, and
    /// finally straight at the goal when no path exists.
    fn navigate<R: Rng + ?Sized>(&self, unit: &mut Unit, goal: Vec2Fixed, speed: Fixed, rng: &mut R) {
        let now = self.ctx.now;
        let grid = self.ctx.grid;
        let footprint = unit.footprint();
        unit.brain.move_goal = Some(goal);

        if let Some(slide) = unit.brain.wall_slide {
            if slide.is_active(now) {
                self.set_velocity(unit, slide.direction, speed);
                return;
            }
            unit.brain.wall_slide = None;
        }

        let forced = now < unit.brain.force_path_until;
        if !forced && grid.is_line_clear(unit.position, goal, footprint) {
            unit.brain.drop_path();
            let direction = unit.position.direction_to(goal);
            self.set_velocity(unit, direction, speed);
            return;
        }

        if now >= unit.brain.path_refresh_at {
            unit.brain.path_refresh_at = now
                + jitter(
                    rng,
                    self.ctx.ai.path_refresh_min_ms,
                    self.ctx.ai.path_refresh_max_ms,
                );

            let found =
                grid.find_path_with_budget(unit.position, goal, footprint, self.ctx.ai.search_budget);
            tracing::trace!(
                unit = unit.id,
                found = ?found.as_ref().map(Vec::len),
                forced,
                "Path request"
            );
            unit.brain.path = found
                .map(|path| smooth_path(grid, path, footprint))
                .unwrap_or_default()
                .into();
        }

        let reached = grid.cell_size() / 4;
        let reached_sq = reached * reached;
        while unit
            .brain
            .path
            .front()
            .is_some_and(|waypoint| unit.position.distance_squared(*waypoint) <= reached_sq)
        {
            unit.brain.path.pop_front();
        }

        if let Some(&waypoint) = unit.brain.path.front() {
            let direction = unit.position.direction_to(waypoint);
            self.set_velocity(unit, direction, speed);
            unit.brain.following_path = true;
        } else {
            let direction = unit.position.direction_to(goal);
            self.set_velocity(unit, direction, speed);
            unit.brain.following_path = false;
        }
    }
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, min_ms: u32, max_ms: u32) -> u64 {
    if max_ms <= min_ms {
        return u64::from(min_ms);
    }
    u64::from(rng.gen_range(min_ms..=max_ms))
}
