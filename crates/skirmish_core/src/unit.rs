//! Unit data and storage.
//!
//! A [`Unit`] is plain data: identity, role, kinematics, hit points, the
//! resolved stat block it was spawned with, and the [`Brain`] that drives
//! it. Units reference each other only by [`UnitId`] handles, which are
//! never reused, so a handle to a removed unit resolves to "not found".

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorState, Brain};
use crate::config::RoleStats;
use crate::error::SkirmishError;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Unique identifier for units.
pub type UnitId = u64;

/// Team identifier.
pub type TeamId = u8;

/// Closed set of unit roles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Role {
    /// Melee line fighter.
    #[default]
    Warrior,
    /// Ranged attacker that keeps its distance.
    Archer,
    /// Large, indomitable melee unit that taunts nearby enemies.
    Tanker,
    /// Support unit that heals the most wounded ally in range.
    Healer,
}

impl Role {
    /// All roles in declaration order.
    pub const ALL: [Self; 4] = [Self::Warrior, Self::Archer, Self::Tanker, Self::Healer];

    /// Lowercase role name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Warrior => "warrior",
            Self::Archer => "archer",
            Self::Tanker => "tanker",
            Self::Healer => "healer",
        }
    }

    /// Whether the role attacks from range (affects knockback strength).
    #[must_use]
    pub const fn is_ranged(self) -> bool {
        matches!(self, Self::Archer | Self::Healer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = SkirmishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SkirmishError::UnknownRole(s.to_string()))
    }
}

/// Who controls a unit, which decides whether it gives up a chase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Archetype {
    /// Player squad member; chases until the target is gone.
    #[default]
    Squad,
    /// Map patrol; leashes back to its spawn anchor.
    Patrol,
}

/// Short-lived displacement applied after being hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Knockback {
    /// Velocity in world units per second.
    pub velocity: Vec2Fixed,
    /// Battle time at which the impulse ends.
    pub until: u64,
}

/// Terminal death record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathRecord {
    /// Battle time of death.
    pub at: u64,
    /// Unit that landed the killing blow.
    pub killer: Option<UnitId>,
}

/// A combat unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Handle of this unit.
    pub id: UnitId,
    /// Owning team.
    pub team: TeamId,
    /// Role tag.
    pub role: Role,
    /// Control archetype.
    pub archetype: Archetype,
    /// Resolved stats.
    pub stats: RoleStats,
    /// World position (center of the footprint).
    pub position: Vec2Fixed,
    /// Desired velocity in world units per second.
    pub velocity: Vec2Fixed,
    /// Unit-length facing direction (zero until the unit first moves).
    pub facing: Vec2Fixed,
    /// Current hit points, in `0..=stats.max_hp`.
    pub hp: u32,
    /// Position captured at spawn.
    pub spawn_anchor: Vec2Fixed,
    /// Battle time of the last attack or heal, if any.
    pub last_attack_at: Option<u64>,
    /// Battle time of the last taunt, if any.
    pub last_taunt_at: Option<u64>,
    /// Active knockback impulse.
    pub knockback: Option<Knockback>,
    /// Set once hit points reach zero.
    pub death: Option<DeathRecord>,
    /// Whether the unit collides with static geometry.
    pub collision_enabled: bool,
    /// Decision state.
    pub brain: Brain,
}

impl Unit {
    /// Create a unit at full health.
    #[must_use]
    pub fn new(
        team: TeamId,
        role: Role,
        archetype: Archetype,
        stats: RoleStats,
        position: Vec2Fixed,
    ) -> Self {
        Self {
            id: 0,
            team,
            role,
            archetype,
            hp: stats.max_hp,
            stats,
            position,
            velocity: Vec2Fixed::ZERO,
            facing: Vec2Fixed::ZERO,
            spawn_anchor: position,
            last_attack_at: None,
            last_taunt_at: None,
            knockback: None,
            death: None,
            collision_enabled: true,
            brain: Brain::default(),
        }
    }

    /// Whether the unit has entered the terminal dying state.
    #[must_use]
    pub const fn is_dying(&self) -> bool {
        self.death.is_some()
    }

    /// Alive and eligible for targeting, movement and combat.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.death.is_none()
    }

    /// Current behavior state.
    #[must_use]
    pub const fn state(&self) -> BehaviorState {
        self.brain.state
    }

    /// Footprint in cells per side.
    #[must_use]
    pub const fn footprint(&self) -> u32 {
        self.stats.footprint
    }

    /// Hit points as a fraction of max.
    #[must_use]
    pub fn hp_ratio(&self) -> Fixed {
        if self.stats.max_hp == 0 {
            return Fixed::ZERO;
        }
        Fixed::from_num(self.hp) / Fixed::from_num(self.stats.max_hp)
    }

    /// Apply damage and return the amount actually removed.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.hp);
        self.hp -= actual;
        actual
    }

    /// Heal and return the amount actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let missing = self.stats.max_hp - self.hp;
        let actual = amount.min(missing);
        self.hp += actual;
        actual
    }

    /// Whether the attack cooldown has elapsed at `now`.
    #[must_use]
    pub fn attack_ready(&self, now: u64) -> bool {
        self.last_attack_at
            .map_or(true, |last| crate::combat::can_attack(now, last, self.stats.attack_cooldown_ms))
    }
}

/// Storage for all units in a battle.
///
/// Uses a `HashMap` for O(1) lookup by handle, with deterministic
/// iteration via sorted keys when order matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStorage {
    units: HashMap<UnitId, Unit>,
    next_id: UnitId,
}

impl UnitStorage {
    /// Create empty storage. Handles start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new unit and return its handle.
    pub fn insert(&mut self, mut unit: Unit) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Remove a unit by handle.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Temporarily take a unit out so it can be updated against the rest.
    /// Pair with [`restore`](Self::restore).
    pub fn take(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Put back a unit obtained from [`take`](Self::take), keeping its handle.
    pub fn restore(&mut self, unit: Unit) {
        self.units.insert(unit.id, unit);
    }

    /// Get a unit by handle.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable reference to a unit.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Mutable references to two distinct units.
    pub fn pair_mut(&mut self, a: UnitId, b: UnitId) -> Option<(&mut Unit, &mut Unit)> {
        if a == b {
            return None;
        }

        let mut first = None;
        let mut second = None;
        for (id, unit) in &mut self.units {
            if *id == a {
                first = Some(unit);
            } else if *id == b {
                second = Some(unit);
            }
        }
        Some((first?, second?))
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Number of stored units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sorted handles for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all units (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, &Unit)> {
        self.units.iter()
    }
}

/// Current position of a unit body as seen by other units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyExtent {
    /// Center.
    pub center: Vec2Fixed,
    /// Half the body width in world units.
    #[serde(with = "fixed_serde")]
    pub half_width: Fixed,
}

impl BodyExtent {
    /// Extent of a unit with the given footprint on a grid of `cell_size`.
    #[must_use]
    pub fn of(unit: &Unit, cell_size: Fixed) -> Self {
        Self {
            center: unit.position,
            half_width: cell_size * Fixed::from_num(unit.footprint().max(1)) / 2,
        }
    }

    /// Reach needed to strike this body with a weapon of `range`,
    /// measured center to center. Bodies larger than one cell extend it.
    #[must_use]
    pub fn reach(&self, range: Fixed, cell_size: Fixed) -> Fixed {
        range + (self.half_width - cell_size / 2).max(Fixed::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warrior() -> Unit {
        Unit::new(
            0,
            Role::Warrior,
            Archetype::Squad,
            RoleStats::default_for(Role::Warrior),
            Vec2Fixed::from_ints(10, 10),
        )
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Archer".parse::<Role>().unwrap(), Role::Archer);
        assert_eq!("tanker".parse::<Role>().unwrap(), Role::Tanker);
        assert!(matches!(
            "wizard".parse::<Role>(),
            Err(SkirmishError::UnknownRole(name)) if name == "wizard"
        ));
    }

    #[test]
    fn test_damage_and_heal_clamp() {
        let mut unit = warrior();
        let max = unit.stats.max_hp;

        assert_eq!(unit.apply_damage(max + 50), max);
        assert_eq!(unit.hp, 0);

        assert_eq!(unit.heal(max * 2), max);
        assert_eq!(unit.hp, max);
    }

    #[test]
    fn test_hp_ratio() {
        let mut unit = warrior();
        unit.hp = unit.stats.max_hp / 2;
        assert_eq!(unit.hp_ratio(), Fixed::from_num(1) / 2);
    }

    #[test]
    fn test_attack_ready_without_history() {
        let unit = warrior();
        assert!(unit.attack_ready(0));
    }

    #[test]
    fn test_storage_handles_not_reused() {
        let mut storage = UnitStorage::new();
        let a = storage.insert(warrior());
        let b = storage.insert(warrior());
        assert_eq!((a, b), (1, 2));

        storage.remove(a);
        let c = storage.insert(warrior());
        assert_eq!(c, 3);
        assert!(storage.get(a).is_none());
    }

    #[test]
    fn test_take_and_restore() {
        let mut storage = UnitStorage::new();
        let id = storage.insert(warrior());

        let mut unit = storage.take(id).unwrap();
        assert!(!storage.contains(id));
        unit.hp = 1;
        storage.restore(unit);

        assert_eq!(storage.get(id).unwrap().hp, 1);
    }

    #[test]
    fn test_pair_mut() {
        let mut storage = UnitStorage::new();
        let a = storage.insert(warrior());
        let b = storage.insert(warrior());

        let (ua, ub) = storage.pair_mut(a, b).unwrap();
        ua.hp = 1;
        ub.hp = 2;
        assert_eq!(storage.get(a).unwrap().hp, 1);
        assert_eq!(storage.get(b).unwrap().hp, 2);

        assert!(storage.pair_mut(a, a).is_none());
        assert!(storage.pair_mut(a, 99).is_none());
    }

    #[test]
    fn test_reach_grows_with_body() {
        let cell = Fixed::from_num(32);
        let mut unit = warrior();
        let small = BodyExtent::of(&unit, cell);
        assert_eq!(small.reach(Fixed::from_num(24), cell), Fixed::from_num(24));

        unit.stats.footprint = 2;
        let large = BodyExtent::of(&unit, cell);
        assert_eq!(large.reach(Fixed::from_num(24), cell), Fixed::from_num(40));
    }
}
