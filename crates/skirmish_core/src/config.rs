//! Tuning and stat configuration.
//!
//! Everything here is plain data loaded from RON. The core assumes the
//! values are fully resolved; [`RoleTable::validate`] exists for tools
//! that want to reject nonsense before a battle starts.
//!
//! # Example RON
//!
//! ```ron
//! (
//!     roles: {
//!         Warrior: (
//!             max_hp: 100,
//!             attack_power: 30,
//!             defense: 10,
//!             move_speed: 80.0,
//!             attack_range: 24.0,
//!             attack_cooldown_ms: 800,
//!         ),
//!     },
//! )
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkirmishError};
use crate::math::{decimal_serde, ratio, Fixed};
use crate::unit::Role;

fn default_miss_chance() -> Fixed {
    ratio(2, 100)
}

const fn default_footprint() -> u32 {
    1
}

/// Per-role stat block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleStats {
    /// Maximum hit points.
    pub max_hp: u32,
    /// Damage before defense.
    pub attack_power: u32,
    /// Flat damage reduction.
    pub defense: u32,
    /// Movement speed in world units per second.
    #[serde(with = "decimal_serde")]
    pub move_speed: Fixed,
    /// Attack (or heal) range, center to center.
    #[serde(with = "decimal_serde")]
    pub attack_range: Fixed,
    /// Minimum time between attacks.
    pub attack_cooldown_ms: u32,
    /// Probability in `[0, 1]` that an attack misses.
    #[serde(with = "decimal_serde", default = "default_miss_chance")]
    pub miss_chance: Fixed,
    /// Body size in grid cells per side.
    #[serde(default = "default_footprint")]
    pub footprint: u32,
    /// Preferred distance from the target; zero means close to attack range.
    #[serde(with = "decimal_serde", default)]
    pub kite_distance: Fixed,
    /// Never flees.
    #[serde(default)]
    pub indomitable: bool,
    /// Radius of the taunt effect; zero disables taunting.
    #[serde(with = "decimal_serde", default)]
    pub taunt_radius: Fixed,
    /// Minimum time between taunts.
    #[serde(default)]
    pub taunt_cooldown_ms: u32,
    /// Hit points restored per heal; zero disables healing.
    #[serde(default)]
    pub heal_power: u32,
}

impl RoleStats {
    /// Built-in stats for a role.
    #[must_use]
    pub fn default_for(role: Role) -> Self {
        let base = Self {
            max_hp: 100,
            attack_power: 30,
            defense: 10,
            move_speed: Fixed::from_num(80),
            attack_range: Fixed::from_num(24),
            attack_cooldown_ms: 800,
            miss_chance: default_miss_chance(),
            footprint: 1,
            kite_distance: Fixed::ZERO,
            indomitable: false,
            taunt_radius: Fixed::ZERO,
            taunt_cooldown_ms: 0,
            heal_power: 0,
        };

        match role {
            Role::Warrior => base,
            Role::Archer => Self {
                max_hp: 70,
                attack_power: 22,
                defense: 4,
                move_speed: Fixed::from_num(70),
                attack_range: Fixed::from_num(160),
                attack_cooldown_ms: 1200,
                kite_distance: Fixed::from_num(120),
                ..base
            },
            Role::Tanker => Self {
                max_hp: 220,
                attack_power: 18,
                defense: 18,
                move_speed: Fixed::from_num(55),
                attack_range: Fixed::from_num(28),
                attack_cooldown_ms: 1000,
                footprint: 2,
                indomitable: true,
                taunt_radius: Fixed::from_num(120),
                taunt_cooldown_ms: 6000,
                ..base
            },
            Role::Healer => Self {
                max_hp: 60,
                attack_power: 8,
                defense: 3,
                move_speed: Fixed::from_num(70),
                attack_range: Fixed::from_num(140),
                attack_cooldown_ms: 1500,
                kite_distance: Fixed::from_num(110),
                heal_power: 15,
                ..base
            },
        }
    }

    /// Whether this role keeps a preferred distance instead of closing in.
    #[must_use]
    pub fn kites(&self) -> bool {
        self.kite_distance > Fixed::ZERO
    }
}

/// Stat table keyed by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTable {
    /// Stats per role.
    pub roles: BTreeMap<Role, RoleStats>,
}

impl Default for RoleTable {
    fn default() -> Self {
        Self {
            roles: Role::ALL
                .into_iter()
                .map(|role| (role, RoleStats::default_for(role)))
                .collect(),
        }
    }
}

impl RoleTable {
    /// Parse and validate a table from RON text.
    ///
    /// `source_name` labels errors (usually the file path).
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        let table: Self = ron::from_str(text).map_err(|e| SkirmishError::ConfigParse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;

        let errors = table.validate();
        if !errors.is_empty() {
            return Err(SkirmishError::ConfigParse {
                source_name: source_name.to_string(),
                message: errors.join("; "),
            });
        }

        Ok(table)
    }

    /// Stats for a role.
    pub fn get(&self, role: Role) -> Result<&RoleStats> {
        self.roles
            .get(&role)
            .ok_or_else(|| SkirmishError::UnknownRole(role.name().to_string()))
    }

    /// Stats for a role looked up by name.
    pub fn get_by_name(&self, name: &str) -> Result<&RoleStats> {
        self.get(name.parse()?)
    }

    /// Check internal consistency; returns a list of problems.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (role, stats) in &self.roles {
            if stats.max_hp == 0 {
                errors.push(format!("Role '{role}' has zero max_hp"));
            }
            if stats.move_speed < Fixed::ZERO {
                errors.push(format!("Role '{role}' has negative move_speed"));
            }
            if stats.attack_range <= Fixed::ZERO {
                errors.push(format!("Role '{role}' has non-positive attack_range"));
            }
            if stats.miss_chance < Fixed::ZERO || stats.miss_chance > Fixed::ONE {
                errors.push(format!("Role '{role}' miss_chance must be within [0, 1]"));
            }
            if !(1..=2).contains(&stats.footprint) {
                errors.push(format!(
                    "Role '{role}' footprint must be 1 or 2, got {}",
                    stats.footprint
                ));
            }
            if stats.kite_distance > stats.attack_range {
                errors.push(format!("Role '{role}' kites beyond its attack range"));
            }
        }

        errors
    }
}

/// AI timing and tuning constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Lower bound of the jittered think interval.
    pub think_interval_min_ms: u32,
    /// Upper bound of the jittered think interval.
    pub think_interval_max_ms: u32,
    /// How far a roaming unit notices enemies.
    #[serde(with = "decimal_serde")]
    pub detection_radius: Fixed,
    /// Allies within this radius join a fight the source unit starts.
    #[serde(with = "decimal_serde")]
    pub aggro_radius: Fixed,
    /// Patrol units give up when the target strays this far from their spawn.
    #[serde(with = "decimal_serde")]
    pub leash_range: Fixed,
    /// Patrol units give up after losing sight of the target this long.
    pub los_check_interval_ms: u32,
    /// Lower bound of the jittered path refresh interval.
    pub path_refresh_min_ms: u32,
    /// Upper bound of the jittered path refresh interval.
    pub path_refresh_max_ms: u32,
    /// Node expansion cap per path search.
    pub search_budget: u32,
    /// Stationary time along a path before the unit counts as stuck.
    pub stuck_threshold_ms: u32,
    /// Fraction of commanded speed below which a unit counts as stationary.
    #[serde(with = "decimal_serde")]
    pub stuck_speed_ratio: Fixed,
    /// Window during which the direct-line shortcut is disabled.
    pub force_path_window_ms: u32,
    /// Duration of the wall-slide override velocity.
    pub wall_slide_ms: u32,
    /// Weight of the slide component.
    #[serde(with = "decimal_serde")]
    pub wall_slide_weight: Fixed,
    /// Weight of the push away from the obstacle.
    #[serde(with = "decimal_serde")]
    pub wall_repulsion_weight: Fixed,
    /// HP ratio at or below which a unit flees.
    #[serde(with = "decimal_serde")]
    pub flee_threshold: Fixed,
    /// HP ratio above which a fleeing unit fights again.
    #[serde(with = "decimal_serde")]
    pub flee_recover_ratio: Fixed,
    /// Fraction of max HP restored on returning to spawn.
    #[serde(with = "decimal_serde")]
    pub return_heal_ratio: Fixed,
    /// Distance at which a destination counts as reached.
    #[serde(with = "decimal_serde")]
    pub arrival_radius: Fixed,
    /// Radius around the spawn anchor for roaming points.
    #[serde(with = "decimal_serde")]
    pub wander_radius: Fixed,
    /// Distance margin within which two candidates count as equally close.
    #[serde(with = "decimal_serde")]
    pub target_hysteresis: Fixed,
    /// How long a taunt forces its target.
    pub provoke_duration_ms: u32,
    /// Damage multiplier when striking from behind.
    #[serde(with = "decimal_serde")]
    pub backstab_multiplier: Fixed,
    /// Dot product of defender facing and direction to attacker below
    /// which the attack counts as from behind.
    #[serde(with = "decimal_serde")]
    pub backstab_cone: Fixed,
    /// Knockback speed from melee hits.
    #[serde(with = "decimal_serde")]
    pub melee_knockback: Fixed,
    /// Knockback speed from ranged hits.
    #[serde(with = "decimal_serde")]
    pub ranged_knockback: Fixed,
    /// Knockback duration.
    pub knockback_ms: u32,
    /// Time a dying unit stays in the roster before removal.
    pub death_linger_ms: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            think_interval_min_ms: 150,
            think_interval_max_ms: 250,
            detection_radius: Fixed::from_num(250),
            aggro_radius: Fixed::from_num(300),
            leash_range: Fixed::from_num(400),
            los_check_interval_ms: 1000,
            path_refresh_min_ms: 500,
            path_refresh_max_ms: 800,
            search_budget: crate::navigation::DEFAULT_SEARCH_BUDGET,
            stuck_threshold_ms: 200,
            stuck_speed_ratio: ratio(1, 10),
            force_path_window_ms: 1500,
            wall_slide_ms: 250,
            wall_slide_weight: ratio(8, 10),
            wall_repulsion_weight: ratio(12, 10),
            flee_threshold: ratio(2, 10),
            flee_recover_ratio: ratio(1, 2),
            return_heal_ratio: ratio(3, 10),
            arrival_radius: Fixed::from_num(8),
            wander_radius: Fixed::from_num(80),
            target_hysteresis: Fixed::from_num(5),
            provoke_duration_ms: 3000,
            backstab_multiplier: ratio(3, 2),
            backstab_cone: ratio(-1, 2),
            melee_knockback: Fixed::from_num(60),
            ranged_knockback: Fixed::from_num(20),
            knockback_ms: 150,
            death_linger_ms: 1000,
        }
    }
}

impl AiConfig {
    /// Parse from RON text; missing fields take their defaults.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| SkirmishError::ConfigParse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }
}

/// Battle-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// RNG seed; equal seeds replay identically.
    pub seed: u64,
    /// Global time scale (1 = real time).
    #[serde(with = "decimal_serde")]
    pub speed_multiplier: Fixed,
    /// AI tuning.
    pub ai: AiConfig,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            speed_multiplier: Fixed::ONE,
            ai: AiConfig::default(),
        }
    }
}

impl BattleConfig {
    /// Config with the given seed and default tuning.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}
