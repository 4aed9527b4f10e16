//! # Skirmish Core
//!
//! Deterministic tactical-combat decision core.
//!
//! Given units split into opposing teams on a 2D map with static
//! obstacles, the core decides every tick whom each unit fights, how it
//! gets there around obstacles, and how attacks resolve.
//!
//! This crate contains **only** decision logic:
//! - No rendering
//! - No file or network IO
//! - No system randomness (one seeded RNG per battle)
//! - No floating-point math in the tick loop (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`navigation`] - Occupancy grid, clearance, line of sight, A*
//! - [`targeting`] - Target selection policy
//! - [`wall_recovery`] - Sliding off obstacles after collisions
//! - [`behavior`] - Per-unit behavior state machine
//! - [`combat`] - Attack resolution
//! - [`battle`] - Tick driver owning units, rosters and the clock
//! - [`config`] - Role stats and AI tuning
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod battle;
pub mod behavior;
pub mod combat;
pub mod config;
pub mod error;
pub mod events;
pub mod math;
pub mod navigation;
pub mod targeting;
pub mod unit;
pub mod wall_recovery;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::battle::{Battle, Roster};
    pub use crate::behavior::{BehaviorState, Brain, StuckDetector};
    pub use crate::combat::{calculate_damage, can_attack, AttackOutcome, CombatResolver};
    pub use crate::config::{AiConfig, BattleConfig, RoleStats, RoleTable};
    pub use crate::error::{Result, SkirmishError};
    pub use crate::events::{AggroBroadcast, CombatEvent, StateTransition, TickEvents};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::navigation::{MapDescription, NavigationGrid, ObstacleRect, TileLayer};
    pub use crate::targeting::{select_best_target, TargetCandidate};
    pub use crate::unit::{Archetype, Role, TeamId, Unit, UnitId};
}
