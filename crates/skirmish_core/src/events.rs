//! Events produced by a battle tick.
//!
//! Presentation, audio and reward layers subscribe to these; the core
//! never acts on them itself.

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorState;
use crate::unit::UnitId;

/// Discrete combat outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombatEvent {
    /// An attack landed.
    Damaged {
        /// Attacking unit.
        attacker: UnitId,
        /// Unit that took damage.
        defender: UnitId,
        /// Hit points removed.
        amount: u32,
        /// Whether the backstab multiplier applied.
        from_behind: bool,
        /// Defender hit points after the hit.
        remaining_hp: u32,
    },
    /// An attack missed; the cooldown was still consumed.
    Missed {
        /// Attacking unit.
        attacker: UnitId,
        /// Intended target.
        defender: UnitId,
    },
    /// A unit's hit points reached zero.
    Died {
        /// Unit that died.
        unit: UnitId,
        /// Unit that landed the killing blow.
        killer: Option<UnitId>,
    },
    /// Hit points were restored.
    Healed {
        /// Source of the heal (the unit itself when returning to spawn).
        healer: UnitId,
        /// Unit that was healed.
        target: UnitId,
        /// Hit points restored.
        amount: u32,
    },
}

/// Change of a unit's primary behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Unit that changed state.
    pub unit: UnitId,
    /// Previous state.
    pub from: BehaviorState,
    /// New state.
    pub to: BehaviorState,
}

/// A unit that entered combat pulled nearby allies in with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggroBroadcast {
    /// Unit that spotted the enemy.
    pub source: UnitId,
    /// Shared target.
    pub target: UnitId,
    /// Allies that joined.
    pub recruited: Vec<UnitId>,
}

/// Events generated during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Combat outcomes, in resolution order.
    pub combat: Vec<CombatEvent>,
    /// State changes, in the order they happened.
    pub transitions: Vec<StateTransition>,
    /// Aggro broadcasts.
    pub aggro: Vec<AggroBroadcast>,
    /// Units removed from the battle after their death linger.
    pub removed: Vec<UnitId>,
}

impl TickEvents {
    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combat.is_empty()
            && self.transitions.is_empty()
            && self.aggro.is_empty()
            && self.removed.is_empty()
    }

    /// Record a state transition if there was one.
    pub fn push_transition(&mut self, transition: Option<StateTransition>) {
        if let Some(transition) = transition {
            self.transitions.push(transition);
        }
    }

    /// Units that died this tick.
    pub fn deaths(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.combat.iter().filter_map(|event| match event {
            CombatEvent::Died { unit, .. } => Some(*unit),
            _ => None,
        })
    }

    /// Total damage dealt to `unit` this tick.
    #[must_use]
    pub fn damage_to(&self, unit: UnitId) -> u32 {
        self.combat
            .iter()
            .map(|event| match event {
                CombatEvent::Damaged {
                    defender, amount, ..
                } if *defender == unit => *amount,
                _ => 0,
            })
            .sum()
    }
}
