//! Attack resolution.
//!
//! One call resolves one attack from one unit against another:
//! - cooldown gating (`now > last + cooldown`)
//! - miss roll against the attacker's miss chance
//! - backstab multiplier when striking from behind
//! - flat defense with a minimum of 1 damage
//! - death and knockback
//!
//! The miss roll is passed in so resolution itself stays pure.

use crate::behavior::BehaviorState;
use crate::config::AiConfig;
use crate::events::{CombatEvent, TickEvents};
use crate::math::{Fixed, Vec2Fixed};
use crate::unit::{DeathRecord, Knockback, Unit};

/// Whether an attack is allowed at `now` given the last attack time.
#[must_use]
pub const fn can_attack(now: u64, last: u64, cooldown_ms: u32) -> bool {
    now > last + cooldown_ms as u64
}

/// `max(1, attack - defense)`.
#[must_use]
pub fn calculate_damage(attack: u32, defense: u32) -> u32 {
    calculate_scaled_damage(attack, Fixed::ONE, defense)
}

/// `max(1, floor(attack × multiplier) - defense)`.
#[must_use]
pub fn calculate_scaled_damage(attack: u32, multiplier: Fixed, defense: u32) -> u32 {
    let scaled = Fixed::saturating_from_num(attack).saturating_mul(multiplier);
    let raw: u32 = scaled.floor().saturating_to_num();
    raw.saturating_sub(defense).max(1)
}

/// Whether `attacker_pos` lies behind a defender facing `defender_facing`.
///
/// A defender that has never moved has no facing and cannot be backstabbed.
#[must_use]
pub fn is_from_behind(
    defender_pos: Vec2Fixed,
    defender_facing: Vec2Fixed,
    attacker_pos: Vec2Fixed,
    cone: Fixed,
) -> bool {
    if defender_facing.is_zero() {
        return false;
    }
    let to_attacker = defender_pos.direction_to(attacker_pos);
    !to_attacker.is_zero() && defender_facing.dot(to_attacker) < cone
}

/// What happened when an attack was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    /// Still cooling down; nothing happened.
    NotReady,
    /// Cooldown consumed, no damage.
    Missed,
    /// Damage applied.
    Hit {
        /// Hit points removed.
        damage: u32,
        /// Backstab multiplier applied.
        from_behind: bool,
        /// The defender died.
        killed: bool,
    },
}

/// Resolves attacks and heals between units.
#[derive(Debug, Clone, Copy)]
pub struct CombatResolver<'a> {
    ai: &'a AiConfig,
}

impl<'a> CombatResolver<'a> {
    /// Create a resolver with the given tuning.
    #[must_use]
    pub const fn new(ai: &'a AiConfig) -> Self {
        Self { ai }
    }

    /// Resolve one attack. `roll` is uniform in `[0, 1)`; it misses when
    /// below the attacker's miss chance.
    pub fn resolve_attack(
        &self,
        attacker: &mut Unit,
        defender: &mut Unit,
        now: u64,
        roll: Fixed,
        events: &mut TickEvents,
    ) -> AttackOutcome {
        if defender.is_dying() || !attacker.attack_ready(now) {
            return AttackOutcome::NotReady;
        }

        attacker.last_attack_at = Some(now);
        let toward = attacker.position.direction_to(defender.position);
        if !toward.is_zero() {
            attacker.facing = toward;
        }

        if roll < attacker.stats.miss_chance {
            tracing::trace!(attacker = attacker.id, defender = defender.id, "Attack missed");
            events.combat.push(CombatEvent::Missed {
                attacker: attacker.id,
                defender: defender.id,
            });
            return AttackOutcome::Missed;
        }

        let from_behind = is_from_behind(
            defender.position,
            defender.facing,
            attacker.position,
            self.ai.backstab_cone,
        );
        let multiplier = if from_behind {
            self.ai.backstab_multiplier
        } else {
            Fixed::ONE
        };

        let damage = calculate_scaled_damage(
            attacker.stats.attack_power,
            multiplier,
            defender.stats.defense,
        );
        let dealt = defender.apply_damage(damage);

        events.combat.push(CombatEvent::Damaged {
            attacker: attacker.id,
            defender: defender.id,
            amount: dealt,
            from_behind,
            remaining_hp: defender.hp,
        });

        let killed = defender.hp == 0;
        if killed {
            self.kill(defender, Some(attacker.id), now, events);
        } else {
            let strength = if attacker.role.is_ranged() {
                self.ai.ranged_knockback
            } else {
                self.ai.melee_knockback
            };
            defender.knockback = Some(Knockback {
                velocity: toward.scale(strength),
                until: now + u64::from(self.ai.knockback_ms),
            });
        }

        AttackOutcome::Hit {
            damage: dealt,
            from_behind,
            killed,
        }
    }

    /// Heal an ally, gated on the healer's cooldown. Returns the amount
    /// restored, or `None` when nothing happened.
    pub fn resolve_heal(
        &self,
        healer: &mut Unit,
        ally: &mut Unit,
        now: u64,
        events: &mut TickEvents,
    ) -> Option<u32> {
        if ally.is_dying() || healer.stats.heal_power == 0 || !healer.attack_ready(now) {
            return None;
        }

        healer.last_attack_at = Some(now);
        let amount = ally.heal(healer.stats.heal_power);
        events.combat.push(CombatEvent::Healed {
            healer: healer.id,
            target: ally.id,
            amount,
        });
        Some(amount)
    }

    /// Move a unit into the terminal dying state.
    pub fn kill(
        &self,
        unit: &mut Unit,
        killer: Option<crate::unit::UnitId>,
        now: u64,
        events: &mut TickEvents,
    ) {
        if unit.is_dying() {
            return;
        }

        unit.hp = 0;
        unit.death = Some(DeathRecord { at: now, killer });
        unit.velocity = Vec2Fixed::ZERO;
        unit.knockback = None;
        unit.collision_enabled = false;
        events.push_transition(unit.brain.set_state(unit.id, BehaviorState::Dying));
        unit.brain.clear_target();

        tracing::debug!(unit = unit.id, ?killer, "Unit died");
        events.combat.push(CombatEvent::Died {
            unit: unit.id,
            killer,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleStats;
    use crate::math::ratio;
    use crate::unit::{Archetype, Role};

    fn unit(id: u64, team: u8, x: i32, attack: u32, defense: u32) -> Unit {
        let mut stats = RoleStats::default_for(Role::Warrior);
        stats.attack_power = attack;
        stats.defense = defense;
        stats.max_hp = 100;
        let mut unit = Unit::new(
            team,
            Role::Warrior,
            Archetype::Squad,
            stats,
            Vec2Fixed::from_ints(x, 0),
        );
        unit.id = id;
        unit
    }

    const HIT: Fixed = Fixed::ONE;

    #[test]
    fn test_damage_formula() {
        assert_eq!(calculate_damage(50, 0), 50);
        assert_eq!(calculate_damage(30, 10), 20);
        assert_eq!(calculate_damage(10, 999), 1);
        assert_eq!(calculate_damage(0, 0), 1);
    }

    #[test]
    fn test_scaled_damage_floors() {
        // 15 × 1.5 = 22.5 → 22, minus 2
        assert_eq!(calculate_scaled_damage(15, ratio(3, 2), 2), 20);
        assert_eq!(calculate_scaled_damage(u32::MAX, ratio(3, 2), 0), i32::MAX as u32);
    }

    #[test]
    fn test_cooldown_gate() {
        assert!(!can_attack(1000, 800, 500));
        assert!(!can_attack(1300, 800, 500));
        assert!(can_attack(1301, 800, 500));
        assert!(can_attack(1400, 800, 500));
    }

    #[test]
    fn test_hit_applies_flat_defense() {
        let ai = AiConfig::default();
        let resolver = CombatResolver::new(&ai);
        let mut attacker = unit(1, 0, 0, 30, 0);
        let mut defender = unit(2, 1, 20, 10, 10);
        let mut events = TickEvents::default();

        let outcome = resolver.resolve_attack(&mut attacker, &mut defender, 0, HIT, &mut events);

        assert_eq!(
            outcome,
            AttackOutcome::Hit {
                damage: 20,
                from_behind: false,
                killed: false
            }
        );
        assert_eq!(defender.hp, 80);
        assert_eq!(attacker.last_attack_at, Some(0));
        assert!(defender.knockback.unwrap().velocity.x > Fixed::ZERO);
    }

    #[test]
    fn test_miss_consumes_cooldown_without_damage() {
        let ai = AiConfig::default();
        let resolver = CombatResolver::new(&ai);
        let mut attacker = unit(1, 0, 0, 30, 0);
        let mut defender = unit(2, 1, 20, 10, 10);
        let mut events = TickEvents::default();

        let outcome =
            resolver.resolve_attack(&mut attacker, &mut defender, 100, Fixed::ZERO, &mut events);

        assert_eq!(outcome, AttackOutcome::Missed);
        assert_eq!(defender.hp, 100);
        assert!(defender.knockback.is_none());
        assert_eq!(attacker.last_attack_at, Some(100));
        assert_eq!(
            resolver.resolve_attack(&mut attacker, &mut defender, 200, HIT, &mut events),
            AttackOutcome::NotReady
        );
    }

    #[test]
    fn test_backstab_multiplier() {
        let ai = AiConfig::default();
        let resolver = CombatResolver::new(&ai);
        // Defender faces +x, attacker sits at -x behind it
        let mut attacker = unit(1, 0, 0, 30, 0);
        let mut defender = unit(2, 1, 20, 10, 0);
        defender.facing = Vec2Fixed::from_ints(1, 0);
        let mut events = TickEvents::default();

        let outcome = resolver.resolve_attack(&mut attacker, &mut defender, 0, HIT, &mut events);

        assert_eq!(
            outcome,
            AttackOutcome::Hit {
                damage: 45,
                from_behind: true,
                killed: false
            }
        );
    }

    #[test]
    fn test_frontal_attack_no_backstab() {
        let facing_attacker = Vec2Fixed::from_ints(-1, 0);
        assert!(!is_from_behind(
            Vec2Fixed::from_ints(20, 0),
            facing_attacker,
            Vec2Fixed::ZERO,
            ratio(-1, 2)
        ));
    }

    #[test]
    fn test_kill_enters_dying() {
        let ai = AiConfig::default();
        let resolver = CombatResolver::new(&ai);
        let mut attacker = unit(1, 0, 0, 500, 0);
        let mut defender = unit(2, 1, 20, 10, 0);
        defender.velocity = Vec2Fixed::from_ints(5, 5);
        let mut events = TickEvents::default();

        let outcome = resolver.resolve_attack(&mut attacker, &mut defender, 0, HIT, &mut events);

        assert!(matches!(outcome, AttackOutcome::Hit { killed: true, .. }));
        assert!(defender.is_dying());
        assert_eq!(defender.state(), BehaviorState::Dying);
        assert_eq!(defender.velocity, Vec2Fixed::ZERO);
        assert!(!defender.collision_enabled);
        assert_eq!(events.deaths().collect::<Vec<_>>(), vec![2]);

        // Dying units take no further attacks
        let mut other = unit(3, 0, 0, 30, 0);
        assert_eq!(
            resolver.resolve_attack(&mut other, &mut defender, 5000, HIT, &mut events),
            AttackOutcome::NotReady
        );
    }

    #[test]
    fn test_ranged_knockback_weaker() {
        let ai = AiConfig::default();
        let resolver = CombatResolver::new(&ai);
        let mut melee = unit(1, 0, 0, 30, 0);
        let mut archer = unit(3, 0, 0, 30, 0);
        archer.role = Role::Archer;
        let mut a = unit(2, 1, 20, 10, 0);
        let mut b = unit(4, 1, 20, 10, 0);
        let mut events = TickEvents::default();

        resolver.resolve_attack(&mut melee, &mut a, 0, HIT, &mut events);
        resolver.resolve_attack(&mut archer, &mut b, 0, HIT, &mut events);

        assert!(a.knockback.unwrap().velocity.x > b.knockback.unwrap().velocity.x);
    }

    #[test]
    fn test_heal_respects_cooldown_and_cap() {
        let ai = AiConfig::default();
        let resolver = CombatResolver::new(&ai);
        let mut healer = unit(1, 0, 0, 5, 0);
        healer.stats.heal_power = 15;
        let mut ally = unit(2, 0, 10, 5, 0);
        ally.hp = 95;
        let mut events = TickEvents::default();

        assert_eq!(resolver.resolve_heal(&mut healer, &mut ally, 0, &mut events), Some(5));
        assert_eq!(ally.hp, 100);
        assert_eq!(resolver.resolve_heal(&mut healer, &mut ally, 10, &mut events), None);
    }
}
