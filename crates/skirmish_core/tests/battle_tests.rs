//! End-to-end battle tests driven through the public API.

use std::collections::BTreeMap;

use skirmish_core::behavior::BehaviorState;
use skirmish_core::error::SkirmishError;
use skirmish_core::events::CombatEvent;
use skirmish_core::unit::{Archetype, Role, UnitId};
use skirmish_test_utils::fixtures::{
    cell_center, open_battle, run_ticks, skirmish_battle, spawn, vec2, TICK_MS,
};

#[test]
fn test_warrior_duel_deals_twenty_per_frontal_hit() {
    let mut battle = open_battle(17);
    let a = spawn(&mut battle, 0, Role::Warrior, Archetype::Squad, vec2(200, 300));
    let b = spawn(&mut battle, 1, Role::Warrior, Archetype::Squad, vec2(320, 300));

    let mut frontal_hits = 0;
    for events in run_ticks(&mut battle, 200) {
        for event in &events.combat {
            if let CombatEvent::Damaged {
                attacker,
                amount,
                from_behind,
                ..
            } = *event
            {
                assert!(attacker == a || attacker == b);
                if from_behind {
                    assert_eq!(amount, 35, "30 × 1.5 - 10");
                } else {
                    assert_eq!(amount, 20, "30 - 10");
                    frontal_hits += 1;
                }
            }
        }
    }
    assert!(frontal_hits > 0, "the duel should land at least one hit");
}

#[test]
fn test_attacks_respect_cooldown() {
    let mut battle = open_battle(5);
    spawn(&mut battle, 0, Role::Warrior, Archetype::Squad, vec2(200, 300));
    spawn(&mut battle, 1, Role::Tanker, Archetype::Squad, vec2(320, 304));

    let mut last_attack: BTreeMap<UnitId, u64> = BTreeMap::new();
    for _ in 0..300 {
        let events = battle.tick(TICK_MS);
        let now = battle.clock();
        for event in &events.combat {
            let attacker = match *event {
                CombatEvent::Damaged { attacker, .. } | CombatEvent::Missed { attacker, .. } => attacker,
                _ => continue,
            };
            let cooldown = battle
                .unit(attacker)
                .map_or(0, |u| u64::from(u.stats.attack_cooldown_ms));
            if let Some(previous) = last_attack.insert(attacker, now) {
                assert!(
                    now - previous > cooldown,
                    "unit {attacker} attacked at {previous} and again at {now}"
                );
            }
        }
    }
    assert!(!last_attack.is_empty());
}

#[test]
fn test_remaining_hp_matches_damage() {
    let mut battle = open_battle(23);
    spawn(&mut battle, 0, Role::Archer, Archetype::Squad, vec2(200, 300));
    let target = spawn(&mut battle, 1, Role::Warrior, Archetype::Squad, vec2(330, 300));

    let mut hp = battle.unit(target).unwrap().hp;
    for events in run_ticks(&mut battle, 200) {
        for event in &events.combat {
            match *event {
                CombatEvent::Damaged {
                    defender,
                    amount,
                    remaining_hp,
                    ..
                } if defender == target => {
                    assert_eq!(remaining_hp, hp.saturating_sub(amount));
                    hp = remaining_hp;
                }
                CombatEvent::Healed {
                    target: healed,
                    amount,
                    ..
                } if healed == target => {
                    hp += amount;
                }
                _ => {}
            }
        }
    }
}

#[test]
fn test_units_never_end_inside_obstacles() {
    let mut battle = skirmish_battle(99);
    for _ in 0..400 {
        battle.tick(TICK_MS);
        for id in battle.iteration_order() {
            let unit = battle.unit(id).unwrap();
            assert!(
                battle.grid().fits_at(unit.position, unit.footprint()),
                "unit {id} ({}) overlaps an obstacle at {:?}",
                unit.role,
                unit.position
            );
        }
    }
}

#[test]
fn test_dead_units_are_removed_and_handles_go_stale() {
    let mut battle = open_battle(31);
    let victim = spawn(&mut battle, 0, Role::Healer, Archetype::Squad, vec2(200, 300));
    for y in [260, 300, 340] {
        spawn(&mut battle, 1, Role::Warrior, Archetype::Squad, vec2(240, y));
    }

    let mut died_at = None;
    let mut removed = false;
    for _ in 0..600 {
        let events = battle.tick(TICK_MS);
        if events.deaths().any(|id| id == victim) {
            died_at = Some(battle.clock());
            let unit = battle.unit(victim).unwrap();
            assert_eq!(unit.state(), BehaviorState::Dying);
            assert_eq!(unit.hp, 0);
        }
        if events.removed.contains(&victim) {
            let died = died_at.expect("removal follows death");
            assert!(battle.clock() >= died + u64::from(battle.config().ai.death_linger_ms));
            removed = true;
            break;
        }
    }

    assert!(removed, "outnumbered healer should die and be removed");
    assert!(battle.unit(victim).is_none());
    assert!(!battle.roster(0).contains(&victim));
    assert_eq!(battle.surviving_teams(), vec![1]);

    let attacker = battle.roster(1)[0];
    assert!(matches!(
        battle.provoke(victim, attacker, 1000),
        Err(SkirmishError::UnitNotFound(id)) if id == victim
    ));
}

#[test]
fn test_nobody_targets_the_dying() {
    let mut battle = skirmish_battle(4);
    for _ in 0..600 {
        let events = battle.tick(TICK_MS);
        let just_died: Vec<UnitId> = events.deaths().collect();
        for id in battle.iteration_order() {
            let unit = battle.unit(id).unwrap();
            if let Some(target) = unit.brain.current_target() {
                let active = battle.unit(target).is_some_and(|t| t.is_active());
                assert!(
                    active || just_died.contains(&target),
                    "unit {id} still targets inactive unit {target}"
                );
            }
        }
    }
}

#[test]
fn test_arena_squads_engage() {
    let mut battle = skirmish_battle(8);
    let events = run_ticks(&mut battle, 300);

    let transitions_to_combat = events
        .iter()
        .flat_map(|e| e.transitions.iter())
        .filter(|t| t.to == BehaviorState::Combat)
        .count();
    let hits = events
        .iter()
        .flat_map(|e| e.combat.iter())
        .filter(|e| matches!(e, CombatEvent::Damaged { .. }))
        .count();

    assert!(transitions_to_combat > 0);
    assert!(hits > 0);
}

#[test]
fn test_tanker_spawns_on_two_by_two_block() {
    let mut battle = skirmish_battle(1);
    let grid = battle.grid().clone();
    let tanker = battle.roster(0)[0];
    let unit = battle.unit(tanker).unwrap();
    assert_eq!(unit.footprint(), 2);
    assert!(grid.fits_at(unit.position, 2));

    // Spawning a tanker straddling the pillar must fail.
    let result = battle.spawn_unit(0, Role::Tanker, Archetype::Squad, cell_center(8, 3));
    assert!(matches!(result, Err(SkirmishError::InvalidState(_))));
}
