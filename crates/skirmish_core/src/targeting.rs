//! Target selection.
//!
//! Pure functions over candidate snapshots. Candidates are evaluated in
//! the order given, and the running best is only displaced by a strictly
//! better candidate, so callers that list the current target first get
//! stable targeting for free.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2Fixed};
use crate::unit::{Unit, UnitId};

/// Snapshot of a unit considered for targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCandidate {
    /// Candidate handle.
    pub id: UnitId,
    /// World position.
    pub position: Vec2Fixed,
    /// Current hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Whether the candidate is currently targeting the selecting unit.
    pub aggro: bool,
    /// False for dying or removed units.
    pub active: bool,
}

impl TargetCandidate {
    /// Snapshot `unit` from the point of view of `observer`.
    #[must_use]
    pub fn from_unit(unit: &Unit, observer: UnitId) -> Self {
        Self {
            id: unit.id,
            position: unit.position,
            hp: unit.hp,
            max_hp: unit.stats.max_hp,
            aggro: unit.brain.current_target() == Some(observer),
            active: unit.is_active(),
        }
    }

    /// `hp / max_hp`, with an empty pool counting as full.
    fn hp_ratio(&self) -> Fixed {
        if self.max_hp == 0 {
            return Fixed::ONE;
        }
        Fixed::from_num(self.hp) / Fixed::from_num(self.max_hp)
    }
}

/// Pick the best enemy for a unit at `origin`.
///
/// Applied in order:
/// 1. a candidate targeting the selector beats one that is not;
/// 2. with equal aggro, a candidate strictly closer by more than
///    `hysteresis` wins, otherwise the two count as tied;
/// 3. ties go to the lower current HP, then to the earlier candidate.
#[must_use]
pub fn select_best_target(
    origin: Vec2Fixed,
    candidates: &[TargetCandidate],
    hysteresis: Fixed,
) -> Option<UnitId> {
    let mut best: Option<(&TargetCandidate, Fixed)> = None;

    for candidate in candidates.iter().filter(|c| c.active) {
        let distance = origin.distance(candidate.position);

        let replace = match best {
            None => true,
            Some((incumbent, incumbent_distance)) => {
                if candidate.aggro != incumbent.aggro {
                    candidate.aggro
                } else if distance + hysteresis < incumbent_distance {
                    true
                } else if incumbent_distance + hysteresis < distance {
                    false
                } else {
                    candidate.hp < incumbent.hp
                }
            }
        };

        if replace {
            best = Some((candidate, distance));
        }
    }

    best.map(|(candidate, _)| candidate.id)
}

/// Pick the most wounded ally (lowest HP ratio) within `range` of a healer.
///
/// Allies at full health are ignored; ties keep the earlier candidate.
#[must_use]
pub fn select_heal_target(
    origin: Vec2Fixed,
    allies: &[TargetCandidate],
    range: Fixed,
) -> Option<UnitId> {
    let range_sq = range.saturating_mul(range);

    allies
        .iter()
        .filter(|a| a.active && a.hp < a.max_hp)
        .filter(|a| origin.distance_squared(a.position) <= range_sq)
        .fold(None::<&TargetCandidate>, |best, ally| match best {
            Some(b) if b.hp_ratio() <= ally.hp_ratio() => Some(b),
            _ => Some(ally),
        })
        .map(|ally| ally.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn candidate(id: UnitId, x: i32, hp: u32, aggro: bool) -> TargetCandidate {
        TargetCandidate {
            id,
            position: Vec2Fixed::from_ints(x, 0),
            hp,
            max_hp: 100,
            aggro,
            active: true,
        }
    }

    #[test]
    fn test_empty_candidates() {
        assert_eq!(select_best_target(Vec2Fixed::ZERO, &[], fixed(5)), None);
    }

    #[test]
    fn test_aggro_beats_distance_and_hp() {
        let candidates = [candidate(1, 10, 5, false), candidate(2, 500, 100, true)];
        assert_eq!(select_best_target(Vec2Fixed::ZERO, &candidates, fixed(5)), Some(2));

        let reversed = [candidate(2, 500, 100, true), candidate(1, 10, 5, false)];
        assert_eq!(select_best_target(Vec2Fixed::ZERO, &reversed, fixed(5)), Some(2));
    }

    #[test]
    fn test_closer_beyond_margin_wins() {
        let candidates = [candidate(1, 100, 10, false), candidate(2, 90, 100, false)];
        assert_eq!(select_best_target(Vec2Fixed::ZERO, &candidates, fixed(5)), Some(2));
    }

    #[test]
    fn test_within_margin_keeps_earlier() {
        let candidates = [candidate(1, 100, 50, false), candidate(2, 96, 50, false)];
        assert_eq!(select_best_target(Vec2Fixed::ZERO, &candidates, fixed(5)), Some(1));
    }

    #[test]
    fn test_within_margin_lower_hp_wins() {
        let candidates = [candidate(1, 100, 50, false), candidate(2, 103, 20, false)];
        assert_eq!(select_best_target(Vec2Fixed::ZERO, &candidates, fixed(5)), Some(2));
    }

    #[test]
    fn test_inactive_skipped() {
        let mut dying = candidate(1, 1, 0, true);
        dying.active = false;
        let candidates = [dying, candidate(2, 200, 100, false)];
        assert_eq!(select_best_target(Vec2Fixed::ZERO, &candidates, fixed(5)), Some(2));
    }

    #[test]
    fn test_heal_target_lowest_ratio_in_range() {
        let mut tank = candidate(1, 20, 100, false);
        tank.max_hp = 400; // 25%
        let allies = [
            candidate(2, 10, 30, false), // 30%
            tank,
            candidate(3, 500, 1, false), // out of range
            candidate(4, 5, 100, false), // full health
        ];
        assert_eq!(select_heal_target(Vec2Fixed::ZERO, &allies, fixed(100)), Some(1));
    }

    #[test]
    fn test_heal_target_none_when_all_healthy() {
        let allies = [candidate(1, 10, 100, false)];
        assert_eq!(select_heal_target(Vec2Fixed::ZERO, &allies, fixed(100)), None);
    }
}
