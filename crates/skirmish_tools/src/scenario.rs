//! Headless scenario runner.
//!
//! A scenario is a RON file bundling a map, optional role table, battle
//! config and spawn list. Running it ticks a [`Battle`] and writes one
//! JSON object per event line.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use skirmish_core::battle::Battle;
use skirmish_core::config::{BattleConfig, RoleTable};
use skirmish_core::events::{CombatEvent, StateTransition};
use skirmish_core::math::{decimal_serde, Fixed, Vec2Fixed};
use skirmish_core::navigation::MapDescription;
use skirmish_core::unit::{Archetype, Role, TeamId, UnitId};

use crate::error::{read_file, Result, ToolError};

const fn default_ticks() -> u32 {
    600
}

const fn default_dt_ms() -> u32 {
    50
}

const fn default_stop_when_decided() -> bool {
    true
}

/// One unit to spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnSpec {
    /// Owning team.
    pub team: TeamId,
    /// Unit role.
    pub role: Role,
    /// Squad or patrol.
    #[serde(default)]
    pub archetype: Archetype,
    /// Spawn x in world units.
    #[serde(with = "decimal_serde")]
    pub x: Fixed,
    /// Spawn y in world units.
    #[serde(with = "decimal_serde")]
    pub y: Fixed,
}

/// A complete headless battle setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Label for logs.
    #[serde(default)]
    pub name: String,
    /// Static geometry.
    pub map: MapDescription,
    /// Role table override; built-in defaults when absent.
    #[serde(default)]
    pub roles: Option<RoleTable>,
    /// Seed, speed and AI tuning.
    #[serde(default)]
    pub config: BattleConfig,
    /// Spawn list, in roster order.
    pub units: Vec<SpawnSpec>,
    /// Maximum ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u32,
    /// Milliseconds per tick.
    #[serde(default = "default_dt_ms")]
    pub dt_ms: u32,
    /// Stop once at most one team has living units.
    #[serde(default = "default_stop_when_decided")]
    pub stop_when_decided: bool,
}

impl Scenario {
    /// Parse a scenario from RON text.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| ToolError::Scenario {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Load a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_file(path)?;
        Self::from_ron(&path.display().to_string(), &text)
    }

    /// Build the battle and spawn every unit.
    pub fn build_battle(&self) -> Result<Battle> {
        let roles = self.roles.clone().unwrap_or_default();
        let problems = roles.validate();
        if !problems.is_empty() {
            return Err(ToolError::Scenario {
                source_name: self.name.clone(),
                message: problems.join("; "),
            });
        }

        let mut battle = Battle::from_map(&self.map, roles, self.config.clone())?;
        for spec in &self.units {
            battle.spawn_unit(
                spec.team,
                spec.role,
                spec.archetype,
                Vec2Fixed::new(spec.x, spec.y),
            )?;
        }
        Ok(battle)
    }
}

/// A combat event as written to the output stream.
#[derive(Debug, Serialize)]
pub struct EventLine<'a> {
    /// Tick number (1-based).
    pub tick: u64,
    /// Battle clock after the tick.
    pub clock: u64,
    /// The event itself; contributes the `kind` field.
    #[serde(flatten)]
    pub event: &'a CombatEvent,
}

/// A behavior state change as written to the output stream.
#[derive(Debug, Serialize)]
pub struct TransitionLine<'a> {
    /// Tick number (1-based).
    pub tick: u64,
    /// Battle clock after the tick.
    pub clock: u64,
    /// Always `"transition"`.
    pub kind: &'static str,
    /// The change.
    #[serde(flatten)]
    pub transition: &'a StateTransition,
}

/// Final line of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario label.
    pub name: String,
    /// Ticks actually executed.
    pub ticks_run: u64,
    /// Battle clock at the end.
    pub clock: u64,
    /// Teams with living units.
    pub survivors: Vec<TeamId>,
    /// Every unit that died, in order.
    pub deaths: Vec<UnitId>,
    /// Hash of the final state.
    pub state_hash: u64,
}

/// Output options for [`run_scenario`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Also write behavior state transitions.
    pub include_transitions: bool,
}

/// Run a scenario, writing one JSON line per event to `out`.
pub fn run_scenario<W: Write>(scenario: &Scenario, options: RunOptions, out: &mut W) -> Result<RunSummary> {
    let mut battle = scenario.build_battle()?;
    let mut deaths = Vec::new();
    let mut ticks_run = 0u64;

    tracing::info!(
        name = %scenario.name,
        units = scenario.units.len(),
        ticks = scenario.ticks,
        "Running scenario"
    );

    for _ in 0..scenario.ticks {
        let events = battle.tick(scenario.dt_ms);
        ticks_run += 1;

        for event in &events.combat {
            let line = EventLine {
                tick: ticks_run,
                clock: battle.clock(),
                event,
            };
            writeln!(out, "{}", serde_json::to_string(&line)?)?;
        }
        if options.include_transitions {
            for transition in &events.transitions {
                let line = TransitionLine {
                    tick: ticks_run,
                    clock: battle.clock(),
                    kind: "transition",
                    transition,
                };
                writeln!(out, "{}", serde_json::to_string(&line)?)?;
            }
        }
        deaths.extend(events.deaths());

        if scenario.stop_when_decided && battle.surviving_teams().len() <= 1 {
            tracing::debug!(tick = ticks_run, "Battle decided");
            break;
        }
    }

    let summary = RunSummary {
        name: scenario.name.clone(),
        ticks_run,
        clock: battle.clock(),
        survivors: battle.surviving_teams(),
        deaths,
        state_hash: battle.state_hash(),
    };
    writeln!(out, "{}", serde_json::to_string(&summary)?)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUEL: &str = r#"(
        name: "duel",
        map: (width: 12, height: 6, tile_size: 32.0),
        config: (seed: 3),
        units: [
            (team: 0, role: Warrior, x: 80.0, y: 96.0),
            (team: 1, role: Archer, archetype: Patrol, x: 240.0, y: 96.0),
        ],
        ticks: 200,
    )"#;

    #[test]
    fn test_parse_applies_defaults() {
        let scenario = Scenario::from_ron("duel", DUEL).unwrap();
        assert_eq!(scenario.dt_ms, 50);
        assert!(scenario.stop_when_decided);
        assert!(scenario.roles.is_none());
        assert_eq!(scenario.units[0].archetype, Archetype::Squad);
        assert_eq!(scenario.units[1].archetype, Archetype::Patrol);
        assert_eq!(scenario.config.seed, 3);
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = Scenario::from_ron("broken.ron", "(name: ").unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }

    #[test]
    fn test_run_writes_json_lines_and_summary() {
        let scenario = Scenario::from_ron("duel", DUEL).unwrap();
        let mut out = Vec::new();
        let summary = run_scenario(&scenario, RunOptions::default(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.len() > 1, "expected combat events before the summary");

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert!(first.get("kind").is_some());
        assert!(first.get("tick").is_some());

        let last: RunSummary = serde_json::from_str(lines[lines.len() - 1]).unwrap();
        assert_eq!(last, summary);
        assert!(summary.ticks_run > 0);
    }

    #[test]
    fn test_run_is_reproducible() {
        let scenario = Scenario::from_ron("duel", DUEL).unwrap();
        let options = RunOptions {
            include_transitions: true,
        };

        let mut a = Vec::new();
        let mut b = Vec::new();
        run_scenario(&scenario, options, &mut a).unwrap();
        run_scenario(&scenario, options, &mut b).unwrap();
        assert_eq!(a, b);
        assert!(String::from_utf8(a).unwrap().contains("\"transition\""));
    }

    #[test]
    fn test_blocked_spawn_is_rejected() {
        let text = "(
            map: (
                width: 4,
                height: 4,
                tile_size: 32.0,
                layers: [(name: \"walls\", rows: [\"####\", \"#..#\", \"#..#\", \"####\"])],
            ),
            units: [(team: 0, role: Warrior, x: 16.0, y: 16.0)],
        )";
        let scenario = Scenario::from_ron("walls", text).unwrap();
        assert!(matches!(
            scenario.build_battle(),
            Err(ToolError::Core(_))
        ));
    }
}
