//! Data validation utilities.

use std::path::Path;

use skirmish_core::config::RoleTable;

use crate::error::{read_file, Result};
use crate::scenario::Scenario;

/// Load and validate a role table file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, does not parse, or holds
/// out-of-range stats.
pub fn validate_role_table(path: &Path) -> Result<RoleTable> {
    let text = read_file(path)?;
    let table = RoleTable::from_ron(&path.display().to_string(), &text)?;
    tracing::debug!(roles = table.roles.len(), "Role table ok");
    Ok(table)
}

/// Load a scenario and check that its battle can be built.
///
/// # Errors
///
/// Returns an error if the map is inconsistent or a unit cannot spawn.
pub fn validate_scenario(path: &Path) -> Result<Scenario> {
    let scenario = Scenario::load(path)?;
    let battle = scenario.build_battle()?;
    tracing::debug!(
        units = battle.units().len(),
        teams = battle.rosters().len(),
        "Scenario ok"
    );
    Ok(scenario)
}
