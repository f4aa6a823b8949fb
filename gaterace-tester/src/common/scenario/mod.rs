pub mod catalog;

use crate::logic::SimulationPlan;
use catalog::catalog_scenarios;

/// A named plan plus the expectations it must satisfy.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

/// Look a scenario up by its CLI key or one of its short aliases.
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let key = match name.to_lowercase().as_str() {
        "bounds" | "counts" => "gate-count-bounds".to_string(),
        "spacing" => "min-spacing".to_string(),
        "shared" => "shared-track".to_string(),
        "fixed" => "fixed-track-stable".to_string(),
        "isolation" => "reset-isolation".to_string(),
        "crossing" => "crossing-script".to_string(),
        "laps" => "lap-count".to_string(),
        "deterministic" => "determinism".to_string(),
        other => other.to_string(),
    };
    catalog_scenarios()
        .into_iter()
        .find(|(catalog_key, _)| *catalog_key == key)
        .map(|(_, scenario)| scenario)
}

pub fn list_scenarios() -> Vec<(&'static str, String)> {
    catalog_scenarios()
        .into_iter()
        .map(|(key, scenario)| (key, scenario.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_catalog_entries() {
        let by_alias = get_scenario("LAPS").unwrap();
        let by_key = get_scenario("lap-count").unwrap();
        assert_eq!(by_alias.name, by_key.name);
        assert!(get_scenario("no-such-scenario").is_none());
    }

    #[test]
    fn listing_covers_every_catalog_key() {
        let listed = list_scenarios();
        assert!(listed.iter().any(|(key, _)| *key == "smoke"));
        assert!(listed.iter().all(|(key, _)| get_scenario(key).is_some()));
    }
}
