//! Chaos engineering scenarios for DST.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// DST-001: Walk straight through a zone; must enter, then leave
    WalkThrough,

    /// DST-002: Walk away from every zone; distance never shrinks
    Departure,

    /// DST-003: Corrupt fixes mixed into the stream; none reach the trail
    GlitchStorm,

    /// DST-004: Source failures and outages; state never changes on failure
    SensorDropout,

    /// DST-005: Bounded trail over a long session
    LongHaul,

    /// DST-006: No zones configured
    EmptyCatalog,

    /// DST-007: Teardown mid-stream; late fixes are ignored
    EarlyTeardown,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::WalkThrough,
            ScenarioId::Departure,
            ScenarioId::GlitchStorm,
            ScenarioId::SensorDropout,
            ScenarioId::LongHaul,
            ScenarioId::EmptyCatalog,
            ScenarioId::EarlyTeardown,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::WalkThrough => "walk_through",
            ScenarioId::Departure => "departure",
            ScenarioId::GlitchStorm => "glitch_storm",
            ScenarioId::SensorDropout => "sensor_dropout",
            ScenarioId::LongHaul => "long_haul",
            ScenarioId::EmptyCatalog => "empty_catalog",
            ScenarioId::EarlyTeardown => "early_teardown",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::WalkThrough => "Cross the first zone north to south with GNSS noise",
            ScenarioId::Departure => "Leave the first zone on a straight path with perfect fixes",
            ScenarioId::GlitchStorm => "25% of fixes corrupt (out of range, NaN, time regression)",
            ScenarioId::SensorDropout => "Periodic timeouts and outages from the source",
            ScenarioId::LongHaul => "Trail capped at a quarter of the emitted fixes",
            ScenarioId::EmptyCatalog => "Walk with zero zones configured",
            ScenarioId::EarlyTeardown => "Tear the session down halfway through the stream",
        }
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "walk_through" | "walkthrough" | "dst-001" => Ok(ScenarioId::WalkThrough),
            "departure" | "dst-002" => Ok(ScenarioId::Departure),
            "glitch_storm" | "glitchstorm" | "dst-003" => Ok(ScenarioId::GlitchStorm),
            "sensor_dropout" | "sensordropout" | "dst-004" => Ok(ScenarioId::SensorDropout),
            "long_haul" | "longhaul" | "dst-005" => Ok(ScenarioId::LongHaul),
            "empty_catalog" | "emptycatalog" | "dst-006" => Ok(ScenarioId::EmptyCatalog),
            "early_teardown" | "earlyteardown" | "dst-007" => Ok(ScenarioId::EarlyTeardown),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
