//! Scenario setup as seen by this crate: the models it configures, the stop
//! condition, and an opaque body that only the simulator interprets.

use std::path::Path;

use anyhow::Context;
use scenario_corpus::ScenarioDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::traits::ScenarioReader;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Simulation clock.
    Time { tick_length_ms: u64 },
    /// Any other simulator model, passed through untouched.
    Other {
        name: String,
        #[serde(default)]
        params: Value,
    },
}

impl ModelSpec {
    pub fn is_time_model(&self) -> bool {
        matches!(self, Self::Time { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopCondition {
    /// Scenario-defined condition, interpreted by the simulator.
    Named { name: String },
    /// Hard ceiling on simulated time.
    TimeLimit { ms: u64 },
    /// Objective-driven early termination, interpreted by the simulator.
    EarlyStop { name: String },
    /// Stops as soon as any member condition holds.
    FirstOf { conditions: Vec<StopCondition> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    pub stop_condition: StopCondition,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Scenario {
    pub fn tick_length_ms(&self) -> Option<u64> {
        self.models.iter().find_map(|m| match m {
            ModelSpec::Time { tick_length_ms } => Some(*tick_length_ms),
            ModelSpec::Other { .. } => None,
        })
    }
}

/// Preparation applied to every scenario before it is simulated: the clock
/// is replaced with a fixed tick and the run stops at the first of the
/// scenario's own condition, the time ceiling, or the objective's early stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioTransform {
    pub tick_length_ms: u64,
    pub max_sim_time_ms: u64,
}

impl ScenarioTransform {
    pub fn apply(&self, scenario: Scenario, early_stop: &StopCondition) -> Scenario {
        let mut models: Vec<ModelSpec> = scenario
            .models
            .into_iter()
            .filter(|m| !m.is_time_model())
            .collect();
        models.push(ModelSpec::Time {
            tick_length_ms: self.tick_length_ms,
        });

        Scenario {
            models,
            stop_condition: StopCondition::FirstOf {
                conditions: vec![
                    scenario.stop_condition,
                    StopCondition::TimeLimit {
                        ms: self.max_sim_time_ms,
                    },
                    early_stop.clone(),
                ],
            },
            body: scenario.body,
        }
    }
}

/// Reads scenario files stored as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonScenarioReader;

impl JsonScenarioReader {
    fn read_path(path: &Path) -> anyhow::Result<Scenario> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        let scenario = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse scenario file: {}", path.display()))?;
        Ok(scenario)
    }
}

impl ScenarioReader for JsonScenarioReader {
    fn read(&self, descriptor: &ScenarioDescriptor) -> anyhow::Result<Scenario> {
        Self::read_path(&descriptor.path)
    }
}
