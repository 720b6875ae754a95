//! Outcome-to-fitness translation. Lower fitness is better.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dispatch::DispatchedOutcome;
use crate::error::Result;
use crate::outcome::SimulationOutcome;
use crate::registry::{ConfigId, ConfigRegistry};
use crate::traits::ObjectiveFunction;

/// Fitness ceiling for invalid runs. Valid costs stay below half of it, and
/// every whole millisecond of progress below that still changes the penalty.
pub const MAX_FITNESS: f64 = 1e15;

/// Fitness of an invalid run. More progress gives a lower (better) penalty,
/// but never one that beats a valid run.
pub fn penalty(progress: f64) -> f64 {
    let progress = if progress.is_finite() && progress > 0.0 {
        progress.min(MAX_FITNESS / 2.0)
    } else {
        0.0
    };
    MAX_FITNESS - progress
}

pub fn to_fitness(outcome: &SimulationOutcome, objective: &dyn ObjectiveFunction) -> f64 {
    match outcome {
        SimulationOutcome::Aborted { progress, .. } => penalty(*progress),
        SimulationOutcome::Completed(result) => {
            if objective.is_valid_result(&result.stats) {
                objective.compute_cost(&result.stats)
            } else {
                penalty(result.stats.simulation_time)
            }
        }
    }
}

/// Fitness of one run, attributed to the individual it came from.
#[derive(Debug, Clone, Serialize)]
pub struct FitnessRecord {
    pub individual_id: String,
    pub config: ConfigId,
    pub scenario: PathBuf,
    pub repetition: u32,
    pub fitness: f64,
    pub outcome: SimulationOutcome,
    pub evaluated_at: DateTime<Utc>,
}

/// One record per outcome, in outcome order. An outcome whose configuration
/// the registry does not know is a correlation error.
pub fn translate(
    outcomes: Vec<DispatchedOutcome>,
    registry: &ConfigRegistry,
    objective: &dyn ObjectiveFunction,
) -> Result<Vec<FitnessRecord>> {
    let evaluated_at = Utc::now();
    outcomes
        .into_iter()
        .map(|o| {
            let individual_id = registry.individual_id(o.config)?.to_string();
            Ok(FitnessRecord {
                individual_id,
                config: o.config,
                scenario: o.scenario.path,
                repetition: o.repetition,
                fitness: to_fitness(&o.outcome, objective),
                outcome: o.outcome,
                evaluated_at,
            })
        })
        .collect()
}
