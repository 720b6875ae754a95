//! Weighted travel-time / tardiness / overtime objective.

use std::fmt;
use std::str::FromStr;

use crate::error::EvalError;
use crate::outcome::StatisticsRecord;
use crate::scenario::StopCondition;
use crate::traits::ObjectiveFunction;

/// Name of the early-stop condition the simulator maps to this objective.
pub const EARLY_STOP_NAME: &str = "weighted-objective";

/// Relative weights parsed from a `tt-td-ot` string such as `1.0-1.0-1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveWeights {
    pub travel_time: f64,
    pub tardiness: f64,
    pub overtime: f64,
}

impl FromStr for ObjectiveWeights {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| {
            EvalError::Configuration(format!(
                "invalid objective weights '{s}' (expected tt-td-ot, e.g. 1.0-1.0-1.0): {why}"
            ))
        };

        let parts: Vec<&str> = s.trim().split('-').collect();
        if parts.len() != 3 {
            return Err(invalid("need exactly three weights"));
        }
        let mut weights = [0.0f64; 3];
        for (slot, part) in weights.iter_mut().zip(&parts) {
            let w: f64 = part
                .trim()
                .parse()
                .map_err(|_| invalid(&format!("'{part}' is not a number")))?;
            if !w.is_finite() || w < 0.0 {
                return Err(invalid(&format!("'{part}' is not a finite non-negative weight")));
            }
            *slot = w;
        }

        Ok(Self {
            travel_time: weights[0],
            tardiness: weights[1],
            overtime: weights[2],
        })
    }
}

impl fmt::Display for ObjectiveWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.travel_time, self.tardiness, self.overtime)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeightedObjective {
    weights: ObjectiveWeights,
}

impl WeightedObjective {
    pub fn new(weights: ObjectiveWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ObjectiveWeights {
        self.weights
    }
}

impl ObjectiveFunction for WeightedObjective {
    fn compute_cost(&self, stats: &StatisticsRecord) -> f64 {
        self.weights.travel_time * stats.total_travel_time
            + self.weights.tardiness * (stats.pickup_tardiness + stats.delivery_tardiness)
            + self.weights.overtime * stats.overtime
    }

    /// Finished, every parcel picked up and delivered, every vehicle home.
    fn is_valid_result(&self, stats: &StatisticsRecord) -> bool {
        stats.simulation_finished
            && stats.total_pickups == stats.total_parcels
            && stats.total_deliveries == stats.total_parcels
            && stats.vehicles_at_depot == stats.total_vehicles
    }

    fn early_stop(&self) -> StopCondition {
        StopCondition::EarlyStop {
            name: EARLY_STOP_NAME.to_string(),
        }
    }
}
