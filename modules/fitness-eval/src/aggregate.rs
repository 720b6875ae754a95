//! Groups fitness records by individual and checks every individual got
//! exactly the expected number of them.

use std::collections::HashMap;

use scenario_corpus::WindowSchedule;
use serde::Serialize;
use tracing::warn;

use crate::dispatch::REPETITIONS;
use crate::error::{EvalError, Result};
use crate::fitness::FitnessRecord;
use crate::individual::Individual;

#[derive(Debug, Clone, Serialize)]
pub struct IndividualResults {
    pub individual_id: String,
    /// In dispatch order: by scenario, then repetition.
    pub records: Vec<FitnessRecord>,
}

impl IndividualResults {
    pub fn fitness_values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.fitness).collect()
    }

    pub fn mean_fitness(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        Some(self.records.iter().map(|r| r.fitness).sum::<f64>() / self.records.len() as f64)
    }

    pub fn aborted_runs(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_aborted()).count()
    }
}

/// Results each individual receives in one generation.
pub fn expected_results_per_individual(is_final: bool, schedule: &WindowSchedule) -> usize {
    let scenarios = if is_final {
        schedule.final_generation
    } else {
        schedule.per_generation
    };
    scenarios * REPETITIONS as usize
}

/// One group per individual, in population order.
pub fn aggregate(
    records: Vec<FitnessRecord>,
    population: &[Individual],
    expected_per_individual: usize,
) -> Result<Vec<IndividualResults>> {
    let mut groups: HashMap<&str, Vec<FitnessRecord>> = population
        .iter()
        .map(|i| (i.id.as_str(), Vec::with_capacity(expected_per_individual)))
        .collect();

    for record in records {
        match groups.get_mut(record.individual_id.as_str()) {
            Some(group) => group.push(record),
            None => {
                return Err(EvalError::Correlation(format!(
                    "fitness record for unknown individual '{}'",
                    record.individual_id
                )))
            }
        }
    }

    population
        .iter()
        .map(|individual| {
            let records = groups.remove(individual.id.as_str()).unwrap_or_default();
            if records.len() != expected_per_individual {
                warn!(
                    individual = individual.id.as_str(),
                    got = records.len(),
                    expected = expected_per_individual,
                    "Result count mismatch"
                );
                return Err(EvalError::Consistency(format!(
                    "individual '{}' has {} results, expected {}",
                    individual.id,
                    records.len(),
                    expected_per_individual
                )));
            }
            Ok(IndividualResults {
                individual_id: individual.id.clone(),
                records,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConfigId;
    use crate::testing::{completed, individual};
    use chrono::Utc;

    fn record(id: &str, fitness: f64) -> FitnessRecord {
        FitnessRecord {
            individual_id: id.to_string(),
            config: ConfigId(0),
            scenario: "s.scen".into(),
            repetition: 0,
            fitness,
            outcome: completed(fitness, true),
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn groups_in_population_order() {
        let pop = vec![individual("b", "x"), individual("a", "y")];
        let records = vec![
            record("a", 1.0),
            record("b", 2.0),
            record("a", 3.0),
            record("b", 4.0),
        ];

        let groups = aggregate(records, &pop, 2).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].individual_id, "b");
        assert_eq!(groups[0].fitness_values(), vec![2.0, 4.0]);
        assert_eq!(groups[1].fitness_values(), vec![1.0, 3.0]);
        assert_eq!(groups[1].mean_fitness(), Some(2.0));
    }

    #[test]
    fn short_group_is_consistency_error() {
        let pop = vec![individual("a", "x"), individual("b", "y")];
        let records = vec![record("a", 1.0), record("a", 2.0), record("b", 3.0)];
        assert!(matches!(
            aggregate(records, &pop, 2),
            Err(EvalError::Consistency(_))
        ));
    }

    #[test]
    fn unknown_individual_is_correlation_error() {
        let pop = vec![individual("a", "x")];
        let records = vec![record("a", 1.0), record("ghost", 2.0)];
        assert!(matches!(
            aggregate(records, &pop, 1),
            Err(EvalError::Correlation(_))
        ));
    }

    #[test]
    fn final_generation_expects_final_count() {
        let schedule = WindowSchedule {
            per_generation: 3,
            final_generation: 10,
            composite_size: 2,
            reuse_across_generations: false,
        };
        assert_eq!(expected_results_per_individual(false, &schedule), 3);
        assert_eq!(expected_results_per_individual(true, &schedule), 10);
    }

    #[test]
    fn empty_population_yields_no_groups() {
        assert!(aggregate(Vec::new(), &[], 3).unwrap().is_empty());
    }
}
