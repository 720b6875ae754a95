//! Experiment dispatch: one simulation job per (configuration, scenario,
//! repetition), handed to an execution backend and checked on the way back.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scenario_corpus::ScenarioDescriptor;
use tracing::{debug, info};

use crate::error::{EvalError, Result};
use crate::outcome::{PostProcessor, SimulationOutcome};
use crate::registry::{ConfigId, RunConfiguration};
use crate::scenario::{Scenario, ScenarioTransform};
use crate::traits::{ExecutionBackend, ObjectiveFunction, ScenarioReader};

/// Runs per (configuration, scenario) pair.
pub const REPETITIONS: u32 = 1;

/// Everything a simulator needs for one run.
#[derive(Debug, Clone)]
pub struct SimJob {
    pub config: Arc<RunConfiguration>,
    /// Position of the scenario within the generation's window.
    pub scenario_index: usize,
    pub scenario: ScenarioDescriptor,
    /// Transformed setup, shared by every job on the same scenario.
    pub setup: Arc<Scenario>,
    pub repetition: u32,
    pub seed: u64,
    pub post_processor: PostProcessor,
}

/// Jobs submitted to a backend in one call.
#[derive(Debug, Clone)]
pub struct JobBatch {
    pub jobs: Vec<SimJob>,
    /// Jobs per work unit. A unit is the smallest piece a backend schedules.
    pub composite_size: usize,
    pub repetitions: u32,
}

/// What a backend returns for one job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub config: ConfigId,
    pub scenario_index: usize,
    pub repetition: u32,
    pub outcome: SimulationOutcome,
}

#[derive(Debug, Clone)]
pub struct DispatchedOutcome {
    pub config: ConfigId,
    pub scenario_index: usize,
    pub scenario: ScenarioDescriptor,
    pub repetition: u32,
    pub outcome: SimulationOutcome,
}

/// Verified results of a dispatch, ordered by configuration, scenario and
/// repetition.
#[derive(Debug, Clone)]
pub struct Dispatched {
    /// Distinct configurations that were run.
    pub configuration_count: usize,
    pub outcomes: Vec<DispatchedOutcome>,
}

pub struct DispatchRequest<'a> {
    pub configurations: &'a [Arc<RunConfiguration>],
    pub scenarios: &'a [ScenarioDescriptor],
    pub composite_size: usize,
    pub distributed: bool,
    /// Seed for the per-repetition simulator seeds.
    pub seed: u64,
}

pub struct ExperimentDispatcher {
    reader: Arc<dyn ScenarioReader>,
    local: Arc<dyn ExecutionBackend>,
    distributed: Option<Arc<dyn ExecutionBackend>>,
    transform: ScenarioTransform,
    post_processor: PostProcessor,
}

type JobKey = (ConfigId, usize, u32);

impl ExperimentDispatcher {
    pub fn new(
        reader: Arc<dyn ScenarioReader>,
        local: Arc<dyn ExecutionBackend>,
        distributed: Option<Arc<dyn ExecutionBackend>>,
        transform: ScenarioTransform,
        post_processor: PostProcessor,
    ) -> Self {
        Self {
            reader,
            local,
            distributed,
            transform,
            post_processor,
        }
    }

    fn backend(&self, distributed: bool) -> Result<&Arc<dyn ExecutionBackend>> {
        if !distributed {
            return Ok(&self.local);
        }
        self.distributed.as_ref().ok_or_else(|| {
            EvalError::Configuration(
                "distributed execution requested but no distributed backend is configured"
                    .to_string(),
            )
        })
    }

    /// Read every scenario once and apply the evaluation transform.
    fn prepare_scenarios(
        &self,
        scenarios: &[ScenarioDescriptor],
        objective: &dyn ObjectiveFunction,
    ) -> Result<Vec<Arc<Scenario>>> {
        let early_stop = objective.early_stop();
        scenarios
            .iter()
            .map(|descriptor| {
                let scenario =
                    self.reader
                        .read(descriptor)
                        .map_err(|e| EvalError::ScenarioRead {
                            path: descriptor.path.display().to_string(),
                            source: e.into(),
                        })?;
                Ok(Arc::new(self.transform.apply(scenario, &early_stop)))
            })
            .collect()
    }

    pub async fn dispatch(
        &self,
        request: DispatchRequest<'_>,
        objective: &dyn ObjectiveFunction,
    ) -> Result<Dispatched> {
        let backend = self.backend(request.distributed)?;

        let mut configurations: BTreeMap<ConfigId, Arc<RunConfiguration>> = BTreeMap::new();
        for config in request.configurations {
            configurations
                .entry(config.id)
                .or_insert_with(|| Arc::clone(config));
        }

        let setups = self.prepare_scenarios(request.scenarios, objective)?;

        let mut rng = StdRng::seed_from_u64(request.seed);
        let seeds: Vec<u64> = (0..REPETITIONS).map(|_| rng.random()).collect();

        let mut jobs = Vec::with_capacity(
            configurations.len() * request.scenarios.len() * REPETITIONS as usize,
        );
        for config in configurations.values() {
            for (index, (descriptor, setup)) in
                request.scenarios.iter().zip(&setups).enumerate()
            {
                for (repetition, seed) in (0..REPETITIONS).zip(&seeds) {
                    jobs.push(SimJob {
                        config: Arc::clone(config),
                        scenario_index: index,
                        scenario: descriptor.clone(),
                        setup: Arc::clone(setup),
                        repetition,
                        seed: *seed,
                        post_processor: self.post_processor,
                    });
                }
            }
        }

        let expected: BTreeSet<JobKey> = jobs
            .iter()
            .map(|j| (j.config.id, j.scenario_index, j.repetition))
            .collect();

        info!(
            backend = backend.name(),
            configurations = configurations.len(),
            scenarios = request.scenarios.len(),
            jobs = jobs.len(),
            composite_size = request.composite_size,
            "Dispatching experiment"
        );

        let results = backend
            .execute(JobBatch {
                jobs,
                composite_size: request.composite_size.max(1),
                repetitions: REPETITIONS,
            })
            .await
            .map_err(|e| EvalError::Backend {
                backend: backend.name().to_string(),
                source: e.into(),
            })?;

        let outcomes = collect_results(&expected, results)?;
        debug!(outcomes = outcomes.len(), "All jobs accounted for");

        Ok(Dispatched {
            configuration_count: configurations.len(),
            outcomes: outcomes
                .into_iter()
                .map(|((config, scenario_index, repetition), outcome)| DispatchedOutcome {
                    config,
                    scenario_index,
                    scenario: request.scenarios[scenario_index].clone(),
                    repetition,
                    outcome,
                })
                .collect(),
        })
    }
}

/// Match backend results against the submitted jobs: every job exactly once,
/// nothing else.
fn collect_results(
    expected: &BTreeSet<JobKey>,
    results: Vec<JobResult>,
) -> Result<BTreeMap<JobKey, SimulationOutcome>> {
    let mut outcomes = BTreeMap::new();
    for result in results {
        let key = (result.config, result.scenario_index, result.repetition);
        if !expected.contains(&key) {
            return Err(EvalError::Consistency(format!(
                "backend returned a result for {} on scenario #{} (repetition {}) that was never submitted",
                key.0, key.1, key.2
            )));
        }
        if outcomes.insert(key, result.outcome).is_some() {
            return Err(EvalError::Consistency(format!(
                "backend returned more than one result for {} on scenario #{} (repetition {})",
                key.0, key.1, key.2
            )));
        }
    }

    if outcomes.len() != expected.len() {
        let missing: Vec<String> = expected
            .iter()
            .filter(|k| !outcomes.contains_key(k))
            .take(5)
            .map(|(c, s, r)| format!("{c}/#{s}/{r}"))
            .collect();
        return Err(EvalError::IncompleteResults(format!(
            "{} of {} jobs returned no result (first missing: {})",
            expected.len() - outcomes.len(),
            expected.len(),
            missing.join(", ")
        )));
    }

    Ok(outcomes)
}
