//! Collaborator boundaries: everything the evaluator calls but does not own.
//!
//! Production implementations live with the simulator and the evolutionary
//! loop. `LocalExecutor`, `JsonScenarioReader` and `WeightedObjective` are the
//! in-crate defaults; `testing` holds deterministic mocks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use scenario_corpus::ScenarioDescriptor;

use crate::aggregate::IndividualResults;
use crate::dispatch::{JobBatch, JobResult, SimJob};
use crate::evaluator::GenerationContext;
use crate::individual::Individual;
use crate::outcome::{RunReport, StatisticsRecord};
use crate::scenario::{Scenario, StopCondition};

// ---------------------------------------------------------------------------
// Scenario storage
// ---------------------------------------------------------------------------

pub trait ScenarioReader: Send + Sync {
    fn read(&self, descriptor: &ScenarioDescriptor) -> Result<Scenario>;
}

// ---------------------------------------------------------------------------
// Program compilation
// ---------------------------------------------------------------------------

/// Executable dispatch logic compiled from an individual's program tree.
pub trait DispatchPolicy: Send + Sync + fmt::Debug {
    /// Stable identifier of the compiled program (its rendered tree).
    fn program_id(&self) -> &str;

    /// Priority of a dispatch decision given the simulator's terminal values.
    fn priority(&self, terminals: &HashMap<String, f64>) -> f64;
}

/// Deterministic and side-effect free: the same individual always compiles
/// to an equivalent policy.
pub trait ProgramCompiler: Send + Sync {
    fn compile(&self, individual: &Individual) -> Result<Arc<dyn DispatchPolicy>>;
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Runs one job to completion. CPU-bound; called from blocking worker threads.
///
/// A run that ends early is reported with `RunReport::aborted`. An `Err` means
/// the simulation itself broke and fails the whole generation.
pub trait Simulator: Send + Sync {
    fn simulate(&self, job: &SimJob) -> Result<RunReport>;
}

pub trait ObjectiveFunction: Send + Sync {
    fn compute_cost(&self, stats: &StatisticsRecord) -> f64;

    fn is_valid_result(&self, stats: &StatisticsRecord) -> bool;

    /// Condition that lets the simulator stop a run that can no longer be valid.
    fn early_stop(&self) -> StopCondition;
}

/// Executes a batch of jobs and returns one result per job.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, batch: JobBatch) -> Result<Vec<JobResult>>;
}

// ---------------------------------------------------------------------------
// Evolutionary loop
// ---------------------------------------------------------------------------

/// Receives the grouped fitness records of a generation.
pub trait EvaluationSink: Send {
    fn process_results(
        &mut self,
        context: &GenerationContext,
        results: Vec<IndividualResults>,
    ) -> Result<()>;
}
