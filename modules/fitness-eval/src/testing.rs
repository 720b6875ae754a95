// Test mocks for the evaluation pipeline.
//
// One mock per collaborator boundary:
// - TreeCompiler (ProgramCompiler): renders the tree, optionally rejects a node name
// - InMemoryScenarioReader (ScenarioReader): same plain scenario for every file
// - ScriptedSimulator (Simulator): per-program costs and aborts, records every job
// - FaultyBackend (ExecutionBackend): runs locally, then corrupts the result set
// - CollectingSink (EvaluationSink): keeps every generation it is handed
//
// Plus helpers for individuals, descriptors and outcomes.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use scenario_corpus::{FilenameShape, ScenarioDescriptor};
use serde_json::Map;

use crate::aggregate::IndividualResults;
use crate::dispatch::{JobBatch, JobResult, SimJob};
use crate::evaluator::GenerationContext;
use crate::executor::LocalExecutor;
use crate::individual::{Individual, ProgramTree};
use crate::outcome::{ResultObject, RunReport, SimulationOutcome, StatisticsRecord};
use crate::registry::ConfigId;
use crate::scenario::{Scenario, StopCondition};
use crate::traits::{
    DispatchPolicy, EvaluationSink, ExecutionBackend, ProgramCompiler, ScenarioReader, Simulator,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Simulated time every scripted run reaches, in milliseconds.
pub const SCRIPTED_SIM_TIME: f64 = 3_600_000.0;

/// Individual whose program is a single terminal.
pub fn individual(id: &str, terminal: &str) -> Individual {
    Individual::new(id, ProgramTree::leaf(terminal))
}

/// `n` descriptors named `0.50-20-1.00-{i}.scen`, already in corpus order.
pub fn descriptors(n: usize) -> Vec<ScenarioDescriptor> {
    let shape = FilenameShape::v1();
    (0..n)
        .map(|i| {
            let path = PathBuf::from(format!("/corpus/0.50-20-1.00-{i}.scen"));
            shape.decode(&path).expect("test file name matches shape v1")
        })
        .collect()
}

pub fn plain_scenario() -> Scenario {
    Scenario {
        models: Vec::new(),
        stop_condition: StopCondition::Named {
            name: "all_parcels_delivered".to_string(),
        },
        body: Map::new(),
    }
}

/// Statistics of a finished run with every parcel delivered.
pub fn valid_stats(travel_time: f64) -> StatisticsRecord {
    StatisticsRecord {
        total_travel_time: travel_time,
        simulation_time: SCRIPTED_SIM_TIME,
        total_parcels: 10,
        total_pickups: 10,
        total_deliveries: 10,
        total_vehicles: 2,
        vehicles_at_depot: 2,
        simulation_finished: true,
        ..Default::default()
    }
}

/// Completed outcome costing `travel_time` under 1-1-1 weights. Invalid
/// outcomes leave two parcels undelivered.
pub fn completed(travel_time: f64, valid: bool) -> SimulationOutcome {
    let mut stats = valid_stats(travel_time);
    if !valid {
        stats.total_deliveries -= 2;
    }
    SimulationOutcome::Completed(ResultObject {
        stats,
        auction: None,
    })
}

// ---------------------------------------------------------------------------
// TreeCompiler
// ---------------------------------------------------------------------------

/// Policy that sums the terminals its tree mentions.
#[derive(Debug)]
pub struct TreePolicy {
    program_id: String,
    terminals: Vec<String>,
}

impl DispatchPolicy for TreePolicy {
    fn program_id(&self) -> &str {
        &self.program_id
    }

    fn priority(&self, terminals: &HashMap<String, f64>) -> f64 {
        self.terminals
            .iter()
            .filter_map(|t| terminals.get(t))
            .sum()
    }
}

#[derive(Debug, Default)]
pub struct TreeCompiler {
    rejected: Option<String>,
}

impl TreeCompiler {
    /// Fails to compile any tree containing a node named `name`.
    pub fn rejecting(name: &str) -> Self {
        Self {
            rejected: Some(name.to_string()),
        }
    }
}

fn collect_terminals(tree: &ProgramTree, out: &mut Vec<String>) {
    if tree.children.is_empty() {
        out.push(tree.name.clone());
    }
    for child in &tree.children {
        collect_terminals(child, out);
    }
}

fn contains_node(tree: &ProgramTree, name: &str) -> bool {
    tree.name == name || tree.children.iter().any(|c| contains_node(c, name))
}

impl ProgramCompiler for TreeCompiler {
    fn compile(&self, individual: &Individual) -> Result<Arc<dyn DispatchPolicy>> {
        if let Some(rejected) = &self.rejected {
            if contains_node(&individual.tree, rejected) {
                bail!("'{rejected}' is not in the function set");
            }
        }
        let mut terminals = Vec::new();
        collect_terminals(&individual.tree, &mut terminals);
        Ok(Arc::new(TreePolicy {
            program_id: individual.tree.to_string(),
            terminals,
        }))
    }
}

// ---------------------------------------------------------------------------
// InMemoryScenarioReader
// ---------------------------------------------------------------------------

/// Returns `plain_scenario()` for every descriptor except those marked missing.
#[derive(Debug, Default)]
pub struct InMemoryScenarioReader {
    missing: HashSet<String>,
}

impl InMemoryScenarioReader {
    pub fn missing(mut self, file_name: &str) -> Self {
        self.missing.insert(file_name.to_string());
        self
    }
}

impl ScenarioReader for InMemoryScenarioReader {
    fn read(&self, descriptor: &ScenarioDescriptor) -> Result<Scenario> {
        if self.missing.contains(descriptor.file_name()) {
            return Err(anyhow!("no such scenario: {}", descriptor.path.display()));
        }
        Ok(plain_scenario())
    }
}

// ---------------------------------------------------------------------------
// ScriptedSimulator
// ---------------------------------------------------------------------------

/// What the simulator saw for one job.
#[derive(Debug, Clone)]
pub struct SeenJob {
    pub config: ConfigId,
    pub program_id: String,
    pub scenario: String,
    pub seed: u64,
    pub tick_length_ms: Option<u64>,
    pub stop_condition: StopCondition,
}

/// Deterministic simulator. A program's cost is its scripted cost (default
/// 100) plus the scenario index within the window.
#[derive(Debug, Default)]
pub struct ScriptedSimulator {
    costs: HashMap<String, f64>,
    aborts: HashMap<String, f64>,
    failing_scenario: Option<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<SeenJob>>,
}

impl ScriptedSimulator {
    pub fn with_cost(mut self, program_id: &str, cost: f64) -> Self {
        self.costs.insert(program_id.to_string(), cost);
        self
    }

    /// Every run of `program_id` aborts after `progress` simulated ms.
    pub fn aborting(mut self, program_id: &str, progress: f64) -> Self {
        self.aborts.insert(program_id.to_string(), progress);
        self
    }

    /// Every run on the scenario file `file_name` returns `Err`.
    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.failing_scenario = Some(file_name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_jobs(&self) -> Vec<SeenJob> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort_by(|a, b| (a.config, &a.scenario).cmp(&(b.config, &b.scenario)));
        seen
    }
}

impl Simulator for ScriptedSimulator {
    fn simulate(&self, job: &SimJob) -> Result<RunReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let program_id = job.config.policy.program_id().to_string();
        self.seen.lock().unwrap().push(SeenJob {
            config: job.config.id,
            program_id: program_id.clone(),
            scenario: job.scenario.file_name().to_string(),
            seed: job.seed,
            tick_length_ms: job.setup.tick_length_ms(),
            stop_condition: job.setup.stop_condition.clone(),
        });

        if self.failing_scenario.as_deref() == Some(job.scenario.file_name()) {
            bail!("simulator crashed on {}", job.scenario);
        }

        if let Some(progress) = self.aborts.get(&program_id) {
            let stats = StatisticsRecord {
                simulation_time: *progress,
                total_parcels: 10,
                total_pickups: 4,
                total_deliveries: 1,
                total_vehicles: 2,
                ..Default::default()
            };
            return Ok(RunReport {
                stats,
                auction: None,
                aborted: true,
            });
        }

        let cost = self.costs.get(&program_id).copied().unwrap_or(100.0);
        Ok(RunReport {
            stats: valid_stats(cost + job.scenario_index as f64),
            auction: None,
            aborted: false,
        })
    }
}

// ---------------------------------------------------------------------------
// FaultyBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum BackendFault {
    DropLast,
    DuplicateFirst,
    /// Reports a result for a configuration nobody submitted.
    Foreign,
}

pub struct FaultyBackend {
    inner: LocalExecutor,
    fault: BackendFault,
}

impl FaultyBackend {
    pub fn new(simulator: Arc<dyn Simulator>, fault: BackendFault) -> Self {
        Self {
            inner: LocalExecutor::new(simulator, 2),
            fault,
        }
    }
}

#[async_trait]
impl ExecutionBackend for FaultyBackend {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn execute(&self, batch: JobBatch) -> Result<Vec<JobResult>> {
        let mut results = self.inner.execute(batch).await?;
        match self.fault {
            BackendFault::DropLast => {
                results.pop();
            }
            BackendFault::DuplicateFirst => {
                if let Some(first) = results.first().cloned() {
                    results.push(first);
                }
            }
            BackendFault::Foreign => {
                if let Some(mut first) = results.first().cloned() {
                    first.config = ConfigId(usize::MAX);
                    results.push(first);
                }
            }
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// CollectingSink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CollectingSink {
    pub generations: Vec<(GenerationContext, Vec<IndividualResults>)>,
    /// Reject every delivery.
    pub refuse: bool,
}

impl EvaluationSink for CollectingSink {
    fn process_results(
        &mut self,
        context: &GenerationContext,
        results: Vec<IndividualResults>,
    ) -> Result<()> {
        if self.refuse {
            bail!("sink is closed");
        }
        self.generations.push((*context, results));
        Ok(())
    }
}
