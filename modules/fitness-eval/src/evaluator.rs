//! Generation-level entry point: window → configurations → dispatch →
//! fitness → grouped results.

use std::sync::Arc;

use scenario_corpus::{plan_schedule, window_for, GenerationWindow, OrderedCorpus};
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::aggregate::{aggregate, expected_results_per_individual, IndividualResults};
use crate::config::EvaluationSettings;
use crate::dispatch::{DispatchRequest, ExperimentDispatcher};
use crate::error::{EvalError, Result};
use crate::executor::LocalExecutor;
use crate::fitness::translate;
use crate::individual::Individual;
use crate::objective::WeightedObjective;
use crate::registry::ConfigRegistry;
use crate::scenario::JsonScenarioReader;
use crate::traits::{
    EvaluationSink, ExecutionBackend, ObjectiveFunction, ProgramCompiler, ScenarioReader,
    Simulator,
};

/// What the evolutionary loop tells the evaluator about the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationContext {
    pub index: usize,
    pub total_generations: usize,
    /// Seed for this generation's simulations.
    pub seed: u64,
}

impl GenerationContext {
    pub fn is_final(&self) -> bool {
        self.index.checked_add(1) == Some(self.total_generations)
    }
}

/// Collaborators the evaluator is wired with.
#[derive(Clone, TypedBuilder)]
pub struct EvaluatorDeps {
    pub compiler: Arc<dyn ProgramCompiler>,
    pub simulator: Arc<dyn Simulator>,
    /// Defaults to the weighted objective from the configured weight string.
    #[builder(default, setter(strip_option))]
    pub objective: Option<Arc<dyn ObjectiveFunction>>,
    #[builder(default = Arc::new(JsonScenarioReader) as Arc<dyn ScenarioReader>)]
    pub reader: Arc<dyn ScenarioReader>,
    #[builder(default, setter(strip_option))]
    pub distributed: Option<Arc<dyn ExecutionBackend>>,
}

pub struct FitnessEvaluator {
    settings: EvaluationSettings,
    corpus: OrderedCorpus,
    compiler: Arc<dyn ProgramCompiler>,
    objective: Arc<dyn ObjectiveFunction>,
    dispatcher: ExperimentDispatcher,
}

impl FitnessEvaluator {
    /// Fails if distributed execution is configured without a backend, so a
    /// misconfigured run stops before anything is simulated.
    pub fn new(
        settings: EvaluationSettings,
        corpus: OrderedCorpus,
        deps: EvaluatorDeps,
    ) -> Result<Self> {
        if settings.distributed && deps.distributed.is_none() {
            return Err(EvalError::Configuration(
                "distributed = true but no distributed execution backend was provided"
                    .to_string(),
            ));
        }

        let objective: Arc<dyn ObjectiveFunction> = match deps.objective {
            Some(objective) => objective,
            None => Arc::new(WeightedObjective::new(settings.objective_weights)),
        };
        let local = Arc::new(LocalExecutor::new(deps.simulator, settings.max_concurrency));
        let dispatcher = ExperimentDispatcher::new(
            deps.reader,
            local,
            deps.distributed,
            settings.scenario_transform(),
            settings.post_processor,
        );

        Ok(Self {
            settings,
            corpus,
            compiler: deps.compiler,
            objective,
            dispatcher,
        })
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    pub fn corpus(&self) -> &OrderedCorpus {
        &self.corpus
    }

    /// Every window of a run of `total_generations`, or the first range error.
    pub fn plan(&self, total_generations: usize) -> Result<Vec<GenerationWindow>> {
        Ok(plan_schedule(
            total_generations,
            &self.settings.schedule,
            self.corpus.len(),
        )?)
    }

    pub async fn evaluate_population(
        &self,
        context: &GenerationContext,
        population: &[Individual],
    ) -> Result<Vec<IndividualResults>> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "generation",
            generation = context.index,
            final_generation = context.is_final(),
            run_id = %run_id
        );
        self.evaluate_inner(context, population)
            .instrument(span)
            .await
    }

    async fn evaluate_inner(
        &self,
        context: &GenerationContext,
        population: &[Individual],
    ) -> Result<Vec<IndividualResults>> {
        let schedule = &self.settings.schedule;
        let window = window_for(
            context.index,
            context.is_final(),
            schedule,
            self.corpus.len(),
        )?;
        let scenarios = self.corpus.window(&window)?;
        info!(
            window_from = window.from,
            window_to = window.to,
            composite_size = window.composite_size,
            individuals = population.len(),
            "Evaluating generation"
        );
        let names: Vec<&str> = scenarios.iter().map(|s| s.file_name()).collect();
        info!(scenarios = ?names, "Generation scenarios");

        let registry = ConfigRegistry::map_population(
            population,
            self.compiler.as_ref(),
            self.settings.reauction,
        )?;

        let dispatched = self
            .dispatcher
            .dispatch(
                DispatchRequest {
                    configurations: registry.configurations(),
                    scenarios,
                    composite_size: window.composite_size,
                    distributed: self.settings.distributed,
                    seed: context.seed,
                },
                self.objective.as_ref(),
            )
            .await?;
        registry.verify_configuration_count(dispatched.configuration_count)?;

        let records = translate(dispatched.outcomes, &registry, self.objective.as_ref())?;
        let expected = expected_results_per_individual(context.is_final(), schedule);
        let results = aggregate(records, population, expected)?;

        let aborted: usize = results.iter().map(IndividualResults::aborted_runs).sum();
        let best = results
            .iter()
            .filter_map(IndividualResults::mean_fitness)
            .min_by(f64::total_cmp);
        info!(
            individuals = results.len(),
            results_per_individual = expected,
            aborted_runs = aborted,
            best_mean_fitness = ?best,
            "Generation evaluated"
        );

        Ok(results)
    }

    /// Evaluate and hand the grouped results to the evolutionary loop.
    pub async fn evaluate_into(
        &self,
        context: &GenerationContext,
        population: &[Individual],
        sink: &mut dyn EvaluationSink,
    ) -> Result<()> {
        let results = self.evaluate_population(context, population).await?;
        sink.process_results(context, results)
            .map_err(|e| EvalError::Sink(e.into()))
    }
}
