use std::path::Path;
use std::sync::Arc;

use fitness_eval::config::{EvaluationSettings, FileConfig};
use fitness_eval::testing::{
    individual, BackendFault, CollectingSink, FaultyBackend, ScriptedSimulator, TreeCompiler,
};
use fitness_eval::traits::ExecutionBackend;
use fitness_eval::{
    EvalError, EvaluatorDeps, FitnessEvaluator, GenerationContext, Individual, MAX_FITNESS,
};
use scenario_corpus::CorpusError;

const SCENARIO_JSON: &str = r#"{
    "models": [{ "type": "time", "tick_length_ms": 1000 }],
    "stop_condition": { "type": "named", "name": "all_parcels_delivered" },
    "events": []
}"#;

/// `n` matching scenario files plus files the filter must skip.
fn write_corpus(dir: &Path, n: usize) {
    for i in 0..n {
        std::fs::write(dir.join(format!("0.50-20-1.00-{i}.scen")), SCENARIO_JSON).unwrap();
    }
    std::fs::write(dir.join("0.80-20-1.00-0.scen"), SCENARIO_JSON).unwrap();
    std::fs::write(dir.join("notes.txt"), "not a scenario").unwrap();
}

fn settings(dir: &Path, extra: &str) -> EvaluationSettings {
    let raw = format!(
        r#"
        scenarios-per-generation = 3
        scenarios-in-last-generation = 10
        composite-size = 2
        reauction-option = "EVO"
        scenario-filter = '0\.50-20-1\.00-.*\.scen'
        scenario-dir = '{}'
        objective-weights = "1.0-1.0-1.0"
        max-concurrency = 4
        {extra}
        "#,
        dir.display()
    );
    let config: FileConfig = toml::from_str(&raw).unwrap();
    config.validate().unwrap()
}

fn evaluator(settings: EvaluationSettings, simulator: Arc<ScriptedSimulator>) -> FitnessEvaluator {
    let corpus = settings.load_corpus().unwrap();
    let deps = EvaluatorDeps::builder()
        .compiler(Arc::new(TreeCompiler::default()))
        .simulator(simulator)
        .build();
    FitnessEvaluator::new(settings, corpus, deps).unwrap()
}

fn population(n: usize) -> Vec<Individual> {
    (0..n)
        .map(|i| individual(&format!("ind-{i}"), &format!("t{i}")))
        .collect()
}

fn generation(index: usize, total_generations: usize) -> GenerationContext {
    GenerationContext {
        index,
        total_generations,
        seed: 123,
    }
}

// ---------------------------------------------------------------------------
// Full generation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn five_individuals_three_scenarios_gives_five_groups_of_three() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let simulator = Arc::new(ScriptedSimulator::default());
    let evaluator = evaluator(settings(dir.path(), ""), simulator.clone());

    let results = evaluator
        .evaluate_population(&generation(0, 3), &population(5))
        .await
        .unwrap();

    assert_eq!(simulator.calls(), 15);
    assert_eq!(results.len(), 5);
    for group in &results {
        assert_eq!(group.records.len(), 3);
    }
}

#[tokio::test]
async fn fitness_is_attributed_to_the_right_individual() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let simulator = Arc::new(
        ScriptedSimulator::default()
            .with_cost("t0", 10.0)
            .with_cost("t1", 20.0)
            .with_cost("t2", 30.0),
    );
    let evaluator = evaluator(settings(dir.path(), ""), simulator);
    let pop = population(3);

    let results = evaluator
        .evaluate_population(&generation(1, 3), &pop)
        .await
        .unwrap();

    for (group, (ind, base)) in results.iter().zip(pop.iter().zip([10.0, 20.0, 30.0])) {
        assert_eq!(group.individual_id, ind.id);
        assert!(group.records.iter().all(|r| r.individual_id == ind.id));
        assert_eq!(group.fitness_values(), vec![base, base + 1.0, base + 2.0]);
    }
    // Generation 1 covers corpus positions 3, 4 and 5.
    let files: Vec<_> = results[0]
        .records
        .iter()
        .map(|r| r.scenario.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        files,
        vec!["0.50-20-1.00-3.scen", "0.50-20-1.00-4.scen", "0.50-20-1.00-5.scen"]
    );
}

#[tokio::test]
async fn identical_programs_are_scored_separately() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let simulator = Arc::new(ScriptedSimulator::default());
    let evaluator = evaluator(settings(dir.path(), ""), simulator.clone());
    let pop = vec![individual("a", "slack"), individual("b", "slack")];

    let results = evaluator
        .evaluate_population(&generation(0, 3), &pop)
        .await
        .unwrap();

    assert_eq!(simulator.calls(), 6);
    assert_eq!(results[0].individual_id, "a");
    assert_eq!(results[1].individual_id, "b");
    assert_eq!(results[0].fitness_values(), results[1].fitness_values());
}

#[tokio::test]
async fn final_generation_uses_final_window() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let simulator = Arc::new(ScriptedSimulator::default());
    let evaluator = evaluator(settings(dir.path(), "reuse-scenarios = true"), simulator.clone());

    let results = evaluator
        .evaluate_population(&generation(4, 5), &population(2))
        .await
        .unwrap();

    assert_eq!(simulator.calls(), 20);
    assert!(results.iter().all(|g| g.records.len() == 10));

    let plan = evaluator.plan(5).unwrap();
    assert_eq!(plan[4].composite_size, 10);
    assert_eq!(plan[0].composite_size, 2);
}

#[tokio::test]
async fn simulator_sees_evaluation_setup() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let simulator = Arc::new(ScriptedSimulator::default());
    let evaluator = evaluator(settings(dir.path(), ""), simulator.clone());

    evaluator
        .evaluate_population(&generation(0, 3), &population(2))
        .await
        .unwrap();

    let seen = simulator.seen_jobs();
    assert!(seen.iter().all(|j| j.tick_length_ms == Some(250)));
    assert!(seen.iter().all(|j| j.seed == seen[0].seed));
}

#[tokio::test]
async fn reused_scenarios_repeat_across_generations() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let simulator = Arc::new(ScriptedSimulator::default());
    let evaluator = evaluator(settings(dir.path(), "reuse-scenarios = true"), simulator.clone());
    let pop = population(1);

    let first = evaluator
        .evaluate_population(&generation(0, 5), &pop)
        .await
        .unwrap();
    let third = evaluator
        .evaluate_population(&generation(2, 5), &pop)
        .await
        .unwrap();

    let scenarios = |r: &[fitness_eval::IndividualResults]| -> Vec<_> {
        r[0].records.iter().map(|rec| rec.scenario.clone()).collect()
    };
    assert_eq!(scenarios(&first[..]), scenarios(&third[..]));
}

#[tokio::test]
async fn empty_population_evaluates_to_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let simulator = Arc::new(ScriptedSimulator::default());
    let evaluator = evaluator(settings(dir.path(), ""), simulator.clone());

    let results = evaluator
        .evaluate_population(&generation(0, 3), &[])
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(simulator.calls(), 0);
}

// ---------------------------------------------------------------------------
// Penalties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn aborted_runs_rank_behind_every_valid_run() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let simulator = Arc::new(
        ScriptedSimulator::default()
            .aborting("t1", 1000.0)
            .aborting("t2", 5_000_000.0),
    );
    let evaluator = evaluator(settings(dir.path(), ""), simulator);

    let results = evaluator
        .evaluate_population(&generation(0, 3), &population(3))
        .await
        .unwrap();

    let worst_valid = results[0]
        .fitness_values()
        .into_iter()
        .fold(f64::MIN, f64::max);
    for penalised in &results[1..] {
        assert_eq!(penalised.aborted_runs(), 3);
        assert!(penalised.fitness_values().iter().all(|f| *f > worst_valid));
    }
    assert!(results[1]
        .fitness_values()
        .iter()
        .all(|f| *f == MAX_FITNESS - 1000.0));
    // More progress before aborting gives a strictly better penalty.
    assert!(results[2].mean_fitness().unwrap() < results[1].mean_fitness().unwrap());
    assert!(results[1].mean_fitness().unwrap() < MAX_FITNESS);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn distributed_without_backend_fails_at_setup() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let settings = settings(dir.path(), "distributed = true");
    let corpus = settings.load_corpus().unwrap();
    let deps = EvaluatorDeps::builder()
        .compiler(Arc::new(TreeCompiler::default()))
        .simulator(Arc::new(ScriptedSimulator::default()))
        .build();

    let err = FitnessEvaluator::new(settings, corpus, deps).err().unwrap();
    assert!(matches!(err, EvalError::Configuration(_)));
}

async fn run_with_faulty_backend(fault: BackendFault) -> EvalError {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let settings = settings(dir.path(), "distributed = true");
    let corpus = settings.load_corpus().unwrap();
    let backend: Arc<dyn ExecutionBackend> =
        Arc::new(FaultyBackend::new(Arc::new(ScriptedSimulator::default()), fault));
    let deps = EvaluatorDeps::builder()
        .compiler(Arc::new(TreeCompiler::default()))
        .simulator(Arc::new(ScriptedSimulator::default()))
        .distributed(backend)
        .build();
    let evaluator = FitnessEvaluator::new(settings, corpus, deps).unwrap();

    evaluator
        .evaluate_population(&generation(0, 3), &population(3))
        .await
        .unwrap_err()
}

#[tokio::test]
async fn missing_backend_results_are_incomplete() {
    let err = run_with_faulty_backend(BackendFault::DropLast).await;
    assert!(matches!(err, EvalError::IncompleteResults(_)));
}

#[tokio::test]
async fn foreign_backend_results_are_inconsistent() {
    let err = run_with_faulty_backend(BackendFault::Foreign).await;
    assert!(matches!(err, EvalError::Consistency(_)));
}

#[tokio::test]
async fn window_past_corpus_end_is_range_error() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let evaluator = evaluator(
        settings(dir.path(), ""),
        Arc::new(ScriptedSimulator::default()),
    );

    // Generation 3 of 10 would need corpus positions 9..12; generation 4 needs 12..15.
    assert!(evaluator
        .evaluate_population(&generation(3, 10), &population(1))
        .await
        .is_ok());
    let err = evaluator
        .evaluate_population(&generation(4, 10), &population(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EvalError::Corpus(CorpusError::Range { from: 12, to: 15, len: 12 })
    ));
}

#[tokio::test]
async fn compile_failure_stops_the_generation() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let settings = settings(dir.path(), "");
    let corpus = settings.load_corpus().unwrap();
    let simulator = Arc::new(ScriptedSimulator::default());
    let deps = EvaluatorDeps::builder()
        .compiler(Arc::new(TreeCompiler::rejecting("t1")))
        .simulator(simulator.clone())
        .build();
    let evaluator = FitnessEvaluator::new(settings, corpus, deps).unwrap();

    let err = evaluator
        .evaluate_population(&generation(0, 3), &population(3))
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Compile { individual, .. } if individual == "ind-1"));
    assert_eq!(simulator.calls(), 0);
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[tokio::test]
async fn results_are_delivered_to_the_sink() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path(), 12);
    let evaluator = evaluator(
        settings(dir.path(), ""),
        Arc::new(ScriptedSimulator::default()),
    );
    let mut sink = CollectingSink::default();

    evaluator
        .evaluate_into(&generation(0, 3), &population(2), &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.generations.len(), 1);
    let (context, groups) = &sink.generations[0];
    assert_eq!(context.index, 0);
    assert_eq!(groups.len(), 2);

    let mut refusing = CollectingSink {
        refuse: true,
        ..Default::default()
    };
    let err = evaluator
        .evaluate_into(&generation(1, 3), &population(2), &mut refusing)
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Sink(_)));
}
