//! In-process execution backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::dispatch::{JobBatch, JobResult, SimJob};
use crate::traits::{ExecutionBackend, Simulator};

/// Runs jobs on the blocking thread pool, `max_concurrency` units at a time.
///
/// A unit is `composite_size` consecutive jobs simulated back to back on one
/// worker.
pub struct LocalExecutor {
    simulator: Arc<dyn Simulator>,
    max_concurrency: usize,
}

impl LocalExecutor {
    pub fn new(simulator: Arc<dyn Simulator>, max_concurrency: usize) -> Self {
        Self {
            simulator,
            max_concurrency: max_concurrency.max(1),
        }
    }
}

#[async_trait]
impl ExecutionBackend for LocalExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(&self, batch: JobBatch) -> Result<Vec<JobResult>> {
        let unit_size = batch.composite_size.max(1);
        let job_count = batch.jobs.len();

        let mut units: Vec<Vec<SimJob>> = Vec::new();
        let mut jobs = batch.jobs.into_iter().peekable();
        while jobs.peek().is_some() {
            units.push(jobs.by_ref().take(unit_size).collect());
        }
        info!(
            jobs = job_count,
            units = units.len(),
            concurrency = self.max_concurrency,
            "Running simulations locally"
        );

        let unit_results: Vec<Result<Vec<JobResult>>> =
            stream::iter(units.into_iter().map(|unit| {
                let simulator = Arc::clone(&self.simulator);
                async move {
                    tokio::task::spawn_blocking(move || run_unit(simulator.as_ref(), unit))
                        .await
                        .context("Simulation worker panicked")
                        .and_then(|r| r)
                }
            }))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut results = Vec::with_capacity(job_count);
        for unit in unit_results {
            results.extend(unit?);
        }
        Ok(results)
    }
}

fn run_unit(simulator: &dyn Simulator, unit: Vec<SimJob>) -> Result<Vec<JobResult>> {
    unit.into_iter()
        .map(|job| {
            let report = simulator.simulate(&job).with_context(|| {
                format!(
                    "Simulation of {} on {} failed",
                    job.config.program_id, job.scenario
                )
            })?;
            debug!(
                config = %job.config.id,
                scenario = %job.scenario,
                aborted = report.aborted,
                "Simulation finished"
            );
            Ok(JobResult {
                config: job.config.id,
                scenario_index: job.scenario_index,
                repetition: job.repetition,
                outcome: job.post_processor.collect(report),
            })
        })
        .collect()
}
