//! Evaluator configuration.
//!
//! Raw settings come from a TOML file (`FileConfig`); `validate()` turns them
//! into `EvaluationSettings`, which is what the rest of the crate reads.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use regex::Regex;
use scenario_corpus::{FilenameShape, OrderedCorpus, WindowSchedule};
use serde::Deserialize;

use crate::error::{EvalError, Result};
use crate::objective::ObjectiveWeights;
use crate::outcome::PostProcessor;
use crate::scenario::ScenarioTransform;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_PATH_ENV: &str = "FITNESS_EVAL_CONFIG";

pub const DEFAULT_TICK_LENGTH_MS: u64 = 250;
/// Eight hours of simulated time.
pub const DEFAULT_MAX_SIM_TIME_MS: u64 = 8 * 60 * 60 * 1000;

/// Re-negotiation strategy used by the simulated agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReauctionOption {
    Evo,
    Cih,
}

impl FromStr for ReauctionOption {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EVO" => Ok(Self::Evo),
            "CIH" => Ok(Self::Cih),
            other => Err(EvalError::Configuration(format!(
                "unrecognized reauction option '{other}' (expected EVO or CIH)"
            ))),
        }
    }
}

impl fmt::Display for ReauctionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evo => f.write_str("EVO"),
            Self::Cih => f.write_str("CIH"),
        }
    }
}

/// TOML-backed configuration as written on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(default)]
    pub distributed: bool,
    pub composite_size: Option<usize>,
    pub scenarios_per_generation: Option<usize>,
    pub scenarios_in_last_generation: Option<usize>,
    pub reauction_option: Option<String>,
    #[serde(default)]
    pub reuse_scenarios: bool,
    pub scenario_filter: Option<String>,
    pub scenario_shape: Option<String>,
    pub scenario_dir: Option<PathBuf>,
    pub objective_weights: Option<String>,
    pub tick_length_ms: Option<u64>,
    pub max_sim_time_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub post_processor: Option<String>,
}

/// Validated settings for one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    pub distributed: bool,
    pub schedule: WindowSchedule,
    pub reauction: ReauctionOption,
    pub scenario_dir: PathBuf,
    pub scenario_filter: Regex,
    pub scenario_shape: FilenameShape,
    pub objective_weights: ObjectiveWeights,
    pub tick_length_ms: u64,
    pub max_sim_time_ms: u64,
    pub max_concurrency: usize,
    pub post_processor: PostProcessor,
}

impl FileConfig {
    pub fn validate(self) -> Result<EvaluationSettings> {
        let scenario_dir = self
            .scenario_dir
            .ok_or_else(|| missing("scenario-dir"))?;
        let filter = self
            .scenario_filter
            .ok_or_else(|| missing("scenario-filter"))?;
        let scenario_filter = Regex::new(&filter).map_err(|e| {
            EvalError::Configuration(format!("invalid scenario-filter '{filter}': {e}"))
        })?;
        let scenario_shape = match self.scenario_shape.as_deref() {
            Some(pattern) => FilenameShape::new(pattern)?,
            None => FilenameShape::v1(),
        };

        let weights = self
            .objective_weights
            .ok_or_else(|| missing("objective-weights"))?;
        let objective_weights: ObjectiveWeights = weights.parse()?;

        let reauction: ReauctionOption = self
            .reauction_option
            .ok_or_else(|| missing("reauction-option"))?
            .parse()?;

        let post_processor = match self.post_processor.as_deref() {
            Some(name) => name.parse()?,
            None => PostProcessor::Auction,
        };

        let schedule = WindowSchedule {
            per_generation: positive(
                "scenarios-per-generation",
                self.scenarios_per_generation,
            )?,
            final_generation: positive(
                "scenarios-in-last-generation",
                self.scenarios_in_last_generation,
            )?,
            composite_size: positive("composite-size", self.composite_size.or(Some(1)))?,
            reuse_across_generations: self.reuse_scenarios,
        };

        let max_concurrency = match self.max_concurrency {
            Some(n) => positive("max-concurrency", Some(n))?,
            None => std::thread::available_parallelism().map_or(1, |n| n.get()),
        };

        let tick_length_ms = self.tick_length_ms.unwrap_or(DEFAULT_TICK_LENGTH_MS);
        if tick_length_ms == 0 {
            return Err(EvalError::Configuration(
                "tick-length-ms must be positive".to_string(),
            ));
        }

        Ok(EvaluationSettings {
            distributed: self.distributed,
            schedule,
            reauction,
            scenario_dir,
            scenario_filter,
            scenario_shape,
            objective_weights,
            tick_length_ms,
            max_sim_time_ms: self.max_sim_time_ms.unwrap_or(DEFAULT_MAX_SIM_TIME_MS),
            max_concurrency,
            post_processor,
        })
    }
}

impl EvaluationSettings {
    /// The scenario preparation applied before every evaluation run.
    pub fn scenario_transform(&self) -> ScenarioTransform {
        ScenarioTransform {
            tick_length_ms: self.tick_length_ms,
            max_sim_time_ms: self.max_sim_time_ms,
        }
    }

    pub fn load_corpus(&self) -> Result<OrderedCorpus> {
        Ok(scenario_corpus::load(
            &self.scenario_dir,
            &self.scenario_filter,
            &self.scenario_shape,
        )?)
    }

    pub fn log_summary(&self) {
        tracing::info!("Evaluation settings:");
        tracing::info!("  scenario-dir: {}", self.scenario_dir.display());
        tracing::info!("  scenario-filter: {}", self.scenario_filter.as_str());
        tracing::info!("  scenario-shape: {}", self.scenario_shape.as_str());
        tracing::info!(
            "  scenarios per generation / last generation: {} / {}",
            self.schedule.per_generation,
            self.schedule.final_generation
        );
        tracing::info!(
            "  composite-size: {} (reuse scenarios: {})",
            self.schedule.composite_size,
            self.schedule.reuse_across_generations
        );
        tracing::info!("  reauction-option: {}", self.reauction);
        tracing::info!("  objective-weights: {}", self.objective_weights);
        tracing::info!(
            "  distributed: {} (local concurrency {})",
            self.distributed,
            self.max_concurrency
        );
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

/// Resolve the config path from an explicit argument or the environment.
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    dotenvy::dotenv().ok();
    explicit
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .ok_or_else(|| {
            EvalError::Configuration(format!(
                "no config file given (pass --config or set {CONFIG_PATH_ENV})"
            ))
        })
}

fn missing(key: &str) -> EvalError {
    EvalError::Configuration(format!("required setting '{key}' is not defined"))
}

fn positive(key: &str, value: Option<usize>) -> Result<usize> {
    match value {
        Some(0) => Err(EvalError::Configuration(format!("{key} must be at least 1"))),
        Some(n) => Ok(n),
        None => Err(missing(key)),
    }
}
