use scenario_corpus::CorpusError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every variant is fatal for the generation being evaluated. A simulation
/// run that aborts is not an error: it becomes a penalised outcome.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("Failed to read scenario {path}: {source}")]
    ScenarioRead {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to compile individual {individual}: {source}")]
    Compile {
        individual: String,
        #[source]
        source: BoxError,
    },

    #[error("Execution backend '{backend}' failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BoxError,
    },

    #[error("Incomplete results: {0}")]
    IncompleteResults(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Correlation error: {0}")]
    Correlation(String),

    #[error("Evaluation sink rejected results: {0}")]
    Sink(#[source] BoxError),
}

pub type Result<T> = std::result::Result<T, EvalError>;
