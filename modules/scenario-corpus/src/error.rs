use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Scenario file name '{file}' does not match shape {shape}")]
    Parse { file: String, shape: String },

    #[error("Generation window [{from}, {to}) exceeds corpus of {len} scenarios")]
    Range { from: usize, to: usize, len: usize },

    #[error("I/O error under {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CorpusError>;
