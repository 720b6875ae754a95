//! Scenario corpus discovery and ordering.

use std::path::Path;

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::descriptor::{FilenameShape, ScenarioDescriptor};
use crate::error::{CorpusError, Result};
use crate::window::GenerationWindow;

/// Scenario descriptors in deterministic corpus order.
#[derive(Debug, Clone)]
pub struct OrderedCorpus {
    scenarios: Vec<ScenarioDescriptor>,
}

impl OrderedCorpus {
    /// Sorts `scenarios` into corpus order.
    pub fn from_descriptors(mut scenarios: Vec<ScenarioDescriptor>) -> Self {
        scenarios.sort_by(|a, b| a.corpus_cmp(b));
        Self { scenarios }
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn scenarios(&self) -> &[ScenarioDescriptor] {
        &self.scenarios
    }

    /// The slice of the corpus a generation window covers.
    pub fn window(&self, window: &GenerationWindow) -> Result<&[ScenarioDescriptor]> {
        self.scenarios
            .get(window.from..window.to)
            .ok_or(CorpusError::Range {
                from: window.from,
                to: window.to,
                len: self.scenarios.len(),
            })
    }
}

/// Load every file under `root` whose file name matches `filter`, decode it
/// with `shape`, and return the corpus in deterministic order.
///
/// An empty result is a configuration error. A file that passes the filter but
/// not the shape is a parse error: the filter and shape must agree.
pub fn load(root: &Path, filter: &Regex, shape: &FilenameShape) -> Result<OrderedCorpus> {
    if !root.is_dir() {
        return Err(CorpusError::Configuration(format!(
            "scenario directory {} does not exist or is not a directory",
            root.display()
        )));
    }

    let mut scenarios = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            CorpusError::Io {
                path,
                source: e.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        // Lossy so a non-UTF-8 name the filter selects still fails decoding.
        let name = entry.file_name().to_string_lossy();
        if !filter.is_match(&name) {
            continue;
        }
        debug!(file = %name, "Scenario matched filter");
        scenarios.push(shape.decode(entry.path())?);
    }

    if scenarios.is_empty() {
        return Err(CorpusError::Configuration(format!(
            "no scenario files under {} match filter '{}'",
            root.display(),
            filter.as_str()
        )));
    }

    let corpus = OrderedCorpus::from_descriptors(scenarios);
    info!(
        root = %root.display(),
        filter = filter.as_str(),
        scenarios = corpus.len(),
        "Scenario corpus loaded"
    );
    Ok(corpus)
}
