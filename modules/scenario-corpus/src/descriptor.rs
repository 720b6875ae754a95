//! Scenario file name decoding.
//!
//! Corpus metadata is encoded positionally in each file name, e.g.
//! `0.50-20-1.00-17.scen` is dynamism 0.5, urgency 20, scale 1.0, instance 17.
//! The pattern is versioned: a new naming scheme gets a new shape constant
//! instead of a reinterpretation of the old one.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{CorpusError, Result};

/// Shape v1: `[prefix]<dynamism>-<urgency>-<scale>-<instance id>.scen`.
pub const SHAPE_V1: &str =
    r"^.*?(?P<dynamism>\d+(?:\.\d+)?)-(?P<urgency>\d+)-(?P<scale>\d+(?:\.\d+)?)-(?P<id>\d+)\.scen$";

static RE_SHAPE_V1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SHAPE_V1).expect("shape v1 pattern is valid"));

/// Named capture groups every shape must declare.
const REQUIRED_GROUPS: [&str; 4] = ["dynamism", "urgency", "scale", "id"];

/// One scenario file of the corpus. Identity is the path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioDescriptor {
    pub path: PathBuf,
    pub dynamism: f64,
    pub urgency: u32,
    pub scale: f64,
    pub instance_id: u64,
}

impl ScenarioDescriptor {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Corpus order: instance id, dynamism, urgency, scale. The path breaks
    /// remaining ties so the order is total.
    pub fn corpus_cmp(&self, other: &Self) -> Ordering {
        self.instance_id
            .cmp(&other.instance_id)
            .then_with(|| self.dynamism.total_cmp(&other.dynamism))
            .then_with(|| self.urgency.cmp(&other.urgency))
            .then_with(|| self.scale.total_cmp(&other.scale))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl fmt::Display for ScenarioDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Compiled file name shape.
#[derive(Debug, Clone)]
pub struct FilenameShape {
    regex: Regex,
}

impl FilenameShape {
    pub fn v1() -> Self {
        Self {
            regex: RE_SHAPE_V1.clone(),
        }
    }

    /// Compile a caller-supplied shape. It must declare the named groups
    /// `dynamism`, `urgency`, `scale` and `id`.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            CorpusError::Configuration(format!("invalid scenario shape pattern: {e}"))
        })?;
        let names: Vec<&str> = regex.capture_names().flatten().collect();
        if let Some(missing) = REQUIRED_GROUPS.iter().find(|g| !names.contains(*g)) {
            return Err(CorpusError::Configuration(format!(
                "scenario shape pattern is missing capture group '{missing}'"
            )));
        }
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Decode a scenario path. Only the file name is matched.
    pub fn decode(&self, path: &Path) -> Result<ScenarioDescriptor> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| self.parse_error(path))?;
        let caps = self
            .regex
            .captures(name)
            .ok_or_else(|| self.parse_error(path))?;

        let field = |group: &str| caps.name(group).map(|m| m.as_str()).unwrap_or_default();
        let dynamism: f64 = field("dynamism")
            .parse()
            .map_err(|_| self.parse_error(path))?;
        let urgency: u32 = field("urgency")
            .parse()
            .map_err(|_| self.parse_error(path))?;
        let scale: f64 = field("scale").parse().map_err(|_| self.parse_error(path))?;
        let instance_id: u64 = field("id").parse().map_err(|_| self.parse_error(path))?;

        if !(0.0..=1.0).contains(&dynamism) {
            return Err(self.parse_error(path));
        }

        Ok(ScenarioDescriptor {
            path: path.to_path_buf(),
            dynamism,
            urgency,
            scale,
            instance_id,
        })
    }

    fn parse_error(&self, path: &Path) -> CorpusError {
        CorpusError::Parse {
            file: path.display().to_string(),
            shape: self.regex.as_str().to_string(),
        }
    }
}

impl Default for FilenameShape {
    fn default() -> Self {
        Self::v1()
    }
}
