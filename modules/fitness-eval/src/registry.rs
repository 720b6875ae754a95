//! Per-generation mapping between individuals and their run configurations.
//!
//! Configurations never point back at individuals. The link is this side-table,
//! indexed by `ConfigId`, built before dispatch and dropped after translation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::ReauctionOption;
use crate::error::{EvalError, Result};
use crate::individual::Individual;
use crate::traits::{DispatchPolicy, ProgramCompiler};

/// Index of a configuration within its generation's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConfigId(pub usize);

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config-{}", self.0)
    }
}

/// Immutable, runnable form of one individual for one generation.
#[derive(Debug)]
pub struct RunConfiguration {
    pub id: ConfigId,
    pub program_id: String,
    pub policy: Arc<dyn DispatchPolicy>,
    pub reauction: ReauctionOption,
}

#[derive(Debug)]
pub struct ConfigRegistry {
    configurations: Vec<Arc<RunConfiguration>>,
    individual_ids: Vec<String>,
    by_individual: HashMap<String, ConfigId>,
}

impl ConfigRegistry {
    /// Compile every individual up front, one configuration each.
    ///
    /// Two individuals sharing an id would make fitness attribution ambiguous,
    /// so that is rejected before anything is compiled.
    pub fn map_population(
        individuals: &[Individual],
        compiler: &dyn ProgramCompiler,
        reauction: ReauctionOption,
    ) -> Result<Self> {
        let mut by_individual = HashMap::with_capacity(individuals.len());
        for (index, individual) in individuals.iter().enumerate() {
            if by_individual
                .insert(individual.id.clone(), ConfigId(index))
                .is_some()
            {
                return Err(EvalError::Consistency(format!(
                    "individual id '{}' occurs more than once in the population",
                    individual.id
                )));
            }
        }

        let mut configurations = Vec::with_capacity(individuals.len());
        for (index, individual) in individuals.iter().enumerate() {
            let policy = compiler
                .compile(individual)
                .map_err(|e| EvalError::Compile {
                    individual: individual.id.clone(),
                    source: e.into(),
                })?;
            let program_id = policy.program_id().to_string();
            debug!(
                individual = individual.id.as_str(),
                program = program_id.as_str(),
                "Compiled individual"
            );
            configurations.push(Arc::new(RunConfiguration {
                id: ConfigId(index),
                program_id,
                policy,
                reauction,
            }));
        }

        Ok(Self {
            configurations,
            individual_ids: individuals.iter().map(|i| i.id.clone()).collect(),
            by_individual,
        })
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    pub fn configurations(&self) -> &[Arc<RunConfiguration>] {
        &self.configurations
    }

    pub fn individual_id(&self, config: ConfigId) -> Result<&str> {
        self.individual_ids
            .get(config.0)
            .map(String::as_str)
            .ok_or_else(|| {
                EvalError::Correlation(format!(
                    "{config} is not part of this generation's {} configurations",
                    self.individual_ids.len()
                ))
            })
    }

    pub fn config_for(&self, individual_id: &str) -> Option<ConfigId> {
        self.by_individual.get(individual_id).copied()
    }

    /// The dispatcher's distinct configuration count must equal the number of
    /// individuals, or results cannot be attributed.
    pub fn verify_configuration_count(&self, dispatched: usize) -> Result<()> {
        if dispatched != self.individual_ids.len() {
            return Err(EvalError::Consistency(format!(
                "dispatcher ran {dispatched} distinct configurations for {} individuals",
                self.individual_ids.len()
            )));
        }
        Ok(())
    }
}
