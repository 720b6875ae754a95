//! fitness-eval: generational fitness evaluation of evolved dispatch policies.
//!
//! Each generation: select the corpus window, compile the population into run
//! configurations, simulate every (configuration, scenario) pair, translate
//! outcomes into fitness and hand the per-individual groups back to the
//! evolutionary loop.

pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod fitness;
pub mod individual;
pub mod objective;
pub mod outcome;
pub mod registry;
pub mod scenario;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use aggregate::IndividualResults;
pub use config::{EvaluationSettings, FileConfig, ReauctionOption};
pub use error::{EvalError, Result};
pub use evaluator::{EvaluatorDeps, FitnessEvaluator, GenerationContext};
pub use fitness::{FitnessRecord, MAX_FITNESS};
pub use individual::{Individual, ProgramTree};
