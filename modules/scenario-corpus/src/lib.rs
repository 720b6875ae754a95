//! scenario-corpus: discovers, decodes and windows the pre-generated scenario corpus.
//!
//! Only file names are read here. Scenario contents belong to the simulator.

pub mod corpus;
pub mod descriptor;
pub mod error;
pub mod window;

pub use corpus::{load, OrderedCorpus};
pub use descriptor::{FilenameShape, ScenarioDescriptor, SHAPE_V1};
pub use error::{CorpusError, Result};
pub use window::{
    plan_schedule, window_for, GenerationWindow, WindowSchedule, FINAL_COMPOSITE_FACTOR,
};
