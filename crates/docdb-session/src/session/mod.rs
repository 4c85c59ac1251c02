/// Outcomes of individual steps and of a whole run.
pub mod report;
/// The step sequencer.
pub mod runner;

pub use report::{OperationOutcome, SessionReport};
pub use runner::SessionRunner;
