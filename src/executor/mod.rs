mod context;
mod models;
mod printer;
mod runner;

pub use context::{RunContext, SlowRequestRecord};
pub use models::{IterationOptions, IterationReport, PrepareError, PreparedBody};
pub use printer::{print_iteration_report, print_run_summary};
pub use runner::{run_iteration, run_scenarios};
