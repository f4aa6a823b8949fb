pub mod course_runner;
pub mod reports;
pub mod seeds;
pub mod tester;

pub use course_runner::{
    CourseRunner, DriverKind, EpisodeRecord, ResetScope, SimulationPlan, SimulationSummary,
};
pub use seeds::resolve_seed_inputs;
pub use tester::*;
