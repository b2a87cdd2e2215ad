mod gate;
mod grader;
mod locks;
mod normalize;

pub use gate::{AttemptResult, SubmissionGate};
pub use grader::{Grader, RunResult, TestOutcome};
pub use locks::KeyedLocks;
pub use normalize::normalize;
