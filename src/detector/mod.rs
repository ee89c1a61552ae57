//! Activity detection: process evidence and churn scoring.

mod activity;
mod process;

pub use activity::{ActivityScorer, CHURN_WEIGHT, PROCESS_WEIGHT};
pub use process::{FixedProbe, ProcessProbe, SystemProcessProbe, matches_indicator};
