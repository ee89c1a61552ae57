//! Services: the pipeline coordinator, runtime state and the monitor context.

mod monitor;
mod pipeline;
mod runtime;

pub use monitor::MonitorService;
pub use pipeline::{
    Coordinator, MATCH_LINE_MAX_CHARS, Phase, PipelineOutcome, entry_body, first_matching_line,
};
pub use runtime::RuntimeState;
