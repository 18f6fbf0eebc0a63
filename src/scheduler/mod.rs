//! Per-frame compute graph scheduler.
//!
//! Owners enqueue graph executions into named execution groups during frame
//! setup. `submit_work` then handles one group at a time: every execution is
//! validated and bound as a unit, its dispatches are recorded in enqueue
//! order, and the executions (with their providers) are released by a
//! deferred cleanup pass.

pub mod execution;
pub mod invocation;
pub mod report;
mod runner;
mod submit;

pub use execution::{ExecutionGroup, FallbackDelegate, GraphExecution};
pub use invocation::{ShaderInvocation, group_count, merge_thread_counts};
pub use report::{ExecutionOutcome, SubmitReport};
pub use runner::GraphScheduler;
