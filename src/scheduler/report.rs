use serde::Serialize;

/// Terminal state of one queued execution within a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state")]
pub enum ExecutionOutcome {
    Dispatched {
        owner: String,
        passes: usize,
    },
    FallbackInvoked {
        owner: String,
        reason: String,
        /// Whether a fallback delegate was bound.
        notified: bool,
    },
}

/// Summary of one `submit_work` call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SubmitReport {
    pub executions_dispatched: usize,
    pub executions_skipped: usize,
    pub passes_recorded: usize,
    /// Kernels of dispatched executions whose thread count was empty.
    pub kernels_without_work: usize,
    pub outcomes: Vec<ExecutionOutcome>,
}

impl SubmitReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
