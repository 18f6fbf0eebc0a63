use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::config::SchedulerConfig;
use crate::graph::GraphProxy;
use crate::kernel::FeatureLevel;
use crate::provider::ProviderList;
use crate::render_graph::RenderGraphBuilder;

use super::execution::{ExecutionGroup, FallbackDelegate, GraphExecution, QueuedGraphExecution};
use super::report::{ExecutionOutcome, SubmitReport};
use super::submit::stage_execution;

/// Collects graph executions during frame setup and submits each execution
/// group in one batch.
///
/// Not synchronized: enqueue and submit are expected on one logical thread,
/// in frame order.
pub struct GraphScheduler {
    config: SchedulerConfig,
    queues: HashMap<ExecutionGroup, Vec<QueuedGraphExecution>>,
}

impl Default for GraphScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl GraphScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            queues: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queue one graph execution. Takes ownership of `providers`; no GPU work
    /// happens until the group is submitted.
    pub fn enqueue(
        &mut self,
        group: ExecutionGroup,
        owner_name: impl Into<String>,
        graph_proxy: Arc<GraphProxy>,
        providers: ProviderList,
        fallback: Option<FallbackDelegate>,
    ) {
        let mut execution = GraphExecution::new(owner_name, graph_proxy, providers);
        if let Some(fallback) = fallback {
            execution = execution.with_fallback(fallback);
        }
        self.enqueue_execution(group, execution);
    }

    pub fn enqueue_execution(&mut self, group: ExecutionGroup, execution: GraphExecution) {
        let queued = QueuedGraphExecution::from(execution);
        debug!(
            group = %group,
            owner = %queued.owner_name,
            graph = queued.graph_proxy.name(),
            sub_invocations = queued.sub_invocation_count,
            "enqueued graph execution"
        );
        self.queues.entry(group).or_default().push(queued);
    }

    pub fn has_work(&self, group: &ExecutionGroup) -> bool {
        self.queued_count(group) > 0
    }

    pub fn queued_count(&self, group: &ExecutionGroup) -> usize {
        self.queues.get(group).map_or(0, Vec::len)
    }

    /// Drop every queued execution, and with them their providers, without
    /// submitting anything.
    pub fn reset(&mut self) {
        self.queues.clear();
    }

    /// Validate, bind and record every execution queued for `group`, then
    /// schedule the release of the group's executions as a deferred pass.
    pub fn submit_work(
        &mut self,
        builder: &mut dyn RenderGraphBuilder,
        group: &ExecutionGroup,
        feature_level: FeatureLevel,
    ) -> SubmitReport {
        let mut report = SubmitReport::default();
        let Some(mut executions) = self.queues.remove(group) else {
            return report;
        };
        if executions.is_empty() {
            return report;
        }

        let _span = info_span!("compute_graph_submit", group = %group).entered();
        builder.push_scope(&self.config.profile_scope);

        for execution in executions.iter_mut() {
            match stage_execution(execution, builder, feature_level, &self.config) {
                Ok(staged) => {
                    report.kernels_without_work += staged.kernels_without_work;
                    let passes = staged.into_passes();
                    let pass_count = passes.len();
                    for pass in passes {
                        debug!(
                            pass = %pass.label(),
                            groups = ?pass.group_count,
                            "recording compute pass"
                        );
                        builder.add_compute_pass(pass);
                    }
                    report.executions_dispatched += 1;
                    report.passes_recorded += pass_count;
                    report.outcomes.push(ExecutionOutcome::Dispatched {
                        owner: execution.owner_name.clone(),
                        passes: pass_count,
                    });
                }
                Err(err) => {
                    if self.config.warn_on_fallback {
                        warn!(owner = %execution.owner_name, "skipping graph execution: {err}");
                    } else {
                        debug!(owner = %execution.owner_name, "skipping graph execution: {err}");
                    }
                    let notified = execution.invoke_fallback();
                    report.executions_skipped += 1;
                    report.outcomes.push(ExecutionOutcome::FallbackInvoked {
                        owner: execution.owner_name.clone(),
                        reason: err.to_string(),
                        notified,
                    });
                }
            }
        }

        builder.pop_scope();
        builder.add_pass(
            &self.config.cleanup_pass_name,
            Box::new(move || drop(executions)),
        );

        info!(
            dispatched = report.executions_dispatched,
            skipped = report.executions_skipped,
            passes = report.passes_recorded,
            "submitted compute graphs"
        );
        report
    }
}
