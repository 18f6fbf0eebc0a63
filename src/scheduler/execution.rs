use std::borrow::Cow;
use std::sync::Arc;

use crate::graph::GraphProxy;
use crate::params::ParameterBindings;
use crate::provider::{ProviderList, select_sub_invocation_count};

/// Named bucket of queued executions submitted together.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionGroup(Cow<'static, str>);

impl ExecutionGroup {
    pub const IMMEDIATE: ExecutionGroup = ExecutionGroup(Cow::Borrowed("Immediate"));
    pub const END_OF_FRAME_UPDATE: ExecutionGroup =
        ExecutionGroup(Cow::Borrowed("EndOfFrameUpdate"));
    pub const BEGIN_INIT_VIEWS: ExecutionGroup = ExecutionGroup(Cow::Borrowed("BeginInitViews"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExecutionGroup {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ExecutionGroup {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for ExecutionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Called once when an execution cannot run this frame.
pub type FallbackDelegate = Box<dyn FnOnce() + Send>;

/// A graph execution request, built by the owner each frame.
pub struct GraphExecution {
    owner_name: String,
    graph_proxy: Arc<GraphProxy>,
    providers: ProviderList,
    fallback: Option<FallbackDelegate>,
    constants: ParameterBindings,
}

impl GraphExecution {
    pub fn new(
        owner_name: impl Into<String>,
        graph_proxy: Arc<GraphProxy>,
        providers: ProviderList,
    ) -> Self {
        Self {
            owner_name: owner_name.into(),
            graph_proxy,
            providers,
            fallback: None,
            constants: ParameterBindings::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl FnOnce() + Send + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn with_constants(mut self, constants: ParameterBindings) -> Self {
        self.constants = constants;
        self
    }
}

/// An execution waiting in a group for the next submission. Dropping it drops
/// its providers.
pub(crate) struct QueuedGraphExecution {
    pub(crate) owner_name: String,
    pub(crate) graph_proxy: Arc<GraphProxy>,
    pub(crate) providers: ProviderList,
    pub(crate) fallback: Option<FallbackDelegate>,
    pub(crate) constants: ParameterBindings,
    pub(crate) sub_invocation_count: usize,
}

impl QueuedGraphExecution {
    pub(crate) fn invoke_fallback(&mut self) -> bool {
        match self.fallback.take() {
            Some(fallback) => {
                fallback();
                true
            }
            None => false,
        }
    }
}

impl From<GraphExecution> for QueuedGraphExecution {
    fn from(execution: GraphExecution) -> Self {
        let sub_invocation_count = select_sub_invocation_count(&execution.providers);
        Self {
            owner_name: execution.owner_name,
            graph_proxy: execution.graph_proxy,
            providers: execution.providers,
            fallback: execution.fallback,
            constants: execution.constants,
            sub_invocation_count,
        }
    }
}
