use serde::Serialize;

use super::builder::{BufferDesc, ComputePassDesc, DeferredPass, RenderGraphBuilder};
use super::resource::ResourceName;

/// Everything a [`RecordingGraphBuilder`] saw, in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum RecordedPass {
    Compute(ComputePassDesc),
    Deferred { name: String },
    ScopeBegin { name: String },
    ScopeEnd,
}

/// Render graph that only records. Deferred passes run on [`execute`].
///
/// [`execute`]: RecordingGraphBuilder::execute
#[derive(Default)]
pub struct RecordingGraphBuilder {
    passes: Vec<RecordedPass>,
    buffers: Vec<BufferDesc>,
    deferred: Vec<(String, DeferredPass)>,
    executed_deferred: usize,
}

impl RecordingGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn passes(&self) -> &[RecordedPass] {
        &self.passes
    }

    pub fn compute_passes(&self) -> impl Iterator<Item = &ComputePassDesc> {
        self.passes.iter().filter_map(|p| match p {
            RecordedPass::Compute(desc) => Some(desc),
            _ => None,
        })
    }

    pub fn compute_pass_count(&self) -> usize {
        self.compute_passes().count()
    }

    pub fn buffers(&self) -> &[BufferDesc] {
        &self.buffers
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    pub fn executed_deferred(&self) -> usize {
        self.executed_deferred
    }

    /// Run deferred passes in recording order.
    pub fn execute(&mut self) {
        for (_, pass) in self.deferred.drain(..) {
            pass();
            self.executed_deferred += 1;
        }
    }

    /// Drop recorded passes, keeping buffer declarations.
    pub fn clear_passes(&mut self) {
        self.passes.clear();
    }
}

impl RenderGraphBuilder for RecordingGraphBuilder {
    fn create_buffer(&mut self, desc: BufferDesc) -> ResourceName {
        let name = desc.name.clone();
        self.buffers.push(desc);
        name
    }

    fn add_compute_pass(&mut self, pass: ComputePassDesc) {
        self.passes.push(RecordedPass::Compute(pass));
    }

    fn add_pass(&mut self, name: &str, pass: DeferredPass) {
        self.passes.push(RecordedPass::Deferred {
            name: name.to_string(),
        });
        self.deferred.push((name.to_string(), pass));
    }

    fn push_scope(&mut self, name: &str) {
        self.passes.push(RecordedPass::ScopeBegin {
            name: name.to_string(),
        });
    }

    fn pop_scope(&mut self) {
        self.passes.push(RecordedPass::ScopeEnd);
    }
}
