use serde::Serialize;

use crate::kernel::ShaderHandle;

use super::resource::ResourceName;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BufferDesc {
    pub name: ResourceName,
    pub size: u64,
}

/// A buffer bound next to the parameter struct, at `@group(0) @binding(binding)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoundResource {
    pub binding: u32,
    pub buffer: ResourceName,
}

/// One compute dispatch recorded into the render graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComputePassDesc {
    pub kernel_name: String,
    pub invocation_name: String,
    pub shader: ShaderHandle,
    /// Raw bytes of the kernel's parameter struct.
    pub parameters: Vec<u8>,
    pub resources: Vec<BoundResource>,
    pub group_count: [u32; 3],
}

impl ComputePassDesc {
    /// Profiling label, `kernel:invocation`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.kernel_name, self.invocation_name)
    }
}

/// Work run after everything recorded before it, e.g. releasing per-frame
/// provider state once the GPU commands reading it have been submitted.
pub type DeferredPass = Box<dyn FnOnce() + Send>;

/// The render-graph surface the scheduler records into.
///
/// Object safe so providers can allocate through `&mut dyn RenderGraphBuilder`.
pub trait RenderGraphBuilder {
    fn create_buffer(&mut self, desc: BufferDesc) -> ResourceName;

    fn add_compute_pass(&mut self, pass: ComputePassDesc);

    fn add_pass(&mut self, name: &str, pass: DeferredPass);

    /// Open a named profiling / GPU-stat scope.
    fn push_scope(&mut self, name: &str);

    fn pop_scope(&mut self);
}
