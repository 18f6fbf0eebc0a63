//! Ready-made providers for common data interfaces.

use bytemuck::{Pod, Zeroable};

use crate::kernel::PermutationAccumulator;
use crate::render_graph::{BoundResource, BufferDesc, RenderGraphBuilder, ResourceName};

use super::{DataProviderProxy, DispatchContext, DispatchData, ValidationContext};

/// Block written by [`ThreadCountProvider`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct InvocationBlock {
    pub thread_count: u32,
    /// First linear thread of this sub-invocation within a unified dispatch.
    pub thread_offset: u32,
    pub sub_invocation: u32,
    pub sub_invocation_count: u32,
}

/// Drives the shape of an execution: one entry per sub-invocation.
#[derive(Clone, Debug)]
pub struct ThreadCountProvider {
    thread_counts: Vec<[u32; 3]>,
}

impl ThreadCountProvider {
    pub fn new(thread_counts: Vec<[u32; 3]>) -> Self {
        Self { thread_counts }
    }

    /// One-dimensional counts, e.g. particles per emitter.
    pub fn linear(counts: impl IntoIterator<Item = u32>) -> Self {
        Self::new(counts.into_iter().map(|x| [x, 1, 1]).collect())
    }

    fn linear_count(&self, sub_invocation: usize) -> Option<u32> {
        let [x, y, z] = self.thread_counts.get(sub_invocation)?;
        x.checked_mul(*y)?.checked_mul(*z)
    }

    /// Linear threads of the first `end` sub-invocations.
    fn linear_total(&self, end: usize) -> Option<u32> {
        (0..end).try_fold(0u32, |total, i| total.checked_add(self.linear_count(i)?))
    }
}

impl DataProviderProxy for ThreadCountProvider {
    fn invocation_count(&self) -> usize {
        self.thread_counts.len()
    }

    fn is_valid(&self, ctx: &ValidationContext) -> bool {
        // Every offset and the unified total must fit the u32 block fields.
        ctx.sub_invocation_count == self.thread_counts.len()
            && ctx.expected_struct_size as usize == std::mem::size_of::<InvocationBlock>()
            && self.linear_total(self.thread_counts.len()).is_some()
    }

    fn dispatch_thread_counts(&self, out: &mut Vec<[u32; 3]>) -> usize {
        out.extend_from_slice(&self.thread_counts);
        self.thread_counts.len()
    }

    fn gather_dispatch_data(&self, ctx: &DispatchContext<'_>, out: &mut DispatchData) {
        let block = if ctx.unified_dispatch {
            InvocationBlock {
                thread_count: self.linear_total(self.thread_counts.len()).unwrap_or(u32::MAX),
                thread_offset: 0,
                sub_invocation: 0,
                sub_invocation_count: ctx.sub_invocation_count as u32,
            }
        } else {
            InvocationBlock {
                thread_count: self.linear_count(ctx.sub_invocation_index).unwrap_or(0),
                thread_offset: self.linear_total(ctx.sub_invocation_index).unwrap_or(u32::MAX),
                sub_invocation: ctx.sub_invocation_index as u32,
                sub_invocation_count: ctx.sub_invocation_count as u32,
            }
        };
        out.write_pod(&block);
    }
}

/// Fixed bytes for every dispatch, optionally switching permutation options.
#[derive(Clone, Debug, Default)]
pub struct ConstantBlockProvider {
    bytes: Vec<u8>,
    options: Vec<(String, bool)>,
}

impl ConstantBlockProvider {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            options: Vec::new(),
        }
    }

    pub fn from_pod<T: Pod>(value: &T) -> Self {
        Self::new(bytemuck::bytes_of(value).to_vec())
    }

    pub fn with_option(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.options.push((name.into(), enabled));
        self
    }
}

impl DataProviderProxy for ConstantBlockProvider {
    fn is_valid(&self, ctx: &ValidationContext) -> bool {
        self.bytes.len() == ctx.expected_struct_size as usize
    }

    fn gather_permutations(&self, permutations: &mut PermutationAccumulator<'_>) {
        for (name, enabled) in &self.options {
            permutations.set_all(name, *enabled);
        }
    }

    fn gather_dispatch_data(&self, _ctx: &DispatchContext<'_>, out: &mut DispatchData) {
        out.write_bytes(&self.bytes);
    }
}

/// Block written by [`BufferProvider`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct BufferBlock {
    pub element_count: u32,
    pub element_stride: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

/// A storage buffer allocated in the render graph each frame and bound at a
/// fixed binding slot.
#[derive(Clone, Debug)]
pub struct BufferProvider {
    label: String,
    element_count: u32,
    element_stride: u32,
    binding: u32,
    buffer: Option<ResourceName>,
}

impl BufferProvider {
    pub fn new(
        label: impl Into<String>,
        element_count: u32,
        element_stride: u32,
        binding: u32,
    ) -> Self {
        Self {
            label: label.into(),
            element_count,
            element_stride,
            binding,
            buffer: None,
        }
    }

    pub fn buffer(&self) -> Option<&ResourceName> {
        self.buffer.as_ref()
    }
}

impl DataProviderProxy for BufferProvider {
    fn is_valid(&self, ctx: &ValidationContext) -> bool {
        self.element_stride > 0
            && ctx.expected_struct_size as usize == std::mem::size_of::<BufferBlock>()
    }

    fn allocate_resources(&mut self, builder: &mut dyn RenderGraphBuilder) {
        let size = u64::from(self.element_count) * u64::from(self.element_stride);
        // Zero-sized storage bindings are invalid; keep at least one element.
        let size = size.max(u64::from(self.element_stride));
        let name = builder.create_buffer(BufferDesc {
            name: ResourceName::from(self.label.as_str()),
            size,
        });
        self.buffer = Some(name);
    }

    fn gather_dispatch_data(&self, _ctx: &DispatchContext<'_>, out: &mut DispatchData) {
        out.write_pod(&BufferBlock {
            element_count: self.element_count,
            element_stride: self.element_stride,
            ..Default::default()
        });
        if let Some(buffer) = &self.buffer {
            out.bind(BoundResource {
                binding: self.binding,
                buffer: buffer.clone(),
            });
        }
    }
}
