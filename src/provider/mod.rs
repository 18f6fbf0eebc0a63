//! Data providers: per-frame objects that feed kernels their bindings.
//!
//! A graph execution owns one provider per data interface slot. Slots can be
//! empty on purpose; the scheduler only fails when a kernel actually reads an
//! empty slot.

pub mod builtin;

use bytemuck::Pod;

use crate::kernel::{ParameterMember, PermutationAccumulator};
use crate::render_graph::{BoundResource, RenderGraphBuilder};

pub use builtin::{BufferProvider, ConstantBlockProvider, ThreadCountProvider};

/// What a provider is checked against before anything is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationContext {
    pub sub_invocation_count: usize,
    /// Byte size of the struct member the provider fills.
    pub expected_struct_size: u32,
}

/// Where a provider's block goes for one dispatch.
#[derive(Clone, Copy, Debug)]
pub struct DispatchContext<'a> {
    pub kernel_name: &'a str,
    pub member: &'a ParameterMember,
    pub sub_invocation_index: usize,
    pub sub_invocation_count: usize,
    /// The dispatch covers every sub-invocation at once.
    pub unified_dispatch: bool,
}

/// Bytes and resources a provider contributes to one dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchData {
    pub bytes: Vec<u8>,
    pub resources: Vec<BoundResource>,
}

impl DispatchData {
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.bytes.extend_from_slice(bytemuck::bytes_of(value));
    }

    pub fn bind(&mut self, resource: BoundResource) {
        self.resources.push(resource);
    }
}

pub trait DataProviderProxy: Send {
    /// Units of work this provider drives. `0` means it does not drive the
    /// shape of the execution.
    fn invocation_count(&self) -> usize {
        0
    }

    fn is_valid(&self, ctx: &ValidationContext) -> bool;

    fn gather_permutations(&self, _permutations: &mut PermutationAccumulator<'_>) {}

    /// Thread counts per sub-invocation, returning how many were written.
    /// Only called on a kernel's execution provider.
    fn dispatch_thread_counts(&self, _out: &mut Vec<[u32; 3]>) -> usize {
        0
    }

    fn allocate_resources(&mut self, _builder: &mut dyn RenderGraphBuilder) {}

    fn gather_dispatch_data(&self, ctx: &DispatchContext<'_>, out: &mut DispatchData);
}

pub type DataProviderHandle = Box<dyn DataProviderProxy>;

/// Provider slots of one execution, index-aligned with kernel descriptors.
pub type ProviderList = Vec<Option<DataProviderHandle>>;

/// Fan-out of an execution: the first non-empty provider reporting work
/// decides, otherwise one sub-invocation.
pub fn select_sub_invocation_count(providers: &[Option<DataProviderHandle>]) -> usize {
    providers
        .iter()
        .flatten()
        .map(|p| p.invocation_count())
        .find(|&count| count > 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counted(usize);

    impl DataProviderProxy for Counted {
        fn invocation_count(&self) -> usize {
            self.0
        }

        fn is_valid(&self, _ctx: &ValidationContext) -> bool {
            true
        }

        fn gather_dispatch_data(&self, _ctx: &DispatchContext<'_>, _out: &mut DispatchData) {}
    }

    fn slot(count: usize) -> Option<DataProviderHandle> {
        Some(Box::new(Counted(count)))
    }

    #[test]
    fn first_provider_with_work_decides() {
        let providers = vec![None, slot(0), slot(3), slot(5)];
        assert_eq!(select_sub_invocation_count(&providers), 3);
    }

    #[test]
    fn defaults_to_one() {
        assert_eq!(select_sub_invocation_count(&[]), 1);
        assert_eq!(select_sub_invocation_count(&[None, slot(0)]), 1);
    }
}
