#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use compute_forge::graph::{GraphProxy, GraphSource, KernelEntry, KernelInfo};
use compute_forge::kernel::{
    KernelResource, MemberKind, ParameterLayout, ParameterMember, PermutationAccumulator,
    PermutationDomain, PermutationVector, ShaderMap,
};
use compute_forge::provider::{
    DataProviderHandle, DataProviderProxy, DispatchContext, DispatchData, ValidationContext,
};
use compute_forge::render_graph::{BufferDesc, RenderGraphBuilder, ResourceName};

#[derive(Clone, Default)]
pub struct Counters {
    pub drops: Arc<AtomicUsize>,
    pub allocations: Arc<AtomicUsize>,
    pub gathers: Arc<AtomicUsize>,
}

impl Counters {
    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn gathers(&self) -> usize {
        self.gathers.load(Ordering::SeqCst)
    }
}

/// Provider with scripted answers and instrumented lifetime.
pub struct ScriptedProvider {
    pub invocation_count: usize,
    pub thread_counts: Vec<[u32; 3]>,
    /// Bytes written per dispatch; each byte is the sub-invocation index.
    pub block_size: usize,
    pub valid: bool,
    /// Option toggled per sub-invocation.
    pub option: Option<(String, Vec<bool>)>,
    pub buffer: Option<(String, u32)>,
    pub counters: Counters,
}

impl ScriptedProvider {
    pub fn new(block_size: usize, counters: &Counters) -> Self {
        Self {
            invocation_count: 0,
            thread_counts: Vec::new(),
            block_size,
            valid: true,
            option: None,
            buffer: None,
            counters: counters.clone(),
        }
    }

    /// Execution provider driving `thread_counts.len()` sub-invocations.
    pub fn driver(thread_counts: Vec<[u32; 3]>, block_size: usize, counters: &Counters) -> Self {
        let mut provider = Self::new(block_size, counters);
        provider.invocation_count = thread_counts.len();
        provider.thread_counts = thread_counts;
        provider
    }

    pub fn boxed(self) -> Option<DataProviderHandle> {
        Some(Box::new(self))
    }
}

impl Drop for ScriptedProvider {
    fn drop(&mut self) {
        self.counters.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl DataProviderProxy for ScriptedProvider {
    fn invocation_count(&self) -> usize {
        self.invocation_count
    }

    fn is_valid(&self, _ctx: &ValidationContext) -> bool {
        self.valid
    }

    fn gather_permutations(&self, permutations: &mut PermutationAccumulator<'_>) {
        if let Some((name, per_sub)) = &self.option {
            for (i, enabled) in per_sub.iter().enumerate() {
                permutations.set(i, name, *enabled);
            }
        }
    }

    fn dispatch_thread_counts(&self, out: &mut Vec<[u32; 3]>) -> usize {
        out.extend_from_slice(&self.thread_counts);
        self.thread_counts.len()
    }

    fn allocate_resources(&mut self, builder: &mut dyn RenderGraphBuilder) {
        self.counters.allocations.fetch_add(1, Ordering::SeqCst);
        if let Some((label, _)) = &self.buffer {
            builder.create_buffer(BufferDesc {
                name: ResourceName::from(label.as_str()),
                size: 64,
            });
        }
    }

    fn gather_dispatch_data(&self, ctx: &DispatchContext<'_>, out: &mut DispatchData) {
        self.counters.gathers.fetch_add(1, Ordering::SeqCst);
        out.write_bytes(&vec![ctx.sub_invocation_index as u8; self.block_size]);
        if let Some((label, binding)) = &self.buffer {
            out.bind(compute_forge::render_graph::BoundResource {
                binding: *binding,
                buffer: ResourceName::from(label.as_str()),
            });
        }
    }
}

/// Layout with one 16-byte struct member per name, laid out back to back.
pub fn struct_layout(members: &[&str]) -> ParameterLayout {
    let members: Vec<ParameterMember> = members
        .iter()
        .enumerate()
        .map(|(i, name)| ParameterMember::nested(*name, i as u32 * 16, 16))
        .collect();
    ParameterLayout::new(members.len() as u32 * 16, members)
}

pub struct TestKernel {
    pub name: &'static str,
    pub layout: ParameterLayout,
    pub bound: Vec<usize>,
    pub execution_provider: usize,
    pub group_dim: [u32; 3],
    pub unified: bool,
    pub options: Vec<&'static str>,
    pub resource: Arc<dyn KernelResource>,
}

impl TestKernel {
    /// Single-member kernel reading slot 0 and driven by slot 0.
    pub fn simple(name: &'static str) -> Self {
        Self {
            name,
            layout: struct_layout(&["invocation"]),
            bound: vec![0],
            execution_provider: 0,
            group_dim: [64, 1, 1],
            unified: false,
            options: Vec::new(),
            resource: Arc::new(ShaderMap::immediate(0)),
        }
    }

    pub fn entry(self) -> KernelEntry {
        let domain = PermutationDomain::new(self.options.iter().copied()).expect("domain");
        KernelEntry {
            kernel: Some(KernelInfo {
                name: self.name.to_string(),
                group_dim: self.group_dim,
                permutation_domain: domain,
                default_permutation: PermutationVector::default(),
            }),
            resource: Some(self.resource),
            parameter_metadata: Some(self.layout),
            invocation_name: format!("{}_inv", self.name),
            bound_provider_indices: self.bound,
            execution_provider_index: self.execution_provider,
            supports_unified_dispatch: self.unified,
        }
    }
}

pub fn proxy(name: &str, kernels: Vec<TestKernel>) -> Arc<GraphProxy> {
    let source = GraphSource {
        name: name.to_string(),
        kernels: kernels.into_iter().map(TestKernel::entry).collect(),
    };
    Arc::new(GraphProxy::initialize(&source).expect("graph proxy"))
}

pub fn scalar(name: &str, kind: MemberKind, offset: u32) -> ParameterMember {
    ParameterMember::scalar(name, kind, offset)
}

/// Fallback that counts its invocations.
pub fn counting_fallback(counter: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
    let counter = counter.clone();
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}
