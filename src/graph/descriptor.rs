use std::sync::Arc;

use crate::error::GraphProxyError;
use crate::kernel::{KernelResource, ParameterLayout, PermutationDomain, PermutationVector};

/// Static description of one kernel inside a graph.
pub struct KernelInvocationDescriptor {
    kernel_name: String,
    invocation_name: String,
    group_dim: [u32; 3],
    parameter_layout: ParameterLayout,
    bound_provider_indices: Vec<usize>,
    execution_provider_index: usize,
    supports_unified_dispatch: bool,
    permutation_domain: PermutationDomain,
    base_permutation: PermutationVector,
    resource: Arc<dyn KernelResource>,
}

/// Everything needed to build a descriptor; checked by
/// [`KernelInvocationDescriptor::new`].
pub struct DescriptorParts {
    pub kernel_name: String,
    pub invocation_name: String,
    pub group_dim: [u32; 3],
    pub parameter_layout: ParameterLayout,
    pub bound_provider_indices: Vec<usize>,
    pub execution_provider_index: usize,
    pub supports_unified_dispatch: bool,
    pub permutation_domain: PermutationDomain,
    pub base_permutation: PermutationVector,
    pub resource: Arc<dyn KernelResource>,
}

impl KernelInvocationDescriptor {
    pub fn new(parts: DescriptorParts) -> Result<Self, GraphProxyError> {
        if parts.group_dim.contains(&0) {
            return Err(GraphProxyError::ZeroGroupDim {
                kernel: parts.kernel_name,
                group_dim: parts.group_dim,
            });
        }
        let struct_members = parts.parameter_layout.struct_member_count();
        if struct_members != parts.bound_provider_indices.len() {
            return Err(GraphProxyError::BoundProviderCountMismatch {
                kernel: parts.kernel_name,
                struct_members,
                bound: parts.bound_provider_indices.len(),
            });
        }
        Ok(Self {
            kernel_name: parts.kernel_name,
            invocation_name: parts.invocation_name,
            group_dim: parts.group_dim,
            parameter_layout: parts.parameter_layout,
            bound_provider_indices: parts.bound_provider_indices,
            execution_provider_index: parts.execution_provider_index,
            supports_unified_dispatch: parts.supports_unified_dispatch,
            permutation_domain: parts.permutation_domain,
            base_permutation: parts.base_permutation,
            resource: parts.resource,
        })
    }

    pub fn kernel_name(&self) -> &str {
        &self.kernel_name
    }

    pub fn invocation_name(&self) -> &str {
        &self.invocation_name
    }

    pub fn group_dim(&self) -> [u32; 3] {
        self.group_dim
    }

    pub fn parameter_layout(&self) -> &ParameterLayout {
        &self.parameter_layout
    }

    /// Provider slot for the n-th struct member of the parameter layout.
    pub fn bound_provider_indices(&self) -> &[usize] {
        &self.bound_provider_indices
    }

    pub fn execution_provider_index(&self) -> usize {
        self.execution_provider_index
    }

    pub fn supports_unified_dispatch(&self) -> bool {
        self.supports_unified_dispatch
    }

    pub fn permutation_domain(&self) -> &PermutationDomain {
        &self.permutation_domain
    }

    /// Permutation cached at graph preparation; providers adjust it per frame.
    pub fn base_permutation(&self) -> PermutationVector {
        self.base_permutation
    }

    pub fn resource(&self) -> &dyn KernelResource {
        self.resource.as_ref()
    }
}

impl std::fmt::Debug for KernelInvocationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelInvocationDescriptor")
            .field("kernel_name", &self.kernel_name)
            .field("invocation_name", &self.invocation_name)
            .field("group_dim", &self.group_dim)
            .field("parameter_layout", &self.parameter_layout)
            .field("bound_provider_indices", &self.bound_provider_indices)
            .field("execution_provider_index", &self.execution_provider_index)
            .field("supports_unified_dispatch", &self.supports_unified_dispatch)
            .field("base_permutation", &self.base_permutation)
            .finish_non_exhaustive()
    }
}
