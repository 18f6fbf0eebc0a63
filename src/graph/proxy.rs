use std::sync::Arc;

use tracing::debug;

use crate::error::GraphProxyError;
use crate::kernel::{KernelResource, ParameterLayout, PermutationDomain, PermutationVector};

use super::descriptor::{DescriptorParts, KernelInvocationDescriptor};

/// Kernel identity as declared by a graph asset.
#[derive(Clone, Debug)]
pub struct KernelInfo {
    pub name: String,
    pub group_dim: [u32; 3],
    pub permutation_domain: PermutationDomain,
    pub default_permutation: PermutationVector,
}

/// One kernel slot of a graph asset. Any of `kernel`, `resource` and
/// `parameter_metadata` may be missing while compilation is pending or failed.
pub struct KernelEntry {
    pub kernel: Option<KernelInfo>,
    pub resource: Option<Arc<dyn KernelResource>>,
    pub parameter_metadata: Option<ParameterLayout>,
    pub invocation_name: String,
    pub bound_provider_indices: Vec<usize>,
    pub execution_provider_index: usize,
    pub supports_unified_dispatch: bool,
}

impl std::fmt::Debug for KernelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelEntry")
            .field("kernel", &self.kernel)
            .field("has_resource", &self.resource.is_some())
            .field("parameter_metadata", &self.parameter_metadata)
            .field("invocation_name", &self.invocation_name)
            .field("bound_provider_indices", &self.bound_provider_indices)
            .field("execution_provider_index", &self.execution_provider_index)
            .field("supports_unified_dispatch", &self.supports_unified_dispatch)
            .finish_non_exhaustive()
    }
}

/// Kernel list of a graph asset in execution order.
#[derive(Debug, Default)]
pub struct GraphSource {
    pub name: String,
    pub kernels: Vec<KernelEntry>,
}

/// Render-side snapshot of a graph: dense descriptor list, immutable after
/// construction and shared read-only by every queued execution.
#[derive(Debug, Default)]
pub struct GraphProxy {
    name: String,
    kernel_invocations: Vec<KernelInvocationDescriptor>,
}

impl GraphProxy {
    /// Build descriptors for every complete kernel entry.
    ///
    /// Entries missing their kernel, compiled resource or parameter metadata
    /// are skipped; they simply do not run until the asset is prepared again.
    pub fn initialize(source: &GraphSource) -> Result<Self, GraphProxyError> {
        let mut kernel_invocations = Vec::with_capacity(source.kernels.len());
        for (index, entry) in source.kernels.iter().enumerate() {
            let (Some(kernel), Some(resource), Some(layout)) = (
                entry.kernel.as_ref(),
                entry.resource.as_ref(),
                entry.parameter_metadata.as_ref(),
            ) else {
                debug!(graph = %source.name, index, "skipping incomplete kernel entry");
                continue;
            };

            kernel_invocations.push(KernelInvocationDescriptor::new(DescriptorParts {
                kernel_name: kernel.name.clone(),
                invocation_name: entry.invocation_name.clone(),
                group_dim: kernel.group_dim,
                parameter_layout: layout.clone(),
                bound_provider_indices: entry.bound_provider_indices.clone(),
                execution_provider_index: entry.execution_provider_index,
                supports_unified_dispatch: entry.supports_unified_dispatch,
                permutation_domain: kernel.permutation_domain.clone(),
                base_permutation: kernel.default_permutation,
                resource: resource.clone(),
            })?);
        }

        Ok(Self {
            name: source.name.clone(),
            kernel_invocations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kernel_invocations(&self) -> &[KernelInvocationDescriptor] {
        &self.kernel_invocations
    }

    pub fn is_empty(&self) -> bool {
        self.kernel_invocations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{ParameterMember, ShaderMap};

    fn info(name: &str) -> KernelInfo {
        KernelInfo {
            name: name.to_string(),
            group_dim: [64, 1, 1],
            permutation_domain: PermutationDomain::default(),
            default_permutation: PermutationVector::default(),
        }
    }

    fn entry(name: &str) -> KernelEntry {
        KernelEntry {
            kernel: Some(info(name)),
            resource: Some(Arc::new(ShaderMap::immediate(0))),
            parameter_metadata: Some(ParameterLayout::new(
                16,
                vec![ParameterMember::nested("invocation", 0, 16)],
            )),
            invocation_name: format!("{name}_inv"),
            bound_provider_indices: vec![0],
            execution_provider_index: 0,
            supports_unified_dispatch: false,
        }
    }

    #[test]
    fn incomplete_entries_are_skipped() {
        let mut no_kernel = entry("a");
        no_kernel.kernel = None;
        let mut no_resource = entry("b");
        no_resource.resource = None;
        let mut no_metadata = entry("c");
        no_metadata.parameter_metadata = None;

        let source = GraphSource {
            name: "g".into(),
            kernels: vec![no_kernel, entry("kept"), no_resource, no_metadata],
        };
        let proxy = GraphProxy::initialize(&source).expect("initialize");
        let names: Vec<&str> = proxy
            .kernel_invocations()
            .iter()
            .map(|k| k.kernel_name())
            .collect();
        assert_eq!(names, vec!["kept"]);
    }

    #[test]
    fn bound_index_count_must_match_struct_members() {
        let mut bad = entry("k");
        bad.bound_provider_indices = vec![0, 1];
        let source = GraphSource {
            name: "g".into(),
            kernels: vec![bad],
        };
        assert_eq!(
            GraphProxy::initialize(&source).unwrap_err(),
            GraphProxyError::BoundProviderCountMismatch {
                kernel: "k".into(),
                struct_members: 1,
                bound: 2,
            }
        );
    }

    #[test]
    fn zero_group_dim_is_rejected() {
        let mut bad = entry("k");
        if let Some(kernel) = bad.kernel.as_mut() {
            kernel.group_dim = [64, 0, 1];
        }
        let source = GraphSource {
            name: "g".into(),
            kernels: vec![bad],
        };
        assert!(matches!(
            GraphProxy::initialize(&source),
            Err(GraphProxyError::ZeroGroupDim { .. })
        ));
    }
}
