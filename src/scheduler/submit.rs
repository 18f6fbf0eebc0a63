//! Staging of one queued execution: validation, shader resolution and
//! parameter binding. No pass is recorded here. Providers allocate their
//! resources between validation and binding, so a binding failure can leave
//! unused buffers in the graph, but never a dispatch.

use tracing::trace;

use crate::config::SchedulerConfig;
use crate::error::{ExecutionError, ValidationFailure};
use crate::graph::KernelInvocationDescriptor;
use crate::kernel::{FeatureLevel, PermutationAccumulator, ShaderHandle};
use crate::params::{ParameterBindings, ParameterBuffer};
use crate::provider::{DataProviderHandle, DispatchContext, DispatchData, ValidationContext};
use crate::render_graph::{BoundResource, ComputePassDesc, RenderGraphBuilder};

use super::execution::QueuedGraphExecution;
use super::invocation::{
    ShaderInvocation, group_count, is_nonempty_dispatch, merge_thread_counts,
    shaders_identical,
};

/// A kernel that passed validation.
struct ValidatedKernel<'a> {
    descriptor: &'a KernelInvocationDescriptor,
    shaders: Vec<ShaderHandle>,
    thread_counts: Vec<[u32; 3]>,
}

/// Parameter bytes and resources of one dispatch.
pub(crate) struct StagedBinding {
    pub(crate) parameters: ParameterBuffer,
    pub(crate) resources: Vec<BoundResource>,
}

/// Everything needed to record one execution's passes.
#[derive(Default)]
pub(crate) struct StagedExecution {
    pub(crate) invocations: Vec<ShaderInvocation>,
    pub(crate) bindings: Vec<StagedBinding>,
    pub(crate) kernels_without_work: usize,
}

impl StagedExecution {
    pub(crate) fn into_passes(self) -> Vec<ComputePassDesc> {
        let mut bindings: Vec<Option<StagedBinding>> =
            self.bindings.into_iter().map(Some).collect();
        self.invocations
            .into_iter()
            .filter_map(|inv| {
                let binding = bindings.get_mut(inv.binding_index)?.take()?;
                Some(ComputePassDesc {
                    kernel_name: inv.kernel_name,
                    invocation_name: inv.invocation_name,
                    shader: inv.shader,
                    parameters: binding.parameters.into_bytes(),
                    resources: binding.resources,
                    group_count: inv.group_count,
                })
            })
            .collect()
    }
}

fn provider_slot<'p>(
    providers: &'p [Option<DataProviderHandle>],
    kernel: &KernelInvocationDescriptor,
    provider_index: usize,
) -> Result<Option<&'p DataProviderHandle>, ValidationFailure> {
    providers
        .get(provider_index)
        .map(Option::as_ref)
        .ok_or_else(|| ValidationFailure::ProviderIndexOutOfRange {
            kernel: kernel.kernel_name().to_string(),
            provider_index,
            provider_count: providers.len(),
        })
}

fn validate_kernel<'a>(
    descriptor: &'a KernelInvocationDescriptor,
    providers: &[Option<DataProviderHandle>],
    sub_invocation_count: usize,
    feature_level: FeatureLevel,
) -> Result<ValidatedKernel<'a>, ValidationFailure> {
    let kernel_name = descriptor.kernel_name();
    let mut permutations = PermutationAccumulator::new(
        descriptor.permutation_domain(),
        sub_invocation_count,
        descriptor.base_permutation(),
    );

    for (struct_index, member) in descriptor.parameter_layout().struct_members() {
        let provider_index = descriptor.bound_provider_indices()[struct_index];
        let Some(provider) = provider_slot(providers, descriptor, provider_index)? else {
            return Err(ValidationFailure::UnboundProvider {
                kernel: kernel_name.to_string(),
                member: member.name.clone(),
                provider_index,
            });
        };
        let ctx = ValidationContext {
            sub_invocation_count,
            expected_struct_size: member.size,
        };
        if !provider.is_valid(&ctx) {
            return Err(ValidationFailure::ProviderRejected {
                kernel: kernel_name.to_string(),
                member: member.name.clone(),
                provider_index,
            });
        }
        provider.gather_permutations(&mut permutations);
    }

    let execution_index = descriptor.execution_provider_index();
    let Some(execution_provider) = provider_slot(providers, descriptor, execution_index)? else {
        return Err(ValidationFailure::MissingExecutionProvider {
            kernel: kernel_name.to_string(),
            provider_index: execution_index,
        });
    };
    let mut thread_counts: Vec<[u32; 3]> = Vec::with_capacity(sub_invocation_count);
    let reported = execution_provider.dispatch_thread_counts(&mut thread_counts);
    if reported != sub_invocation_count || thread_counts.len() != sub_invocation_count {
        return Err(ValidationFailure::SubInvocationMismatch {
            kernel: kernel_name.to_string(),
            reported,
            expected: sub_invocation_count,
        });
    }

    let shaders = permutations
        .vectors()
        .iter()
        .map(|v| {
            descriptor
                .resource()
                .shader(v.id(), feature_level)
                .ok_or_else(|| ValidationFailure::ShaderNotReady {
                    kernel: kernel_name.to_string(),
                    permutation_id: v.id(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedKernel {
        descriptor,
        shaders,
        thread_counts,
    })
}

fn bind_dispatch(
    descriptor: &KernelInvocationDescriptor,
    providers: &[Option<DataProviderHandle>],
    constants: &ParameterBindings,
    sub_invocation_index: usize,
    sub_invocation_count: usize,
    unified_dispatch: bool,
) -> Result<StagedBinding, ExecutionError> {
    let kernel_name = descriptor.kernel_name();
    let layout = descriptor.parameter_layout();
    let mut parameters = ParameterBuffer::zeroed(layout);
    let mut resources: Vec<BoundResource> = Vec::new();
    let mut struct_index = 0;

    for member in layout.members() {
        if !member.kind.is_struct() {
            parameters.write_constant(kernel_name, member, constants.get(&member.name))?;
            continue;
        }

        let provider_index = descriptor.bound_provider_indices()[struct_index];
        struct_index += 1;
        // Validation already proved every bound slot is filled.
        let Some(provider) = provider_slot(providers, descriptor, provider_index)? else {
            return Err(ValidationFailure::UnboundProvider {
                kernel: kernel_name.to_string(),
                member: member.name.clone(),
                provider_index,
            }
            .into());
        };

        let ctx = DispatchContext {
            kernel_name,
            member,
            sub_invocation_index,
            sub_invocation_count,
            unified_dispatch,
        };
        let mut data = DispatchData::default();
        provider.gather_dispatch_data(&ctx, &mut data);
        parameters.write_struct(kernel_name, member, &data.bytes)?;
        resources.extend(data.resources);
    }

    Ok(StagedBinding {
        parameters,
        resources,
    })
}

/// Validate, resolve and bind every kernel of `execution`, all or nothing.
pub(crate) fn stage_execution(
    execution: &mut QueuedGraphExecution,
    builder: &mut dyn RenderGraphBuilder,
    feature_level: FeatureLevel,
    config: &SchedulerConfig,
) -> Result<StagedExecution, ExecutionError> {
    let sub_invocation_count = execution.sub_invocation_count;
    let proxy = execution.graph_proxy.clone();

    let validated = proxy
        .kernel_invocations()
        .iter()
        .map(|descriptor| {
            validate_kernel(
                descriptor,
                &execution.providers,
                sub_invocation_count,
                feature_level,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    for provider in execution.providers.iter_mut().flatten() {
        provider.allocate_resources(builder);
    }

    let mut staged = StagedExecution::default();
    for kernel in validated {
        let descriptor = kernel.descriptor;
        let unified = config.enable_unified_dispatch
            && descriptor.supports_unified_dispatch()
            && sub_invocation_count > 1
            && shaders_identical(&kernel.shaders);
        let merged = if unified {
            merge_thread_counts(&kernel.thread_counts)
        } else {
            None
        };

        // (sub-invocation index, thread count, shader, unified)
        let dispatches: Vec<(usize, [u32; 3], ShaderHandle, bool)> = match merged {
            Some(thread_count) => vec![(0, thread_count, kernel.shaders[0], true)],
            None => kernel
                .thread_counts
                .iter()
                .zip(&kernel.shaders)
                .enumerate()
                .map(|(i, (count, shader))| (i, *count, *shader, false))
                .collect(),
        };

        let mut kernel_has_work = false;
        for (sub_invocation_index, thread_count, shader, unified_dispatch) in dispatches {
            let groups = group_count(thread_count, descriptor.group_dim());
            if !is_nonempty_dispatch(groups) {
                trace!(
                    kernel = descriptor.kernel_name(),
                    sub_invocation_index, "no threads to dispatch"
                );
                continue;
            }
            let binding = bind_dispatch(
                descriptor,
                &execution.providers,
                &execution.constants,
                sub_invocation_index,
                sub_invocation_count,
                unified_dispatch,
            )?;
            staged.bindings.push(binding);
            staged.invocations.push(ShaderInvocation {
                kernel_name: descriptor.kernel_name().to_string(),
                invocation_name: descriptor.invocation_name().to_string(),
                shader,
                thread_count,
                group_count: groups,
                binding_index: staged.bindings.len() - 1,
                unified: unified_dispatch,
            });
            kernel_has_work = true;
        }
        if !kernel_has_work {
            staged.kernels_without_work += 1;
        }
    }

    Ok(staged)
}
