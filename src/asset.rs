//! JSON compute graph assets.
//!
//! An asset lists kernels in execution order (WGSL inline or by file), the
//! built-in providers one execution of the graph is fed with, and named
//! constants for scalar parameter members.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::graph::{GraphSource, KernelEntry, KernelInfo};
use crate::kernel::{
    KernelReflection, KernelResource, ParameterLayout, PermutationDomain, ShaderMap,
    reflect_kernel,
};
use crate::params::{ParameterBindings, ParameterValue};
use crate::provider::{
    BufferProvider, ConstantBlockProvider, DataProviderHandle, ProviderList, ThreadCountProvider,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ComputeGraphAsset {
    pub name: String,
    pub kernels: Vec<KernelAsset>,
    /// Provider slots; `null` leaves a slot empty.
    #[serde(default)]
    pub providers: Vec<Option<ProviderSpec>>,
    #[serde(default)]
    pub constants: ParameterBindings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct KernelAsset {
    pub name: String,
    #[serde(default)]
    pub invocation_name: Option<String>,
    #[serde(default)]
    pub wgsl: Option<String>,
    /// Relative to the asset file.
    #[serde(default)]
    pub wgsl_file: Option<String>,
    #[serde(default)]
    pub entry_point: Option<String>,
    /// Overrides the reflected `@workgroup_size`.
    #[serde(default)]
    pub group_dim: Option<[u32; 3]>,
    #[serde(default)]
    pub permutation_options: Vec<String>,
    #[serde(default)]
    pub default_options: Vec<String>,
    #[serde(default)]
    pub bound_providers: BoundProviders,
    #[serde(default)]
    pub execution_provider: usize,
    #[serde(default)]
    pub unified_dispatch: bool,
}

/// Provider index per struct member, either in member order or by name.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum BoundProviders {
    ByIndex(Vec<usize>),
    ByMember(HashMap<String, usize>),
}

impl Default for BoundProviders {
    fn default() -> Self {
        BoundProviders::ByIndex(Vec::new())
    }
}

impl BoundProviders {
    /// Indices in struct-member order of `layout`.
    pub fn resolve(&self, kernel: &str, layout: &ParameterLayout) -> Result<Vec<usize>> {
        match self {
            BoundProviders::ByIndex(indices) => Ok(indices.clone()),
            BoundProviders::ByMember(by_member) => {
                if let Some(unknown) = by_member
                    .keys()
                    .find(|name| !layout.struct_members().any(|(_, m)| &m.name == *name))
                {
                    bail!("kernel {kernel}: boundProviders names unknown struct member {unknown}");
                }
                layout
                    .struct_members()
                    .map(|(_, member)| {
                        by_member.get(&member.name).copied().ok_or_else(|| {
                            anyhow!(
                                "kernel {kernel}: no provider bound for struct member {}",
                                member.name
                            )
                        })
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum ProviderSpec {
    ThreadCount {
        counts: Vec<[u32; 3]>,
    },
    ConstantBlock {
        /// Each value occupies four bytes.
        values: Vec<ParameterValue>,
        #[serde(default)]
        options: BTreeMap<String, bool>,
    },
    Buffer {
        label: String,
        count: u32,
        stride: u32,
        binding: u32,
    },
}

impl ProviderSpec {
    pub fn build(&self) -> DataProviderHandle {
        match self {
            ProviderSpec::ThreadCount { counts } => {
                Box::new(ThreadCountProvider::new(counts.clone()))
            }
            ProviderSpec::ConstantBlock { values, options } => {
                let mut bytes = vec![0u8; values.len() * 4];
                for (value, chunk) in values.iter().zip(bytes.chunks_exact_mut(4)) {
                    value.write_to(chunk);
                }
                let provider = options
                    .iter()
                    .fold(ConstantBlockProvider::new(bytes), |p, (name, enabled)| {
                        p.with_option(name.clone(), *enabled)
                    });
                Box::new(provider)
            }
            ProviderSpec::Buffer {
                label,
                count,
                stride,
                binding,
            } => Box::new(BufferProvider::new(label.clone(), *count, *stride, *binding)),
        }
    }
}

/// Kernel source and reflection handed to a resource factory.
pub struct PreparedKernel<'a> {
    pub index: usize,
    pub asset: &'a KernelAsset,
    pub source: &'a str,
    pub domain: &'a PermutationDomain,
    pub reflection: &'a KernelReflection,
}

pub fn load_graph_asset(path: impl AsRef<Path>) -> Result<(ComputeGraphAsset, PathBuf)> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph json at {}", path.display()))?;
    let asset = ComputeGraphAsset::from_json_str(&text)
        .with_context(|| format!("invalid graph json in {}", path.display()))?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((asset, base_dir))
}

impl ComputeGraphAsset {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse graph json")
    }

    /// One fresh provider list for an execution of this graph.
    pub fn build_providers(&self) -> ProviderList {
        self.providers
            .iter()
            .map(|spec| spec.as_ref().map(ProviderSpec::build))
            .collect()
    }

    /// Graph source whose kernels are always ready, each permutation mapped
    /// to a distinct handle derived from the kernel index.
    pub fn immediate_graph_source(&self, base_dir: &Path) -> Result<GraphSource> {
        self.graph_source(base_dir, |kernel| {
            let map: Arc<dyn KernelResource> = Arc::new(ShaderMap::immediate(kernel.index as u32));
            Ok(Some(map))
        })
    }

    /// Reflect every kernel and build the graph source.
    ///
    /// Kernels whose WGSL fails to reflect keep their slot with no parameter
    /// metadata, so the graph proxy skips them. Malformed asset data (bad
    /// permutation options, unreadable files, bad bindings) is an error.
    pub fn graph_source<F>(&self, base_dir: &Path, mut resource_for: F) -> Result<GraphSource>
    where
        F: FnMut(&PreparedKernel<'_>) -> Result<Option<Arc<dyn KernelResource>>>,
    {
        let mut kernels = Vec::with_capacity(self.kernels.len());
        for (index, kernel) in self.kernels.iter().enumerate() {
            let source = kernel_source(kernel, base_dir)?;
            let domain = PermutationDomain::new(kernel.permutation_options.iter().cloned())
                .with_context(|| format!("kernel {}: bad permutation options", kernel.name))?;
            if let Some(unknown) = kernel
                .default_options
                .iter()
                .find(|o| domain.bit(o).is_none())
            {
                bail!("kernel {}: default option {unknown} is not declared", kernel.name);
            }
            let default_permutation =
                domain.vector_with(kernel.default_options.iter().map(String::as_str));
            let invocation_name = kernel
                .invocation_name
                .clone()
                .unwrap_or_else(|| kernel.name.clone());

            let reflection = match reflect_kernel(&source, &domain, kernel.entry_point.as_deref()) {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        graph = %self.name,
                        kernel = %kernel.name,
                        "kernel reflection failed: {e:#}"
                    );
                    kernels.push(KernelEntry {
                        kernel: Some(KernelInfo {
                            name: kernel.name.clone(),
                            group_dim: kernel.group_dim.unwrap_or([1, 1, 1]),
                            permutation_domain: domain,
                            default_permutation,
                        }),
                        resource: None,
                        parameter_metadata: None,
                        invocation_name,
                        bound_provider_indices: Vec::new(),
                        execution_provider_index: kernel.execution_provider,
                        supports_unified_dispatch: kernel.unified_dispatch,
                    });
                    continue;
                }
            };

            let bound_provider_indices = kernel
                .bound_providers
                .resolve(&kernel.name, &reflection.layout)?;
            let resource = resource_for(&PreparedKernel {
                index,
                asset: kernel,
                source: &source,
                domain: &domain,
                reflection: &reflection,
            })?;

            kernels.push(KernelEntry {
                kernel: Some(KernelInfo {
                    name: kernel.name.clone(),
                    group_dim: kernel.group_dim.unwrap_or(reflection.group_dim),
                    permutation_domain: domain.clone(),
                    default_permutation,
                }),
                resource,
                parameter_metadata: Some(reflection.layout.clone()),
                invocation_name,
                bound_provider_indices,
                execution_provider_index: kernel.execution_provider,
                supports_unified_dispatch: kernel.unified_dispatch,
            });
        }

        Ok(GraphSource {
            name: self.name.clone(),
            kernels,
        })
    }
}

fn kernel_source(kernel: &KernelAsset, base_dir: &Path) -> Result<String> {
    match (&kernel.wgsl, &kernel.wgsl_file) {
        (Some(inline), None) => Ok(inline.clone()),
        (None, Some(file)) => {
            let path = base_dir.join(file);
            std::fs::read_to_string(&path).with_context(|| {
                format!("kernel {}: failed to read {}", kernel.name, path.display())
            })
        }
        (Some(_), Some(_)) => {
            bail!("kernel {}: set either wgsl or wgslFile, not both", kernel.name)
        }
        (None, None) => bail!("kernel {}: missing wgsl source", kernel.name),
    }
}
