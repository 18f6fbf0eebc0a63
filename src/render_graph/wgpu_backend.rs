//! wgpu execution of recorded compute passes.
//!
//! [`WgpuKernelLibrary`] turns (kernel, permutation) pairs into compute
//! pipelines. Permutations are requested lazily by the scheduler and compiled
//! by [`WgpuKernelLibrary::compile_pending`], so a permutation is "not ready"
//! for the frame that first asks for it.
//!
//! [`WgpuGraphBuilder`] binds the parameter struct as a uniform at
//! `@group(0) @binding(0)` and provider buffers as further entries of group 0.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use crate::kernel::{
    FeatureLevel, KernelResource, PermutationDomain, ShaderHandle, parse_kernel_wgsl,
};

use super::builder::{BufferDesc, ComputePassDesc, DeferredPass, RenderGraphBuilder};
use super::resource::ResourceName;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WgpuBackendError {
    #[error("no compiled pipeline for shader {0:?} (pass {1})")]
    MissingPipeline(ShaderHandle, String),
    #[error("buffer not found: {0}")]
    MissingBuffer(ResourceName),
    #[error("kernel library lock poisoned")]
    LockPoisoned,
    #[error("bind group rejected for pass {0}: {1}")]
    BindGroupRejected(String, String),
}

pub fn shader_handle(kernel_index: u32, permutation_id: u32) -> ShaderHandle {
    ShaderHandle::new((u64::from(kernel_index) << 32) | u64::from(permutation_id))
}

pub fn split_shader_handle(handle: ShaderHandle) -> (u32, u32) {
    ((handle.raw() >> 32) as u32, handle.raw() as u32)
}

/// Uniform bindings are uploaded in 16-byte multiples.
pub fn pad_to_uniform(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(bytes.len().next_multiple_of(16), 0);
    out
}

struct LibraryKernel {
    name: String,
    wgsl: String,
    entry_point: String,
    domain: PermutationDomain,
}

#[derive(Default)]
struct LibraryState {
    kernels: Vec<LibraryKernel>,
    pipelines: HashMap<ShaderHandle, Arc<wgpu::ComputePipeline>>,
    failed: HashMap<ShaderHandle, String>,
    pending: Vec<ShaderHandle>,
    requested: HashSet<ShaderHandle>,
}

pub struct WgpuKernelLibrary {
    device: Arc<wgpu::Device>,
    state: Mutex<LibraryState>,
}

impl WgpuKernelLibrary {
    pub fn new(device: Arc<wgpu::Device>) -> Arc<Self> {
        Arc::new(Self {
            device,
            state: Mutex::new(LibraryState::default()),
        })
    }

    /// Register kernel source; permutations compile on demand.
    pub fn register_kernel(
        self: &Arc<Self>,
        name: impl Into<String>,
        wgsl: impl Into<String>,
        entry_point: impl Into<String>,
        domain: PermutationDomain,
    ) -> Result<Arc<WgpuKernelResource>, WgpuBackendError> {
        let mut state = self.state.lock().map_err(|_| WgpuBackendError::LockPoisoned)?;
        let kernel_index = state.kernels.len() as u32;
        state.kernels.push(LibraryKernel {
            name: name.into(),
            wgsl: wgsl.into(),
            entry_point: entry_point.into(),
            domain,
        });
        Ok(Arc::new(WgpuKernelResource {
            library: self.clone(),
            kernel_index,
        }))
    }

    pub fn pipeline(&self, handle: ShaderHandle) -> Option<Arc<wgpu::ComputePipeline>> {
        self.state.lock().ok()?.pipelines.get(&handle).cloned()
    }

    pub fn failure(&self, handle: ShaderHandle) -> Option<String> {
        self.state.lock().ok()?.failed.get(&handle).cloned()
    }

    fn request(&self, handle: ShaderHandle) -> Option<ShaderHandle> {
        let mut state = self.state.lock().ok()?;
        if state.pipelines.contains_key(&handle) {
            return Some(handle);
        }
        if !state.failed.contains_key(&handle) && state.requested.insert(handle) {
            state.pending.push(handle);
        }
        None
    }

    /// Compile every requested permutation. Returns how many became ready.
    pub fn compile_pending(&self) -> Result<usize, WgpuBackendError> {
        let mut guard = self.state.lock().map_err(|_| WgpuBackendError::LockPoisoned)?;
        let state = &mut *guard;
        let pending = std::mem::take(&mut state.pending);
        let mut compiled = 0;
        for handle in pending {
            state.requested.remove(&handle);
            let (kernel_index, permutation_id) = split_shader_handle(handle);
            let Some(kernel) = state.kernels.get(kernel_index as usize) else {
                continue;
            };
            let source = format!("{}{}", kernel.domain.wgsl_prelude(permutation_id), kernel.wgsl);
            // Reject bad WGSL here; wgpu treats it as an uncaptured device error.
            if let Err(e) = parse_kernel_wgsl(&source) {
                warn!(kernel = %kernel.name, permutation_id, "kernel failed to compile: {e:#}");
                state.failed.insert(handle, format!("{e:#}"));
                continue;
            }
            let label = format!("{}#{permutation_id:x}", kernel.name);
            let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Owned(source)),
            });
            let pipeline = self
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&label),
                    layout: None,
                    module: &module,
                    entry_point: Some(&kernel.entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                });
            debug!(kernel = %label, "compiled kernel permutation");
            state.pipelines.insert(handle, Arc::new(pipeline));
            compiled += 1;
        }
        Ok(compiled)
    }
}

/// One kernel of a [`WgpuKernelLibrary`], usable as a graph's compiled
/// kernel resource.
pub struct WgpuKernelResource {
    library: Arc<WgpuKernelLibrary>,
    kernel_index: u32,
}

impl KernelResource for WgpuKernelResource {
    fn shader(&self, permutation_id: u32, _feature_level: FeatureLevel) -> Option<ShaderHandle> {
        self.library
            .request(shader_handle(self.kernel_index, permutation_id))
    }
}

enum Command {
    Compute(ComputePassDesc),
    PushScope(String),
    PopScope,
}

/// Render graph backed by a wgpu device. Commands are encoded and submitted
/// by [`execute`](WgpuGraphBuilder::execute).
pub struct WgpuGraphBuilder {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    library: Arc<WgpuKernelLibrary>,
    buffers: HashMap<ResourceName, Arc<wgpu::Buffer>>,
    commands: Vec<Command>,
    deferred: Vec<(String, DeferredPass)>,
}

impl WgpuGraphBuilder {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        library: Arc<WgpuKernelLibrary>,
    ) -> Self {
        Self {
            device,
            queue,
            library,
            buffers: HashMap::new(),
            commands: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn buffer(&self, name: &ResourceName) -> Option<Arc<wgpu::Buffer>> {
        self.buffers.get(name).cloned()
    }

    /// Encode and submit recorded passes, then run deferred passes.
    ///
    /// Deferred passes run even when encoding fails so per-frame state is
    /// always released. Buffers are transient and dropped here as well.
    /// Returns the number of dispatches submitted.
    pub fn execute(&mut self) -> Result<usize, WgpuBackendError> {
        let commands = std::mem::take(&mut self.commands);
        let result = self.encode_and_submit(commands);
        for (name, pass) in self.deferred.drain(..) {
            debug!(pass = %name, "running deferred pass");
            pass();
        }
        self.buffers.clear();
        result
    }

    fn encode_and_submit(&self, commands: Vec<Command>) -> Result<usize, WgpuBackendError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compute_graph"),
            });
        let mut dispatched = 0;
        for command in commands {
            match command {
                Command::PushScope(name) => encoder.push_debug_group(&name),
                Command::PopScope => encoder.pop_debug_group(),
                Command::Compute(pass) => {
                    self.encode_compute(&mut encoder, &pass)?;
                    dispatched += 1;
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(dispatched)
    }

    fn encode_compute(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &ComputePassDesc,
    ) -> Result<(), WgpuBackendError> {
        let label = pass.label();
        let pipeline = self
            .library
            .pipeline(pass.shader)
            .ok_or_else(|| WgpuBackendError::MissingPipeline(pass.shader, label.clone()))?;

        let params_buffer = (!pass.parameters.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&label),
                    contents: &pad_to_uniform(&pass.parameters),
                    usage: wgpu::BufferUsages::UNIFORM,
                })
        });
        let resources = pass
            .resources
            .iter()
            .map(|r| {
                self.buffers
                    .get(&r.buffer)
                    .map(|b| (r.binding, b.clone()))
                    .ok_or_else(|| WgpuBackendError::MissingBuffer(r.buffer.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries: Vec<wgpu::BindGroupEntry<'_>> = Vec::with_capacity(resources.len() + 1);
        if let Some(buffer) = params_buffer.as_ref() {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            });
        }
        for (binding, buffer) in &resources {
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            });
        }
        let bind_group = if entries.is_empty() {
            None
        } else {
            // The pipeline layout is derived from what the entry point uses, so
            // a declared but unused binding is rejected here.
            self.device.push_error_scope(wgpu::ErrorFilter::Validation);
            let layout = pipeline.get_bind_group_layout(0);
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&label),
                layout: &layout,
                entries: &entries,
            });
            if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
                warn!(pass = %label, "bind group rejected: {error}");
                return Err(WgpuBackendError::BindGroupRejected(label, error.to_string()));
            }
            Some(bind_group)
        };

        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(&label),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&pipeline);
        if let Some(bind_group) = bind_group.as_ref() {
            cpass.set_bind_group(0, bind_group, &[]);
        }
        let [x, y, z] = pass.group_count;
        cpass.dispatch_workgroups(x, y, z);
        Ok(())
    }
}

/// `base`, or `base#n` with the first free `n`.
pub fn unique_buffer_name<V>(
    existing: &HashMap<ResourceName, V>,
    base: &ResourceName,
) -> ResourceName {
    if !existing.contains_key(base) {
        return base.clone();
    }
    (1..)
        .map(|n| ResourceName::from(format!("{base}#{n}")))
        .find(|name| !existing.contains_key(name))
        .unwrap_or_else(|| base.clone())
}

impl RenderGraphBuilder for WgpuGraphBuilder {
    fn create_buffer(&mut self, desc: BufferDesc) -> ResourceName {
        let name = unique_buffer_name(&self.buffers, &desc.name);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name.as_str()),
            size: desc.size.next_multiple_of(4).max(4),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        self.buffers.insert(name.clone(), Arc::new(buffer));
        name
    }

    fn add_compute_pass(&mut self, pass: ComputePassDesc) {
        self.commands.push(Command::Compute(pass));
    }

    fn add_pass(&mut self, name: &str, pass: DeferredPass) {
        self.deferred.push((name.to_string(), pass));
    }

    fn push_scope(&mut self, name: &str) {
        self.commands.push(Command::PushScope(name.to_string()));
    }

    fn pop_scope(&mut self) {
        self.commands.push(Command::PopScope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::BoundResource;

    #[test]
    fn shader_handles_round_trip_kernel_and_permutation() {
        let handle = shader_handle(7, 0b101);
        assert_eq!(split_shader_handle(handle), (7, 0b101));
    }

    #[test]
    fn uniform_padding() {
        assert_eq!(pad_to_uniform(&[1; 28]).len(), 32);
        assert_eq!(pad_to_uniform(&[1; 32]).len(), 32);
        assert!(pad_to_uniform(&[]).is_empty());
        assert_eq!(&pad_to_uniform(&[9; 4])[4..], &[0; 12]);
    }

    fn headless_device() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .ok()?;
            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .ok()?;
            Some((Arc::new(device), Arc::new(queue)))
        })
    }

    #[test]
    fn unused_parameter_binding_is_an_error_not_a_panic() {
        // Needs an adapter; machines without one skip.
        let Some((device, queue)) = headless_device() else {
            return;
        };
        let library = WgpuKernelLibrary::new(device.clone());
        let wgsl = "struct Params { n: vec4<u32> }\n\
                    @group(0) @binding(0) var<uniform> params: Params;\n\
                    @group(0) @binding(1) var<storage, read_write> data: array<u32>;\n\
                    @compute @workgroup_size(1) fn main() { data[0] = 1u; }\n";
        let resource = library
            .register_kernel("idle", wgsl, "main", PermutationDomain::default())
            .expect("register");
        assert!(resource.shader(0, FeatureLevel::Sm6).is_none());
        assert_eq!(library.compile_pending().expect("compile"), 1);
        let shader = resource.shader(0, FeatureLevel::Sm6).expect("ready");

        let mut builder = WgpuGraphBuilder::new(device, queue, library);
        let data = builder.create_buffer(BufferDesc {
            name: ResourceName::from("data"),
            size: 16,
        });
        builder.add_compute_pass(ComputePassDesc {
            kernel_name: "idle".into(),
            invocation_name: "Idle".into(),
            shader,
            parameters: vec![0; 16],
            resources: vec![BoundResource {
                binding: 1,
                buffer: data,
            }],
            group_count: [1, 1, 1],
        });
        assert!(matches!(
            builder.execute(),
            Err(WgpuBackendError::BindGroupRejected(..))
        ));
    }

    #[test]
    fn buffer_names_are_made_unique() {
        let mut existing: HashMap<ResourceName, ()> = HashMap::new();
        let base = ResourceName::from("positions");
        assert_eq!(unique_buffer_name(&existing, &base), base);
        existing.insert(base.clone(), ());
        existing.insert(ResourceName::from("positions#1"), ());
        assert_eq!(
            unique_buffer_name(&existing, &base),
            ResourceName::from("positions#2")
        );
    }
}
