//! Render-graph surface the scheduler records dispatches into.
//!
//! - `builder`: the [`RenderGraphBuilder`] trait and pass descriptions
//! - `recording`: an in-memory builder used by tests and the CLI
//! - `wgpu_backend`: a builder that executes on a wgpu device

pub mod builder;
pub mod recording;
pub mod resource;
pub mod wgpu_backend;

pub use builder::{BoundResource, BufferDesc, ComputePassDesc, DeferredPass, RenderGraphBuilder};
pub use recording::{RecordedPass, RecordingGraphBuilder};
pub use resource::ResourceName;
pub use wgpu_backend::{WgpuBackendError, WgpuGraphBuilder, WgpuKernelLibrary, WgpuKernelResource};
