//! Compute graph scheduling on top of a render graph.
//!
//! Graphs of GPU kernels are prepared once into a [`GraphProxy`], fed per
//! frame by [`DataProviderProxy`] implementations, and batched by the
//! [`GraphScheduler`] into compute passes of a [`RenderGraphBuilder`].

pub mod asset;
pub mod config;
pub mod error;
pub mod graph;
pub mod kernel;
pub mod params;
pub mod provider;
pub mod render_graph;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use error::{BindingError, ExecutionError, GraphProxyError, ValidationFailure};
pub use graph::{GraphProxy, GraphSource, KernelInvocationDescriptor};
pub use provider::{DataProviderProxy, ProviderList};
pub use render_graph::{RecordingGraphBuilder, RenderGraphBuilder};
pub use scheduler::{ExecutionGroup, GraphExecution, GraphScheduler, SubmitReport};
