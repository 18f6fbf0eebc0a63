pub mod descriptor;
pub mod proxy;

pub use descriptor::{DescriptorParts, KernelInvocationDescriptor};
pub use proxy::{GraphProxy, GraphSource, KernelEntry, KernelInfo};
