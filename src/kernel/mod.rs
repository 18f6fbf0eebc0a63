//! Kernel-level building blocks: parameter layouts, WGSL reflection,
//! permutation domains and compiled-kernel resources.

pub mod layout;
pub mod permutation;
pub mod reflect;
pub mod resource;

pub use layout::{MemberKind, ParameterLayout, ParameterMember};
pub use permutation::{
    PermutationAccumulator, PermutationDomain, PermutationError, PermutationVector,
};
pub use reflect::{KernelReflection, parse_kernel_wgsl, reflect_kernel};
pub use resource::{FeatureLevel, KernelResource, ShaderHandle, ShaderMap, ShaderState};
