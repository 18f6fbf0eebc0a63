//! Error types shared across the scheduler.
//!
//! Two classes exist on purpose: [`ValidationFailure`] is "not ready yet"
//! (unbound provider, shader still compiling) and [`BindingError`] is a
//! programming error in a provider or kernel layout. Both are recovered into a
//! skipped execution by the scheduler and never escape `submit_work`.

use crate::kernel::MemberKind;

/// Invariant violations found while building a `GraphProxy`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphProxyError {
    #[error(
        "kernel {kernel}: {struct_members} struct members but {bound} bound provider indices"
    )]
    BoundProviderCountMismatch {
        kernel: String,
        struct_members: usize,
        bound: usize,
    },
    #[error("kernel {kernel}: group dimension {group_dim:?} has a zero axis")]
    ZeroGroupDim { kernel: String, group_dim: [u32; 3] },
}

/// Why a queued execution could not be validated this frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("kernel {kernel}: member {member} has no bound provider (slot {provider_index})")]
    UnboundProvider {
        kernel: String,
        member: String,
        provider_index: usize,
    },
    #[error("kernel {kernel}: provider index {provider_index} out of range ({provider_count} providers)")]
    ProviderIndexOutOfRange {
        kernel: String,
        provider_index: usize,
        provider_count: usize,
    },
    #[error("kernel {kernel}: provider {provider_index} rejected member {member}")]
    ProviderRejected {
        kernel: String,
        member: String,
        provider_index: usize,
    },
    #[error("kernel {kernel}: execution provider slot {provider_index} is empty")]
    MissingExecutionProvider { kernel: String, provider_index: usize },
    #[error("kernel {kernel}: execution provider reports {reported} sub-invocations, expected {expected}")]
    SubInvocationMismatch {
        kernel: String,
        reported: usize,
        expected: usize,
    },
    #[error("kernel {kernel}: shader for permutation {permutation_id:#x} is not ready")]
    ShaderNotReady { kernel: String, permutation_id: u32 },
}

/// Contract violations found while writing a parameter buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("kernel {kernel}: member {member} expects {expected} bytes, provider wrote {actual}")]
    StructSizeMismatch {
        kernel: String,
        member: String,
        expected: usize,
        actual: usize,
    },
    #[error("kernel {kernel}: member {member} has unsupported type {kind:?}")]
    UnsupportedMemberType {
        kernel: String,
        member: String,
        kind: MemberKind,
    },
    #[error("kernel {kernel}: constant {member} needs {value_size} bytes, member has {member_size}")]
    ConstantTooWide {
        kernel: String,
        member: String,
        value_size: usize,
        member_size: usize,
    },
    #[error("kernel {kernel}: member {member} lies outside the {struct_size}-byte parameter struct")]
    MemberOutOfBounds {
        kernel: String,
        member: String,
        struct_size: usize,
    },
}

/// Anything that makes the scheduler drop a queued execution for a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Binding(#[from] BindingError),
}
