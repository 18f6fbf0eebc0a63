use crate::kernel::ShaderHandle;

/// One dispatch derived from a (kernel, sub-invocation) pair, or from all of
/// a kernel's sub-invocations when they were merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderInvocation {
    pub kernel_name: String,
    pub invocation_name: String,
    pub shader: ShaderHandle,
    pub thread_count: [u32; 3],
    pub group_count: [u32; 3],
    /// Index into the staged bindings table.
    pub binding_index: usize,
    pub unified: bool,
}

/// Thread groups needed to cover `thread_count`, rounding up on every axis.
pub fn group_count(thread_count: [u32; 3], group_dim: [u32; 3]) -> [u32; 3] {
    [
        thread_count[0].div_ceil(group_dim[0].max(1)),
        thread_count[1].div_ceil(group_dim[1].max(1)),
        thread_count[2].div_ceil(group_dim[2].max(1)),
    ]
}

/// At least one thread group on every axis.
pub fn is_nonempty_dispatch(count: [u32; 3]) -> bool {
    count.iter().all(|&c| c > 0)
}

/// Merge sub-invocation thread counts into one dispatch by summing X.
///
/// Sub-invocations only merge when Y and Z agree, so the merged dispatch
/// covers exactly the threads of the separate ones. Returns `None` otherwise.
pub fn merge_thread_counts(thread_counts: &[[u32; 3]]) -> Option<[u32; 3]> {
    let (first, rest) = thread_counts.split_first()?;
    let mut merged = *first;
    for count in rest {
        if count[1] != first[1] || count[2] != first[2] {
            return None;
        }
        merged[0] = merged[0].checked_add(count[0])?;
    }
    Some(merged)
}

/// All sub-invocations resolved to the same shader.
pub fn shaders_identical(shaders: &[ShaderHandle]) -> bool {
    shaders.windows(2).all(|w| w[0] == w[1])
}
