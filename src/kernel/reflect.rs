//! Kernel reflection from WGSL using naga.
//!
//! The parameter struct of a kernel is the uniform bound at
//! `@group(0) @binding(0)`. Its members become the kernel's
//! [`ParameterLayout`]; struct-typed members are data interface blocks.

use anyhow::{Context, Result, anyhow};
use naga::{AddressSpace, ScalarKind, ShaderStage, TypeInner};

use super::layout::{MemberKind, ParameterLayout, ParameterMember};
use super::permutation::PermutationDomain;

pub const PARAMETER_GROUP: u32 = 0;
pub const PARAMETER_BINDING: u32 = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelReflection {
    pub entry_point: String,
    pub group_dim: [u32; 3],
    pub layout: ParameterLayout,
}

/// Parse kernel WGSL, returning the naga module or a readable error.
pub fn parse_kernel_wgsl(source: &str) -> Result<naga::Module> {
    naga::front::wgsl::parse_str(source)
        .map_err(|e| anyhow!("WGSL parse failed:\n{}", format_naga_error(source, &e)))
}

/// Reflect a kernel's entry point and parameter struct.
///
/// The source is parsed with the permutation-0 prelude of `domain` prepended
/// so that option constants resolve. With `entry_point == None` the first
/// compute entry point is used.
pub fn reflect_kernel(
    source: &str,
    domain: &PermutationDomain,
    entry_point: Option<&str>,
) -> Result<KernelReflection> {
    let full = format!("{}{}", domain.wgsl_prelude(0), source);
    let module = parse_kernel_wgsl(&full)?;

    let ep = module
        .entry_points
        .iter()
        .filter(|ep| ep.stage == ShaderStage::Compute)
        .find(|ep| entry_point.is_none_or(|name| ep.name == name))
        .ok_or_else(|| match entry_point {
            Some(name) => anyhow!("no compute entry point named {name}"),
            None => anyhow!("no compute entry point"),
        })?;

    let layout = reflect_parameter_layout(&module).context("reflecting parameter struct")?;

    Ok(KernelReflection {
        entry_point: ep.name.clone(),
        group_dim: ep.workgroup_size,
        layout,
    })
}

fn reflect_parameter_layout(module: &naga::Module) -> Result<ParameterLayout> {
    let Some((_, global)) = module.global_variables.iter().find(|(_, g)| {
        g.space == AddressSpace::Uniform
            && g.binding
                .as_ref()
                .is_some_and(|b| b.group == PARAMETER_GROUP && b.binding == PARAMETER_BINDING)
    }) else {
        // Kernels without parameters are allowed.
        return Ok(ParameterLayout::default());
    };

    let ty = &module.types[global.ty];
    let TypeInner::Struct { members, span } = &ty.inner else {
        return Err(anyhow!(
            "uniform at @group({PARAMETER_GROUP}) @binding({PARAMETER_BINDING}) is not a struct"
        ));
    };

    let gctx = module.to_ctx();
    let mut out: Vec<ParameterMember> = Vec::with_capacity(members.len());
    for (i, member) in members.iter().enumerate() {
        let name = member.name.clone().unwrap_or_else(|| format!("member_{i}"));
        let inner = &module.types[member.ty].inner;
        out.push(ParameterMember::new(
            name,
            member_kind(inner),
            member.offset,
            inner.size(gctx),
        ));
    }
    Ok(ParameterLayout::new(*span, out))
}

fn member_kind(inner: &TypeInner) -> MemberKind {
    match inner {
        TypeInner::Scalar(scalar) | TypeInner::Vector { scalar, .. } => match scalar.kind {
            ScalarKind::Sint => MemberKind::Int,
            ScalarKind::Uint => MemberKind::Uint,
            ScalarKind::Float => MemberKind::Float,
            ScalarKind::Bool => MemberKind::Unsupported("bool".into()),
            _ => MemberKind::Unsupported("abstract".into()),
        },
        TypeInner::Struct { .. } => MemberKind::Struct,
        TypeInner::Matrix { .. } => MemberKind::Unsupported("matrix".into()),
        TypeInner::Array { .. } => MemberKind::Unsupported("array".into()),
        TypeInner::Atomic(_) => MemberKind::Unsupported("atomic".into()),
        _ => MemberKind::Unsupported("other".into()),
    }
}

fn format_naga_error(source: &str, error: &naga::front::wgsl::ParseError) -> String {
    let mut output = String::new();
    output.push_str(&format!("  {}\n", error));
    output.push_str("\nKernel WGSL:\n---\n");
    for (line_num, line) in source.lines().enumerate() {
        output.push_str(&format!("{:4} | {}\n", line_num + 1, line));
    }
    output.push_str("---\n");
    output
}
