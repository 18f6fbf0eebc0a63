//! Parameter buffers and the values written into them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::BindingError;
use crate::kernel::{MemberKind, ParameterLayout, ParameterMember};

/// A named constant bound to a scalar member of a parameter struct.
///
/// Writes are raw bit patterns at the member offset; no numeric conversion
/// happens even if the member kind differs from the value kind.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ParameterValue {
    I32(i32),
    U32(u32),
    F32(f32),
}

impl ParameterValue {
    pub fn byte_size(&self) -> usize {
        match self {
            ParameterValue::I32(_) | ParameterValue::U32(_) | ParameterValue::F32(_) => 4,
        }
    }

    /// Native-endian bytes of the value into the front of `dst`.
    pub fn write_to(&self, dst: &mut [u8]) {
        match self {
            ParameterValue::I32(v) => dst[..4].copy_from_slice(&v.to_ne_bytes()),
            ParameterValue::U32(v) => dst[..4].copy_from_slice(&v.to_ne_bytes()),
            ParameterValue::F32(v) => dst[..4].copy_from_slice(&v.to_ne_bytes()),
        }
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::I32(v)
    }
}

impl From<u32> for ParameterValue {
    fn from(v: u32) -> Self {
        ParameterValue::U32(v)
    }
}

impl From<f32> for ParameterValue {
    fn from(v: f32) -> Self {
        ParameterValue::F32(v)
    }
}

/// Named constants for the non-struct members of every kernel in a graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBindings {
    values: HashMap<String, ParameterValue>,
}

impl ParameterBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Zero-initialized bytes of one kernel's parameter struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterBuffer {
    bytes: Vec<u8>,
}

impl ParameterBuffer {
    pub fn zeroed(layout: &ParameterLayout) -> Self {
        Self {
            bytes: vec![0_u8; layout.size() as usize],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Copy a provider-supplied block; its length must match the member size.
    pub fn write_struct(
        &mut self,
        kernel: &str,
        member: &ParameterMember,
        data: &[u8],
    ) -> Result<(), BindingError> {
        if data.len() != member.size as usize {
            return Err(BindingError::StructSizeMismatch {
                kernel: kernel.to_string(),
                member: member.name.clone(),
                expected: member.size as usize,
                actual: data.len(),
            });
        }
        self.member_bytes(kernel, member)?.copy_from_slice(data);
        Ok(())
    }

    /// Write a named constant into a scalar member. Unbound members stay zero.
    pub fn write_constant(
        &mut self,
        kernel: &str,
        member: &ParameterMember,
        value: Option<ParameterValue>,
    ) -> Result<(), BindingError> {
        match &member.kind {
            MemberKind::Int | MemberKind::Uint | MemberKind::Float => {}
            MemberKind::Struct => return Ok(()),
            kind @ MemberKind::Unsupported(_) => {
                return Err(BindingError::UnsupportedMemberType {
                    kernel: kernel.to_string(),
                    member: member.name.clone(),
                    kind: kind.clone(),
                });
            }
        }
        let Some(value) = value else {
            return Ok(());
        };
        if value.byte_size() > member.size as usize {
            return Err(BindingError::ConstantTooWide {
                kernel: kernel.to_string(),
                member: member.name.clone(),
                value_size: value.byte_size(),
                member_size: member.size as usize,
            });
        }
        value.write_to(self.member_bytes(kernel, member)?);
        Ok(())
    }

    fn member_bytes(
        &mut self,
        kernel: &str,
        member: &ParameterMember,
    ) -> Result<&mut [u8], BindingError> {
        let struct_size = self.bytes.len();
        self.bytes
            .get_mut(member.range())
            .ok_or_else(|| BindingError::MemberOutOfBounds {
                kernel: kernel.to_string(),
                member: member.name.clone(),
                struct_size,
            })
    }
}
