use serde::Serialize;

/// Base type of one member of a kernel's parameter struct.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MemberKind {
    Int,
    Uint,
    Float,
    /// A data interface's parameter block, filled by a bound provider.
    Struct,
    /// Anything the binder cannot write (matrices, arrays, bools).
    Unsupported(String),
}

impl MemberKind {
    pub fn is_struct(&self) -> bool {
        matches!(self, MemberKind::Struct)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParameterMember {
    pub name: String,
    pub kind: MemberKind,
    /// Byte offset inside the parameter struct.
    pub offset: u32,
    /// Byte size of the member.
    pub size: u32,
}

impl ParameterMember {
    pub fn new(name: impl Into<String>, kind: MemberKind, offset: u32, size: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            offset,
            size,
        }
    }

    /// A 4-byte scalar member.
    pub fn scalar(name: impl Into<String>, kind: MemberKind, offset: u32) -> Self {
        Self::new(name, kind, offset, 4)
    }

    /// A nested struct member backed by a data interface.
    pub fn nested(name: impl Into<String>, offset: u32, size: u32) -> Self {
        Self::new(name, MemberKind::Struct, offset, size)
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.size as usize
    }
}

/// Ordered member list of a kernel's parameter struct plus its total size.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParameterLayout {
    members: Vec<ParameterMember>,
    size: u32,
}

impl ParameterLayout {
    /// The size is grown to cover every member if `size` is too small,
    /// saturating at `u32::MAX`.
    pub fn new(size: u32, members: Vec<ParameterMember>) -> Self {
        let end = members
            .iter()
            .map(|m| m.offset.saturating_add(m.size))
            .max()
            .unwrap_or(0);
        Self {
            size: size.max(end),
            members,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn members(&self) -> &[ParameterMember] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&ParameterMember> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Nested struct members in declaration order, each paired with its
    /// position among struct members (the index into bound provider indices).
    pub fn struct_members(&self) -> impl Iterator<Item = (usize, &ParameterMember)> {
        self.members.iter().filter(|m| m.kind.is_struct()).enumerate()
    }

    pub fn struct_member_count(&self) -> usize {
        self.members.iter().filter(|m| m.kind.is_struct()).count()
    }
}
