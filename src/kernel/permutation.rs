use serde::Serialize;

pub const MAX_PERMUTATION_OPTIONS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermutationError {
    #[error("permutation domain supports at most {MAX_PERMUTATION_OPTIONS} options, got {0}")]
    TooManyOptions(usize),
    #[error("duplicate permutation option {0}")]
    DuplicateOption(String),
}

/// Named boolean compile options of a kernel, one bit each.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PermutationDomain {
    options: Vec<String>,
}

impl PermutationDomain {
    pub fn new<I, S>(options: I) -> Result<Self, PermutationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for option in options {
            let option = option.into();
            if out.contains(&option) {
                return Err(PermutationError::DuplicateOption(option));
            }
            out.push(option);
        }
        if out.len() > MAX_PERMUTATION_OPTIONS {
            return Err(PermutationError::TooManyOptions(out.len()));
        }
        Ok(Self { options: out })
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn bit(&self, option: &str) -> Option<u32> {
        self.options
            .iter()
            .position(|o| o == option)
            .map(|i| i as u32)
    }

    /// Vector with the given options enabled; unknown names are ignored.
    pub fn vector_with<'a>(&self, enabled: impl IntoIterator<Item = &'a str>) -> PermutationVector {
        let mut v = PermutationVector::default();
        for name in enabled {
            if let Some(bit) = self.bit(name) {
                v.set_bit(bit, true);
            }
        }
        v
    }

    /// WGSL `const` declarations selecting one permutation, prepended to the
    /// kernel source before compilation.
    pub fn wgsl_prelude(&self, permutation_id: u32) -> String {
        let mut out = String::new();
        for (bit, name) in self.options.iter().enumerate() {
            let enabled = permutation_id & (1 << bit) != 0;
            out.push_str(&format!("const {name}: bool = {enabled};\n"));
        }
        out
    }
}

/// A concrete permutation: the option bitset doubles as the permutation id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PermutationVector(u32);

impl PermutationVector {
    pub fn from_id(id: u32) -> Self {
        Self(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }

    pub fn set_bit(&mut self, bit: u32, enabled: bool) {
        if enabled {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }

    pub fn is_set(self, bit: u32) -> bool {
        self.0 & (1 << bit) != 0
    }
}

/// Per sub-invocation permutation vectors for one kernel, filled by providers
/// during validation.
pub struct PermutationAccumulator<'a> {
    domain: &'a PermutationDomain,
    vectors: Vec<PermutationVector>,
}

impl<'a> PermutationAccumulator<'a> {
    pub fn new(
        domain: &'a PermutationDomain,
        sub_invocation_count: usize,
        base: PermutationVector,
    ) -> Self {
        Self {
            domain,
            vectors: vec![base; sub_invocation_count],
        }
    }

    pub fn domain(&self) -> &PermutationDomain {
        self.domain
    }

    pub fn sub_invocation_count(&self) -> usize {
        self.vectors.len()
    }

    /// Options the kernel does not declare are ignored.
    pub fn set(&mut self, sub_invocation: usize, option: &str, enabled: bool) {
        let Some(bit) = self.domain.bit(option) else {
            return;
        };
        if let Some(v) = self.vectors.get_mut(sub_invocation) {
            v.set_bit(bit, enabled);
        }
    }

    pub fn set_all(&mut self, option: &str, enabled: bool) {
        let Some(bit) = self.domain.bit(option) else {
            return;
        };
        for v in &mut self.vectors {
            v.set_bit(bit, enabled);
        }
    }

    pub fn vectors(&self) -> &[PermutationVector] {
        &self.vectors
    }

    pub fn into_vectors(self) -> Vec<PermutationVector> {
        self.vectors
    }
}
