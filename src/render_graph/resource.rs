use std::sync::Arc;

/// Cheap-to-clone name of a render graph resource (buffer, pass).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName(Arc<str>);

impl ResourceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResourceName {
    fn from(s: String) -> Self {
        ResourceName(Arc::from(s.as_str()))
    }
}

impl From<&str> for ResourceName {
    fn from(s: &str) -> Self {
        ResourceName(Arc::from(s))
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for ResourceName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
