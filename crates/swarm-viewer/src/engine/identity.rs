use std::fmt;
use uuid::Uuid;

/// Opaque client identifier held by one viewer for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewerIdentity(String);

impl ViewerIdentity {
    /// Generates a fresh random (v4) identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
