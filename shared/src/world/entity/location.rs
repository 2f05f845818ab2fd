use std::fmt;

/// Human readable path of an entity, for diagnostics only. Never used for routing.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Location(String);

impl Location {
    pub const UNBOUND: &'static str = "<<unbound>>";

    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn unbound() -> Self {
        Self(Self::UNBOUND.to_string())
    }

    /// `parent.name`, or `parent[name]` for indexed children
    pub fn sub(&self, name: &str) -> Self {
        if name.starts_with('[') {
            Self(format!("{}{}", self.0, name))
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    pub fn is_unbound(&self) -> bool {
        self.0 == Self::UNBOUND
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::unbound()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.0)
    }
}
