//! Child cache names

use std::fmt;

/// Key of a child cache: the namespace of the scope that asks for it plus an
/// optional sub-part, e.g. `("intersection", "first")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildCacheName {
    namespace: String,
    part: Option<String>,
}

impl ChildCacheName {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            part: None,
        }
    }

    pub fn with_part(namespace: impl Into<String>, part: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            part: Some(part.into()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn part(&self) -> Option<&str> {
        self.part.as_deref()
    }
}

impl fmt::Display for ChildCacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.part {
            Some(part) => write!(f, "{}/{}", self.namespace, part),
            None => f.write_str(&self.namespace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        assert_eq!(
            ChildCacheName::with_part("pair", "first"),
            ChildCacheName::with_part("pair", "first")
        );
        assert_ne!(
            ChildCacheName::with_part("pair", "first"),
            ChildCacheName::with_part("pair", "second")
        );
        assert_ne!(ChildCacheName::new("pair"), ChildCacheName::with_part("pair", ""));
    }

    #[test]
    fn test_display() {
        assert_eq!(ChildCacheName::new("object").to_string(), "object");
        assert_eq!(ChildCacheName::with_part("pair", "merged").to_string(), "pair/merged");
    }
}
