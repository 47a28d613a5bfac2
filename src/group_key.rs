//! Interned dependency-group identifiers shared by breakers, bulkheads, and
//! fallback gates.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// A case-sensitive identifier naming a dependency cluster.
///
/// Cheap to clone (`Arc<str>` refcount bump) and compares/hashes by string
/// content, so it can be used directly as a `HashMap` key without a
/// process-wide interner.
#[derive(Clone, Eq)]
pub struct GroupKey(Arc<str>);

impl GroupKey {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl std::hash::Hash for GroupKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state)
    }
}

impl Borrow<str> for GroupKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupKey({:?})", self.0)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for GroupKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn equal_content_is_equal_regardless_of_allocation() {
        let a = GroupKey::from("orders-db");
        let b = GroupKey::new(String::from("orders-db"));
        assert_eq!(a, b);
    }

    #[test]
    fn case_sensitive() {
        assert_ne!(GroupKey::from("orders"), GroupKey::from("Orders"));
    }

    #[test]
    fn usable_as_hashmap_key() {
        let mut map = HashMap::new();
        map.insert(GroupKey::from("orders-db"), 1);
        assert_eq!(map.get("orders-db"), Some(&1));
    }
}
