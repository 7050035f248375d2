use std::collections::BTreeSet;

/// Addresses of peers this ledger has been told about.
///
/// Bookkeeping only: nothing in block creation or validation reads it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeRegistry {
    addresses: BTreeSet<String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the address was not already known.
    pub fn register(&mut self, address: impl Into<String>) -> bool {
        self.addresses.insert(address.into())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut nodes = NodeRegistry::new();
        assert!(nodes.register("10.0.0.1:5000"));
        assert!(!nodes.register("10.0.0.1:5000"));
        assert!(nodes.register("10.0.0.2:5000"));
        assert_eq!(nodes.len(), 2);
        assert!(nodes.contains("10.0.0.1:5000"));
        assert!(!nodes.contains("10.0.0.3:5000"));
    }

    #[test]
    fn iter_is_sorted() {
        let mut nodes = NodeRegistry::new();
        nodes.register("b");
        nodes.register("a");
        assert_eq!(nodes.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
