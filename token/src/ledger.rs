//! Access to the key-value state the validator and translator run against.

use std::collections::BTreeMap;

use crate::errors::Result;

/// Read access to ledger state.
pub trait Ledger {
    /// Returns the value under `key`. Absent and empty values are equivalent.
    fn get_state(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Whether `key` holds a non-empty value.
    fn exists(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self
            .get_state(namespace, key)?
            .map_or(false, |v| !v.is_empty()))
    }
}

/// Read-write set of a transaction being committed.
pub trait RwSet: Ledger {
    fn set_state(&mut self, namespace: &str, key: &str, value: Vec<u8>) -> Result<()>;

    /// Replaces the tags of `key`; `None` removes them.
    fn set_state_metadata(
        &mut self,
        namespace: &str,
        key: &str,
        metadata: Option<BTreeMap<String, Vec<u8>>>,
    ) -> Result<()>;

    fn delete_state(&mut self, namespace: &str, key: &str) -> Result<()>;
}

/// In-memory ledger.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    states: BTreeMap<(String, String), Vec<u8>>,
    metadata: BTreeMap<(String, String), BTreeMap<String, Vec<u8>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_metadata(&self, namespace: &str, key: &str) -> Option<&BTreeMap<String, Vec<u8>>> {
        self.metadata.get(&(namespace.to_string(), key.to_string()))
    }

    /// Keys in `namespace` holding a value.
    pub fn keys(&self, namespace: &str) -> Vec<&str> {
        self.states
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, k)| k.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Ledger for MemoryLedger {
    fn get_state(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .states
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }
}

impl RwSet for MemoryLedger {
    fn set_state(&mut self, namespace: &str, key: &str, value: Vec<u8>) -> Result<()> {
        self.states
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    fn set_state_metadata(
        &mut self,
        namespace: &str,
        key: &str,
        metadata: Option<BTreeMap<String, Vec<u8>>>,
    ) -> Result<()> {
        let k = (namespace.to_string(), key.to_string());
        match metadata {
            Some(m) => {
                self.metadata.insert(k, m);
            }
            None => {
                self.metadata.remove(&k);
            }
        }
        Ok(())
    }

    fn delete_state(&mut self, namespace: &str, key: &str) -> Result<()> {
        self.states.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_do_not_exist() {
        let mut ledger = MemoryLedger::new();
        ledger.set_state("ns", "a", vec![]).unwrap();
        ledger.set_state("ns", "b", vec![1]).unwrap();
        assert!(!ledger.exists("ns", "a").unwrap());
        assert!(ledger.exists("ns", "b").unwrap());
        assert!(!ledger.exists("other", "b").unwrap());

        ledger.delete_state("ns", "b").unwrap();
        assert!(!ledger.exists("ns", "b").unwrap());
        assert_eq!(ledger.keys("ns"), vec!["a"]);
    }

    #[test]
    fn metadata_can_be_cleared() {
        let mut ledger = MemoryLedger::new();
        let mut tags = BTreeMap::new();
        tags.insert("action".to_string(), b"issue".to_vec());
        ledger.set_state_metadata("ns", "a", Some(tags)).unwrap();
        assert!(ledger.state_metadata("ns", "a").is_some());
        ledger.set_state_metadata("ns", "a", None).unwrap();
        assert!(ledger.state_metadata("ns", "a").is_none());
    }
}
