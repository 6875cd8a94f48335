use std::collections::BTreeMap;

/// Deterministic key-value storage supplied by the host.
///
/// Iteration is always in ascending key order so that every replica walks
/// entries identically.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// All entries whose key starts with `prefix`, ordered by key.
    fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// BTreeMap backed store used by tests and by hosts without persistence.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Buffered writes of one open transaction.
///
/// `None` marks a deletion. Reads consult the buffer before falling through
/// to whatever lies underneath.
#[derive(Debug, Default, Clone)]
pub struct StoreTransaction {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl StoreTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(None)` if the key was deleted here, `None` if untouched.
    pub fn lookup(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        self.writes.get(key).cloned()
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    /// Overlay the buffered writes under `prefix` onto an ordered view.
    pub fn overlay(&self, prefix: &[u8], view: &mut BTreeMap<Vec<u8>, Vec<u8>>) {
        for (key, value) in self
            .writes
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            match value {
                Some(value) => {
                    view.insert(key.clone(), value.clone());
                }
                None => {
                    view.remove(key);
                }
            }
        }
    }

    /// Fold these writes into the enclosing transaction.
    pub fn merge_into(self, parent: &mut StoreTransaction) {
        parent.writes.extend(self.writes);
    }

    /// Apply these writes to the underlying store.
    pub fn commit(self, store: &mut dyn KvStore) {
        for (key, value) in self.writes {
            match value {
                Some(value) => store.set(key, value),
                None => store.delete(&key),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
