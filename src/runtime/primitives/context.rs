use std::collections::BTreeMap;

use codec::{Decode, Encode};
use tracing::trace;

use crate::{
    error::StoreError,
    event::{Event, EventManager},
    store::{KvStore, StoreTransaction},
    BlockNumber,
};

/// Height and timestamp of the block being executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: BlockNumber,
    /// Unix timestamp in seconds, as agreed by consensus.
    pub time: u64,
}

/// Execution context handed to every keeper operation.
///
/// Owns the store, the current header and the events emitted so far.
/// Writes go to the innermost open transaction, or straight to the store
/// when none is open.
pub struct Context {
    store: Box<dyn KvStore>,
    transactions: Vec<StoreTransaction>,
    header: BlockHeader,
    events: EventManager,
}

impl Context {
    pub fn new(store: impl KvStore + 'static, header: BlockHeader) -> Self {
        Self {
            store: Box::new(store),
            transactions: Vec::new(),
            header,
            events: EventManager::default(),
        }
    }

    pub fn header(&self) -> BlockHeader {
        self.header
    }

    pub fn set_header(&mut self, header: BlockHeader) {
        self.header = header;
    }

    pub fn block_height(&self) -> BlockNumber {
        self.header.height
    }

    pub fn block_time(&self) -> u64 {
        self.header.time
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        for tx in self.transactions.iter().rev() {
            if let Some(value) = tx.lookup(key) {
                return value;
            }
        }
        self.store.get(key)
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        match self.transactions.last_mut() {
            Some(tx) => tx.set(key, value),
            None => self.store.set(key, value),
        }
    }

    pub fn delete(&mut self, key: &[u8]) {
        match self.transactions.last_mut() {
            Some(tx) => tx.delete(key),
            None => self.store.delete(key),
        }
    }

    /// Entries under `prefix` as seen through every open transaction.
    pub fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        if self.transactions.is_empty() {
            return self.store.prefix_iter(prefix);
        }
        let mut view: BTreeMap<Vec<u8>, Vec<u8>> =
            self.store.prefix_iter(prefix).into_iter().collect();
        for tx in &self.transactions {
            tx.overlay(prefix, &mut view);
        }
        view.into_iter().collect()
    }

    pub fn get_decoded<T: Decode>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.get(key) {
            Some(bytes) => T::decode(&mut &bytes[..])
                .map(Some)
                .map_err(|e| StoreError::decode(key, e)),
            None => Ok(None),
        }
    }

    pub fn set_encoded<T: Encode>(&mut self, key: Vec<u8>, value: &T) {
        self.set(key, value.encode());
    }

    /// Decoded values of every entry under `prefix`, in key order.
    pub fn iter_decoded<T: Decode>(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>, StoreError> {
        self.prefix_iter(prefix)
            .into_iter()
            .map(|(key, bytes)| {
                T::decode(&mut &bytes[..])
                    .map(|value| (key.clone(), value))
                    .map_err(|e| StoreError::decode(&key, e))
            })
            .collect()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.emit(event);
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take()
    }

    /// Run `f` inside a fresh transaction.
    ///
    /// On `Ok` the buffered writes are folded into the enclosing transaction
    /// (or the store). On `Err` they are discarded together with every event
    /// emitted by `f`.
    pub fn with_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Context) -> Result<T, E>,
    {
        let events_before = self.events.len();
        self.transactions.push(StoreTransaction::new());
        let result = f(self);
        let tx = self.transactions.pop().unwrap_or_default();

        match result {
            Ok(value) => {
                match self.transactions.last_mut() {
                    Some(parent) => tx.merge_into(parent),
                    None => tx.commit(self.store.as_mut()),
                }
                Ok(value)
            }
            Err(err) => {
                trace!(height = self.header.height, "rolling back transaction");
                self.events.truncate(events_before);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ctx() -> Context {
        Context::new(MemoryStore::new(), BlockHeader { height: 7, time: 1_000 })
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let mut ctx = ctx();
        ctx.set(b"kept".to_vec(), b"1".to_vec());

        let result: Result<(), &str> = ctx.with_transaction(|ctx| {
            ctx.set(b"dropped".to_vec(), b"2".to_vec());
            ctx.delete(b"kept");
            ctx.emit(Event::new("should_vanish"));
            Err("boom")
        });

        assert_eq!(result, Err("boom"));
        assert!(ctx.has(b"kept"));
        assert!(!ctx.has(b"dropped"));
        assert!(ctx.events().is_empty());
    }

    #[test]
    fn nested_transactions_commit_through_parent() {
        let mut ctx = ctx();

        let outer: Result<(), ()> = ctx.with_transaction(|ctx| {
            ctx.set(b"p/a".to_vec(), b"1".to_vec());
            let inner: Result<(), ()> = ctx.with_transaction(|ctx| {
                ctx.set(b"p/b".to_vec(), b"2".to_vec());
                Ok(())
            });
            assert!(inner.is_ok());
            let failed: Result<(), ()> = ctx.with_transaction(|ctx| {
                ctx.set(b"p/c".to_vec(), b"3".to_vec());
                Err(())
            });
            assert!(failed.is_err());

            let keys: Vec<_> = ctx.prefix_iter(b"p/").into_iter().map(|(k, _)| k).collect();
            assert_eq!(keys, vec![b"p/a".to_vec(), b"p/b".to_vec()]);
            Ok(())
        });

        assert!(outer.is_ok());
        assert_eq!(ctx.prefix_iter(b"p/").len(), 2);
    }

    #[test]
    fn prefix_iter_hides_deletions_in_open_transaction() {
        let mut ctx = ctx();
        ctx.set(b"x/1".to_vec(), b"a".to_vec());
        ctx.set(b"x/2".to_vec(), b"b".to_vec());

        let _: Result<(), ()> = ctx.with_transaction(|ctx| {
            ctx.delete(b"x/1");
            assert_eq!(ctx.prefix_iter(b"x/"), vec![(b"x/2".to_vec(), b"b".to_vec())]);
            Ok(())
        });

        assert_eq!(ctx.prefix_iter(b"x/").len(), 1);
    }

    #[test]
    fn decode_failure_is_reported() {
        let mut ctx = ctx();
        ctx.set(b"bad".to_vec(), vec![1]);
        let decoded: Result<Option<u64>, StoreError> = ctx.get_decoded(b"bad");
        assert!(matches!(decoded, Err(StoreError::Decode { .. })));
    }
}
