use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use crate::provider::{Endpoint, Provider};

/// Resolved providers keyed by service path.
///
/// Entries live until a fresh resolution overwrites them or they are
/// invalidated; there is no eviction.
#[derive(Debug, Default)]
pub struct EndpointCache {
    entries: RwLock<HashMap<String, Provider>>,
}

impl EndpointCache {
    pub fn new() -> EndpointCache {
        Default::default()
    }

    pub fn get(&self, path: &str) -> Option<Endpoint> {
        self.lookup(path).map(|p| p.endpoint)
    }

    /// The methods the cached provider advertised.
    pub fn methods(&self, path: &str) -> Option<Vec<String>> {
        self.lookup(path).map(|p| p.methods)
    }

    pub fn lookup(&self, path: &str) -> Option<Provider> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(path).cloned()
    }

    pub fn put(&self, path: &str, provider: Provider) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(path.to_owned(), provider);
    }

    pub fn invalidate(&self, path: &str) -> Option<Provider> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
