// src/secrets/mock.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Secret, SecretSource};

/// In-memory secret source for tests.
///
/// Clones share the lookup counter, so a test can hand one clone to the
/// controller and keep another to assert that secrets were (not) consulted.
#[derive(Debug, Clone, Default)]
pub struct MapSecretStore {
    values: HashMap<String, String>,
    lookups: Arc<AtomicUsize>,
}

impl MapSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    /// Number of `lookup` calls made so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl SecretSource for MapSecretStore {
    fn lookup(&self, name: &str) -> Option<Secret> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.values
            .get(name)
            .filter(|v| !v.is_empty())
            .map(|v| Secret::new(v.clone()))
    }
}
