use crate::storage::models::PathRecord;
use std::collections::HashMap;

/// Every path record known before the pass, keyed by path. Paths observed
/// on disk are taken out; whatever is left was not seen.
#[derive(Debug, Default)]
pub struct PathIndex {
    records: HashMap<String, PathRecord>,
}

impl PathIndex {
    pub fn new(records: Vec<PathRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.path.clone(), record))
                .collect(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&PathRecord> {
        self.records.get(path)
    }

    /// Mark `path` as observed this pass.
    pub fn take(&mut self, path: &str) -> Option<PathRecord> {
        self.records.remove(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Paths never observed, sorted.
    pub fn into_unobserved(self) -> Vec<String> {
        let mut paths: Vec<String> = self.records.into_keys().collect();
        paths.sort();
        paths
    }
}
