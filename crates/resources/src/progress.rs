use scenekit_common::ResourceId;
use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::error::ResourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Complete,
    Error,
}

/// Display-only record of one identifier's most recent load attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadingProgress {
    pub id: ResourceId,
    /// In `[0, 1]`.
    pub progress: f32,
    pub status: LoadStatus,
    pub error: Option<ResourceError>,
}

impl LoadingProgress {
    pub fn loading(id: ResourceId) -> Self {
        Self {
            id,
            progress: 0.0,
            status: LoadStatus::Loading,
            error: None,
        }
    }

    pub fn complete(id: ResourceId) -> Self {
        Self {
            id,
            progress: 1.0,
            status: LoadStatus::Complete,
            error: None,
        }
    }

    pub fn failed(id: ResourceId, error: ResourceError) -> Self {
        Self {
            id,
            progress: 0.0,
            status: LoadStatus::Error,
            error: Some(error),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ProgressLedger {
    entries: RefCell<BTreeMap<ResourceId, LoadingProgress>>,
}

impl ProgressLedger {
    pub(crate) fn record(&self, progress: LoadingProgress) {
        self.entries
            .borrow_mut()
            .insert(progress.id.clone(), progress);
    }

    pub(crate) fn get(&self, id: &ResourceId) -> Option<LoadingProgress> {
        self.entries.borrow().get(id).cloned()
    }

    pub(crate) fn all(&self) -> Vec<LoadingProgress> {
        self.entries.borrow().values().cloned().collect()
    }

    /// Mean progress over `ids`; unknown ids count as 0. An empty batch is done.
    pub(crate) fn aggregate(&self, ids: &[ResourceId]) -> f32 {
        if ids.is_empty() {
            return 1.0;
        }
        let entries = self.entries.borrow();
        let total: f32 = ids
            .iter()
            .map(|id| entries.get(id).map_or(0.0, |p| p.progress))
            .sum();
        total / ids.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_averages_and_defaults_missing_to_zero() {
        let ledger = ProgressLedger::default();
        let a = ResourceId::new("json", "a");
        let b = ResourceId::new("json", "b");
        let c = ResourceId::new("json", "c");
        ledger.record(LoadingProgress::complete(a.clone()));
        ledger.record(LoadingProgress::loading(b.clone()));
        let mean = ledger.aggregate(&[a, b, c]);
        assert!((mean - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(ledger.aggregate(&[]), 1.0);
    }

    #[test]
    fn later_records_replace_earlier_ones() {
        let ledger = ProgressLedger::default();
        let a = ResourceId::new("json", "a");
        ledger.record(LoadingProgress::loading(a.clone()));
        ledger.record(LoadingProgress::failed(
            a.clone(),
            ResourceError::load_failure("a", "boom"),
        ));
        let p = ledger.get(&a).unwrap();
        assert_eq!(p.status, LoadStatus::Error);
        assert_eq!(ledger.all().len(), 1);
    }
}
