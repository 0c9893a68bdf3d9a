use std::collections::BTreeMap;

use kicksim_core::{ErrorSource, SimError};

/// Collects simulation errors per origin until they are taken.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    errors: BTreeMap<ErrorSource, Vec<SimError>>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error. Repeated errors are kept as separate records.
    pub fn aggregate(&mut self, error: SimError, source: ErrorSource) {
        log::debug!("simulation error from {}: {}", source, error);
        self.errors.entry(source).or_default().push(error);
    }

    /// Returns all errors of `source` in insertion order and clears them.
    pub fn take_aggregates(&mut self, source: ErrorSource) -> Vec<SimError> {
        self.errors.remove(&source).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.values().all(|v| v.is_empty())
    }
}
