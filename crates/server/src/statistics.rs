//! Aggregation of statistics reported by external tools.

use dashmap::DashMap;
use std::collections::BTreeMap;

/// Sums numeric statistics by name across concurrent reporters.
#[derive(Default)]
pub struct StatisticsAggregator {
    values: DashMap<String, i64>,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every reported value to the accumulated total for its key.
    pub fn report<'a>(&self, stats: impl IntoIterator<Item = (&'a String, &'a i64)>) {
        for (key, value) in stats {
            self.values
                .entry(key.clone())
                .and_modify(|total| *total = total.saturating_add(*value))
                .or_insert(*value);
        }
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.values.get(key).map(|v| *v.value())
    }

    /// Current totals sorted by key. Does not reset anything.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Log the current totals, one line per key.
    pub fn log_table(&self) {
        for (key, value) in self.snapshot() {
            tracing::info!(target: "conduit::statistics", %key, value, "statistic");
        }
    }
}
