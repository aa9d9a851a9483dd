use std::sync::Arc;

use anyhow::Context;

use crate::reading::Sample;
use crate::store::SampleStore;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Per-sensor time-indexed sample history, stored as JSON blobs scored by
/// their timestamp.
pub struct SampleLog<S> {
    store: Arc<S>,
}

impl<S> Clone for SampleLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SampleStore> SampleLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Runs `op` on tokio's blocking pool, since store calls may block on I/O.
    pub async fn blocking<T, Op>(&self, op: Op) -> Result<T, anyhow::Error>
    where
        T: Send + 'static,
        Op: FnOnce(&SampleLog<S>) -> T + Send + 'static,
    {
        let log = self.clone();
        tokio::task::spawn_blocking(move || op(&log))
            .await
            .context("Sample store task failed")
    }

    /// Stores `sample`, replacing any sample at the same timestamp.
    pub fn insert(&self, sensor_id: &str, sample: &Sample) -> Result<(), anyhow::Error> {
        let blob = serde_json::to_string(sample).context("Failed to encode sample")?;
        self.store
            .add(sensor_id, sample.timestamp, &blob)
            .with_context(|| format!("Failed to store sample for sensor {sensor_id}"))
    }

    /// Samples with `from <= timestamp <= to`, oldest first.
    pub fn query_window(
        &self,
        sensor_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<Sample>, anyhow::Error> {
        self.store
            .range_by_score(sensor_id, from, to)
            .with_context(|| format!("Failed to read samples for sensor {sensor_id}"))?
            .iter()
            .map(|blob| {
                serde_json::from_str(blob)
                    .with_context(|| format!("Malformed sample for sensor {sensor_id}: {blob}"))
            })
            .collect()
    }

    /// Drops every sample with `timestamp < cutoff`.
    pub fn evict_older_than(&self, sensor_id: &str, cutoff: i64) -> Result<usize, anyhow::Error> {
        self.store
            .remove_range_by_score(sensor_id, i64::MIN, cutoff.saturating_sub(1))
            .with_context(|| format!("Failed to evict samples for sensor {sensor_id}"))
    }

    pub fn delete_all(&self, sensor_id: &str) -> Result<(), anyhow::Error> {
        self.store
            .delete(sensor_id)
            .with_context(|| format!("Failed to delete samples for sensor {sensor_id}"))
    }
}
