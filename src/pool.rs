use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::WorkerError;
use crate::reading::Reading;

/// Metadata for one sensor on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorRecord {
    pub id: String,
    /// Sensor type key in the device's report, e.g. `bme280`.
    pub kind: String,
    /// Address of the sensor within its type, e.g. `0x76`.
    pub address: String,
    /// How long samples are kept.
    pub retention: Duration,
}

impl SensorRecord {
    pub fn retention_millis(&self) -> i64 {
        i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorEntry {
    pub record: SensorRecord,
    /// Last known state. An error marker until the first successful poll.
    pub reading: Reading,
}

/// In-memory set of a device's sensors, keyed by sensor id.
#[derive(Debug, Default)]
pub struct SensorPool {
    entries: BTreeMap<String, SensorEntry>,
}

impl SensorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` with an error placeholder reading.
    pub fn initialize(&mut self, record: SensorRecord) -> Result<(), WorkerError> {
        if self.entries.contains_key(&record.id) {
            return Err(WorkerError::SensorExists(record.id));
        }
        self.entries.insert(
            record.id.clone(),
            SensorEntry {
                record,
                reading: Reading::Error,
            },
        );
        Ok(())
    }

    /// Replaces the metadata of an existing sensor, keeping its last reading.
    pub fn update(&mut self, record: SensorRecord) -> Result<(), WorkerError> {
        match self.entries.get_mut(&record.id) {
            Some(entry) => {
                entry.record = record;
                Ok(())
            }
            None => Err(WorkerError::SensorNotFound(record.id)),
        }
    }

    pub fn remove(&mut self, sensor_id: &str) -> Result<SensorEntry, WorkerError> {
        self.entries
            .remove(sensor_id)
            .ok_or_else(|| WorkerError::SensorNotFound(sensor_id.to_owned()))
    }

    pub fn find(&self, sensor_id: &str) -> Option<&SensorEntry> {
        self.entries.get(sensor_id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SensorEntry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
