use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use tokio::sync::Mutex;

use crate::config::PollerConfig;
use crate::fetch::{FetchClient, FetchTarget, SensorsInfo};
use crate::pool::{SensorEntry, SensorPool, SensorRecord};
use crate::reading::{Reading, Sample};
use crate::samples::{SampleLog, now_millis};
use crate::store::SampleStore;

/// Why a sensor has no reading in an otherwise successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    TypeAbsent,
    TypeErrored(i64),
    AddressAbsent,
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Miss::TypeAbsent => write!(f, "sensor type missing from report"),
            Miss::TypeErrored(code) => write!(f, "sensor type reported error {code}"),
            Miss::AddressAbsent => write!(f, "address missing from report"),
        }
    }
}

/// Finds the reading for `record` in a fetch result.
pub fn locate<'a>(info: &'a SensorsInfo, record: &SensorRecord) -> Result<&'a Reading, Miss> {
    let report = info.get(&record.kind).ok_or(Miss::TypeAbsent)?;
    if report.error != 0 {
        return Err(Miss::TypeErrored(report.error));
    }
    report
        .sensors
        .get(&record.address)
        .ok_or(Miss::AddressAbsent)
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub online: bool,
    /// Sensors that received a reading from the device.
    pub matched: usize,
    /// Sensors that were given an error reading.
    pub errored: usize,
    pub store_failures: usize,
}

/// Runs fetch-and-store cycles for one device.
///
/// Cycles are serialized: a cycle started while another one is in flight
/// waits for it to finish.
pub struct PollEngine<F, S> {
    device_id: String,
    client: Arc<F>,
    samples: SampleLog<S>,
    backoff: ConstantBuilder,
    online: AtomicBool,
    running: Mutex<()>,
}

impl<F: FetchClient, S: SampleStore> PollEngine<F, S> {
    pub fn new(
        device_id: String,
        client: Arc<F>,
        samples: SampleLog<S>,
        poller: &PollerConfig,
    ) -> Self {
        Self {
            device_id,
            client,
            samples,
            backoff: poller.backoff(),
            online: AtomicBool::new(false),
            running: Mutex::new(()),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub async fn run_cycle(&self, target: &FetchTarget, pool: &Mutex<SensorPool>) -> CycleReport {
        let _running = self.running.lock().await;

        let client = &*self.client;
        let device_id = &self.device_id;
        let fetched = (|| client.fetch(target))
            .retry(self.backoff)
            .notify(|e: &anyhow::Error, dur: Duration| {
                log::warn!("Polling device {device_id} failed: {e:#}");
                log::info!("Retrying in {:?}", dur);
            })
            .await;

        let mut pool = pool.lock().await;
        let mut report = CycleReport::default();
        let mut writes = Vec::with_capacity(pool.len());

        match fetched {
            Ok(info) => {
                if !self.online.swap(true, Ordering::SeqCst) {
                    log::info!("Device {device_id} is online");
                }
                report.online = true;

                for entry in pool.iter_mut() {
                    let reading = match locate(&info, &entry.record) {
                        Ok(reading) => {
                            let reading = reading.rounded();
                            log::info!("{}: {reading:?}", entry.record.id);
                            reading
                        }
                        Err(miss) => {
                            log::debug!(
                                "No reading for sensor {} ({} at {}): {miss}",
                                entry.record.id,
                                entry.record.kind,
                                entry.record.address
                            );
                            Reading::Error
                        }
                    };
                    writes.push(apply(entry, reading, &mut report));
                }
            }
            Err(e) => {
                if self.online.swap(false, Ordering::SeqCst) {
                    log::warn!("Device {device_id} is offline: {e:#}");
                } else {
                    log::error!("Failed to poll device {device_id}: {e:#}");
                }
                for entry in pool.iter_mut() {
                    writes.push(apply(entry, Reading::Error, &mut report));
                }
            }
        }

        // The pool stays locked until the samples are written, so a sensor
        // removed with its history cannot be written to afterwards.
        report.store_failures = self.persist(writes).await;
        report
    }

    /// Appends the cycle's samples to the store off the async threads.
    /// Failures are logged and counted only.
    async fn persist(&self, writes: Vec<PendingWrite>) -> usize {
        if writes.is_empty() {
            return 0;
        }
        let total = writes.len();
        let failures = self
            .samples
            .blocking(move |samples| {
                let mut failures = 0;
                for write in &writes {
                    let stored = samples
                        .insert(&write.sensor_id, &write.sample)
                        .and_then(|()| samples.evict_older_than(&write.sensor_id, write.cutoff));
                    if let Err(e) = stored {
                        log::error!("{e:#}");
                        failures += 1;
                    }
                }
                failures
            })
            .await;

        failures.unwrap_or_else(|e| {
            log::error!("Device {}: {e:#}", self.device_id);
            total
        })
    }
}

struct PendingWrite {
    sensor_id: String,
    sample: Sample,
    cutoff: i64,
}

/// Makes `reading` the sensor's last known state and stamps it for storage.
fn apply(entry: &mut SensorEntry, reading: Reading, report: &mut CycleReport) -> PendingWrite {
    entry.reading = reading;
    if reading.is_error() {
        report.errored += 1;
    } else {
        report.matched += 1;
    }

    let timestamp = now_millis();
    PendingWrite {
        sensor_id: entry.record.id.clone(),
        sample: Sample { timestamp, reading },
        cutoff: timestamp.saturating_sub(entry.record.retention_millis()),
    }
}
