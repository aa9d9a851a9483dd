use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::PollerConfig;
use crate::error::WorkerError;
use crate::fetch::{FetchClient, FetchTarget};
use crate::poll::PollEngine;
use crate::pool::{SensorEntry, SensorPool, SensorRecord};
use crate::reading::Sample;
use crate::samples::{SampleLog, now_millis};
use crate::store::SampleStore;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Identity and reachability of a registered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub id: String,
    pub target: FetchTarget,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Also delete every stored sample of the sensor.
    pub purge_history: bool,
}

/// Polls one device on a recurring timer and owns its sensor pool.
///
/// Must be created inside a tokio runtime. The timer is re-armed, never
/// stacked, whenever a sensor is added or the poll interval changes: the
/// previous timer is cancelled, one poll runs immediately and further polls
/// follow every interval. Dropping the worker stops its timer; a cycle that is
/// already running is left to finish.
pub struct DispatcherWorker<F, S> {
    device_id: String,
    target: FetchTarget,
    poll_interval: Duration,
    engine: Arc<PollEngine<F, S>>,
    pool: Arc<Mutex<SensorPool>>,
    samples: SampleLog<S>,
    timer: Option<CancellationToken>,
}

impl<F: FetchClient, S: SampleStore> DispatcherWorker<F, S> {
    pub fn new(
        settings: DeviceSettings,
        sensors: impl IntoIterator<Item = SensorRecord>,
        client: Arc<F>,
        samples: SampleLog<S>,
        poller: &PollerConfig,
    ) -> Self {
        let mut pool = SensorPool::new();
        for record in sensors {
            if let Err(e) = pool.initialize(record) {
                log::warn!("Skipping sensor on device {}: {e}", settings.id);
            }
        }

        let engine = PollEngine::new(settings.id.clone(), client, samples.clone(), poller);
        let mut worker = Self {
            device_id: settings.id,
            target: settings.target,
            poll_interval: settings.poll_interval,
            engine: Arc::new(engine),
            pool: Arc::new(Mutex::new(pool)),
            samples,
            timer: None,
        };
        log::info!(
            "Starting worker for device {} every {:?}",
            worker.device_id,
            worker.poll_interval
        );
        worker.rearm();
        worker
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Whether the last finished poll cycle reached the device.
    pub fn is_online(&self) -> bool {
        self.engine.is_online()
    }

    pub async fn find_sensor(&self, sensor_id: &str) -> Option<SensorEntry> {
        self.pool.lock().await.find(sensor_id).cloned()
    }

    /// Samples of the last `window`, oldest first, never older than the
    /// sensor's retention. Expired samples are evicted first.
    pub async fn get_samples(
        &self,
        sensor_id: &str,
        window: Duration,
    ) -> Result<Vec<Sample>, WorkerError> {
        let retention = self
            .pool
            .lock()
            .await
            .find(sensor_id)
            .map(|entry| entry.record.retention_millis())
            .ok_or_else(|| WorkerError::SensorNotFound(sensor_id.to_owned()))?;

        let now = now_millis();
        let cutoff = now.saturating_sub(retention);
        let window = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let from = now.saturating_sub(window).max(cutoff);

        let sensor_id = sensor_id.to_owned();
        let samples = self
            .samples
            .blocking(move |samples| {
                if let Err(e) = samples.evict_older_than(&sensor_id, cutoff) {
                    log::error!("{e:#}");
                }
                samples.query_window(&sensor_id, from, now)
            })
            .await??;
        Ok(samples)
    }

    /// Adds a sensor and polls right away so it gets data promptly.
    ///
    /// The record is trusted as is; an id already in the pool is rejected.
    pub async fn add_sensor(&mut self, record: SensorRecord) -> Result<(), WorkerError> {
        let id = record.id.clone();
        self.pool.lock().await.initialize(record)?;
        log::info!("Adding sensor {id} to device {}", self.device_id);
        self.rearm();
        Ok(())
    }

    pub async fn update_sensor(&self, record: SensorRecord) -> Result<(), WorkerError> {
        let id = record.id.clone();
        self.pool.lock().await.update(record)?;
        log::info!("Updating sensor {id} on device {}", self.device_id);
        Ok(())
    }

    pub async fn remove_sensor(
        &self,
        sensor_id: &str,
        options: RemoveOptions,
    ) -> Result<(), WorkerError> {
        let mut pool = self.pool.lock().await;
        pool.remove(sensor_id)?;
        log::info!("Removing sensor {sensor_id} from device {}", self.device_id);

        if options.purge_history {
            let id = sensor_id.to_owned();
            let purged = self
                .samples
                .blocking(move |samples| samples.delete_all(&id))
                .await
                .and_then(|purged| purged);
            if let Err(e) = purged {
                log::error!("{e:#}");
            }
        }
        drop(pool);
        Ok(())
    }

    pub fn set_poll_interval(&mut self, poll_interval: Duration) {
        log::info!("Polling device {} every {:?}", self.device_id, poll_interval);
        self.poll_interval = poll_interval;
        self.rearm();
    }

    /// Cancels the timer. Calling it again does nothing.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
            log::info!("Stopped polling device {}", self.device_id);
        }
    }

    fn rearm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let engine = Arc::clone(&self.engine);
        let pool = Arc::clone(&self.pool);
        let target = self.target.clone();
        let period = self.poll_interval.max(MIN_POLL_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                engine.run_cycle(&target, &pool).await;
            }
        });

        self.timer = Some(token);
    }
}

impl<F, S> Drop for DispatcherWorker<F, S> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}
