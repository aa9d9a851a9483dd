use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::fetch::{FetchClient, FetchTarget, SensorsInfo};
use crate::pool::SensorRecord;
use crate::store::{SampleStore, SqliteStore};

/// Replays scripted fetch outcomes, then repeats `fallback`.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<SensorsInfo, String>>>,
    fallback: Result<SensorsInfo, String>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn scripted(
        script: Vec<Result<SensorsInfo, String>>,
        fallback: Result<SensorsInfo, String>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(info: SensorsInfo) -> Self {
        Self::scripted(Vec::new(), Ok(info))
    }

    pub fn failing() -> Self {
        Self::scripted(Vec::new(), Err("connection refused".to_owned()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FetchClient for ScriptedClient {
    fn fetch(
        &self,
        _target: &FetchTarget,
    ) -> impl Future<Output = Result<SensorsInfo, anyhow::Error>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        std::future::ready(next.map_err(anyhow::Error::msg))
    }
}

/// Never answers.
pub struct StalledClient;

impl FetchClient for StalledClient {
    fn fetch(
        &self,
        _target: &FetchTarget,
    ) -> impl Future<Output = Result<SensorsInfo, anyhow::Error>> + Send {
        std::future::pending()
    }
}

/// Answers after `delay`, tracking how many fetches overlap. The `n`th call
/// reports a `bme280` temperature of `n`.
pub struct SlowClient {
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowClient {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl FetchClient for SlowClient {
    fn fetch(
        &self,
        _target: &FetchTarget,
    ) -> impl Future<Output = Result<SensorsInfo, anyhow::Error>> + Send {
        async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);

            // Wall-clock gap so consecutive cycles get distinct sample timestamps.
            std::thread::sleep(Duration::from_millis(2));
            tokio::time::sleep(self.delay).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(info(serde_json::json!({
                "bme280": {"error": 0, "sensors": {"0x76": {"error": 0, "temperature": call}}}
            })))
        }
    }
}

/// Sqlite store whose writes block the calling thread for `delay`.
pub struct SlowStore {
    inner: SqliteStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        let inner = SqliteStore::open_in_memory().unwrap();
        inner.init().unwrap();
        Self { inner, delay }
    }
}

impl SampleStore for SlowStore {
    fn add(&self, key: &str, score: i64, blob: &str) -> Result<(), anyhow::Error> {
        std::thread::sleep(self.delay);
        self.inner.add(key, score, blob)
    }

    fn range_by_score(&self, key: &str, min: i64, max: i64) -> Result<Vec<String>, anyhow::Error> {
        self.inner.range_by_score(key, min, max)
    }

    fn remove_range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<usize, anyhow::Error> {
        self.inner.remove_range_by_score(key, min, max)
    }

    fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        self.inner.delete(key)
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

impl SampleStore for FailingStore {
    fn add(&self, _key: &str, _score: i64, _blob: &str) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("disk full"))
    }

    fn range_by_score(
        &self,
        _key: &str,
        _min: i64,
        _max: i64,
    ) -> Result<Vec<String>, anyhow::Error> {
        Err(anyhow::anyhow!("disk full"))
    }

    fn remove_range_by_score(
        &self,
        _key: &str,
        _min: i64,
        _max: i64,
    ) -> Result<usize, anyhow::Error> {
        Err(anyhow::anyhow!("disk full"))
    }

    fn delete(&self, _key: &str) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("disk full"))
    }
}

pub fn info(value: serde_json::Value) -> SensorsInfo {
    serde_json::from_value(value).unwrap()
}

/// `bme280` report with one sensor at `0x76`.
pub fn bme280_info() -> SensorsInfo {
    info(serde_json::json!({
        "bme280": {
            "error": 0,
            "sensors": {
                "0x76": {"error": 0, "temperature": 21.2345, "humidity": 50.001, "pressure": null}
            }
        }
    }))
}

pub fn record(id: &str, address: &str, retention: Duration) -> SensorRecord {
    SensorRecord {
        id: id.to_owned(),
        kind: "bme280".to_owned(),
        address: address.to_owned(),
        retention,
    }
}

pub fn target() -> FetchTarget {
    FetchTarget {
        address: "192.168.1.40".to_owned(),
        credential: "secret".to_owned(),
    }
}
