//! Polling and sample buffering for networked environmental sensor devices.
//!
//! A [`DispatcherWorker`] owns one device: it polls the device on a recurring
//! timer through an injected [`FetchClient`], keeps the last reading of every
//! sensor, and appends each reading to a per-sensor rolling history in a
//! [`SampleStore`].

pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod poll;
pub mod pool;
pub mod reading;
pub mod samples;
pub mod store;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{Config, PollerConfig};
pub use error::WorkerError;
pub use fetch::{FetchClient, FetchTarget, SensorsInfo, TypeReport};
pub use pool::{SensorEntry, SensorRecord};
pub use reading::{Measurement, Reading, Sample};
pub use samples::SampleLog;
pub use store::{SampleStore, SqliteStore};
pub use worker::{DeviceSettings, DispatcherWorker, RemoveOptions};
