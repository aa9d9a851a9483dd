use thiserror::Error;

/// Failures surfaced to callers of a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("sensor {0} does not exist")]
    SensorNotFound(String),

    #[error("sensor {0} already exists")]
    SensorExists(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
