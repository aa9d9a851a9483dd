use std::collections::HashMap;
use std::future::Future;

use serde::Deserialize;

use crate::reading::Reading;

/// Where and how to reach a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub address: String,
    pub credential: String,
}

/// Readings reported for one sensor type. A nonzero `error` invalidates the
/// whole type.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TypeReport {
    #[serde(default)]
    pub error: i64,
    #[serde(default)]
    pub sensors: HashMap<String, Reading>,
}

/// Result of one successful fetch, keyed by sensor type.
pub type SensorsInfo = HashMap<String, TypeReport>;

/// Client for the device's own protocol.
///
/// The worker only needs the aggregate per-type reading map; how the device is
/// reached, and any timeout on that, is up to the implementation.
pub trait FetchClient: Send + Sync + 'static {
    fn fetch(
        &self,
        target: &FetchTarget,
    ) -> impl Future<Output = Result<SensorsInfo, anyhow::Error>> + Send;
}
