use serde::{Deserialize, Serialize};

/// Numeric channels a device sensor may report. Any of them can be absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

impl Measurement {
    /// Rounds every present channel to two decimals.
    pub fn rounded(self) -> Self {
        Self {
            temperature: self.temperature.map(round2),
            humidity: self.humidity.map(round2),
            pressure: self.pressure.map(round2),
        }
    }
}

/// One point-in-time result for a sensor: either a measurement set or an
/// error marker carrying no numbers at all.
///
/// On the wire this is `{error: 0|1, temperature, humidity, pressure}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawReading", into = "RawReading")]
pub enum Reading {
    Valid(Measurement),
    Error,
}

impl Reading {
    pub fn is_error(&self) -> bool {
        matches!(self, Reading::Error)
    }

    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            Reading::Valid(m) => Some(m),
            Reading::Error => None,
        }
    }

    pub fn rounded(self) -> Self {
        match self {
            Reading::Valid(m) => Reading::Valid(m.rounded()),
            Reading::Error => Reading::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawReading {
    #[serde(default)]
    error: i64,
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

impl From<RawReading> for Reading {
    fn from(raw: RawReading) -> Self {
        if raw.error != 0 {
            return Reading::Error;
        }
        Reading::Valid(Measurement {
            temperature: raw.temperature,
            humidity: raw.humidity,
            pressure: raw.pressure,
        })
    }
}

impl From<Reading> for RawReading {
    fn from(reading: Reading) -> Self {
        match reading {
            Reading::Valid(m) => RawReading {
                error: 0,
                temperature: m.temperature,
                humidity: m.humidity,
                pressure: m.pressure,
            },
            Reading::Error => RawReading {
                error: 1,
                temperature: None,
                humidity: None,
                pressure: None,
            },
        }
    }
}

/// A reading stamped with its capture time in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSample", into = "RawSample")]
pub struct Sample {
    pub timestamp: i64,
    pub reading: Reading,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawSample {
    timestamp: i64,
    #[serde(flatten)]
    reading: RawReading,
}

impl From<RawSample> for Sample {
    fn from(raw: RawSample) -> Self {
        Sample {
            timestamp: raw.timestamp,
            reading: raw.reading.into(),
        }
    }
}

impl From<Sample> for RawSample {
    fn from(sample: Sample) -> Self {
        RawSample {
            timestamp: sample.timestamp,
            reading: sample.reading.into(),
        }
    }
}

/// Rounds half away from zero at two decimals, keeping the sign.
///
/// The scaled magnitude is first normalized to 15 significant digits so that
/// values such as `1.005` (stored as `100.49999999999999` once scaled) land on
/// the half-unit they were written as.
pub fn round2(value: f64) -> f64 {
    let scaled = value.abs() * 100.0;
    let scaled = format!("{scaled:.14e}").parse::<f64>().unwrap_or(scaled);
    scaled.round() / 100.0 * value.signum()
}
