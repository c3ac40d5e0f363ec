use std::time::Duration;

use serde::Deserialize;

use crate::error::{WorkloadError, WorkloadResult};

/// Options as decoded from the harness configuration.
pub type Options = toml::Table;

pub const DEFAULT_DELAY_MILLIS: u64 = 100;

/// Recognized keys. Anything else in the options table is ignored.
#[derive(Deserialize, Debug, Default)]
struct RawOptions {
    #[serde(default)]
    delay: Option<toml::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    delay_millis: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            delay_millis: DEFAULT_DELAY_MILLIS,
        }
    }
}

impl WorkerConfig {
    pub fn with_delay_millis(delay_millis: u64) -> Self {
        Self { delay_millis }
    }

    pub fn from_options(options: &Options) -> WorkloadResult<Self> {
        let raw: RawOptions = toml::Value::Table(options.clone())
            .try_into()
            .map_err(|e: toml::de::Error| WorkloadError::config("options", e.to_string()))?;
        let delay_millis = match raw.delay {
            Some(value) => coerce_millis("delay", &value)?,
            None => DEFAULT_DELAY_MILLIS,
        };
        Ok(Self { delay_millis })
    }

    pub fn from_toml_str(raw: &str) -> WorkloadResult<Self> {
        let options: Options =
            toml::from_str(raw).map_err(|e| WorkloadError::config("options", e.to_string()))?;
        Self::from_options(&options)
    }

    pub fn delay_millis(&self) -> u64 {
        self.delay_millis
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_millis)
    }
}

fn coerce_millis(key: &str, value: &toml::Value) -> WorkloadResult<u64> {
    match value {
        toml::Value::Integer(n) => u64::try_from(*n)
            .map_err(|_| WorkloadError::config(key, format!("{} is negative", n))),
        toml::Value::Float(f) if f.is_finite() && *f >= 0.0 => Ok(f.trunc() as u64),
        toml::Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| WorkloadError::config(key, format!("{:?} is not a non-negative integer", s))),
        other => Err(WorkloadError::config(
            key,
            format!("expected a non-negative integer, got {}", other.type_str()),
        )),
    }
}
