use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{reply::PayloadPolicy, Error, InternalResult};

/// Settings of a [`crate::reply::Replier`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplierConfig {
    #[serde(default)]
    pub payload_policy: PayloadPolicy,

    /// Workflow bridge identifier. Empty disables the stateful headers.
    #[serde(default)]
    pub bridge_identifier: String,

    #[serde(default)]
    pub processed_headers: bool,

    /// Fixed response type instead of the `.response` suffix.
    #[serde(default)]
    pub response_type: Option<String>,

    #[serde(default)]
    pub response_content_type: Option<String>,
}

/// Settings of a [`crate::correlation::Synchronizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynchronizerConfig {
    #[serde(default = "default_correlation_key")]
    pub correlation_key: String,

    #[serde(default = "default_correlation_key_length")]
    pub correlation_key_length: usize,

    #[serde(default = "default_response_wait_timeout", with = "duration_ms")]
    pub response_wait_timeout: Duration,

    /// Destination of forwarded requests.
    #[serde(default)]
    pub sink: String,

    #[serde(default)]
    pub bridge_identifier: String,

    /// 0 means unbounded.
    #[serde(default)]
    pub max_pending_sessions: usize,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            correlation_key: default_correlation_key(),
            correlation_key_length: default_correlation_key_length(),
            response_wait_timeout: default_response_wait_timeout(),
            sink: String::new(),
            bridge_identifier: String::new(),
            max_pending_sessions: 0,
        }
    }
}

impl SynchronizerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        from_file(path)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_correlation_key() -> String {
    "correlationid".to_string()
}

fn default_correlation_key_length() -> usize {
    24
}

fn default_response_wait_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
