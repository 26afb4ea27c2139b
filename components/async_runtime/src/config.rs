//! Event loop configuration.

use serde::{Deserialize, Serialize};

/// Configuration for an [`EventLoop`](crate::EventLoop).
///
/// Missing fields take their defaults, so hosts can load partial
/// configurations.
///
/// # Examples
///
/// ```
/// use async_runtime::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json(r#"{ "collect_at_checkpoint": false }"#).unwrap();
/// assert!(!config.collect_at_checkpoint);
/// assert!(config.track_unhandled_rejections);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Report rejected promises that end a checkpoint, or get collected,
    /// without a handler
    pub track_unhandled_rejections: bool,
    /// Free unreachable promise records at every checkpoint
    pub collect_at_checkpoint: bool,
    /// Name given to background worker threads
    pub worker_thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            track_unhandled_rejections: true,
            collect_at_checkpoint: true,
            worker_thread_name: "async-runtime-worker".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
