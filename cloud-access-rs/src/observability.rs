//! Structured logging setup and trace annotation sinks

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as fmt_layer, EnvFilter, Registry};

use crate::config::{ConfigError, Settings};

// Flag to track if logging has been initialized
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    pub service_name: String,
    /// Emit one JSON object per event instead of text lines
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "univoice".to_string(),
            json_format: true,
        }
    }
}

impl From<&Settings> for LoggingConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            level: settings.log_level.to_lowercase(),
            service_name: settings.service_name.clone(),
            json_format: settings.log_json,
        }
    }
}

/// Install the global `tracing` subscriber
///
/// Only the first call has an effect; later calls return `Ok(())`.
pub fn init_logging(config: LoggingConfig) -> Result<(), ConfigError> {
    if LOGGING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level)) {
        Ok(filter) => filter,
        Err(e) => {
            LOGGING_INITIALIZED.store(false, Ordering::SeqCst);
            return Err(ConfigError::Logging(format!(
                "Invalid log level {}: {}",
                config.level, e
            )));
        }
    };

    let json_layer = config.json_format.then(|| {
        fmt_layer::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
    });
    let text_layer = (!config.json_format).then(|| fmt_layer::layer().with_target(true));

    Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ConfigError::Logging(format!("Failed to set global subscriber: {}", e)))?;

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = config.json_format,
        "Logging initialized"
    );

    Ok(())
}

/// Whether a subscriber has been installed by [`init_logging`]
pub fn logging_initialized() -> bool {
    LOGGING_INITIALIZED.load(Ordering::SeqCst)
}

/// Sink for trace annotations on failed remote calls
pub trait TraceAnnotator: Send + Sync {
    fn annotate(&self, key: &str, value: &str);
}

/// Discards every annotation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnnotator;

impl TraceAnnotator for NoopAnnotator {
    fn annotate(&self, _key: &str, _value: &str) {}
}

/// Emits annotations as `trace`-level events on the current span
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnnotator;

impl TraceAnnotator for TracingAnnotator {
    fn annotate(&self, key: &str, value: &str) {
        tracing::trace!(annotation = %key, value = %value, "Trace annotation");
    }
}

/// Keeps annotations in memory for inspection
#[derive(Default)]
pub struct RecordingAnnotator {
    entries: Mutex<Vec<(String, String)>>,
}

impl RecordingAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotations recorded so far, oldest first
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Most recent value recorded under a key
    pub fn last(&self, key: &str) -> Option<String> {
        self.entries()
            .into_iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl TraceAnnotator for RecordingAnnotator {
    fn annotate(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((key.to_string(), value.to_string()));
    }
}

impl fmt::Debug for RecordingAnnotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingAnnotator")
            .field("entries", &self.entries().len())
            .finish()
    }
}
