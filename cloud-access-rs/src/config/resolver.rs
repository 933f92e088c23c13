//! Remote parameter and secret resolution
//!
//! Lookups degrade to an absent value instead of failing: configuration
//! resolution must never take a calling service down because a remote store
//! is unreachable. Callers fall back to environment-supplied defaults.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use super::{ConfigProvider, EnvConfigProvider, Settings};
use crate::core::{ParameterBackend, SecretBackend};

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Remote,
    Cache,
    Environment,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Cache => write!(f, "cache"),
            Self::Environment => write!(f, "environment"),
        }
    }
}

/// A resolved configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigValue {
    /// Fully-qualified parameter path, or the environment key for fallbacks
    pub key: String,
    pub value: String,
    pub source: ValueSource,
}

#[derive(Debug, Clone)]
struct CachedParameter {
    value: String,
    fetched_at: Instant,
}

/// Resolves remote parameters (cached) and secrets (never cached)
pub struct ConfigResolver {
    parameters: Arc<dyn ParameterBackend>,
    secrets: Arc<dyn SecretBackend>,
    prefix: String,
    cache: DashMap<String, CachedParameter>,
    ttl: Option<Duration>,
    environment: Arc<dyn ConfigProvider>,
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("prefix", &self.prefix)
            .field("cached", &self.cache.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ConfigResolver {
    /// Create a resolver with an unbounded, process-lifetime parameter cache
    pub fn new(
        parameters: Arc<dyn ParameterBackend>,
        secrets: Arc<dyn SecretBackend>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            parameters,
            secrets,
            prefix: prefix.into(),
            cache: DashMap::new(),
            ttl: None,
            environment: Arc::new(EnvConfigProvider::new()),
        }
    }

    /// Create a resolver using the prefix and cache lifetime from settings
    pub fn from_settings(
        settings: &Settings,
        parameters: Arc<dyn ParameterBackend>,
        secrets: Arc<dyn SecretBackend>,
    ) -> Self {
        Self::new(parameters, secrets, settings.parameter_prefix.clone())
            .with_cache_ttl(settings.parameter_cache_ttl())
    }

    /// Bound the lifetime of cached parameters
    ///
    /// `None` keeps entries until the process exits.
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Provider consulted by [`resolve`](Self::resolve) when the remote store has no value
    pub fn with_environment(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.environment = provider;
        self
    }

    /// Fully-qualified path of a parameter name
    pub fn parameter_path(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.prefix.trim_end_matches('/'),
            name.trim_start_matches('/')
        )
    }

    /// Get a parameter value, or `None` when absent or unreachable
    pub async fn get_parameter(&self, name: &str, use_cache: bool) -> Option<String> {
        self.lookup(name, use_cache).await.map(|v| v.value)
    }

    /// Cached value of a parameter without touching the network
    pub fn cached_parameter(&self, name: &str) -> Option<String> {
        let path = self.parameter_path(name);
        self.fresh_entry(&path)
    }

    /// Resolve a parameter, falling back to an environment key
    pub async fn resolve(&self, name: &str, env_key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.lookup(name, true).await {
            return Some(value);
        }

        match self.environment.get_string(env_key) {
            Ok(value) => {
                debug!(parameter = %name, env_key = %env_key, "Using environment fallback");
                Some(ConfigValue {
                    key: env_key.to_string(),
                    value,
                    source: ValueSource::Environment,
                })
            }
            Err(_) => None,
        }
    }

    /// Get a secret value, or `None` on any failure
    ///
    /// Secrets rotate, so every call goes to the remote store.
    pub async fn get_secret(&self, name: &str) -> Option<String> {
        match self.secrets.get_secret_value(name).await {
            Ok(value) => Some(value),
            Err(err) if err.is_not_found() => {
                debug!(secret = %name, "Secret not found");
                None
            }
            Err(err) => {
                warn!(
                    secret = %name,
                    failure = %err.kind(),
                    error = %err.redacted_message(),
                    "Error retrieving secret"
                );
                None
            }
        }
    }

    /// Drop every cached parameter
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached parameters
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    async fn lookup(&self, name: &str, use_cache: bool) -> Option<ConfigValue> {
        let path = self.parameter_path(name);

        if use_cache {
            if let Some(value) = self.fresh_entry(&path) {
                return Some(ConfigValue {
                    key: path,
                    value,
                    source: ValueSource::Cache,
                });
            }
        }

        match self.parameters.get_parameter(&path, true).await {
            Ok(value) => {
                self.cache.insert(
                    path.clone(),
                    CachedParameter {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Some(ConfigValue {
                    key: path,
                    value,
                    source: ValueSource::Remote,
                })
            }
            Err(err) if err.is_not_found() => {
                debug!(parameter = %path, "Parameter not found");
                None
            }
            Err(err) => {
                warn!(
                    parameter = %path,
                    failure = %err.kind(),
                    error = %err.redacted_message(),
                    "Error retrieving parameter, falling back"
                );
                None
            }
        }
    }

    fn fresh_entry(&self, path: &str) -> Option<String> {
        let entry = self.cache.get(path)?;
        match self.ttl {
            Some(ttl) if entry.fetched_at.elapsed() >= ttl => {
                drop(entry);
                self.cache
                    .remove_if(path, |_, cached| cached.fetched_at.elapsed() >= ttl);
                None
            }
            _ => Some(entry.value.clone()),
        }
    }
}
