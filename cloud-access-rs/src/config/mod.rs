//! Configuration management for the access layer
//!
//! This module provides utilities for loading and validating the settings
//! that describe which remote services to reach (region, endpoints, table,
//! bucket and stream names) with support for environment variables and
//! `.env` files. Remote parameter and secret resolution lives in
//! [`resolver`].

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::core::ServiceId;

pub mod resolver;
pub use resolver::{ConfigResolver, ConfigValue, ValueSource};

/// Configuration failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Key absent from every source
    #[error("Configuration key not found: {0}")]
    Missing(String),

    /// Key present but unusable
    #[error("Invalid value for key {key}: {reason}")]
    Invalid { key: String, reason: String },

    /// The logging pipeline could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl ConfigError {
    fn invalid(key: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String, ConfigError>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a typed configuration value by parsing from string
    fn get<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(key, e))
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let value = self.get_string(key)?;
        parse_bool(key, &value)
    }

    /// Get an optional value: absent is `Ok(None)`, unparsable is an error
    fn get_opt<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        match self.get::<T>(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::Missing(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get a typed value, falling back to the default when absent
    fn get_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        Ok(self.get_opt::<T>(key)?.unwrap_or(default))
    }

    /// Get a boolean value, falling back to the default when absent
    fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get_bool(key) {
            Ok(value) => Ok(value),
            Err(ConfigError::Missing(_)) => Ok(default),
            Err(e) => Err(e),
        }
    }

    /// Raw value of the first key present, trying `keys` in order
    fn get_first(&self, keys: &[&str]) -> Result<Option<(String, String)>, ConfigError> {
        for key in keys {
            match self.get_string(key) {
                Ok(value) => return Ok(Some((key.to_string(), value))),
                Err(ConfigError::Missing(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// String value under the first key present, else the default
    fn get_first_or(&self, keys: &[&str], default: &str) -> Result<String, ConfigError> {
        Ok(self
            .get_first(keys)?
            .map(|(_, value)| value)
            .unwrap_or_else(|| default.to_string()))
    }

    /// Boolean value under the first key present, else the default
    fn get_first_bool_or(&self, keys: &[&str], default: bool) -> Result<bool, ConfigError> {
        match self.get_first(keys)? {
            Some((key, value)) => parse_bool(&key, &value),
            None => Ok(default),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("not a boolean: {}", value))),
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Format a configuration key as an environment variable
    pub fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => ConfigError::Missing(env_key.clone()),
            env::VarError::NotUnicode(_) => ConfigError::invalid(&env_key, "not valid unicode"),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }
}

/// A composite config provider that tries multiple providers in order
#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider to the end of the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Builder-style [`add_provider`](Self::add_provider)
    pub fn with_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.add_provider(provider);
        self
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        for provider in &self.providers {
            match provider.get_string(key) {
                Ok(value) => return Ok(value),
                Err(ConfigError::Missing(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ConfigError::Missing(key.to_string()))
    }
}

/// Process settings for the access layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub environment: String,
    pub region: String,
    pub log_level: String,
    pub log_json: bool,
    pub enable_tracing: bool,
    pub service_name: String,

    pub sessions_table: String,
    pub voice_profiles_table: String,
    pub users_table: String,
    pub voice_embeddings_bucket: String,
    pub recordings_bucket: String,
    pub audio_stream: String,

    /// Prefix prepended to every remote parameter name
    pub parameter_prefix: String,

    /// Endpoint used for every service without an override
    pub endpoint_url: Option<String>,

    /// Per-service endpoint overrides keyed by service id
    pub endpoint_overrides: HashMap<String, String>,

    /// Per-attempt timeout handed to provider clients
    pub request_timeout_seconds: u64,

    /// Parameter cache lifetime; `None` caches for the process lifetime
    pub parameter_cache_ttl_seconds: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            region: "us-east-1".to_string(),
            log_level: "info".to_string(),
            log_json: true,
            enable_tracing: true,
            service_name: "univoice".to_string(),
            sessions_table: "univoice-sessions".to_string(),
            voice_profiles_table: "univoice-voice-profiles".to_string(),
            users_table: "univoice-users".to_string(),
            voice_embeddings_bucket: "univoice-voice-embeddings".to_string(),
            recordings_bucket: "univoice-session-recordings".to_string(),
            audio_stream: "univoice-audio-stream".to_string(),
            parameter_prefix: "/univoice".to_string(),
            endpoint_url: None,
            endpoint_overrides: HashMap::new(),
            request_timeout_seconds: 30,
            parameter_cache_ttl_seconds: None,
        }
    }
}

impl Settings {
    /// Load settings from `.env` (if present) and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_provider(&EnvConfigProvider::new())
    }

    /// Load settings from a config provider, using defaults for absent keys
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut endpoint_overrides = HashMap::new();
        for service in ServiceId::WELL_KNOWN {
            let key = format!("endpoint_url_{}", service);
            if let Some(url) = provider.get_opt::<String>(&key)? {
                endpoint_overrides.insert(service.to_string(), url);
            }
        }

        // Deployment-era names (`AWS_REGION`, `DYNAMODB_SESSIONS_TABLE`, ...)
        // are accepted after the plain key
        let settings = Self {
            environment: provider.get_string_or("environment", &defaults.environment),
            region: provider.get_first_or(&["region", "aws_region"], &defaults.region)?,
            log_level: provider.get_string_or("log_level", &defaults.log_level),
            log_json: provider.get_bool_or("log_json", defaults.log_json)?,
            enable_tracing: provider
                .get_first_bool_or(&["enable_tracing", "enable_xray"], defaults.enable_tracing)?,
            service_name: provider.get_string_or("service_name", &defaults.service_name),
            sessions_table: provider.get_first_or(
                &["sessions_table", "dynamodb_sessions_table"],
                &defaults.sessions_table,
            )?,
            voice_profiles_table: provider.get_first_or(
                &["voice_profiles_table", "dynamodb_voice_profiles_table"],
                &defaults.voice_profiles_table,
            )?,
            users_table: provider
                .get_first_or(&["users_table", "dynamodb_users_table"], &defaults.users_table)?,
            voice_embeddings_bucket: provider.get_first_or(
                &["voice_embeddings_bucket", "s3_voice_embeddings_bucket"],
                &defaults.voice_embeddings_bucket,
            )?,
            recordings_bucket: provider.get_first_or(
                &["recordings_bucket", "s3_recordings_bucket"],
                &defaults.recordings_bucket,
            )?,
            audio_stream: provider.get_first_or(
                &["audio_stream", "kinesis_audio_stream"],
                &defaults.audio_stream,
            )?,
            parameter_prefix: provider.get_first_or(
                &["parameter_prefix", "ssm_parameter_prefix"],
                &defaults.parameter_prefix,
            )?,
            endpoint_url: provider.get_opt::<String>("endpoint_url")?,
            endpoint_overrides,
            request_timeout_seconds: provider
                .get_or("request_timeout_seconds", defaults.request_timeout_seconds)?,
            parameter_cache_ttl_seconds: provider.get_opt::<u64>("parameter_cache_ttl_seconds")?,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate this configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::invalid("region", "must not be empty"));
        }

        if self.parameter_prefix.trim().is_empty() {
            return Err(ConfigError::invalid("parameter_prefix", "must not be empty"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::invalid("request_timeout_seconds", "must be positive"));
        }

        if let Some(ref endpoint) = self.endpoint_url {
            Url::parse(endpoint).map_err(|e| ConfigError::invalid("endpoint_url", e))?;
        }

        for (service, endpoint) in &self.endpoint_overrides {
            Url::parse(endpoint)
                .map_err(|e| ConfigError::invalid(&format!("endpoint_url_{}", service), e))?;
        }

        Ok(())
    }

    /// Endpoint for a service: its override, else the global endpoint
    pub fn endpoint_for(&self, service: &ServiceId) -> Option<&str> {
        self.endpoint_overrides
            .get(service.as_str())
            .or(self.endpoint_url.as_ref())
            .map(String::as_str)
    }

    /// Per-attempt provider timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Parameter cache lifetime, if bounded
    pub fn parameter_cache_ttl(&self) -> Option<Duration> {
        self.parameter_cache_ttl_seconds.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_formatting() {
        let provider = EnvConfigProvider::new().with_prefix("TEST");
        assert_eq!(provider.format_key("region"), "TEST_REGION");
        assert_eq!(provider.format_key("endpoint_url_object-store"), "TEST_ENDPOINT_URL_OBJECT_STORE");
    }

    #[test]
    fn test_defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_endpoint_override_wins() {
        let mut settings = Settings::default();
        settings.endpoint_url = Some("http://localhost:4566".to_string());
        settings
            .endpoint_overrides
            .insert("object-store".to_string(), "http://localhost:9000".to_string());

        assert_eq!(
            settings.endpoint_for(&ServiceId::object_store()),
            Some("http://localhost:9000")
        );
        assert_eq!(
            settings.endpoint_for(&ServiceId::record_store()),
            Some("http://localhost:4566")
        );
    }
}
