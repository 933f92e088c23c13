//! Access layer builder
//!
//! Wires settings, the client registry, the invoker, the config resolver and
//! the facades into one [`AccessLayer`], constructed once at startup.

use std::sync::Arc;

use tracing::info;

use super::{ClientFactory, ClientRegistry, ServiceId};
use crate::backends::MemoryClientFactory;
use crate::config::{ConfigProvider, ConfigResolver, Settings};
use crate::error::Result;
use crate::observability::{NoopAnnotator, TraceAnnotator, TracingAnnotator};
use crate::resilience::{ResilientInvoker, RetryPolicy};
use crate::services::AccessLayer;

/// Builder for [`AccessLayer`]
#[derive(Default)]
pub struct AccessLayerBuilder {
    settings: Option<Settings>,
    factory: Option<Arc<dyn ClientFactory>>,
    annotator: Option<Arc<dyn TraceAnnotator>>,
    retry_policy: Option<RetryPolicy>,
    environment: Option<Arc<dyn ConfigProvider>>,
}

impl AccessLayerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit settings instead of loading them from the environment
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set the factory that constructs provider clients
    pub fn factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the sink for trace annotations on failed calls
    pub fn annotator(mut self, annotator: Arc<dyn TraceAnnotator>) -> Self {
        self.annotator = Some(annotator);
        self
    }

    /// Retry policy shared by every facade
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Provider consulted when a remote parameter is absent
    pub fn environment(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.environment = Some(provider);
        self
    }

    /// Validate the settings and assemble the layer
    ///
    /// Without explicit settings they are loaded from `.env` and the process
    /// environment. Without a factory, in-memory stores provisioned with the
    /// configured tables, buckets and stream are used.
    pub fn build(self) -> Result<AccessLayer> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => Settings::load()?,
        };
        settings.validate()?;

        let factory: Arc<dyn ClientFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(MemoryClientFactory::provisioned(&settings)),
        };

        let annotator: Arc<dyn TraceAnnotator> = match self.annotator {
            Some(annotator) => annotator,
            None if settings.enable_tracing => Arc::new(TracingAnnotator),
            None => Arc::new(NoopAnnotator),
        };

        let settings = Arc::new(settings);
        let registry = Arc::new(ClientRegistry::new(Arc::clone(&settings), factory));

        let parameters = registry
            .get_handle(&ServiceId::parameter_store())?
            .parameters()?;
        let secrets = registry.get_handle(&ServiceId::secret_store())?.secrets()?;

        let mut resolver = ConfigResolver::from_settings(&settings, parameters, secrets);
        if let Some(environment) = self.environment {
            resolver = resolver.with_environment(environment);
        }

        let invoker = ResilientInvoker::new(annotator);
        let policy = self.retry_policy.unwrap_or_default();

        info!(
            environment = %settings.environment,
            region = %settings.region,
            service = %settings.service_name,
            "Access layer ready"
        );

        Ok(AccessLayer::new(settings, registry, invoker, Arc::new(resolver), policy))
    }
}
