//! Provider backend implementations and the default client factory

pub mod http;
pub mod memory;

pub use http::{build_http_client, HttpConfigBackend, UserAgent};
pub use memory::{
    FaultQueue, MemoryObjectStore, MemoryParameterStore, MemoryRecordStore, MemorySecretStore,
    MemoryStream, StreamRecord,
};

use std::sync::Arc;

use tracing::debug;

use crate::config::Settings;
use crate::core::{ClientFactory, HandleRequest, ProviderClient, ServiceId};
use crate::error::{DomainError, Result};

/// Builds in-memory clients for the well-known services
///
/// Parameter and secret stores with a configured endpoint are served by an
/// [`HttpConfigBackend`] instead. Every handle built for the same service
/// shares the same underlying store.
#[derive(Debug, Default, Clone)]
pub struct MemoryClientFactory {
    records: Arc<MemoryRecordStore>,
    objects: Arc<MemoryObjectStore>,
    stream: Arc<MemoryStream>,
    parameters: Arc<MemoryParameterStore>,
    secrets: Arc<MemorySecretStore>,
}

impl MemoryClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory whose stores already hold the tables, buckets and
    /// stream named in the settings
    pub fn provisioned(settings: &Settings) -> Self {
        let factory = Self::new();
        factory.records.create_table(&settings.sessions_table, &["session_id"]);
        factory.records.create_table(&settings.voice_profiles_table, &["profile_id"]);
        factory.records.create_table(&settings.users_table, &["user_id"]);
        factory.objects.create_bucket(&settings.voice_embeddings_bucket);
        factory.objects.create_bucket(&settings.recordings_bucket);
        factory.stream.create_stream(&settings.audio_stream);
        factory
    }

    pub fn records(&self) -> &Arc<MemoryRecordStore> {
        &self.records
    }

    pub fn objects(&self) -> &Arc<MemoryObjectStore> {
        &self.objects
    }

    pub fn stream(&self) -> &Arc<MemoryStream> {
        &self.stream
    }

    pub fn parameters(&self) -> &Arc<MemoryParameterStore> {
        &self.parameters
    }

    pub fn secrets(&self) -> &Arc<MemorySecretStore> {
        &self.secrets
    }
}

impl ClientFactory for MemoryClientFactory {
    fn create(&self, request: &HandleRequest<'_>) -> Result<ProviderClient> {
        let client = match request.service.as_str() {
            ServiceId::RECORD_STORE => ProviderClient::RecordStore(self.records.clone()),
            ServiceId::OBJECT_STORE => ProviderClient::ObjectStore(self.objects.clone()),
            ServiceId::STREAM => ProviderClient::Stream(self.stream.clone()),
            ServiceId::PARAMETER_STORE => match request.endpoint {
                Some(endpoint) => ProviderClient::Parameters(Arc::new(HttpConfigBackend::new(
                    endpoint,
                    request.timeout,
                )?)),
                None => ProviderClient::Parameters(self.parameters.clone()),
            },
            ServiceId::SECRET_STORE => match request.endpoint {
                Some(endpoint) => ProviderClient::Secrets(Arc::new(HttpConfigBackend::new(
                    endpoint,
                    request.timeout,
                )?)),
                None => ProviderClient::Secrets(self.secrets.clone()),
            },
            other => {
                return Err(DomainError::internal(format!("Unknown service: {}", other), None)
                    .with_detail("service", other))
            }
        };

        debug!(
            service = %request.service,
            client = client.variant_name(),
            "Built provider client"
        );

        Ok(client)
    }
}
