//! Service facades
//!
//! Thin, named operations over the record store, object store and stream.
//! Each runs its remote call through the shared [`ResilientInvoker`]; none
//! adds retry logic of its own.

pub mod objects;
pub mod records;
pub mod streams;

pub use objects::{ObjectStorage, OBJECT_ENCRYPTION};
pub use records::RecordStorage;
pub use streams::StreamPublisher;

use std::sync::Arc;

use crate::config::{ConfigResolver, Settings};
use crate::core::{AccessLayerBuilder, ClientRegistry};
use crate::resilience::{ResilientInvoker, RetryPolicy};

/// Everything a service needs to reach its remote dependencies
#[derive(Debug, Clone)]
pub struct AccessLayer {
    settings: Arc<Settings>,
    registry: Arc<ClientRegistry>,
    invoker: ResilientInvoker,
    resolver: Arc<ConfigResolver>,
    records: RecordStorage,
    objects: ObjectStorage,
    streams: StreamPublisher,
}

impl AccessLayer {
    pub fn builder() -> AccessLayerBuilder {
        AccessLayerBuilder::new()
    }

    pub(crate) fn new(
        settings: Arc<Settings>,
        registry: Arc<ClientRegistry>,
        invoker: ResilientInvoker,
        resolver: Arc<ConfigResolver>,
        policy: RetryPolicy,
    ) -> Self {
        let records = RecordStorage::new(Arc::clone(&registry), invoker.clone()).with_policy(policy.clone());
        let objects = ObjectStorage::new(Arc::clone(&registry), invoker.clone()).with_policy(policy.clone());
        let streams = StreamPublisher::new(Arc::clone(&registry), invoker.clone()).with_policy(policy);

        Self {
            settings,
            registry,
            invoker,
            resolver,
            records,
            objects,
            streams,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn invoker(&self) -> &ResilientInvoker {
        &self.invoker
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn records(&self) -> &RecordStorage {
        &self.records
    }

    pub fn objects(&self) -> &ObjectStorage {
        &self.objects
    }

    pub fn streams(&self) -> &StreamPublisher {
        &self.streams
    }
}
