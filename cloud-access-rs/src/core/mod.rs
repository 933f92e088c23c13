//! Core abstractions for the access layer
//!
//! This module provides the fundamental types every facade builds on:
//!
//! - `ServiceId`: the key naming a remote service
//! - Backend traits: the provider-side operations of each remote service
//! - `ProviderClient` / `ClientHandle`: a constructed, shareable client
//! - `ClientRegistry`: the create-once cache of handles
//! - `AccessLayerBuilder`: wiring of registry, invoker, resolver and facades

pub mod builder;
pub mod registry;

pub use builder::AccessLayerBuilder;
pub use registry::{ClientFactory, ClientRegistry, HandleKind, HandleRequest};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{DomainError, ProviderError, Result};

/// A structured record: attribute name to value
pub type Item = Map<String, Value>;

/// Key naming a remote service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId(String);

impl ServiceId {
    pub const RECORD_STORE: &'static str = "record-store";
    pub const OBJECT_STORE: &'static str = "object-store";
    pub const STREAM: &'static str = "stream";
    pub const PARAMETER_STORE: &'static str = "parameter-store";
    pub const SECRET_STORE: &'static str = "secret-store";

    /// Services the default factories know how to build
    pub const WELL_KNOWN: [&'static str; 5] = [
        Self::RECORD_STORE,
        Self::OBJECT_STORE,
        Self::STREAM,
        Self::PARAMETER_STORE,
        Self::SECRET_STORE,
    ];

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn record_store() -> Self {
        Self::new(Self::RECORD_STORE)
    }

    pub fn object_store() -> Self {
        Self::new(Self::OBJECT_STORE)
    }

    pub fn stream() -> Self {
        Self::new(Self::STREAM)
    }

    pub fn parameter_store() -> Self {
        Self::new(Self::PARAMETER_STORE)
    }

    pub fn secret_store() -> Self {
        Self::new(Self::SECRET_STORE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Server-side encryption applied to stored objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerSideEncryption {
    #[serde(rename = "AES256")]
    Aes256,
    #[serde(rename = "aws:kms")]
    Kms,
}

impl ServerSideEncryption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aes256 => "AES256",
            Self::Kms => "aws:kms",
        }
    }
}

/// A single object write
#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub server_side_encryption: ServerSideEncryption,
}

/// Acknowledgement of a published stream record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReceipt {
    pub shard_id: String,
    pub sequence_number: String,
}

/// Structured-record store operations
#[async_trait]
pub trait RecordStoreBackend: Send + Sync {
    /// Fetch one item by key; `Ok(None)` when the table has no such item
    async fn get_item(&self, table: &str, key: &Item) -> std::result::Result<Option<Item>, ProviderError>;

    /// Insert or replace one item
    async fn put_item(&self, table: &str, item: Item) -> std::result::Result<(), ProviderError>;
}

/// Object store operations
#[async_trait]
pub trait ObjectStoreBackend: Send + Sync {
    async fn put_object(&self, request: PutObjectRequest) -> std::result::Result<(), ProviderError>;

    async fn get_object(&self, bucket: &str, key: &str) -> std::result::Result<Vec<u8>, ProviderError>;
}

/// Stream publishing operations
#[async_trait]
pub trait StreamBackend: Send + Sync {
    async fn put_record(
        &self,
        stream: &str,
        data: Vec<u8>,
        partition_key: &str,
    ) -> std::result::Result<RecordReceipt, ProviderError>;
}

/// Remote parameter store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterBackend: Send + Sync {
    /// Fetch a parameter by its fully-qualified path
    async fn get_parameter(
        &self,
        path: &str,
        with_decryption: bool,
    ) -> std::result::Result<String, ProviderError>;
}

/// Remote secret store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretBackend: Send + Sync {
    async fn get_secret_value(&self, secret_id: &str) -> std::result::Result<String, ProviderError>;
}

/// A constructed provider client
#[derive(Clone)]
pub enum ProviderClient {
    RecordStore(Arc<dyn RecordStoreBackend>),
    ObjectStore(Arc<dyn ObjectStoreBackend>),
    Stream(Arc<dyn StreamBackend>),
    Parameters(Arc<dyn ParameterBackend>),
    Secrets(Arc<dyn SecretBackend>),
}

impl ProviderClient {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::RecordStore(_) => "record_store",
            Self::ObjectStore(_) => "object_store",
            Self::Stream(_) => "stream",
            Self::Parameters(_) => "parameters",
            Self::Secrets(_) => "secrets",
        }
    }
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderClient::{}", self.variant_name())
    }
}

/// A cached, shareable client for one service
///
/// Built once by [`ClientRegistry`] and never mutated afterwards.
#[derive(Debug)]
pub struct ClientHandle {
    id: Uuid,
    service: ServiceId,
    kind: HandleKind,
    region: String,
    endpoint: Option<String>,
    created_at: DateTime<Utc>,
    client: ProviderClient,
}

impl ClientHandle {
    pub(crate) fn new(request: &HandleRequest<'_>, client: ProviderClient) -> Self {
        Self {
            id: Uuid::new_v4(),
            service: request.service.clone(),
            kind: request.kind,
            region: request.region.to_string(),
            endpoint: request.endpoint.map(str::to_string),
            created_at: Utc::now(),
            client,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    pub fn record_store(&self) -> Result<Arc<dyn RecordStoreBackend>> {
        match &self.client {
            ProviderClient::RecordStore(backend) => Ok(Arc::clone(backend)),
            other => Err(self.mismatch("record_store", other)),
        }
    }

    pub fn object_store(&self) -> Result<Arc<dyn ObjectStoreBackend>> {
        match &self.client {
            ProviderClient::ObjectStore(backend) => Ok(Arc::clone(backend)),
            other => Err(self.mismatch("object_store", other)),
        }
    }

    pub fn stream(&self) -> Result<Arc<dyn StreamBackend>> {
        match &self.client {
            ProviderClient::Stream(backend) => Ok(Arc::clone(backend)),
            other => Err(self.mismatch("stream", other)),
        }
    }

    pub fn parameters(&self) -> Result<Arc<dyn ParameterBackend>> {
        match &self.client {
            ProviderClient::Parameters(backend) => Ok(Arc::clone(backend)),
            other => Err(self.mismatch("parameters", other)),
        }
    }

    pub fn secrets(&self) -> Result<Arc<dyn SecretBackend>> {
        match &self.client {
            ProviderClient::Secrets(backend) => Ok(Arc::clone(backend)),
            other => Err(self.mismatch("secrets", other)),
        }
    }

    fn mismatch(&self, expected: &str, actual: &ProviderClient) -> DomainError {
        DomainError::internal(
            format!("Service {} does not provide a {} client", self.service, expected),
            None,
        )
        .with_detail("service", self.service.as_str())
        .with_detail("client", actual.variant_name())
    }
}
