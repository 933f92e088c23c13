//! In-process provider backends
//!
//! These stand in for the remote services during local development and tests.
//! Each store reports failures with the same error codes the real providers
//! use, and each can be told to fail its next calls through
//! [`inject_failure`](MemoryRecordStore::inject_failure).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::core::{
    Item, ObjectStoreBackend, ParameterBackend, PutObjectRequest, RecordReceipt,
    RecordStoreBackend, SecretBackend, ServerSideEncryption, StreamBackend,
};
use crate::error::ProviderError;

const SHARD_ID: &str = "shardId-000000000000";

/// Failures queued to be returned by the next calls of a store
#[derive(Debug, Default)]
pub struct FaultQueue {
    pending: Mutex<VecDeque<ProviderError>>,
}

impl FaultQueue {
    pub fn push(&self, error: ProviderError) {
        self.lock().push_back(error);
    }

    /// Pop the next queued failure, if any
    pub fn check(&self) -> Result<(), ProviderError> {
        match self.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ProviderError>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    key_attributes: Vec<String>,
    items: HashMap<String, Item>,
}

impl MemoryTable {
    /// Canonical storage key built from the key attributes of a record
    fn storage_key(&self, record: &Item) -> Result<String, ProviderError> {
        let mut parts = Vec::with_capacity(self.key_attributes.len());
        for attribute in &self.key_attributes {
            match record.get(attribute) {
                Some(value) => parts.push(value.clone()),
                None => {
                    return Err(ProviderError::from_code(
                        "ValidationException",
                        format!("Missing the key {} in the item", attribute),
                    ))
                }
            }
        }
        Ok(Value::Array(parts).to_string())
    }
}

/// Structured-record store keyed by table name
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: DashMap<String, MemoryTable>,
    faults: FaultQueue,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table keyed by the given attributes
    pub fn create_table(&self, name: &str, key_attributes: &[&str]) {
        self.tables.insert(
            name.to_string(),
            MemoryTable {
                key_attributes: key_attributes.iter().map(|a| a.to_string()).collect(),
                items: HashMap::new(),
            },
        );
    }

    /// Number of items in a table, or `None` if it does not exist
    pub fn item_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.items.len())
    }

    /// Make the next call fail with this error
    pub fn inject_failure(&self, error: ProviderError) {
        self.faults.push(error);
    }

    fn missing_table(table: &str) -> ProviderError {
        ProviderError::not_found(
            "ResourceNotFoundException",
            format!("Requested resource not found: Table: {} not found", table),
        )
    }
}

#[async_trait]
impl RecordStoreBackend for MemoryRecordStore {
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, ProviderError> {
        self.faults.check()?;

        let memory_table = self.tables.get(table).ok_or_else(|| Self::missing_table(table))?;
        let storage_key = memory_table.storage_key(key)?;
        Ok(memory_table.items.get(&storage_key).cloned())
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), ProviderError> {
        self.faults.check()?;

        let mut memory_table = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::missing_table(table))?;
        let storage_key = memory_table.storage_key(&item)?;
        memory_table.items.insert(storage_key, item);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    encryption: ServerSideEncryption,
}

/// Object store keyed by bucket and object key
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: DashMap<String, HashMap<String, StoredObject>>,
    writes: Mutex<Vec<PutObjectRequest>>,
    faults: FaultQueue,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_bucket(&self, name: &str) {
        self.buckets.entry(name.to_string()).or_default();
    }

    /// Encryption recorded for a stored object
    pub fn object_encryption(&self, bucket: &str, key: &str) -> Option<ServerSideEncryption> {
        self.buckets
            .get(bucket)
            .and_then(|objects| objects.get(key).map(|o| o.encryption))
    }

    /// Every write request received, oldest first
    pub fn writes(&self) -> Vec<PutObjectRequest> {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last_write(&self) -> Option<PutObjectRequest> {
        self.writes().pop()
    }

    pub fn inject_failure(&self, error: ProviderError) {
        self.faults.push(error);
    }

    fn missing_bucket(bucket: &str) -> ProviderError {
        ProviderError::not_found("NoSuchBucket", format!("The specified bucket does not exist: {}", bucket))
    }
}

#[async_trait]
impl ObjectStoreBackend for MemoryObjectStore {
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), ProviderError> {
        self.faults.check()?;

        let mut objects = self
            .buckets
            .get_mut(&request.bucket)
            .ok_or_else(|| Self::missing_bucket(&request.bucket))?;
        objects.insert(
            request.key.clone(),
            StoredObject {
                body: request.body.clone(),
                encryption: request.server_side_encryption,
            },
        );
        drop(objects);

        // only accepted writes are recorded
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ProviderError> {
        self.faults.check()?;

        let objects = self.buckets.get(bucket).ok_or_else(|| Self::missing_bucket(bucket))?;
        objects
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| ProviderError::not_found("NoSuchKey", "The specified key does not exist."))
    }
}

/// A record accepted by [`MemoryStream`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub data: Vec<u8>,
    pub partition_key: String,
    pub sequence_number: String,
}

/// Append-only record streams
#[derive(Debug, Default)]
pub struct MemoryStream {
    streams: DashMap<String, Vec<StreamRecord>>,
    sequence: AtomicU64,
    faults: FaultQueue,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_stream(&self, name: &str) {
        self.streams.entry(name.to_string()).or_default();
    }

    /// Records published to a stream, oldest first
    pub fn records(&self, stream: &str) -> Vec<StreamRecord> {
        self.streams
            .get(stream)
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn inject_failure(&self, error: ProviderError) {
        self.faults.push(error);
    }
}

#[async_trait]
impl StreamBackend for MemoryStream {
    async fn put_record(
        &self,
        stream: &str,
        data: Vec<u8>,
        partition_key: &str,
    ) -> Result<RecordReceipt, ProviderError> {
        self.faults.check()?;

        let mut records = self.streams.get_mut(stream).ok_or_else(|| {
            ProviderError::not_found(
                "ResourceNotFoundException",
                format!("Stream {} not found", stream),
            )
        })?;

        let sequence_number = format!("{:020}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        records.push(StreamRecord {
            data,
            partition_key: partition_key.to_string(),
            sequence_number: sequence_number.clone(),
        });

        Ok(RecordReceipt {
            shard_id: SHARD_ID.to_string(),
            sequence_number,
        })
    }
}

/// Parameter store keyed by fully-qualified path
#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    values: DashMap<String, String>,
    lookups: AtomicUsize,
    faults: FaultQueue,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: impl Into<String>, value: impl Into<String>) {
        self.values.insert(path.into(), value.into());
    }

    pub fn remove(&self, path: &str) {
        self.values.remove(path);
    }

    /// Remote lookups served so far, including failed ones
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn inject_failure(&self, error: ProviderError) {
        self.faults.push(error);
    }
}

#[async_trait]
impl ParameterBackend for MemoryParameterStore {
    async fn get_parameter(&self, path: &str, _with_decryption: bool) -> Result<String, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.faults.check()?;

        self.values
            .get(path)
            .map(|v| v.value().clone())
            .ok_or_else(|| ProviderError::not_found("ParameterNotFound", format!("Parameter {} not found", path)))
    }
}

/// Secret store keyed by secret id
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: DashMap<String, String>,
    lookups: AtomicUsize,
    faults: FaultQueue,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, secret_id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(secret_id.into(), value.into());
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn inject_failure(&self, error: ProviderError) {
        self.faults.push(error);
    }
}

#[async_trait]
impl SecretBackend for MemorySecretStore {
    async fn get_secret_value(&self, secret_id: &str) -> Result<String, ProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.faults.check()?;

        self.values.get(secret_id).map(|v| v.value().clone()).ok_or_else(|| {
            ProviderError::not_found(
                "ResourceNotFoundException",
                "Secrets Manager can't find the specified secret.",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use serde_json::json;

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_record_round_trip() {
        let store = MemoryRecordStore::new();
        store.create_table("sessions", &["session_id"]);

        store
            .put_item("sessions", item(json!({"session_id": "s-1", "status": "active"})))
            .await
            .unwrap();

        let found = store
            .get_item("sessions", &item(json!({"session_id": "s-1"})))
            .await
            .unwrap();
        assert_eq!(found.unwrap()["status"], "active");

        let missing = store
            .get_item("sessions", &item(json!({"session_id": "s-2"})))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_missing_table_and_bad_key() {
        let store = MemoryRecordStore::new();
        let err = store.get_item("nope", &Item::new()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
        assert_eq!(err.code(), Some("ResourceNotFoundException"));

        store.create_table("users", &["user_id"]);
        let err = store.put_item("users", item(json!({"name": "x"}))).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Validation);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let store = MemoryParameterStore::new();
        store.set("/app/key", "value");
        store.inject_failure(ProviderError::throttling("slow down"));

        let err = store.get_parameter("/app/key", true).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Throttling);
        assert_eq!(store.get_parameter("/app/key", true).await.unwrap(), "value");
        assert_eq!(store.lookup_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_put_is_not_recorded() {
        let store = MemoryObjectStore::new();
        let request = PutObjectRequest {
            bucket: "absent".to_string(),
            key: "k".to_string(),
            body: b"abc".to_vec(),
            server_side_encryption: ServerSideEncryption::Aes256,
        };

        let err = store.put_object(request.clone()).await.unwrap_err();
        assert_eq!(err.code(), Some("NoSuchBucket"));
        assert!(store.writes().is_empty());
        assert!(store.last_write().is_none());

        store.create_bucket("absent");
        store.put_object(request).await.unwrap();
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_sequence_numbers_increase() {
        let stream = MemoryStream::new();
        stream.create_stream("audio");

        let first = stream.put_record("audio", b"a".to_vec(), "p").await.unwrap();
        let second = stream.put_record("audio", b"b".to_vec(), "p").await.unwrap();
        assert!(second.sequence_number > first.sequence_number);
        assert_eq!(stream.records("audio").len(), 2);
    }
}
