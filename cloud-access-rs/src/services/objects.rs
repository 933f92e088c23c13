//! Object storage facade

use std::sync::Arc;

use tracing::debug;

use crate::core::{ClientRegistry, ObjectStoreBackend, PutObjectRequest, ServerSideEncryption, ServiceId};
use crate::error::{DomainError, ErrorKind, Fallback, Result};
use crate::resilience::{CallSite, ResilientInvoker, RetryPolicy};

/// Encryption applied to every uploaded object
pub const OBJECT_ENCRYPTION: ServerSideEncryption = ServerSideEncryption::Aes256;

/// Upload and download objects
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    registry: Arc<ClientRegistry>,
    invoker: ResilientInvoker,
    policy: RetryPolicy,
}

impl ObjectStorage {
    pub fn new(registry: Arc<ClientRegistry>, invoker: ResilientInvoker) -> Self {
        Self {
            registry,
            invoker,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Store `data` under `bucket`/`key`, encrypted at rest
    pub async fn upload_file(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let backend = self.backend()?;
        let location = format!("{}/{}", bucket, key);
        let call = CallSite::new("upload_file", "Object", location.as_str())
            .with_fallback(Fallback::storage(format!("Failed to upload object: {}", location)));

        let size = data.len();
        let request = PutObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body: data,
            server_side_encryption: OBJECT_ENCRYPTION,
        };

        self.invoker
            .run(&call, &self.policy, || backend.put_object(request.clone()))
            .await
            .map_err(|err| failed_upload(err, &location))?;

        debug!(bucket = %bucket, key = %key, size = size, "Uploaded object");
        Ok(())
    }

    /// Fetch the bytes stored under `bucket`/`key`
    pub async fn download_file(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let backend = self.backend()?;
        let location = format!("{}/{}", bucket, key);
        let call = CallSite::new("download_file", "Object", location.as_str())
            .with_fallback(Fallback::storage(format!("Failed to download object: {}", location)));

        let data = self
            .invoker
            .run(&call, &self.policy, || backend.get_object(bucket, key))
            .await?;

        debug!(bucket = %bucket, key = %key, size = data.len(), "Downloaded object");
        Ok(data)
    }

    fn backend(&self) -> Result<Arc<dyn ObjectStoreBackend>> {
        self.registry
            .get_handle(&ServiceId::object_store())?
            .object_store()
    }
}

/// A write cannot miss its object; a missing bucket is a failed upload
fn failed_upload(err: DomainError, location: &str) -> DomainError {
    if err.kind() != ErrorKind::ResourceNotFound {
        return err;
    }

    DomainError::storage(
        format!("Failed to upload object: {}", location),
        Some(err.details().clone()),
    )
}
