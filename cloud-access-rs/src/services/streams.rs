//! Stream publishing facade

use std::sync::Arc;

use tracing::debug;

use crate::core::{ClientRegistry, RecordReceipt, ServiceId, StreamBackend};
use crate::error::{Fallback, Result};
use crate::resilience::{CallSite, ResilientInvoker, RetryPolicy};

/// Publish records to a named stream
#[derive(Debug, Clone)]
pub struct StreamPublisher {
    registry: Arc<ClientRegistry>,
    invoker: ResilientInvoker,
    policy: RetryPolicy,
}

impl StreamPublisher {
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

    pub async fn put_record(&self, stream: &str, data: Vec<u8>, partition_key: &str) -> Result<RecordReceipt> {
        let backend = self.backend()?;
        let call = CallSite::new("put_record", "Stream", stream)
            .with_fallback(Fallback::service_unavailable("stream", "Failed to publish to stream"));

        let receipt = self
            .invoker
            .run(&call, &self.policy, || backend.put_record(stream, data.clone(), partition_key))
            .await?;

        debug!(
            stream = %stream,
            shard_id = %receipt.shard_id,
            sequence_number = %receipt.sequence_number,
            "Published record"
        );
        Ok(receipt)
    }

    fn backend(&self) -> Result<Arc<dyn StreamBackend>> {
        self.registry.get_handle(&ServiceId::stream())?.stream()
    }
}
