//! Structured-record storage facade

use std::sync::Arc;

use tracing::debug;

use crate::core::{ClientRegistry, Item, RecordStoreBackend, ServiceId};
use crate::error::{DomainError, ErrorKind, Fallback, Result};
use crate::resilience::{CallSite, ResilientInvoker, RetryPolicy};

/// Get and put items in record-store tables
#[derive(Debug, Clone)]
pub struct RecordStorage {
    registry: Arc<ClientRegistry>,
    invoker: ResilientInvoker,
    policy: RetryPolicy,
}

impl RecordStorage {
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

    /// Fetch one item by key; `Ok(None)` when the table has no such item
    pub async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        let backend = self.backend()?;
        let call = CallSite::new("get_item", "Table", table)
            .with_fallback(Fallback::storage(format!("Failed to get item from {}", table)));

        let item = self
            .invoker
            .run(&call, &self.policy, || backend.get_item(table, key))
            .await
            .map_err(|err| missing_table(err, table))?;

        debug!(table = %table, found = item.is_some(), "Fetched item");
        Ok(item)
    }

    /// Insert or replace one item
    pub async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        let backend = self.backend()?;
        let call = CallSite::new("put_item", "Table", table)
            .with_fallback(Fallback::storage(format!("Failed to put item to {}", table)));

        self.invoker
            .run(&call, &self.policy, || backend.put_item(table, item.clone()))
            .await
            .map_err(|err| missing_table(err, table))?;

        debug!(table = %table, "Stored item");
        Ok(())
    }

    fn backend(&self) -> Result<Arc<dyn RecordStoreBackend>> {
        self.registry
            .get_resource_handle(&ServiceId::record_store())?
            .record_store()
    }
}

/// Report a missing table as a storage failure rather than a missing resource
fn missing_table(err: DomainError, table: &str) -> DomainError {
    if err.kind() != ErrorKind::ResourceNotFound {
        return err;
    }

    DomainError::storage(
        format!("Table not found: {}", table),
        Some(err.details().clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_conversion() {
        let err = missing_table(DomainError::resource_not_found("Table", "sessions"), "sessions");
        assert_eq!(err.kind(), ErrorKind::StorageError);
        assert_eq!(err.message(), "Table not found: sessions");
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.detail("resource_id").and_then(|v| v.as_str()), Some("sessions"));

        let other = missing_table(DomainError::authorization(None), "sessions");
        assert_eq!(other.kind(), ErrorKind::AuthorizationFailed);
    }
}
