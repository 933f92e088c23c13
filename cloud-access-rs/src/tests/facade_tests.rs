//! Tests for the storage, object and stream facades
//!
//! These tests run the facades end to end over in-memory stores wired
//! through the access layer builder.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};

    use crate::backends::MemoryClientFactory;
    use crate::config::Settings;
    use crate::core::{AccessLayerBuilder, Item, ServerSideEncryption, ServiceId};
    use crate::error::{ErrorKind, FailureKind, ProviderError};
    use crate::observability::RecordingAnnotator;
    use crate::resilience::RetryPolicy;
    use crate::services::AccessLayer;

    struct Fixture {
        layer: AccessLayer,
        factory: MemoryClientFactory,
        annotator: Arc<RecordingAnnotator>,
    }

    fn fixture() -> Fixture {
        let settings = Settings::default();
        let factory = MemoryClientFactory::provisioned(&settings);
        let annotator = Arc::new(RecordingAnnotator::new());

        let layer = AccessLayerBuilder::new()
            .settings(settings)
            .factory(Arc::new(factory.clone()))
            .annotator(annotator.clone())
            .retry_policy(
                RetryPolicy::default().with_delays(Duration::from_millis(5), Duration::from_millis(20)),
            )
            .build()
            .unwrap();

        Fixture {
            layer,
            factory,
            annotator,
        }
    }

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_upload_download_round_trip() {
        let fx = fixture();
        fx.factory.objects().create_bucket("b");

        fx.layer.objects().upload_file("b", "k", b"abc".to_vec()).await.unwrap();
        let data = fx.layer.objects().download_file("b", "k").await.unwrap();

        assert_eq!(data, b"abc");
        let write = fx.factory.objects().last_write().unwrap();
        assert_eq!(write.server_side_encryption, ServerSideEncryption::Aes256);
        assert_eq!(write.server_side_encryption.as_str(), "AES256");
        assert_eq!(
            fx.factory.objects().object_encryption("b", "k"),
            Some(ServerSideEncryption::Aes256)
        );
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let fx = fixture();
        let bucket = fx.layer.settings().recordings_bucket.clone();

        let err = fx.layer.objects().download_file(&bucket, "missing.wav").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
        assert_eq!(err.http_status(), 404);
        assert_eq!(
            err.message(),
            format!("Object not found: {}/missing.wav", bucket)
        );
        assert_eq!(err.detail("provider_code"), Some(&json!("NoSuchKey")));
    }

    #[tokio::test]
    async fn test_upload_to_missing_bucket_is_storage_error() {
        let fx = fixture();

        let err = fx
            .layer
            .objects()
            .upload_file("no-bucket", "k", b"abc".to_vec())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageError);
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.message(), "Failed to upload object: no-bucket/k");
        assert_eq!(err.detail("provider_code"), Some(&json!("NoSuchBucket")));
        assert_eq!(err.detail("attempts"), Some(&json!(1)));
        assert!(fx.factory.objects().writes().is_empty());
        assert!(fx.factory.objects().last_write().is_none());
    }

    #[tokio::test]
    async fn test_record_round_trip() {
        let fx = fixture();
        let table = fx.layer.settings().sessions_table.clone();

        fx.layer
            .records()
            .put_item(&table, item(json!({"session_id": "session-123", "status": "active"})))
            .await
            .unwrap();

        let found = fx
            .layer
            .records()
            .get_item(&table, &item(json!({"session_id": "session-123"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["status"], "active");

        let absent = fx
            .layer
            .records()
            .get_item(&table, &item(json!({"session_id": "session-999"})))
            .await
            .unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_missing_table_is_storage_error() {
        let fx = fixture();

        let err = fx
            .layer
            .records()
            .get_item("no-such-table", &item(json!({"session_id": "s"})))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageError);
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.message(), "Table not found: no-such-table");
        assert_eq!(err.detail("operation"), Some(&json!("get_item")));
        assert_eq!(err.detail("attempts"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let fx = fixture();
        let table = fx.layer.settings().users_table.clone();
        fx.factory.records().inject_failure(ProviderError::throttling("slow down"));
        fx.factory
            .records()
            .inject_failure(ProviderError::new(FailureKind::ServiceFault, "HTTP 500"));

        fx.layer
            .records()
            .put_item(&table, item(json!({"user_id": "u-1"})))
            .await
            .unwrap();

        assert_eq!(fx.factory.records().item_count(&table), Some(1));
        assert!(fx.annotator.entries().is_empty());
    }

    #[tokio::test]
    async fn test_put_item_failure_message() {
        let fx = fixture();
        let table = fx.layer.settings().users_table.clone();
        for _ in 0..3 {
            fx.factory.records().inject_failure(ProviderError::connection("reset"));
        }

        let err = fx
            .layer
            .records()
            .put_item(&table, item(json!({"user_id": "u-1"})))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageError);
        assert_eq!(err.message(), format!("Failed to put item to {}", table));
        assert_eq!(err.detail("attempts"), Some(&json!(3)));
        assert_eq!(fx.annotator.last("error_code").as_deref(), Some("STORAGE_ERROR"));
    }

    #[tokio::test]
    async fn test_stream_publish() {
        let fx = fixture();
        let stream = fx.layer.settings().audio_stream.clone();

        let receipt = fx
            .layer
            .streams()
            .put_record(&stream, b"chunk-1".to_vec(), "session-123")
            .await
            .unwrap();

        assert!(!receipt.sequence_number.is_empty());
        let records = fx.factory.stream().records(&stream);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, b"chunk-1");
        assert_eq!(records[0].partition_key, "session-123");
    }

    #[tokio::test]
    async fn test_stream_failure_is_service_unavailable() {
        let fx = fixture();
        let stream = fx.layer.settings().audio_stream.clone();
        let streams = fx.layer.streams().clone().with_policy(RetryPolicy::no_retry());
        fx.factory
            .stream()
            .inject_failure(ProviderError::new(FailureKind::ServiceFault, "internal failure"));

        let err = streams
            .put_record(&stream, b"chunk".to_vec(), "p")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(err.message(), "Failed to publish to stream");
        assert_eq!(err.detail("service"), Some(&json!("stream")));
    }

    #[tokio::test]
    async fn test_facades_share_registry_handles() {
        let fx = fixture();
        fx.factory.objects().create_bucket("b");

        fx.layer.objects().upload_file("b", "one", b"1".to_vec()).await.unwrap();
        fx.layer.objects().upload_file("b", "two", b"2".to_vec()).await.unwrap();

        let registry = fx.layer.registry();
        let first = registry.get_handle(&ServiceId::object_store()).unwrap();
        let second = registry.get_handle(&ServiceId::object_store()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fx.factory.objects().writes().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let fx = fixture();
        let table = fx.layer.settings().voice_profiles_table.clone();

        let writes = (0..16).map(|i| {
            let records = fx.layer.records().clone();
            let table = table.clone();
            async move {
                records
                    .put_item(&table, item(json!({"profile_id": format!("p-{}", i)})))
                    .await
            }
        });

        let results = futures::future::join_all(writes).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(fx.factory.records().item_count(&table), Some(16));
        assert!(fx
            .layer
            .registry()
            .contains(&ServiceId::record_store(), crate::core::HandleKind::Resource));
    }

    #[tokio::test]
    async fn test_layer_resolver_reads_parameter_store() {
        let fx = fixture();
        fx.factory.parameters().set("/univoice/voice-model", "neural-v2");

        let value = fx.layer.resolver().get_parameter("voice-model", true).await;
        assert_eq!(value.as_deref(), Some("neural-v2"));
    }

    #[test]
    fn test_builder_rejects_invalid_settings() {
        let settings = Settings {
            parameter_prefix: String::new(),
            ..Settings::default()
        };

        let err = AccessLayer::builder().settings(settings).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
