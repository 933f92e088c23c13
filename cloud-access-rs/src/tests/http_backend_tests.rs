//! Tests for the HTTP parameter and secret backend
//!
//! These tests run the backend and the resolver against a mock sidecar.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::backends::{HttpConfigBackend, MemoryClientFactory};
    use crate::config::{ConfigResolver, Settings};
    use crate::core::{AccessLayerBuilder, ParameterBackend, SecretBackend};
    use crate::error::FailureKind;

    fn backend(server: &MockServer) -> HttpConfigBackend {
        HttpConfigBackend::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/parameters"))
            .and(query_param("name", "/univoice/db-host"))
            .and(query_param("with_decryption", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "db.internal"})))
            .expect(1)
            .mount(&server)
            .await;

        let value = backend(&server).get_parameter("/univoice/db-host", true).await.unwrap();
        assert_eq!(value, "db.internal");
    }

    #[tokio::test]
    async fn test_fetch_secret() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/db-password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"secret_string": "s3cr3t"})))
            .mount(&server)
            .await;

        let value = backend(&server).get_secret_value("db-password").await.unwrap();
        assert_eq!(value, "s3cr3t");
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "ResourceNotFoundException",
                "message": "Secret not found"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/secrets/busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = backend(&server).get_secret_value("missing").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
        assert_eq!(err.code(), Some("ResourceNotFoundException"));

        let err = backend(&server).get_secret_value("busy").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Throttling);
    }

    #[tokio::test]
    async fn test_resolver_degrades_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/parameters"))
            .and(query_param("name", "/univoice/missing-key"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/parameters"))
            .and(query_param("name", "/univoice/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let http = Arc::new(backend(&server));
        let resolver = ConfigResolver::new(http.clone(), http, "/univoice");

        assert_eq!(resolver.get_parameter("missing-key", true).await, None);
        assert_eq!(resolver.get_parameter("broken", true).await, None);
        assert_eq!(resolver.get_secret("never-mounted").await, None);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        // nothing listens on the discard port
        let backend = HttpConfigBackend::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = backend.get_parameter("/univoice/x", true).await.unwrap_err();
        assert!(err.kind().is_transient());
    }

    #[tokio::test]
    async fn test_layer_uses_configured_sidecar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/parameters"))
            .and(query_param("name", "/univoice/voice-model"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "neural-v2"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = Settings::default();
        settings
            .endpoint_overrides
            .insert("parameter-store".to_string(), server.uri());

        let layer = AccessLayerBuilder::new()
            .settings(settings.clone())
            .factory(Arc::new(MemoryClientFactory::provisioned(&settings)))
            .build()
            .unwrap();

        let resolver = layer.resolver();
        assert_eq!(resolver.get_parameter("voice-model", true).await.as_deref(), Some("neural-v2"));
        // served from cache; the mock expects exactly one request
        assert_eq!(resolver.get_parameter("voice-model", true).await.as_deref(), Some("neural-v2"));
    }
}
