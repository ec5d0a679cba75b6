use super::*;
use crate::config::OllamaConfig;

fn test_config() -> Config {
    let mut config = Config::new("/tmp/cocktails");
    config.ollama = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        timeout_seconds: 10,
    };
    config.embedder.dimension = 384;
    config
}

#[test]
fn client_configuration() {
    let client = OllamaClient::new(&test_config()).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.dimension, 384);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
    assert_eq!(client.name(), "ollama:test-model");
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&test_config())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);
    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);
}

#[test]
fn invalid_url_is_rejected() {
    let mut config = test_config();
    config.ollama.host = "bad host".to_string();

    let err = OllamaClient::new(&config).expect_err("invalid host should fail");
    assert!(matches!(err, CocktailError::Config(_)));
}

#[test]
fn empty_batch_needs_no_server() {
    let client = OllamaClient::new(&test_config()).expect("Failed to create client");
    let embeddings = client.embed(&[]).expect("empty batch should succeed");
    assert!(embeddings.is_empty());
}

#[test]
fn unreachable_server_is_embedding_unavailable() {
    let mut config = test_config();
    config.ollama.host = "127.0.0.1".to_string();
    config.ollama.port = 9;

    let client = OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(2))
        .with_retry_attempts(1);

    let err = client
        .embed_one("gin and tonic")
        .expect_err("nothing listens on the discard port");
    assert!(matches!(err, CocktailError::EmbeddingUnavailable(_)));
}

#[test]
fn embed_request_serialization() {
    let texts = vec!["gin".to_string(), "rum".to_string()];
    let request = EmbedRequest {
        model: "test-model",
        input: &texts,
    };

    let json = serde_json::to_value(&request).expect("should serialize");
    assert_eq!(json["model"], "test-model");
    assert_eq!(json["input"][1], "rum");
}
