#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Ollama client tests against a mocked HTTP API

use cocktail_search::CocktailError;
use cocktail_search::config::Config;
use cocktail_search::embeddings::{Embedder, OllamaClient};
use cocktail_search::index::{DistanceMetric, SimilarityIndex};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const DIMENSION: usize = 4;
const TEST_MODEL: &str = "nomic-embed-text:latest";

/// Answers `/api/embed` with one deterministic vector per input text
struct EchoEmbeddings {
    dimension: usize,
}

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("request body is JSON");
        let inputs = body["input"].as_array().expect("input is an array");
        let embeddings: Vec<Vec<f32>> = inputs
            .iter()
            .map(|text| {
                let len = text.as_str().map_or(0, str::len) as f32;
                let mut vector = vec![0.0; self.dimension];
                vector[0] = len;
                vector[1] = 1.0;
                vector
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "model": TEST_MODEL,
            "embeddings": embeddings
        }))
    }
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok(); // Ignore error if already initialized
}

fn client_for(server: &MockServer, dir: &TempDir, batch_size: u32) -> OllamaClient {
    let mut config = Config::new(dir.path());
    config.ollama.host = "127.0.0.1".to_string();
    config.ollama.port = server.address().port();
    config.ollama.model = TEST_MODEL.to_string();
    config.ollama.batch_size = batch_size;
    config.embedder.dimension = DIMENSION as u32;

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(1)
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn batches_follow_configured_size() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EchoEmbeddings {
            dimension: DIMENSION,
        })
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("should create temp dir");
    let client = client_for(&server, &dir, 2);
    let inputs = texts(&["a", "bb", "ccc"]);

    let embeddings = tokio::task::spawn_blocking(move || client.embed(&inputs))
        .await
        .expect("task should complete")
        .expect("embedding should succeed");

    assert_eq!(embeddings.len(), 3);
    assert_eq!(embeddings[2][0], 3.0);
    assert!(embeddings.iter().all(|v| v.len() == DIMENSION));
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_dimension_is_unavailable() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EchoEmbeddings {
            dimension: DIMENSION + 1,
        })
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("should create temp dir");
    let client = client_for(&server, &dir, 8);

    let err = tokio::task::spawn_blocking(move || client.embed_one("negroni"))
        .await
        .expect("task should complete")
        .expect_err("dimension does not match");
    assert!(matches!(err, CocktailError::EmbeddingUnavailable(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("should create temp dir");
    let client = client_for(&server, &dir, 8).with_retry_attempts(3);

    let err = tokio::task::spawn_blocking(move || client.embed_one("negroni"))
        .await
        .expect("task should complete")
        .expect_err("model endpoint missing");
    assert!(matches!(err, CocktailError::EmbeddingUnavailable(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("should create temp dir");
    let client = client_for(&server, &dir, 8).with_retry_attempts(2);

    let err = tokio::task::spawn_blocking(move || client.embed_one("negroni"))
        .await
        .expect("task should complete")
        .expect_err("server keeps failing");
    assert!(matches!(err, CocktailError::EmbeddingUnavailable(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_validates_model() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": TEST_MODEL, "size": 274_302_450_u64, "digest": "0a109f422b47"},
                {"name": "llama3:latest"}
            ]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("should create temp dir");
    let client = client_for(&server, &dir, 8);

    let other_config = {
        let mut config = Config::new(dir.path());
        config.ollama.host = "127.0.0.1".to_string();
        config.ollama.port = server.address().port();
        config.ollama.model = "missing-model".to_string();
        config
    };
    let missing = OllamaClient::new(&other_config)
        .expect("Failed to create Ollama client")
        .with_retry_attempts(1);

    let (healthy, unhealthy, models) = tokio::task::spawn_blocking(move || {
        (
            client.health_check(),
            missing.health_check(),
            client.list_models(),
        )
    })
    .await
    .expect("task should complete");

    assert!(healthy.is_ok(), "health check failed: {:?}", healthy);
    assert!(unhealthy.is_err());
    let models = models.expect("should list models");
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].size, Some(274_302_450));
}

#[tokio::test(flavor = "multi_thread")]
async fn index_builds_through_ollama() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EchoEmbeddings {
            dimension: DIMENSION,
        })
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("should create temp dir");
    let client = client_for(&server, &dir, 16);
    let snapshot_dir = dir.path().join("index");

    let drinks: Vec<serde_json::Map<String, Value>> = serde_json::from_value(json!([
        {"name": "Kir", "instructions": "Pour.", "combined_ingredients": [{"ingredient": "Cassis"}]},
        {"name": "Americano", "instructions": "Build over ice.", "combined_ingredients": [
            {"ingredient": "Campari"}, {"ingredient": "Vermouth"}, {"ingredient": "Soda"}
        ]}
    ]))
    .expect("fixture is an array of objects");

    let hits = tokio::task::spawn_blocking(move || {
        let mut index = SimilarityIndex::new(Arc::new(client), DistanceMetric::SquaredEuclidean);
        index.build(&drinks).expect("should build index");
        index.save(&snapshot_dir).expect("should save");
        index.search("Kir", 2).expect("should search")
    })
    .await
    .expect("task should complete");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.name, "Kir");
    assert!(hits[0].similarity_score <= hits[1].similarity_score);
}
