#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// MCP server driven over an in-memory newline-delimited transport

use cocktail_search::config::{Config, EmbedderProvider};
use cocktail_search::context::{CocktailContext, IndexSource};
use cocktail_search::mcp::{ConnectionState, McpServer, tools};
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok(); // Ignore error if already initialized
}

fn hashing_config(dir: &TempDir) -> Config {
    let mut config = Config::new(dir.path());
    config.embedder.provider = EmbedderProvider::Hashing;
    config.embedder.dimension = 128;
    config.index.default_k = 3;
    config
}

fn write_dataset(config: &Config) {
    let drinks = json!([
        {
            "name": "Negroni",
            "alcoholic": "Alcoholic",
            "category": "Ordinary Drink",
            "instructions": "Stir gin, campari and sweet vermouth over ice.",
            "combined_ingredients": [
                {"ingredient": "Gin", "measure": "1 oz"},
                {"ingredient": "Campari", "measure": "1 oz"},
                {"ingredient": "Sweet Vermouth", "measure": "1 oz"}
            ]
        },
        {
            "name": "Shirley Temple",
            "alcoholic": "Non alcoholic",
            "category": "Soft Drink",
            "instructions": "Pour ginger ale over ice and add grenadine.",
            "combined_ingredients": [
                {"ingredient": "Ginger ale", "measure": "8 oz"},
                {"ingredient": "Grenadine", "measure": "1 splash"},
                {"ingredient": "Maraschino cherry"}
            ]
        }
    ]);
    fs::write(config.dataset_path(), drinks.to_string()).expect("should write dataset");
}

async fn server_for(context: CocktailContext) -> McpServer {
    let context = Arc::new(context);
    let server = McpServer::new("cocktail-search", "test");
    tools::register_all(&server, &context).await;
    server
}

/// Run one session and return the parsed response lines
async fn exchange(server: &McpServer, requests: &[Value]) -> Vec<Value> {
    let input: String = requests
        .iter()
        .map(|request| format!("{}\n", request))
        .collect();
    exchange_raw(server, &input).await
}

async fn exchange_raw(server: &McpServer, input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("session should end cleanly");

    String::from_utf8(output)
        .expect("output is UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect()
}

fn initialize_request() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "integration-test", "version": "0.0.0"}
        }
    })
}

fn tool_payload(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("tool result carries text");
    serde_json::from_str(text).expect("tool text is JSON")
}

#[tokio::test]
async fn full_session_with_ready_index() {
    init_test_tracing();
    let dir = TempDir::new().expect("should create temp dir");
    let config = hashing_config(&dir);
    write_dataset(&config);
    let context = CocktailContext::from_config(config).expect("should create context");
    assert_eq!(
        context.initialize().await.expect("should initialize"),
        IndexSource::Built
    );
    let server = server_for(context).await;

    let responses = exchange(
        &server,
        &[
            initialize_request(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {
                    "name": "search_cocktails",
                    "arguments": {"query": "gin campari vermouth", "k": 1}
                }
            }),
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": {
                    "name": "cocktails_by_ingredient",
                    "arguments": {"ingredient": "grenadine", "alcoholic": false}
                }
            }),
        ],
    )
    .await;

    // The notification produces no response
    assert_eq!(responses.len(), 4);

    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "cocktail-search");
    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");

    let names: Vec<&str> = responses[1]["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "cocktails_by_ingredient",
            "index_status",
            "recommend_similar",
            "search_cocktails"
        ]
    );

    assert_eq!(responses[2]["result"]["isError"], false);
    let search = tool_payload(&responses[2]);
    let results = search["results"].as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "Negroni");
    assert!(results[0]["similarity_score"].is_number());

    let filtered = tool_payload(&responses[3]);
    assert_eq!(filtered["results"][0]["name"], "Shirley Temple");
    assert!(filtered["results"][0].get("similarity_score").is_none());

    assert_eq!(server.connection_state().await, ConnectionState::Closed);
}

#[tokio::test]
async fn degraded_index_reports_tool_errors() {
    init_test_tracing();
    let dir = TempDir::new().expect("should create temp dir");
    // No dataset and no snapshot
    let context =
        CocktailContext::from_config(hashing_config(&dir)).expect("should create context");
    assert_eq!(
        context.initialize().await.expect("should initialize"),
        IndexSource::Unavailable
    );
    let server = server_for(context).await;

    let responses = exchange(
        &server,
        &[
            json!({
                "jsonrpc": "2.0",
                "id": "status",
                "method": "tools/call",
                "params": {"name": "index_status", "arguments": {}}
            }),
            json!({
                "jsonrpc": "2.0",
                "id": "search",
                "method": "tools/call",
                "params": {"name": "search_cocktails", "arguments": {"query": "anything"}}
            }),
        ],
    )
    .await;

    assert_eq!(responses.len(), 2);
    let status = tool_payload(&responses[0]);
    assert_eq!(status["ready"], false);
    assert_eq!(status["indexed_records"], 0);

    assert_eq!(responses[1]["id"], "search");
    assert_eq!(responses[1]["result"]["isError"], true);
    let text = responses[1]["result"]["content"][0]["text"]
        .as_str()
        .expect("error text");
    assert!(text.contains("not ready"), "unexpected error text: {text}");
}

#[tokio::test]
async fn protocol_errors_use_jsonrpc_codes() {
    init_test_tracing();
    let dir = TempDir::new().expect("should create temp dir");
    let context =
        CocktailContext::from_config(hashing_config(&dir)).expect("should create context");
    let server = server_for(context).await;

    let input = concat!(
        "{not json\n",
        "\n",
        "{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"resources/list\"}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":8,\"method\":\"tools/call\",\"params\":{\"name\":\"mix_drink\"}}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"ping\"}\n",
    );
    let responses = exchange_raw(&server, input).await;

    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert!(responses[0]["id"].is_null());
    assert_eq!(responses[1]["id"], 7);
    assert_eq!(responses[1]["error"]["code"], -32601);
    assert_eq!(responses[2]["id"], 8);
    assert_eq!(responses[2]["error"]["code"], -32602);
    assert_eq!(responses[3]["id"], 9);
    assert_eq!(responses[3]["result"], json!({}));
}
