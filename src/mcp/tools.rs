//! MCP Tools Implementation
//!
//! Tool handlers exposing the cocktail index and recipe filters. Every
//! handler shares one [`CocktailContext`].

use crate::context::CocktailContext;
use crate::mcp::protocol::*;
use crate::mcp::server::{McpServer, ToolHandler};
use crate::recipes::{Record, SearchHit};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error};

const DEFAULT_FILTER_LIMIT: usize = 10;

/// Semantic search over the indexed recipes
pub struct SearchCocktailsHandler {
    context: Arc<CocktailContext>,
}

/// Recommendations from a cocktail name or a list of ingredients
pub struct RecommendSimilarHandler {
    context: Arc<CocktailContext>,
}

/// Exact ingredient and alcoholic/non-alcoholic filtering
pub struct CocktailsByIngredientHandler {
    context: Arc<CocktailContext>,
}

/// Reports whether the index is loaded
pub struct IndexStatusHandler {
    context: Arc<CocktailContext>,
}

impl SearchCocktailsHandler {
    #[inline]
    pub fn new(context: Arc<CocktailContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ToolHandler for SearchCocktailsHandler {
    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "search_cocktails".to_string(),
            description: "Find cocktail recipes similar to a free-text description".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look for, e.g. 'refreshing gin drink with lime'"
                    },
                    "k": {
                        "type": "integer",
                        "description": "Maximum number of results (default: configured default_k)"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn call(&self, args: &Arguments) -> Result<CallToolResult> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Missing required parameter: query"))?;
        let k = optional_count(args, "k");

        debug!("Searching cocktails: query='{}', k={:?}", query, k);

        match self.context.search(query, k).await {
            Ok(hits) => hits_result(&hits),
            Err(e) => {
                error!("Error performing search: {}", e);
                Ok(CallToolResult::failure(format!("Search error: {}", e)))
            }
        }
    }
}

impl RecommendSimilarHandler {
    #[inline]
    pub fn new(context: Arc<CocktailContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ToolHandler for RecommendSimilarHandler {
    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "recommend_similar".to_string(),
            description:
                "Recommend cocktails similar to a named cocktail or matching preferred ingredients"
                    .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "cocktail_name": {
                        "type": "string",
                        "description": "Name of a cocktail to find look-alikes for"
                    },
                    "ingredients": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Preferred ingredients, used when no cocktail_name is given"
                    },
                    "k": {
                        "type": "integer",
                        "description": "Maximum number of results (default: configured default_k)"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn call(&self, args: &Arguments) -> Result<CallToolResult> {
        let k = optional_count(args, "k");

        let result = if let Some(name) = args.get("cocktail_name").and_then(|v| v.as_str()) {
            debug!("Recommending cocktails similar to '{}'", name);
            self.context.recommend_similar(name, k).await
        } else if let Some(list) = args.get("ingredients").and_then(|v| v.as_array()) {
            let ingredients: Vec<String> = list
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect();
            debug!("Recommending cocktails for ingredients {:?}", ingredients);
            self.context.recommend_for_ingredients(&ingredients, k).await
        } else {
            return Err(anyhow!(
                "Provide either 'cocktail_name' or 'ingredients'"
            ));
        };

        match result {
            Ok(hits) => hits_result(&hits),
            Err(e) => {
                error!("Error recommending cocktails: {}", e);
                Ok(CallToolResult::failure(format!("Recommendation error: {}", e)))
            }
        }
    }
}

impl CocktailsByIngredientHandler {
    #[inline]
    pub fn new(context: Arc<CocktailContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ToolHandler for CocktailsByIngredientHandler {
    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "cocktails_by_ingredient".to_string(),
            description:
                "List cocktails containing an ingredient, optionally only (non-)alcoholic ones"
                    .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ingredient": {
                        "type": "string",
                        "description": "Ingredient name or part of it, case-insensitive"
                    },
                    "alcoholic": {
                        "type": "boolean",
                        "description": "Optional: true for alcoholic drinks only, false for non-alcoholic only"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 10)"
                    }
                },
                "required": ["ingredient"],
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn call(&self, args: &Arguments) -> Result<CallToolResult> {
        let ingredient = args
            .get("ingredient")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Missing required parameter: ingredient"))?;
        let alcoholic = args.get("alcoholic").and_then(|v| v.as_bool());
        let limit = optional_count(args, "limit").unwrap_or(DEFAULT_FILTER_LIMIT);

        debug!(
            "Filtering cocktails: ingredient='{}', alcoholic={:?}, limit={}",
            ingredient, alcoholic, limit
        );

        let records = match alcoholic {
            Some(alcoholic) => {
                self.context
                    .by_alcoholic(alcoholic, Some(ingredient), limit)
                    .await
            }
            None => self.context.by_ingredient(ingredient, limit).await,
        };

        let results: Vec<Value> = records.iter().map(|record| summarize(record, None)).collect();
        text_result(&json!({ "results": results }))
    }
}

impl IndexStatusHandler {
    #[inline]
    pub fn new(context: Arc<CocktailContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ToolHandler for IndexStatusHandler {
    #[inline]
    fn definition(&self) -> Tool {
        Tool {
            name: "index_status".to_string(),
            description: "Report whether the cocktail index is loaded".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }

    #[inline]
    async fn call(&self, _args: &Arguments) -> Result<CallToolResult> {
        let status = self.context.status().await;
        text_result(&serde_json::to_value(status)?)
    }
}

/// Register every cocktail tool on `server`
#[inline]
pub async fn register_all(server: &McpServer, context: &Arc<CocktailContext>) {
    server
        .register(SearchCocktailsHandler::new(Arc::clone(context)))
        .await;
    server
        .register(RecommendSimilarHandler::new(Arc::clone(context)))
        .await;
    server
        .register(CocktailsByIngredientHandler::new(Arc::clone(context)))
        .await;
    server
        .register(IndexStatusHandler::new(Arc::clone(context)))
        .await;
}

fn optional_count(args: &Arguments, key: &str) -> Option<usize> {
    args.get(key)
        .and_then(|v| v.as_u64())
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
}

fn summarize(record: &Record, similarity_score: Option<f32>) -> Value {
    let mut summary = json!({
        "id": record.id,
        "name": record.name,
        "ingredients": record.ingredient_list(),
        "alcoholic": record.attribute_str("alcoholic"),
        "category": record.attribute_str("category"),
        "instructions": record.attribute_str("instructions"),
    });
    if let Some(score) = similarity_score {
        summary["similarity_score"] = json!(score);
    }
    summary
}

fn hits_result(hits: &[SearchHit]) -> Result<CallToolResult> {
    let results: Vec<Value> = hits
        .iter()
        .map(|hit| summarize(&hit.record, Some(hit.similarity_score)))
        .collect();
    text_result(&json!({ "results": results }))
}

fn text_result(value: &Value) -> Result<CallToolResult> {
    Ok(CallToolResult::json(value)?)
}
