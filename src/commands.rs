use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{Config, EmbedderProvider};
use crate::context::{CocktailContext, IndexSource};
use crate::embeddings::{Embedder, HashingEmbedder, OllamaClient};
use crate::index::{SimilarityIndex, snapshot};
use crate::mcp::McpServer;
use crate::recipes::{self, Record, SearchHit};

/// Embed the dataset and save a fresh index snapshot
#[inline]
pub fn build_index(dataset: Option<PathBuf>) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let dataset = dataset.unwrap_or_else(|| config.dataset_path());

    let sources = recipes::load_dataset(&dataset)?;
    let eligible = recipes::prepare_records(&sources).len();
    println!(
        "📄 Loaded {} drinks from {} ({} indexable)",
        sources.len(),
        dataset.display(),
        eligible
    );

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(eligible as u64).with_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} Embedding recipes")
                .context("Invalid progress template")?,
        )
    } else {
        ProgressBar::hidden()
    };

    let embedder: Arc<dyn Embedder> = match config.embedder.provider {
        EmbedderProvider::Ollama => Arc::new(OllamaClient::new(&config)?.with_progress(bar.clone())),
        EmbedderProvider::Hashing => {
            Arc::new(HashingEmbedder::new(config.embedder.dimension as usize))
        }
    };

    let mut index = SimilarityIndex::new(embedder, config.index.metric);
    let result = index.build(&sources);
    bar.finish_and_clear();
    let count = result.context("Failed to build index")?;

    let snapshot_dir = config.snapshot_path();
    let generation = index
        .save(&snapshot_dir)
        .context("Failed to save index snapshot")?;

    println!(
        "✅ Indexed {} recipes ({} metric) into {}",
        count,
        config.index.metric,
        snapshot_dir.display()
    );
    println!("   Snapshot generation: {}", generation);
    Ok(())
}

/// Free-text similarity search
#[inline]
pub async fn search(query: &str, k: Option<usize>) -> Result<()> {
    let context = open_index().await?;
    let hits = context.search(query, k).await?;
    print_hits(&format!("Results for \"{}\"", query), &hits);
    Ok(())
}

/// Cocktails similar to a named one
#[inline]
pub async fn similar(name: &str, k: Option<usize>) -> Result<()> {
    let context = open_index().await?;
    let hits = context.recommend_similar(name, k).await?;
    print_hits(&format!("Cocktails similar to {}", name), &hits);
    Ok(())
}

/// Exact ingredient filter, optionally restricted to (non-)alcoholic drinks
///
/// Reads the dataset directly; nothing is embedded or saved.
#[inline]
pub fn by_ingredient(ingredient: &str, alcoholic: Option<bool>, limit: usize) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let records = filter_dataset(&config.dataset_path(), ingredient, alcoholic, limit)?;

    if records.is_empty() {
        println!("No cocktails found containing '{}'", ingredient);
        return Ok(());
    }

    println!("🍸 Cocktails containing '{}':", ingredient);
    for record in &records {
        print_record(record);
    }
    Ok(())
}

/// Show configuration, index and embedder health
#[inline]
pub fn show_status() -> Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            println!("⚠️  Could not load configuration ({:#}); showing defaults", e);
            Config::new(Config::config_dir()?)
        }
    };

    println!("📊 Cocktail Search Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Embedder Status:");
    match config.embedder.provider {
        EmbedderProvider::Ollama => match OllamaClient::new(&config) {
            Ok(client) => match client.health_check() {
                Ok(()) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                    println!("   📋 Model: {}", config.ollama.model);
                    println!("   🔢 Batch Size: {}", config.ollama.batch_size);
                }
                Err(e) => {
                    println!("   ⚠️  Ollama: Unavailable - {:#}", e);
                }
            },
            Err(e) => {
                println!("   ❌ Ollama: Misconfigured - {}", e);
            }
        },
        EmbedderProvider::Hashing => {
            println!(
                "   ✅ Hashing embedder ({} dimensions, offline)",
                config.embedder.dimension
            );
        }
    }

    println!();
    println!("🔍 Index Status:");
    let snapshot_dir = config.snapshot_path();
    println!("   📁 Snapshot directory: {}", snapshot_dir.display());
    if snapshot::exists(&snapshot_dir) {
        match snapshot::read(&snapshot_dir) {
            Ok(current) => {
                println!("   ✅ Generation: {}", current.generation);
                println!("   📊 Records: {}", current.records.len());
                println!("   🔢 Dimension: {}", current.vectors.dimension());
                println!("   📐 Metric: {}", current.metric);
                println!(
                    "   🕒 Created: {}",
                    current.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                if current.metric != config.index.metric
                    || current.vectors.dimension() != config.embedder.dimension as usize
                {
                    println!("   ⚠️  Snapshot does not match the configuration; rebuild it");
                }
            }
            Err(e) => {
                println!("   ❌ Snapshot unreadable - {}", e);
            }
        }
    } else {
        println!("   📭 No snapshot saved yet");
    }

    println!();
    println!("📄 Dataset:");
    let dataset = config.dataset_path();
    if dataset.exists() {
        println!("   ✅ {}", dataset.display());
    } else {
        println!("   ❌ Not found at {}", dataset.display());
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'cocktail-search build' to (re)build the index");
    println!("   • Use 'cocktail-search search <query>' to try a query");
    println!("   • Use 'cocktail-search serve' to start the MCP server for AI assistants");

    Ok(())
}

/// Start the MCP server on stdio
#[inline]
pub async fn serve_mcp() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let context = Arc::new(CocktailContext::from_config(config)?);

    match context
        .initialize()
        .await
        .context("Failed to initialize index")?
    {
        IndexSource::Snapshot => info!("Serving from saved snapshot"),
        IndexSource::Built => info!("Serving freshly built index"),
        IndexSource::Unavailable => {
            warn!("Similarity tools will report an unavailable index until it is built");
        }
    }

    let server = McpServer::new("cocktail-search", env!("CARGO_PKG_VERSION"));
    crate::mcp::tools::register_all(&server, &context).await;

    eprintln!("✅ MCP server initialized with tools: search_cocktails, recommend_similar, cocktails_by_ingredient, index_status");
    eprintln!("Note: This server uses stdio transport. Connect via MCP client.");

    tokio::select! {
        result = server.serve_stdio() => {
            if let Err(e) = result {
                error!("MCP server error: {}", e);
                return Err(e);
            }
            info!("MCP server stopped normally");
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n📴 Received interrupt signal, shutting down...");
        }
    }

    Ok(())
}

async fn open_index() -> Result<CocktailContext> {
    let config = Config::load().context("Failed to load configuration")?;
    let snapshot_dir = config.snapshot_path();
    let context = CocktailContext::from_config(config)?;
    context
        .load_snapshot(&snapshot_dir)
        .await
        .context("No usable index; run 'cocktail-search build' first")?;
    Ok(context)
}

fn filter_dataset(
    dataset: &Path,
    ingredient: &str,
    alcoholic: Option<bool>,
    limit: usize,
) -> Result<Vec<Record>> {
    let sources = recipes::load_dataset(dataset)?;
    let catalog = recipes::prepare_records(&sources);
    let matches = match alcoholic {
        Some(alcoholic) => recipes::by_alcoholic(&catalog, alcoholic, Some(ingredient), limit),
        None => recipes::by_ingredient(&catalog, ingredient, limit),
    };
    Ok(matches.into_iter().cloned().collect())
}

fn print_hits(title: &str, hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No matching cocktails");
        return;
    }

    println!("🍸 {}:", title);
    for hit in hits {
        print_record(&hit.record);
        println!("      distance: {:.4}", hit.similarity_score);
    }
}

fn print_record(record: &Record) {
    println!(
        "   • {} [{}]",
        record.name,
        record.attribute_str("alcoholic").unwrap_or("unknown")
    );
    println!("      {}", record.ingredient_list());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn ingredient_filter_leaves_index_untouched() {
        let dir = TempDir::new().expect("should create temp dir");
        let config = Config::new(dir.path());
        let drinks = json!([
            {
                "name": "Mojito",
                "alcoholic": "Alcoholic",
                "instructions": "Muddle mint and lime, add rum.",
                "combined_ingredients": [{"ingredient": "Mint"}, {"ingredient": "Rum"}]
            },
            {
                "name": "Virgin Mojito",
                "alcoholic": "Non alcoholic",
                "instructions": "Muddle mint and lime, top with soda.",
                "combined_ingredients": [{"ingredient": "Mint"}, {"ingredient": "Soda"}]
            }
        ]);
        std::fs::write(config.dataset_path(), drinks.to_string()).expect("should write dataset");

        let all = filter_dataset(&config.dataset_path(), "mint", None, 10).expect("should filter");
        assert_eq!(all.len(), 2);

        let soft = filter_dataset(&config.dataset_path(), "MINT", Some(false), 10)
            .expect("should filter");
        assert_eq!(soft.len(), 1);
        assert_eq!(soft[0].name, "Virgin Mojito");

        assert!(!config.snapshot_path().exists());
    }

    #[test]
    fn ingredient_filter_requires_dataset() {
        let dir = TempDir::new().expect("should create temp dir");
        let err = filter_dataset(&dir.path().join("missing.json"), "mint", None, 10)
            .expect_err("no dataset");
        assert!(err.to_string().contains("missing.json"));
    }
}
