use clap::{Parser, Subcommand};
use cocktail_search::Result;
use cocktail_search::commands::{
    build_index, by_ingredient, search, serve_mcp, show_status, similar,
};
use cocktail_search::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cocktail-search")]
#[command(about = "Cocktail recipe retrieval with embedding search and an MCP server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedder, Ollama connection and index settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Embed the recipe dataset and save the index snapshot
    Build {
        /// Dataset to index instead of the configured one
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Find recipes similar to a free-text query
    Search {
        query: String,
        /// Number of results (default: configured default_k)
        #[arg(short)]
        k: Option<usize>,
    },
    /// Recommend recipes similar to a named cocktail
    Similar {
        name: String,
        /// Number of results (default: configured default_k)
        #[arg(short)]
        k: Option<usize>,
    },
    /// List recipes containing an ingredient
    Ingredient {
        name: String,
        /// Only alcoholic drinks
        #[arg(long, conflicts_with = "non_alcoholic")]
        alcoholic: bool,
        /// Only non-alcoholic drinks
        #[arg(long)]
        non_alcoholic: bool,
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show embedder, snapshot and dataset status
    Status,
    /// Start MCP server on stdio
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Build { dataset } => {
            build_index(dataset)?;
        }
        Commands::Search { query, k } => {
            search(&query, k).await?;
        }
        Commands::Similar { name, k } => {
            similar(&name, k).await?;
        }
        Commands::Ingredient {
            name,
            alcoholic,
            non_alcoholic,
            limit,
        } => {
            let filter = if alcoholic {
                Some(true)
            } else if non_alcoholic {
                Some(false)
            } else {
                None
            };
            by_ingredient(&name, filter, limit)?;
        }
        Commands::Status => {
            show_status()?;
        }
        Commands::Serve => {
            serve_mcp().await?;
        }
    }

    Ok(())
}
