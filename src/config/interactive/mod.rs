
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, EmbedderConfig, EmbedderProvider, IndexConfig, OllamaConfig};
use crate::index::DistanceMetric;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🍸 Cocktail Search Configuration").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Model").bold().yellow());
    configure_embedder(&mut config.embedder)?;

    if config.embedder.provider == EmbedderProvider::Ollama {
        eprintln!();
        eprintln!("{}", style("Ollama Configuration").bold().yellow());
        eprintln!("Configure your local Ollama instance for embedding generation.");
        eprintln!();

        configure_ollama(&mut config.ollama)?;

        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_ollama_connection(&config.ollama) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before building the index.");
        }
    }

    eprintln!();
    eprintln!("{}", style("Search Index").bold().yellow());
    configure_index(&mut config.index)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedder:").bold().yellow());
    eprintln!(
        "  Provider: {}",
        style(provider_label(config.embedder.provider)).cyan()
    );
    eprintln!("  Dimension: {}", style(config.embedder.dimension).cyan());

    if config.embedder.provider == EmbedderProvider::Ollama {
        eprintln!();
        eprintln!("{}", style("Ollama Settings:").bold().yellow());
        eprintln!("  Host: {}", style(&config.ollama.host).cyan());
        eprintln!("  Port: {}", style(config.ollama.port).cyan());
        eprintln!("  Model: {}", style(&config.ollama.model).cyan());
        eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
        eprintln!(
            "  Timeout: {}s",
            style(config.ollama.timeout_seconds).cyan()
        );
        match config.ollama_url() {
            Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
            Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
        }
    }

    eprintln!();
    eprintln!("{}", style("Index Settings:").bold().yellow());
    eprintln!("  Metric: {}", style(config.index.metric).cyan());
    eprintln!("  Default k: {}", style(config.index.default_k).cyan());
    eprintln!(
        "  Snapshot: {}",
        style(config.snapshot_path().display()).cyan()
    );
    eprintln!(
        "  Dataset: {}",
        style(config.dataset_path().display()).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().or_else(|_| {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        let base_dir = Config::config_dir().context("Failed to determine config directory")?;
        Ok(Config::new(base_dir))
    })
}

fn provider_label(provider: EmbedderProvider) -> &'static str {
    match provider {
        EmbedderProvider::Ollama => "ollama",
        EmbedderProvider::Hashing => "hashing (offline, not semantic)",
    }
}

fn configure_embedder(embedder: &mut EmbedderConfig) -> Result<()> {
    let providers = [EmbedderProvider::Ollama, EmbedderProvider::Hashing];
    let labels: Vec<&str> = providers.iter().map(|p| provider_label(*p)).collect();
    let default_index = providers
        .iter()
        .position(|p| *p == embedder.provider)
        .unwrap_or(0);

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(&labels)
        .interact()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedder.dimension)
        .validate_with(|input: &u32| -> Result<(), ConfigError> {
            EmbedderConfig {
                dimension: *input,
                ..embedder.clone()
            }
            .validate()
        })
        .interact_text()?;

    embedder.provider = providers[provider_index];
    embedder.set_dimension(dimension)?;

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            }
            .validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_index(index: &mut IndexConfig) -> Result<()> {
    let metrics = [DistanceMetric::SquaredEuclidean, DistanceMetric::Cosine];
    let labels: Vec<String> = metrics.iter().map(ToString::to_string).collect();
    let default_index = metrics
        .iter()
        .position(|m| *m == index.metric)
        .unwrap_or(0);

    let metric_index = Select::new()
        .with_prompt("Distance metric (changing it requires a rebuild)")
        .default(default_index)
        .items(&labels)
        .interact()?;

    let default_k: usize = Input::new()
        .with_prompt("Default number of results")
        .default(index.default_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Result count must be between 1 and 100")
            }
        })
        .interact_text()?;

    index.metric = metrics[metric_index];
    index.set_default_k(default_k)?;

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
