//! Recipe records
//!
//! Raw drinks arrive as JSON objects from the processed dataset. They are
//! validated into typed [`Record`]s here; anything that cannot produce a
//! description is skipped with a diagnostic instead of failing the batch.

pub mod filter;


use std::collections::HashSet;
use std::fs;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::{CocktailError, Result};

pub use filter::{by_alcoholic, by_ingredient};

/// A drink as found in the processed dataset
pub type SourceRecord = Map<String, Value>;

/// One entry of a drink's `combined_ingredients`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(deserialize_with = "null_as_empty")]
    pub ingredient: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub measure: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A validated recipe ready for indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    /// `name + " " + ingredient names + " " + instructions`
    pub description: String,
    pub ingredients: Vec<Ingredient>,
    /// The complete source object, kept opaque
    pub attributes: SourceRecord,
}

/// A search result: a copy of the stored record plus its distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: Record,
    pub similarity_score: f32,
}

/// Why a source record was left out of the index
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("missing or empty 'name'")]
    MissingName,
    #[error("missing 'instructions'")]
    MissingInstructions,
    #[error("missing 'combined_ingredients'")]
    MissingIngredients,
    #[error("malformed ingredient entry at position {0}")]
    MalformedIngredient(usize),
    #[error("description has no words to embed")]
    NothingToEmbed,
    #[error("duplicate id '{0}'")]
    DuplicateId(String),
}

impl Record {
    /// Validate one source object into a record
    #[inline]
    pub fn from_source(source: &SourceRecord) -> std::result::Result<Self, SkipReason> {
        let name = source
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(SkipReason::MissingName)?;

        let instructions = source
            .get("instructions")
            .and_then(Value::as_str)
            .ok_or(SkipReason::MissingInstructions)?;

        let ingredients = source
            .get("combined_ingredients")
            .and_then(Value::as_array)
            .ok_or(SkipReason::MissingIngredients)?
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                serde_json::from_value::<Ingredient>(entry.clone())
                    .map_err(|_| SkipReason::MalformedIngredient(position))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let id = match source.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            Some(Value::Number(id)) => id.to_string(),
            _ => name.to_lowercase(),
        };

        let description = describe(name, &ingredients, instructions);
        if !description.chars().any(char::is_alphanumeric) {
            return Err(SkipReason::NothingToEmbed);
        }

        Ok(Self {
            id,
            name: name.to_string(),
            description,
            ingredients,
            attributes: source.clone(),
        })
    }

    /// Attribute lookup as a string, e.g. `alcoholic` or `category`
    #[inline]
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    #[inline]
    pub fn has_ingredient(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.ingredients
            .iter()
            .any(|ing| ing.ingredient.to_lowercase().contains(&needle))
    }

    /// Ingredient names joined for display
    #[inline]
    pub fn ingredient_list(&self) -> String {
        self.ingredients
            .iter()
            .map(|ing| ing.ingredient.as_str())
            .filter(|name| !name.is_empty())
            .join(", ")
    }
}

/// Build the text that gets embedded for a recipe
#[inline]
pub fn describe(name: &str, ingredients: &[Ingredient], instructions: &str) -> String {
    let ingredients_text = ingredients.iter().map(|ing| ing.ingredient.as_str()).join(" ");
    format!("{} {} {}", name, ingredients_text, instructions)
}

/// Validate a batch of source records, dropping the ones that cannot be indexed
///
/// Later records whose id repeats an earlier one are dropped too, so ids are
/// unique within the returned list.
#[inline]
pub fn prepare_records(sources: &[SourceRecord]) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(sources.len());

    for (position, source) in sources.iter().enumerate() {
        let label = source
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let record = match Record::from_source(source) {
            Ok(record) => record,
            Err(reason) => {
                warn!("Skipping record {} ('{}'): {}", position, label, reason);
                continue;
            }
        };

        if !seen.insert(record.id.clone()) {
            warn!(
                "Skipping record {} ('{}'): {}",
                position,
                label,
                SkipReason::DuplicateId(record.id.clone())
            );
            continue;
        }

        records.push(record);
    }

    records
}

/// Load the processed drinks dataset (a JSON array of objects)
#[inline]
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<SourceRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CocktailError::Dataset(format!(
            "JSON file not found at path: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)?;
    let drinks: Vec<SourceRecord> = serde_json::from_str(&content).map_err(|e| {
        CocktailError::Dataset(format!("Failed to parse {}: {}", path.display(), e))
    })?;

    info!(
        "Loaded {} drinks from {}",
        drinks.len(),
        path.display()
    );
    Ok(drinks)
}
