//! On-disk snapshots of the similarity index
//!
//! A snapshot directory holds one or more generation directories plus a
//! `CURRENT` file naming the live one. Each generation has an Arrow IPC file
//! with the vectors and a JSON file with the records; both carry the same
//! generation id. Readers follow `CURRENT`, which only ever names a fully
//! written generation.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::metric::DistanceMetric;
use super::store::VectorStore;
use crate::recipes::Record;
use crate::{CocktailError, Result};

pub const CURRENT_FILE: &str = "CURRENT";
pub const VECTORS_FILE: &str = "vectors.arrow";
pub const METADATA_FILE: &str = "metadata.json";
pub const FORMAT_VERSION: u32 = 1;

const VECTOR_COLUMN: &str = "vector";

/// A snapshot read back from disk
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub generation: String,
    pub created_at: DateTime<Utc>,
    pub metric: DistanceMetric,
    pub vectors: VectorStore,
    pub records: Vec<Record>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile<'a> {
    generation: String,
    format_version: u32,
    created_at: DateTime<Utc>,
    records: Cow<'a, [Record]>,
}

/// Whether `dir` contains a snapshot pointer
#[inline]
pub fn exists(dir: &Path) -> bool {
    dir.join(CURRENT_FILE).is_file()
}

/// Write a new generation and make it current; returns the generation id
#[inline]
pub fn write(
    dir: &Path,
    metric: DistanceMetric,
    vectors: &VectorStore,
    records: &[Record],
) -> Result<String> {
    if vectors.len() != records.len() {
        return Err(CocktailError::Persistence(format!(
            "refusing to save {} vectors with {} records",
            vectors.len(),
            records.len()
        )));
    }

    let generation = Uuid::new_v4().to_string();
    let generation_dir = dir.join(&generation);
    fs::create_dir_all(&generation_dir).map_err(|e| {
        persistence(format!("Failed to create {}", generation_dir.display()), e)
    })?;

    debug!(
        "Writing snapshot generation {} to {}",
        generation,
        generation_dir.display()
    );

    if let Err(e) = write_generation(dir, &generation, &generation_dir, metric, vectors, records) {
        if let Err(cleanup) = fs::remove_dir_all(&generation_dir) {
            warn!(
                "Failed to remove unpublished generation {}: {}",
                generation_dir.display(),
                cleanup
            );
        }
        return Err(e);
    }

    remove_stale_generations(dir, &generation);

    info!(
        "Saved snapshot {} ({} vectors) to {}",
        generation,
        vectors.len(),
        dir.display()
    );
    Ok(generation)
}

/// Fill `generation_dir` and point `CURRENT` at it
///
/// `CURRENT` keeps naming the previous generation unless this returns `Ok`.
fn write_generation(
    dir: &Path,
    generation: &str,
    generation_dir: &Path,
    metric: DistanceMetric,
    vectors: &VectorStore,
    records: &[Record],
) -> Result<()> {
    let vector_bytes = encode_vectors(generation, metric, vectors)?;
    write_synced(&generation_dir.join(VECTORS_FILE), &vector_bytes)?;

    let metadata = MetadataFile {
        generation: generation.to_string(),
        format_version: FORMAT_VERSION,
        created_at: Utc::now(),
        records: Cow::Borrowed(records),
    };
    let metadata_bytes = serde_json::to_vec(&metadata)
        .map_err(|e| CocktailError::Persistence(format!("Failed to encode metadata: {}", e)))?;
    write_synced(&generation_dir.join(METADATA_FILE), &metadata_bytes)?;
    sync_dir(generation_dir);

    let temp_path = dir.join(format!("{}.tmp", CURRENT_FILE));
    write_synced(&temp_path, generation.as_bytes())?;
    fs::rename(&temp_path, dir.join(CURRENT_FILE))
        .map_err(|e| persistence("Failed to publish snapshot".to_string(), e))?;
    sync_dir(dir);
    Ok(())
}

/// Read the current generation from `dir`
#[inline]
pub fn read(dir: &Path) -> Result<Snapshot> {
    let current_path = dir.join(CURRENT_FILE);
    let generation = read_required(&current_path)?;
    let generation = String::from_utf8(generation)
        .map_err(|_| corrupt("CURRENT is not valid UTF-8"))?
        .trim()
        .to_string();

    if Uuid::parse_str(&generation).is_err() {
        return Err(corrupt(format!(
            "CURRENT names an invalid generation '{}'",
            generation
        )));
    }

    let generation_dir = dir.join(&generation);
    let vector_bytes = read_required(&generation_dir.join(VECTORS_FILE))?;
    let metadata_bytes = read_required(&generation_dir.join(METADATA_FILE))?;

    let (header, vectors) = decode_vectors(&vector_bytes)?;

    let metadata: MetadataFile<'static> = serde_json::from_slice(&metadata_bytes)
        .map_err(|e| corrupt(format!("metadata is not valid JSON: {}", e)))?;

    if metadata.format_version != FORMAT_VERSION || header.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version (vectors {}, metadata {})",
            header.format_version, metadata.format_version
        )));
    }

    if header.generation != generation || metadata.generation != generation {
        return Err(corrupt(format!(
            "generation mismatch: CURRENT {}, vectors {}, metadata {}",
            generation, header.generation, metadata.generation
        )));
    }

    let records = metadata.records.into_owned();
    if vectors.len() != header.count || records.len() != header.count {
        return Err(corrupt(format!(
            "count mismatch: header {}, vectors {}, records {}",
            header.count,
            vectors.len(),
            records.len()
        )));
    }

    debug!(
        "Read snapshot generation {} with {} vectors",
        generation,
        vectors.len()
    );

    Ok(Snapshot {
        generation,
        created_at: metadata.created_at,
        metric: header.metric,
        vectors,
        records,
    })
}

struct VectorHeader {
    generation: String,
    format_version: u32,
    metric: DistanceMetric,
    count: usize,
}

fn encode_vectors(
    generation: &str,
    metric: DistanceMetric,
    vectors: &VectorStore,
) -> Result<Vec<u8>> {
    let dimension = vectors.dimension();
    let list_size = i32::try_from(dimension)
        .map_err(|_| CocktailError::Persistence(format!("dimension {} too large", dimension)))?;

    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    let metadata = HashMap::from([
        ("generation".to_string(), generation.to_string()),
        ("dimension".to_string(), dimension.to_string()),
        ("count".to_string(), vectors.len().to_string()),
        ("metric".to_string(), metric.to_string()),
        ("format_version".to_string(), FORMAT_VERSION.to_string()),
    ]);
    let schema = Arc::new(Schema::new_with_metadata(
        vec![Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(Arc::clone(&item_field), list_size),
            false,
        )],
        metadata,
    ));

    let values = Float32Array::from(vectors.as_flat().to_vec());
    let vector_array = FixedSizeListArray::try_new(item_field, list_size, Arc::new(values), None)
        .map_err(|e| CocktailError::Persistence(format!("Failed to create vector array: {}", e)))?;

    let batch = RecordBatch::try_new(Arc::clone(&schema), vec![Arc::new(vector_array)])
        .map_err(|e| CocktailError::Persistence(format!("Failed to create record batch: {}", e)))?;

    let mut writer = FileWriter::try_new(Vec::new(), &schema)
        .map_err(|e| CocktailError::Persistence(format!("Failed to start vector file: {}", e)))?;
    writer
        .write(&batch)
        .map_err(|e| CocktailError::Persistence(format!("Failed to write vectors: {}", e)))?;
    writer
        .into_inner()
        .map_err(|e| CocktailError::Persistence(format!("Failed to finish vector file: {}", e)))
}

fn decode_vectors(bytes: &[u8]) -> Result<(VectorHeader, VectorStore)> {
    let reader = FileReader::try_new(Cursor::new(bytes), None)
        .map_err(|e| corrupt(format!("vector file is not Arrow IPC: {}", e)))?;

    let schema = reader.schema();
    let metadata = schema.metadata();
    let field = |key: &str| {
        metadata
            .get(key)
            .ok_or_else(|| corrupt(format!("vector file lacks '{}' metadata", key)))
    };

    let generation = field("generation")?.clone();
    let format_version = parse_field::<u32>("format_version", field("format_version")?)?;
    let dimension = parse_field::<usize>("dimension", field("dimension")?)?;
    let count = parse_field::<usize>("count", field("count")?)?;
    let metric = field("metric")?
        .parse::<DistanceMetric>()
        .map_err(corrupt)?;

    if dimension == 0 {
        return Err(corrupt("vector dimension is zero"));
    }

    // `count` is untrusted until compared with what was actually decoded
    let mut flat = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| corrupt(format!("unreadable vector batch: {}", e)))?;
        let column = batch
            .column_by_name(VECTOR_COLUMN)
            .ok_or_else(|| corrupt("missing vector column"))?
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| corrupt("invalid vector column type"))?;

        if usize::try_from(column.value_length()).ok() != Some(dimension) {
            return Err(corrupt(format!(
                "vector column has width {}, header says {}",
                column.value_length(),
                dimension
            )));
        }
        if column.null_count() > 0 {
            return Err(corrupt("vector column contains nulls"));
        }

        for row in 0..column.len() {
            let values = column.value(row);
            let values = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| corrupt("vector values are not f32"))?;
            flat.extend_from_slice(values.values());
        }
    }

    let vectors = VectorStore::from_flat(dimension, flat).map_err(|e| corrupt(e.to_string()))?;

    Ok((
        VectorHeader {
            generation,
            format_version,
            metric,
            count,
        },
        vectors,
    ))
}

fn parse_field<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| corrupt(format!("invalid '{}' metadata: {}", key, value)))
}

fn read_required(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CocktailError::IndexFileMissing(path.to_path_buf()))
        }
        Err(e) => Err(corrupt(format!("cannot read {}: {}", path.display(), e))),
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .map_err(|e| persistence(format!("Failed to create {}", path.display()), e))?;
    file.write_all(bytes)
        .map_err(|e| persistence(format!("Failed to write {}", path.display()), e))?;
    file.sync_all()
        .map_err(|e| persistence(format!("Failed to sync {}", path.display()), e))
}

fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

fn remove_stale_generations(dir: &Path, live: &str) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not scan {} for old snapshots: {}", dir.display(), e);
            return;
        }
    };

    let stale: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name != live && Uuid::parse_str(name).is_ok())
        })
        .collect();

    for path in stale {
        match fs::remove_dir_all(&path) {
            Ok(()) => debug!("Removed old snapshot generation {}", path.display()),
            Err(e) => warn!(
                "Failed to remove old snapshot generation {}: {}",
                path.display(),
                e
            ),
        }
    }
}

fn corrupt(message: impl Into<String>) -> CocktailError {
    CocktailError::CorruptIndex(message.into())
}

fn persistence(context: String, error: std::io::Error) -> CocktailError {
    CocktailError::Persistence(format!("{}: {}", context, error))
}
