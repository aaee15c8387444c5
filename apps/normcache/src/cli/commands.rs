//! # CLI Command Implementations
//!
//! Every command opens the configured store, does its work, and for the
//! `file` backend writes the store back as a canonical snapshot.

use super::ExportFormat;
use crate::config::{Backend, Config};
use normcache_core::formats::{snapshot_from_json, snapshot_to_json};
use normcache_core::{
    CacheError, Document, EntityId, EntityStore, NormalizedCache, ROOT_QUERY, ResultObject,
    StorageBackend, StoreSnapshot, Variables, canonical_checksum, canonical_crypto_hash,
    export_canonical, import_canonical, verify_crypto_hash,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a document, result, or variables file (16 MB).
const MAX_INPUT_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Maximum size of a snapshot or store file (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CacheError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        CacheError::IoError(format!("Cannot read metadata of {}: {}", path.display(), e))
    })?;

    if metadata.len() > max_size {
        return Err(CacheError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CacheError> {
    let canonical = path.canonicalize().map_err(|e| {
        CacheError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CacheError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against an existing parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, CacheError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CacheError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    let filename = path
        .file_name()
        .ok_or_else(|| CacheError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn read_bytes(path: &Path, max_size: u64) -> Result<Vec<u8>, CacheError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated)
        .map_err(|e| CacheError::IoError(format!("Read {}: {}", path.display(), e)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CacheError> {
    let bytes = read_bytes(path, MAX_INPUT_FILE_SIZE)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        CacheError::DeserializationError(format!("Parse {}: {}", path.display(), e))
    })
}

fn read_variables(path: Option<&Path>) -> Result<Variables, CacheError> {
    path.map(read_json::<Variables>)
        .transpose()
        .map(Option::unwrap_or_default)
}

fn print_json(value: &Value) -> Result<(), CacheError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// STORE LIFECYCLE
// =============================================================================

/// Decode a snapshot file: canonical binary first, JSON second.
pub fn decode_snapshot(data: &[u8]) -> Result<StoreSnapshot, CacheError> {
    match import_canonical(data) {
        Ok(snapshot) => Ok(snapshot),
        Err(canonical_err) => match std::str::from_utf8(data) {
            Ok(text) if text.trim_start().starts_with('{') => snapshot_from_json(text),
            _ => Err(canonical_err),
        },
    }
}

/// Open the configured store and wrap it in a cache.
///
/// A missing `file` store starts empty; a missing `redb` store is created.
pub fn open_cache(config: &Config) -> Result<NormalizedCache<StorageBackend>, CacheError> {
    let path = &config.store.path;
    match config.store.backend {
        Backend::Redb => Ok(config.build_cache(StorageBackend::redb(path)?)),
        Backend::File => {
            let mut cache = config.build_cache(StorageBackend::default());
            if path.exists() {
                let data = read_bytes(path, MAX_IMPORT_FILE_SIZE)?;
                cache.restore(decode_snapshot(&data)?)?;
            }
            Ok(cache)
        }
    }
}

/// Persist the cache. redb commits on every write, so only the `file`
/// backend has anything to do.
pub fn save_cache(cache: &NormalizedCache<StorageBackend>, config: &Config) -> Result<(), CacheError> {
    if cache.store().is_persistent() {
        return Ok(());
    }
    let data = export_canonical(cache.store())?;
    std::fs::write(&config.store.path, &data).map_err(|e| {
        CacheError::IoError(format!("Write {}: {}", config.store.path.display(), e))
    })?;
    tracing::debug!(path = %config.store.path.display(), bytes = data.len(), "store saved");
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty store.
pub fn cmd_init(config: &Config, force: bool) -> Result<(), CacheError> {
    let path = &config.store.path;
    if path.exists() {
        if !force {
            return Err(CacheError::IoError(format!(
                "Store {} already exists. Use --force to overwrite.",
                path.display()
            )));
        }
        std::fs::remove_file(path)
            .map_err(|e| CacheError::IoError(format!("Remove {}: {}", path.display(), e)))?;
    }

    let cache = open_cache(config)?;
    save_cache(&cache, config)?;
    println!(
        "Initialized new {} store at {}",
        config.store.backend.as_str(),
        path.display()
    );
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store metrics.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), CacheError> {
    let cache = open_cache(config)?;
    let metrics = cache.metrics()?;

    if json_mode {
        return print_json(&json!({
            "store": config.store.path.display().to_string(),
            "backend": config.store.backend.as_str(),
            "metrics": metrics,
        }));
    }

    println!("normcache Status");
    println!("================");
    println!("Store:               {}", config.store.path.display());
    println!("Backend:             {}", config.store.backend.as_str());
    println!("Entities:            {}", metrics.entity_count);
    println!("Scalar fields:       {}", metrics.scalar_field_count);
    println!("Reference fields:    {}", metrics.reference_field_count);
    println!("Dangling references: {}", metrics.dangling_reference_count);
    Ok(())
}

// =============================================================================
// WRITE COMMAND
// =============================================================================

/// Inputs of `normcache write`.
#[derive(Debug, Clone, Copy)]
pub struct WriteArgs<'a> {
    pub document: &'a Path,
    pub data: &'a Path,
    pub variables: Option<&'a Path>,
    pub id: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

/// Write a result tree through a document's operation or one of its
/// fragments.
pub fn cmd_write(config: &Config, json_mode: bool, args: &WriteArgs<'_>) -> Result<(), CacheError> {
    let document: Document = read_json(args.document)?;
    let data: Value = read_json(args.data)?;
    let variables = read_variables(args.variables)?;

    let mut cache = open_cache(config)?;
    let summary = if document.operation.is_some() {
        let root = EntityId::new(args.id.unwrap_or(ROOT_QUERY));
        cache.write_result(&root, &document, &variables, &data)?
    } else {
        let id = required_id(args.id)?;
        cache.write_fragment(&id, &document, args.fragment, &data, &variables)?
    };
    save_cache(&cache, config)?;

    if json_mode {
        return print_json(&json!({
            "entities_written": summary.entities_written,
            "user_ids": summary.user_ids,
            "generated_ids": summary.generated_ids,
        }));
    }
    println!(
        "Wrote {} entities ({} identified, {} generated ids)",
        summary.entities_written, summary.user_ids, summary.generated_ids
    );
    Ok(())
}

fn required_id(id: Option<&str>) -> Result<EntityId, CacheError> {
    id.map(EntityId::new).ok_or_else(|| {
        CacheError::MalformedSelection("fragment documents need an entity --id".to_string())
    })
}

// =============================================================================
// READ COMMAND
// =============================================================================

/// Inputs of `normcache read`.
#[derive(Debug, Clone, Copy)]
pub struct ReadArgs<'a> {
    pub document: &'a Path,
    pub variables: Option<&'a Path>,
    pub id: Option<&'a str>,
    pub fragment: Option<&'a str>,
    pub previous: Option<&'a Path>,
    pub diff: bool,
}

/// Read a document's operation or one of its fragments and print the
/// result tree.
pub fn cmd_read(config: &Config, json_mode: bool, args: &ReadArgs<'_>) -> Result<(), CacheError> {
    let document: Document = read_json(args.document)?;
    let variables = read_variables(args.variables)?;
    let previous = args
        .previous
        .map(|path| read_json::<Value>(path).map(|value| Arc::new(ResultObject::from_json(&value))))
        .transpose()?;

    let cache = open_cache(config)?;

    if args.diff {
        if args.id.is_some() || document.operation.is_none() {
            return Err(CacheError::MalformedSelection(
                "--diff reads a document's operation from ROOT_QUERY".to_string(),
            ));
        }
        let diff = cache.diff_query(&document, &variables, previous.as_ref())?;
        let output = json!({
            "complete": diff.is_complete(),
            "missing": diff.missing.as_ref().map(ToString::to_string),
            "stale": diff.result.as_ref().is_some_and(|result| result.stale),
            "data": diff.result.as_ref().map(|result| result.data.to_json()),
        });
        if json_mode {
            return print_json(&output);
        }
        if let Some(missing) = &diff.missing {
            println!("Missing: {}", missing);
        }
        if let Some(result) = &diff.result {
            print_json(&result.data.to_json())?;
        }
        return Ok(());
    }

    let result = if document.operation.is_some() {
        let root = EntityId::new(args.id.unwrap_or(ROOT_QUERY));
        cache.read(&root, &document, &variables, previous.as_ref())?
    } else {
        let id = required_id(args.id)?;
        cache.read_fragment(&id, &document, args.fragment, &variables, previous.as_ref())?
    };

    if json_mode {
        return print_json(&json!({
            "stale": result.stale,
            "data": result.data.to_json(),
        }));
    }
    if result.stale {
        tracing::warn!("result contains values from the previous result");
    }
    print_json(&result.data.to_json())
}

// =============================================================================
// INSPECT / EVICT COMMANDS
// =============================================================================

/// Print one entity record.
pub fn cmd_inspect(config: &Config, json_mode: bool, id: &str) -> Result<(), CacheError> {
    let cache = open_cache(config)?;
    let id = EntityId::new(id);
    let record = cache
        .store()
        .get(&id)?
        .ok_or_else(|| CacheError::MissingEntity { id: id.clone() })?;

    if json_mode {
        return print_json(&json!({ "id": id, "record": record }));
    }
    println!("Entity {}", id);
    println!("  typename:   {}", record.typename().unwrap_or("-"));
    for (key, value) in &record.scalars {
        println!("  {} = {}", key, value);
    }
    for (key, reference) in &record.references {
        let target = serde_json::to_string(reference)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        println!("  {} -> {}", key, target);
    }
    Ok(())
}

/// Remove one entity record.
pub fn cmd_evict(config: &Config, id: &str) -> Result<(), CacheError> {
    let mut cache = open_cache(config)?;
    let id = EntityId::new(id);
    match cache.evict(&id)? {
        Some(_) => {
            save_cache(&cache, config)?;
            println!("Evicted {}", id);
        }
        None => println!("No entity {}", id),
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT COMMANDS
// =============================================================================

/// Export the store to a file.
pub fn cmd_export(config: &Config, output: &Path, format: ExportFormat) -> Result<(), CacheError> {
    let validated_output = validate_output_path(output)?;
    let cache = open_cache(config)?;

    let data = match format {
        ExportFormat::Canonical => {
            let data = export_canonical(cache.store())?;
            println!("Checksum: {}", canonical_checksum(cache.store())?);
            data
        }
        ExportFormat::Json => snapshot_to_json(&cache.extract()?)?.into_bytes(),
    };

    std::fs::write(&validated_output, &data).map_err(|e| {
        CacheError::IoError(format!("Write {}: {}", validated_output.display(), e))
    })?;

    println!("Exported {} bytes to {}", data.len(), validated_output.display());
    Ok(())
}

/// Merge a canonical or JSON snapshot into the store.
pub fn cmd_import(config: &Config, input: &Path) -> Result<(), CacheError> {
    let data = read_bytes(input, MAX_IMPORT_FILE_SIZE)?;
    let snapshot = decode_snapshot(&data)?;
    let count = snapshot.len();

    let mut cache = open_cache(config)?;
    cache.restore(snapshot)?;
    save_cache(&cache, config)?;

    println!("Imported {} entities from {}", count, input.display());
    Ok(())
}

// =============================================================================
// HASH / COMPACT COMMANDS
// =============================================================================

/// Print the FNV-1a checksum and BLAKE3 hash of the canonical export, or
/// check the store against an expected BLAKE3 hash.
pub fn cmd_hash(config: &Config, json_mode: bool, verify: Option<&str>) -> Result<(), CacheError> {
    let cache = open_cache(config)?;

    if let Some(expected) = verify {
        if !verify_crypto_hash(cache.store(), expected)? {
            return Err(CacheError::SerializationError(format!(
                "Store hash does not match {}",
                expected
            )));
        }
        println!("OK");
        return Ok(());
    }

    let checksum = canonical_checksum(cache.store())?;
    let hash = canonical_crypto_hash(cache.store())?;
    if json_mode {
        return print_json(&json!({ "checksum": checksum, "blake3": hash }));
    }
    println!("Checksum: {}", checksum);
    println!("BLAKE3:   {}", hash);
    Ok(())
}

/// Compact a redb store file.
pub fn cmd_compact(config: &Config) -> Result<(), CacheError> {
    let mut cache = open_cache(config)?;
    match cache.store_mut() {
        StorageBackend::Persistent(store) => {
            let compacted = store.compact()?;
            println!(
                "{}",
                if compacted {
                    "Compacted"
                } else {
                    "Nothing to compact"
                }
            );
            Ok(())
        }
        StorageBackend::InMemory(_) => Err(CacheError::IoError(
            "compact needs the redb backend".to_string(),
        )),
    }
}
