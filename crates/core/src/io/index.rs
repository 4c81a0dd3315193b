//! Generic sharded/monolithic key-value index storage.
//!
//! An index maps an id to a small record (inbox name + offset, ack, ...).
//! On the hot path entries are written into per-prefix shard files
//! (`<shards_dir>/<hh>.json`, each holding a `HashMap<id, V>` for ids whose
//! `shard_key` is `hh`) to keep any single file small and reduce lock
//! contention. Readers fall back to a single monolithic file when the shard
//! directory does not exist, for compatibility with indexes written before
//! sharding was adopted.

use crate::error::EngineError;
use crate::io::atomic::{read_json_optional, write_json_atomic};
use crate::io::shard::shard_key;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

fn shard_file(shards_dir: &Path, id: &str) -> std::path::PathBuf {
    shards_dir.join(format!("{}.json", shard_key(id)))
}

/// Look up a single entry, preferring the sharded layout and falling back to
/// the monolithic file when no shard directory has ever been written.
pub fn load_entry<V: DeserializeOwned>(
    shards_dir: &Path,
    monolithic: &Path,
    id: &str,
) -> Result<Option<V>, EngineError> {
    if shards_dir.is_dir() {
        let map: HashMap<String, V> =
            read_json_optional(&shard_file(shards_dir, id))?.unwrap_or_default();
        return Ok(map.into_iter().find(|(k, _)| k == id).map(|(_, v)| v));
    }
    let map: HashMap<String, V> = read_json_optional(monolithic)?.unwrap_or_default();
    Ok(map.into_iter().find(|(k, _)| k == id).map(|(_, v)| v))
}

/// Insert or overwrite a single entry in its shard file.
pub fn store_entry<V: Serialize + DeserializeOwned>(
    shards_dir: &Path,
    id: &str,
    entry: V,
) -> Result<(), EngineError> {
    let path = shard_file(shards_dir, id);
    let mut map: HashMap<String, V> = read_json_optional(&path)?.unwrap_or_default();
    map.insert(id.to_string(), entry);
    write_json_atomic(&path, &map)
}

/// Load every entry across all shard files, falling back to (and merging
/// with) the monolithic file. Shard entries win on id collision, since the
/// monolithic file is only ever a pre-sharding relic.
pub fn load_all<V: DeserializeOwned + Clone>(
    shards_dir: &Path,
    monolithic: &Path,
) -> Result<HashMap<String, V>, EngineError> {
    let mut out: HashMap<String, V> = read_json_optional(monolithic)?.unwrap_or_default();

    if shards_dir.is_dir() {
        for entry in std::fs::read_dir(shards_dir).map_err(|e| EngineError::io(shards_dir, e))? {
            let entry = entry.map_err(|e| EngineError::io(shards_dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let shard: HashMap<String, V> = read_json_optional(&path)?.unwrap_or_default();
            out.extend(shard);
        }
    }

    Ok(out)
}

/// Replace the entire sharded index with `entries`, removing the monolithic
/// file and any previously written shards that no longer apply. Used by
/// rehydration, which always rebuilds from scratch.
pub fn replace_all<V: Serialize>(
    shards_dir: &Path,
    monolithic: &Path,
    entries: HashMap<String, V>,
) -> Result<(), EngineError> {
    if shards_dir.is_dir() {
        std::fs::remove_dir_all(shards_dir).map_err(|e| EngineError::io(shards_dir, e))?;
    }
    if monolithic.exists() {
        std::fs::remove_file(monolithic).map_err(|e| EngineError::io(monolithic, e))?;
    }

    let mut by_shard: HashMap<String, HashMap<String, V>> = HashMap::new();
    for (id, value) in entries {
        by_shard.entry(shard_key(&id)).or_default().insert(id, value);
    }

    std::fs::create_dir_all(shards_dir).map_err(|e| EngineError::io(shards_dir, e))?;
    for (key, map) in by_shard {
        write_json_atomic(&shards_dir.join(format!("{key}.json")), &map)?;
    }
    Ok(())
}
