//! # Registry Store
//!
//! Durable map from composite key (`scope_id + "_" + resource_name`) to entry.
//! One `Registry` per entry kind; the two maps are independent, so the same key
//! may appear in both.
//!
//! Persistence is a whole-map overwrite on every mutation. Snapshots are written
//! to a sibling temp file and renamed over the target, so a crash mid-write leaves
//! the previous snapshot intact.
//!
//! A missing or unreadable document loads as an empty map. Documents written
//! before keys carried the scope prefix are migrated on load and re-persisted once.
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::entry::{composite_key, key_scope, valid_name, RegistryEntry, KEY_SEPARATOR};
use crate::error::RegistryError;

/// Returned when a key is already held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupied {
    /// Requester that owns the existing entry.
    pub requester_id: String,
}

/// File-backed snapshot storage for one registry document.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document, migrating legacy keys.
    ///
    /// Returns the map and whether a migration happened (the caller must then
    /// persist once).
    pub fn load<E>(&self) -> (BTreeMap<String, E>, bool)
    where
        E: RegistryEntry + DeserializeOwned,
    {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No registry at {}. Starting empty.", self.path.display());
                return (BTreeMap::new(), false);
            }
            Err(e) => {
                log::warn!("Failed to read registry {}: {}. Starting empty.", self.path.display(), e);
                return (BTreeMap::new(), false);
            }
        };

        let document: BTreeMap<String, Value> = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Unparseable registry {}: {}. Starting empty.", self.path.display(), e);
                return (BTreeMap::new(), false);
            }
        };

        let mut entries = BTreeMap::new();
        let mut legacy = Vec::new();

        for (key, value) in document {
            let mut entry: E = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping malformed registry entry '{}' in {}: {}", key, self.path.display(), e);
                    continue;
                }
            };

            match key_scope(&key) {
                Some(_) => {
                    if entry.watch().resource_name.is_empty() {
                        if let Some((_, name)) = key.split_once(KEY_SEPARATOR) {
                            entry.watch_mut().resource_name = name.to_string();
                        }
                    }
                    entries.insert(key, entry);
                }
                None => legacy.push((key, entry)),
            }
        }

        let migrated = !legacy.is_empty();
        for (bare, mut entry) in legacy {
            let watch = entry.watch_mut();
            let recorded = if watch.resource_name.is_empty() { bare.as_str() } else { watch.resource_name.as_str() };
            let Some(name) = valid_name(recorded) else {
                log::warn!("Dropping legacy registry key '{}': no valid resource name.", bare);
                continue;
            };
            watch.resource_name = name;
            let key = composite_key(&watch.scope_id, &watch.resource_name);
            if entries.contains_key(&key) {
                log::warn!("Legacy key '{}' collides with '{}'. Keeping the existing entry.", bare, key);
                continue;
            }
            log::info!("Migrated legacy registry key '{}' -> '{}'", bare, key);
            entries.insert(key, entry);
        }

        (entries, migrated)
    }

    /// Overwrites the document with `entries`.
    pub fn save_snapshot<E>(&self, entries: &BTreeMap<String, E>) -> Result<(), RegistryError>
    where
        E: Serialize,
    {
        let json = serde_json::to_string_pretty(entries)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source| RegistryError::Io { path: self.path.clone(), source };

        fs::create_dir_all(&dir).map_err(io_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// In-memory registry backed by a `RegistryStore`.
///
/// Entries are never edited in place: they are inserted, read, and removed.
#[derive(Debug)]
pub struct Registry<E> {
    store: RegistryStore,
    entries: BTreeMap<String, E>,
}

impl<E> Registry<E>
where
    E: RegistryEntry + Serialize + DeserializeOwned,
{
    /// Loads the registry at `path`, re-persisting once if legacy keys were migrated.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let store = RegistryStore::new(path);
        let (entries, migrated) = store.load::<E>();
        let registry = Self { store, entries };

        if migrated {
            if let Err(e) = registry.save() {
                log::error!("Failed to persist migrated registry {}: {}", registry.store.path().display(), e);
            }
        }
        log::info!("Loaded {} entries from {}", registry.entries.len(), registry.store.path().display());
        registry
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&E> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, E> {
        &self.entries
    }

    /// Snapshot of the current key set, safe to iterate while removing.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Inserts `entry` under `key` unless some requester already holds it.
    pub fn insert_vacant(&mut self, key: String, entry: E) -> Result<(), Occupied> {
        if let Some(existing) = self.entries.get(&key) {
            return Err(Occupied { requester_id: existing.watch().requester_id.clone() });
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Removes `key`. Removing an absent key is a no-op returning `None`.
    pub fn remove(&mut self, key: &str) -> Option<E> {
        self.entries.remove(key)
    }

    /// Removes `key` only if it is held by `requester_id`.
    pub fn remove_owned(&mut self, key: &str, requester_id: &str) -> Option<E> {
        match self.entries.get(key) {
            Some(entry) if entry.watch().requester_id == requester_id => self.entries.remove(key),
            _ => None,
        }
    }

    /// Entries created by `requester_id` whose key belongs to `scope_id`.
    pub fn owned_in_scope<'a>(&'a self, scope_id: &'a str, requester_id: &'a str) -> impl Iterator<Item = &'a E> + 'a {
        self.entries
            .iter()
            .filter(move |(key, entry)| key_scope(key) == Some(scope_id) && entry.watch().requester_id == requester_id)
            .map(|(_, entry)| entry)
    }

    /// Persists the full map.
    pub fn save(&self) -> Result<(), RegistryError> {
        self.store.save_snapshot(&self.entries)
    }
}
