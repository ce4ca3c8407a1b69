//! Client-side cache for form configuration.
//!
//! Two key-value stores stand in for the browser's persistent and
//! per-session storage. All keys that belong to a project come from
//! [`cache_keys_for`], so invalidation never depends on a hand-maintained
//! list of patterns.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::forms::questions::QuestionKind;

/// Key under which the most recently loaded project id is kept.
pub const LAST_PROJECT_KEY: &str = "form-data:last-project";

const QUERY_PREFIX: &str = "form-cache";
const SAVED_FLAG_SUFFIX: &str = "saved";

/// Minimal string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: String);
    /// Remove a value, returning whether it existed.
    fn remove(&self, key: &str) -> bool;
    /// All keys currently stored.
    fn keys(&self) -> Vec<String>;
    /// Remove everything.
    fn clear(&self);
}

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().cloned().collect()
    }

    fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

/// Query-cache key for one question type of a project.
pub fn query_key(project_id: &str, kind: QuestionKind) -> String {
    let coords = kind.coordinates();
    format!(
        "{}:{}:{}:{}:{}",
        QUERY_PREFIX, project_id, coords.phase_id, coords.step_id, coords.activity_id
    )
}

/// "Has this ever been saved" flag key for one question type of a project.
pub fn saved_flag_key(project_id: &str, kind: QuestionKind) -> String {
    format!("{}-{}:{}", kind.as_str(), SAVED_FLAG_SUFFIX, project_id)
}

/// Every cache key that holds data for `project_id`.
pub fn cache_keys_for(project_id: &str) -> Vec<String> {
    QuestionKind::ALL
        .iter()
        .flat_map(|kind| [query_key(project_id, *kind), saved_flag_key(project_id, *kind)])
        .collect()
}

/// Persistent and per-session stores used by the form loaders.
#[derive(Clone)]
pub struct ClientCache {
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl ClientCache {
    /// Create a cache over the given stores.
    pub fn new(local: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self { local, session }
    }

    /// Create a cache backed by two fresh [`MemoryStore`]s.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// The persistent store.
    pub fn local(&self) -> &Arc<dyn KeyValueStore> {
        &self.local
    }

    /// The per-session store.
    pub fn session(&self) -> &Arc<dyn KeyValueStore> {
        &self.session
    }

    /// Read a cached query result. Undecodable entries are dropped.
    pub fn get_query<T: DeserializeOwned>(&self, project_id: &str, kind: QuestionKind) -> Option<T> {
        let key = query_key(project_id, kind);
        let raw = self.session.get(&key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %key, "Form cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding corrupt form cache entry");
                self.session.remove(&key);
                None
            }
        }
    }

    /// Store a query result.
    pub fn put_query<T: Serialize>(&self, project_id: &str, kind: QuestionKind, value: &T) {
        let key = query_key(project_id, kind);
        match serde_json::to_string(value) {
            Ok(raw) => self.session.set(&key, raw),
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize form cache entry"),
        }
    }

    /// Drop a single query-cache entry.
    pub fn invalidate_query(&self, project_id: &str, kind: QuestionKind) {
        self.session.remove(&query_key(project_id, kind));
    }

    /// Whether a question type was ever saved for the project.
    pub fn saved_flag(&self, project_id: &str, kind: QuestionKind) -> bool {
        self.local
            .get(&saved_flag_key(project_id, kind))
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    /// Record that a question type was saved for the project.
    pub fn set_saved_flag(&self, project_id: &str, kind: QuestionKind) {
        self.local
            .set(&saved_flag_key(project_id, kind), "true".to_string());
    }

    /// Project id stashed by the previous load.
    pub fn last_project(&self) -> Option<String> {
        self.local.get(LAST_PROJECT_KEY)
    }

    /// Remember the project id of the current load.
    pub fn set_last_project(&self, project_id: &str) {
        self.local.set(LAST_PROJECT_KEY, project_id.to_string());
    }

    /// Drop only the saved flags of a project.
    pub fn clear_saved_flags(&self, project_id: &str) {
        for kind in QuestionKind::ALL {
            self.local.remove(&saved_flag_key(project_id, kind));
        }
    }

    /// Remove every key of [`cache_keys_for`] from both stores.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_project(&self, project_id: &str) -> usize {
        let mut removed = 0;
        for key in cache_keys_for(project_id) {
            if self.local.remove(&key) {
                removed += 1;
            }
            if self.session.remove(&key) {
                removed += 1;
            }
        }
        debug!(project_id = %project_id, removed, "Invalidated form cache");
        removed
    }
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::in_memory()
    }
}
