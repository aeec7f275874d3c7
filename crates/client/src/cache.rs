//! Cached query results keyed like the server's read endpoints.
//!
//! Invalidation marks entries stale rather than dropping them, so a reader
//! can still show the old value while it refetches. Matching is by key
//! prefix: invalidating `["projects"]` also covers any key that starts with
//! that segment.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use vidgen_core::types::DbId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Projects,
    Project(DbId),
    ProjectVideos(DbId),
    Videos,
    /// Status of one generation, scoped to its project when known.
    GenerationStatus(Option<DbId>, String),
    Discoveries,
}

impl QueryKey {
    pub fn segments(&self) -> Vec<String> {
        match self {
            Self::Projects => vec!["projects".into()],
            Self::Project(id) => vec!["project".into(), id.to_string()],
            Self::ProjectVideos(id) => vec!["project-videos".into(), id.to_string()],
            Self::Videos => vec!["videos".into()],
            Self::GenerationStatus(project_id, generation_id) => {
                let mut segments = vec!["generation-status".to_string()];
                if let Some(project_id) = project_id {
                    segments.push(project_id.to_string());
                }
                segments.push(generation_id.clone());
                segments
            }
            Self::Discoveries => vec!["discoveries".into()],
        }
    }

    fn covers(&self, other: &QueryKey) -> bool {
        other.segments().starts_with(&self.segments())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stale: bool,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: QueryKey, value: Value) {
        self.lock().insert(key, CacheEntry { value, stale: false });
    }

    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.lock().get(key).map(|entry| entry.value.clone())
    }

    /// `None` when the key has never been cached.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.lock().get(key).map(|entry| entry.stale)
    }

    /// Mark every entry under `key` stale. Returns how many were marked.
    pub fn invalidate(&self, key: &QueryKey) -> usize {
        let mut entries = self.lock();
        let mut marked = 0;
        for (cached, entry) in entries.iter_mut() {
            if key.covers(cached) {
                entry.stale = true;
                marked += 1;
            }
        }
        marked
    }

    pub fn remove(&self, key: &QueryKey) -> Option<Value> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Refresh what a finished generation changed.
    ///
    /// The project list and the video list always go stale; with a project
    /// its detail and its videos do too. The generation's own status
    /// entries are removed either way.
    pub fn invalidate_generation(&self, project_id: Option<DbId>, generation_id: &str) {
        let keys = match project_id {
            Some(id) => vec![
                QueryKey::Project(id),
                QueryKey::ProjectVideos(id),
                QueryKey::Projects,
                QueryKey::Videos,
            ],
            None => vec![QueryKey::Projects, QueryKey::Videos],
        };
        for key in &keys {
            self.invalidate(key);
        }

        self.lock().retain(|key, _| {
            !matches!(key, QueryKey::GenerationStatus(_, id) if id == generation_id)
        });
        tracing::debug!(?project_id, generation_id, "Invalidated generation queries");
    }

    /// Mark every cached entry stale, e.g. after a flow failed halfway and
    /// it is unknown which records it touched.
    pub fn invalidate_all(&self) -> usize {
        let mut entries = self.lock();
        for entry in entries.values_mut() {
            entry.stale = true;
        }
        entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
