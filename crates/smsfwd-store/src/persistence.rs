//! Pluggable persistence for the task and log collections.
//!
//! [`crate::TaskLogStore`] talks to storage only through [`Persistence`]:
//! one `load` at startup and one full-overwrite `save` per mutated
//! collection. Two backends ship with the crate:
//!
//! - [`PreferencePersistence`] keeps both collections as JSON text in a
//!   named [`Preferences`] store and survives restarts.
//! - [`MemoryPersistence`] keeps them for the life of the process only.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::preferences::Preferences;
use crate::record::Record;

/// Preference key holding the serialized task array.
pub const TASKS_KEY: &str = "tasks";
/// Preference key holding the next auto-assigned task id.
pub const NEXT_TASK_ID_KEY: &str = "next_task_id";
/// Preference key holding the serialized log array.
pub const LOGS_KEY: &str = "logs";
/// Preference key holding the next log id.
pub const NEXT_LOG_ID_KEY: &str = "next_log_id";

/// Which of the two collections a save targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Tasks,
    Logs,
}

impl CollectionKind {
    fn keys(self) -> (&'static str, &'static str) {
        match self {
            Self::Tasks => (TASKS_KEY, NEXT_TASK_ID_KEY),
            Self::Logs => (LOGS_KEY, NEXT_LOG_ID_KEY),
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tasks => write!(f, "tasks"),
            Self::Logs => write!(f, "logs"),
        }
    }
}

/// One ordered collection plus its id counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionState {
    pub records: Vec<Record>,
    pub next_id: i64,
}

impl Default for CollectionState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
        }
    }
}

/// Everything the store loads at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub tasks: CollectionState,
    pub logs: CollectionState,
}

impl PersistedState {
    fn collection_mut(&mut self, kind: CollectionKind) -> &mut CollectionState {
        match kind {
            CollectionKind::Tasks => &mut self.tasks,
            CollectionKind::Logs => &mut self.logs,
        }
    }
}

/// Backing storage for [`crate::TaskLogStore`].
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Short backend name for logs and status output.
    fn name(&self) -> &str;

    /// Load both collections. Unreadable collection text is not an error:
    /// implementations return that collection empty instead.
    async fn load(&self) -> StoreResult<PersistedState>;

    /// Overwrite one collection and its counter.
    async fn save(&self, kind: CollectionKind, state: &CollectionState) -> StoreResult<()>;
}

// ═══════════════════════════════════════════════════════════════════════
//  Preference-backed
// ═══════════════════════════════════════════════════════════════════════

/// Persists collections as JSON arrays inside a named preference store.
#[derive(Clone)]
pub struct PreferencePersistence {
    prefs: Preferences,
}

impl PreferencePersistence {
    pub fn new(prefs: Preferences) -> Self {
        Self { prefs }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    async fn load_collection(&self, kind: CollectionKind) -> StoreResult<CollectionState> {
        let (records_key, counter_key) = kind.keys();

        let raw = self
            .prefs
            .get_string(records_key)
            .await?
            .unwrap_or_else(|| "[]".to_string());
        let records = parse_records(&raw).unwrap_or_else(|err| {
            warn!(collection = %kind, %err, "stored collection is unreadable, starting empty");
            Vec::new()
        });
        let next_id = self.prefs.get_i64(counter_key).await?.unwrap_or(1);

        debug!(collection = %kind, records = records.len(), next_id, "collection loaded");
        Ok(CollectionState { records, next_id })
    }
}

#[async_trait]
impl Persistence for PreferencePersistence {
    fn name(&self) -> &str {
        "preferences"
    }

    async fn load(&self) -> StoreResult<PersistedState> {
        Ok(PersistedState {
            tasks: self.load_collection(CollectionKind::Tasks).await?,
            logs: self.load_collection(CollectionKind::Logs).await?,
        })
    }

    async fn save(&self, kind: CollectionKind, state: &CollectionState) -> StoreResult<()> {
        let (records_key, counter_key) = kind.keys();
        let text = serde_json::to_string(&state.records)?;

        self.prefs
            .edit()
            .put_string(records_key, text)
            .put_i64(counter_key, state.next_id)
            .apply()
            .await
    }
}

/// Parse a stored collection. Any element that is not an object
/// invalidates the whole array.
pub fn parse_records(raw: &str) -> Result<Vec<Record>, serde_json::Error> {
    serde_json::from_str(raw)
}

// ═══════════════════════════════════════════════════════════════════════
//  Memory-only
// ═══════════════════════════════════════════════════════════════════════

/// Process-lifetime persistence. Clones share the same snapshot.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    state: Arc<Mutex<PersistedState>>,
}

impl MemoryPersistence {
    /// Start empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from `state`, as if it had been saved earlier in this process.
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Copy of the most recently saved state.
    pub fn snapshot(&self) -> StoreResult<PersistedState> {
        self.state
            .lock()
            .map(|state| state.clone())
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> StoreResult<PersistedState> {
        self.snapshot()
    }

    async fn save(&self, kind: CollectionKind, state: &CollectionState) -> StoreResult<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        *guard.collection_mut(kind) = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;

    async fn setup() -> PreferencePersistence {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        PreferencePersistence::new(Preferences::new(db, "test_prefs"))
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn first_run_loads_empty_with_counters_at_one() {
        let persistence = setup().await;

        let state = persistence.load().await.unwrap();

        assert_eq!(state, PersistedState::default());
        assert_eq!(state.tasks.next_id, 1);
        assert_eq!(state.logs.next_id, 1);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_one_collection() {
        let persistence = setup().await;
        let tasks = CollectionState {
            records: vec![record(json!({"label": "A", "id": 1}))],
            next_id: 2,
        };

        persistence.save(CollectionKind::Tasks, &tasks).await.unwrap();
        let state = persistence.load().await.unwrap();

        assert_eq!(state.tasks, tasks);
        assert_eq!(state.logs, CollectionState::default());
    }

    #[tokio::test]
    async fn malformed_text_loads_empty_but_keeps_counter() {
        let persistence = setup().await;
        persistence
            .preferences()
            .edit()
            .put_string(TASKS_KEY, "{not json")
            .put_i64(NEXT_TASK_ID_KEY, 9)
            .apply()
            .await
            .unwrap();

        let state = persistence.load().await.unwrap();

        assert!(state.tasks.records.is_empty());
        assert_eq!(state.tasks.next_id, 9);
    }

    #[tokio::test]
    async fn non_object_element_discards_whole_collection() {
        let persistence = setup().await;
        persistence
            .preferences()
            .edit()
            .put_string(LOGS_KEY, r#"[{"msg":"a"}, 3]"#)
            .apply()
            .await
            .unwrap();

        let state = persistence.load().await.unwrap();

        assert!(state.logs.records.is_empty());
    }

    #[tokio::test]
    async fn memory_persistence_keeps_last_save() {
        let persistence = MemoryPersistence::new();
        let logs = CollectionState {
            records: vec![record(json!({"msg": "hi"}))],
            next_id: 5,
        };

        persistence.save(CollectionKind::Logs, &logs).await.unwrap();

        let state = persistence.load().await.unwrap();
        assert_eq!(state.logs, logs);
        assert_eq!(state.tasks, CollectionState::default());
        assert_eq!(persistence.name(), "memory");
    }
}
