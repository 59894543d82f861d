//! The task and log store.
//!
//! [`TaskLogStore`] owns the ordered `tasks` and `logs` collections and
//! their id counters. It is loaded once through a [`Persistence`] backend,
//! mutated in memory, and every task mutation is written back eagerly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::persistence::{CollectionKind, CollectionState, Persistence};
use crate::record::{ID_FIELD, Record, coerce_id, has_id, record_id};

/// How auto-assigned task ids relate to ids supplied by callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// Accept caller ids verbatim and never move the counter for them.
    /// Auto-assigned ids may then collide with caller-supplied ones.
    #[default]
    Passthrough,
    /// Keep the counter above every id ever stored, including ones loaded
    /// at startup.
    Reconcile,
}

/// Tunables for [`TaskLogStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    pub id_policy: IdPolicy,
}

/// Outcome of [`TaskLogStore::save_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The task had no id; it was given this one and appended.
    Assigned(i64),
    /// An existing task with this id was replaced in place.
    Replaced(i64),
    /// No task had this caller-supplied id; the record was appended.
    Appended(i64),
}

/// In-memory task and log collections with an injected persistence backend.
pub struct TaskLogStore {
    tasks: CollectionState,
    logs: CollectionState,
    persistence: Box<dyn Persistence>,
    options: StoreOptions,
}

impl TaskLogStore {
    /// Load both collections from `persistence`.
    ///
    /// Unreadable stored text has already been replaced by an empty
    /// collection in the backend; only a failing backend is an error here.
    pub async fn initialize(
        persistence: impl Persistence + 'static,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let state = persistence.load().await?;

        let mut store = Self {
            tasks: state.tasks,
            logs: state.logs,
            persistence: Box::new(persistence),
            options,
        };

        if store.options.id_policy == IdPolicy::Reconcile {
            let max = store.tasks.records.iter().filter_map(record_id).max();
            if let Some(max) = max {
                store.raise_task_counter_past(max);
            }
        }

        info!(
            backend = store.persistence.name(),
            tasks = store.tasks.records.len(),
            logs = store.logs.records.len(),
            next_task_id = store.tasks.next_id,
            "task log store initialized"
        );
        Ok(store)
    }

    /// Flush both collections and release the backend.
    pub async fn shutdown(self) -> StoreResult<()> {
        self.persist(CollectionKind::Tasks).await?;
        self.persist(CollectionKind::Logs).await?;
        info!(backend = self.persistence.name(), "task log store shut down");
        Ok(())
    }

    // ── tasks ────────────────────────────────────────────────────────

    /// All tasks in store order.
    pub fn tasks(&self) -> &[Record] {
        &self.tasks.records
    }

    /// All tasks as a JSON array string.
    pub fn tasks_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(&self.tasks.records)?)
    }

    /// Counter value the next id-less task will receive.
    pub fn next_task_id(&self) -> i64 {
        self.tasks.next_id
    }

    /// Insert or replace a task, then persist the task collection.
    ///
    /// A task without an `id` (or with `id: null`) gets the counter value
    /// and is appended. A task whose coerced `id` matches an existing one
    /// replaces it at the same position; otherwise it is appended as-is.
    #[instrument(skip(self, task))]
    pub async fn save_task(&mut self, mut task: Record) -> StoreResult<SaveOutcome> {
        let outcome = if has_id(&task) {
            let id = task
                .get(ID_FIELD)
                .and_then(coerce_id)
                .ok_or_else(|| StoreError::InvalidArgument("task id must be a number".into()))?;

            match self.tasks.records.iter().position(|t| record_id(t) == Some(id)) {
                Some(index) => {
                    self.tasks.records[index] = task;
                    SaveOutcome::Replaced(id)
                }
                None => {
                    self.tasks.records.push(task);
                    if self.options.id_policy == IdPolicy::Reconcile {
                        self.raise_task_counter_past(id);
                    }
                    SaveOutcome::Appended(id)
                }
            }
        } else {
            let id = self.tasks.next_id;
            let next = id
                .checked_add(1)
                .ok_or_else(|| StoreError::InvalidArgument("task id counter exhausted".into()))?;
            self.tasks.next_id = next;
            task.insert(ID_FIELD.to_string(), Value::from(id));
            self.tasks.records.push(task);
            SaveOutcome::Assigned(id)
        };

        debug!(?outcome, tasks = self.tasks.records.len(), "task saved");
        self.persist(CollectionKind::Tasks).await?;
        Ok(outcome)
    }

    /// Remove every task whose coerced `id` equals `task_id` and persist.
    ///
    /// Returns how many tasks were removed; zero is not an error.
    #[instrument(skip(self))]
    pub async fn delete_task(&mut self, task_id: i64) -> StoreResult<usize> {
        let before = self.tasks.records.len();
        self.tasks
            .records
            .retain(|t| record_id(t) != Some(task_id));
        let removed = before - self.tasks.records.len();

        debug!(removed, tasks = self.tasks.records.len(), "task delete applied");
        self.persist(CollectionKind::Tasks).await?;
        Ok(removed)
    }

    // ── logs ─────────────────────────────────────────────────────────

    /// The oldest `limit` log records, in store order.
    pub fn logs(&self, limit: i64) -> StoreResult<&[Record]> {
        let limit = usize::try_from(limit).map_err(|_| {
            StoreError::InvalidArgument(format!("limit must not be negative, got {limit}"))
        })?;
        let end = limit.min(self.logs.records.len());
        Ok(&self.logs.records[..end])
    }

    /// The oldest `limit` log records as a JSON array string.
    pub fn logs_json(&self, limit: i64) -> StoreResult<String> {
        Ok(serde_json::to_string(self.logs(limit)?)?)
    }

    /// Counter kept alongside the log collection. Nothing in this crate
    /// assigns log ids; the value is only carried through persistence.
    pub fn next_log_id(&self) -> i64 {
        self.logs.next_id
    }

    /// Empty the log collection and persist it.
    ///
    /// Never fails: a persistence error is logged and the in-memory clear
    /// stands.
    #[instrument(skip(self))]
    pub async fn clear_logs(&mut self) {
        let cleared = self.logs.records.len();
        self.logs.records.clear();
        debug!(cleared, "logs cleared");

        if let Err(err) = self.persist(CollectionKind::Logs).await {
            warn!(%err, "failed to persist cleared logs");
        }
    }

    // ── internals ────────────────────────────────────────────────────

    fn raise_task_counter_past(&mut self, id: i64) {
        if id >= self.tasks.next_id {
            let next = id.saturating_add(1);
            debug!(from = self.tasks.next_id, to = next, "task counter reconciled");
            self.tasks.next_id = next;
        }
    }

    async fn persist(&self, kind: CollectionKind) -> StoreResult<()> {
        let state = match kind {
            CollectionKind::Tasks => &self.tasks,
            CollectionKind::Logs => &self.logs,
        };
        self.persistence.save(kind, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryPersistence, PersistedState};
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn labels(store: &TaskLogStore) -> Vec<&str> {
        store
            .tasks()
            .iter()
            .map(|t| t["label"].as_str().unwrap())
            .collect()
    }

    async fn empty_store() -> (TaskLogStore, MemoryPersistence) {
        let persistence = MemoryPersistence::new();
        let store = TaskLogStore::initialize(persistence.clone(), StoreOptions::default())
            .await
            .unwrap();
        (store, persistence)
    }

    async fn store_with_logs(logs: &[&str]) -> TaskLogStore {
        let state = PersistedState {
            logs: CollectionState {
                records: logs.iter().map(|m| record(json!({"msg": m}))).collect(),
                next_id: 1,
            },
            ..PersistedState::default()
        };
        TaskLogStore::initialize(MemoryPersistence::with_state(state), StoreOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn save_without_id_assigns_and_appends() {
        let (mut store, _) = empty_store().await;

        let outcome = store.save_task(record(json!({"name": "x"}))).await.unwrap();

        assert_eq!(outcome, SaveOutcome::Assigned(1));
        assert_eq!(store.tasks(), &[record(json!({"name": "x", "id": 1}))]);
        assert_eq!(store.next_task_id(), 2);
    }

    #[tokio::test]
    async fn null_id_is_treated_as_missing() {
        let (mut store, _) = empty_store().await;

        let outcome = store
            .save_task(record(json!({"id": null, "name": "x"})))
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::Assigned(1));
        assert_eq!(store.tasks()[0]["id"], json!(1));
    }

    #[tokio::test]
    async fn counter_never_reuses_deleted_ids() {
        let (mut store, _) = empty_store().await;

        for label in ["a", "b", "c"] {
            store.save_task(record(json!({"label": label}))).await.unwrap();
        }
        store.delete_task(3).await.unwrap();
        store.delete_task(2).await.unwrap();
        let outcome = store.save_task(record(json!({"label": "d"}))).await.unwrap();

        assert_eq!(outcome, SaveOutcome::Assigned(4));
    }

    #[tokio::test]
    async fn matching_id_replaces_in_place() {
        let (mut store, _) = empty_store().await;
        for label in ["a", "b", "c"] {
            store.save_task(record(json!({"label": label}))).await.unwrap();
        }

        let outcome = store
            .save_task(record(json!({"id": 2.0, "label": "B"})))
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::Replaced(2));
        assert_eq!(labels(&store), ["a", "B", "c"]);
        // Full replace: the stored record is exactly what was supplied.
        assert_eq!(store.tasks()[1], record(json!({"id": 2.0, "label": "B"})));
    }

    #[tokio::test]
    async fn unknown_id_appends_without_moving_counter() {
        let (mut store, _) = empty_store().await;

        let outcome = store
            .save_task(record(json!({"id": 10, "label": "x"})))
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::Appended(10));
        assert_eq!(store.next_task_id(), 1);
    }

    #[tokio::test]
    async fn passthrough_allows_duplicate_ids() {
        let (mut store, _) = empty_store().await;

        store.save_task(record(json!({"id": 1, "label": "manual"}))).await.unwrap();
        store.save_task(record(json!({"label": "auto"}))).await.unwrap();

        let ids: Vec<_> = store.tasks().iter().filter_map(record_id).collect();
        assert_eq!(ids, [1, 1]);
    }

    #[tokio::test]
    async fn reconcile_keeps_counter_ahead() {
        let mut store = TaskLogStore::initialize(
            MemoryPersistence::new(),
            StoreOptions {
                id_policy: IdPolicy::Reconcile,
            },
        )
        .await
        .unwrap();

        store.save_task(record(json!({"id": 5, "label": "manual"}))).await.unwrap();
        let outcome = store.save_task(record(json!({"label": "auto"}))).await.unwrap();

        assert_eq!(outcome, SaveOutcome::Assigned(6));
    }

    #[tokio::test]
    async fn reconcile_applies_to_loaded_tasks() {
        let state = PersistedState {
            tasks: CollectionState {
                records: vec![record(json!({"id": 8})), record(json!({"id": "bad"}))],
                next_id: 2,
            },
            ..PersistedState::default()
        };
        let store = TaskLogStore::initialize(
            MemoryPersistence::with_state(state),
            StoreOptions {
                id_policy: IdPolicy::Reconcile,
            },
        )
        .await
        .unwrap();

        assert_eq!(store.next_task_id(), 9);
    }

    #[tokio::test]
    async fn reconcile_counter_exhaustion_is_rejected() {
        let persistence = MemoryPersistence::new();
        let mut store = TaskLogStore::initialize(
            persistence.clone(),
            StoreOptions {
                id_policy: IdPolicy::Reconcile,
            },
        )
        .await
        .unwrap();

        store
            .save_task(record(json!({"id": i64::MAX, "label": "last"})))
            .await
            .unwrap();
        assert_eq!(store.next_task_id(), i64::MAX);

        let err = store
            .save_task(record(json!({"label": "auto"})))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(labels(&store), ["last"]);
        assert_eq!(store.next_task_id(), i64::MAX);
        assert_eq!(persistence.snapshot().unwrap().tasks.records.len(), 1);
    }

    #[tokio::test]
    async fn passthrough_counter_exhaustion_is_rejected() {
        let state = PersistedState {
            tasks: CollectionState {
                records: vec![record(json!({"id": 1, "label": "first"}))],
                next_id: i64::MAX,
            },
            ..PersistedState::default()
        };
        let persistence = MemoryPersistence::with_state(state);
        let mut store = TaskLogStore::initialize(persistence.clone(), StoreOptions::default())
            .await
            .unwrap();

        let err = store
            .save_task(record(json!({"label": "auto"})))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(labels(&store), ["first"]);
        assert_eq!(store.next_task_id(), i64::MAX);
        assert_eq!(persistence.snapshot().unwrap().tasks.next_id, i64::MAX);
    }

    #[tokio::test]
    async fn non_numeric_id_is_rejected_without_mutation() {
        let (mut store, persistence) = empty_store().await;

        let err = store
            .save_task(record(json!({"id": "seven"})))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(store.tasks().is_empty());
        assert!(persistence.snapshot().unwrap().tasks.records.is_empty());
    }

    #[tokio::test]
    async fn task_mutations_are_persisted_eagerly() {
        let (mut store, persistence) = empty_store().await;

        store.save_task(record(json!({"label": "A"}))).await.unwrap();
        let saved = persistence.snapshot().unwrap().tasks;
        assert_eq!(saved.records.len(), 1);
        assert_eq!(saved.next_id, 2);

        store.delete_task(1).await.unwrap();
        assert!(persistence.snapshot().unwrap().tasks.records.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_every_match_and_ignores_misses() {
        let (mut store, _) = empty_store().await;
        store.save_task(record(json!({"id": 1, "label": "a"}))).await.unwrap();
        store.save_task(record(json!({"id": 2, "label": "b"}))).await.unwrap();
        store.save_task(record(json!({"id": 1.0, "label": "c"}))).await.unwrap();

        assert_eq!(store.delete_task(42).await.unwrap(), 0);
        assert_eq!(labels(&store), ["c", "b"]);

        assert_eq!(store.delete_task(1).await.unwrap(), 1);
        assert_eq!(labels(&store), ["b"]);
    }

    #[tokio::test]
    async fn scenario_save_save_delete() {
        let (mut store, _) = empty_store().await;

        store.save_task(record(json!({"label": "A"}))).await.unwrap();
        store.save_task(record(json!({"label": "B"}))).await.unwrap();
        store.delete_task(1).await.unwrap();

        let tasks: Value = serde_json::from_str(&store.tasks_json().unwrap()).unwrap();
        assert_eq!(tasks, json!([{"label": "B", "id": 2}]));
    }

    #[tokio::test]
    async fn logs_returns_oldest_first() {
        let store = store_with_logs(&["A", "B", "C", "D"]).await;

        let logs: Value = serde_json::from_str(&store.logs_json(2).unwrap()).unwrap();

        assert_eq!(logs, json!([{"msg": "A"}, {"msg": "B"}]));
        assert_eq!(store.logs(200).unwrap().len(), 4);
        assert!(store.logs(0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn negative_log_limit_is_rejected() {
        let store = store_with_logs(&["A"]).await;

        assert!(matches!(
            store.logs(-1),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn clear_logs_empties_and_persists() {
        let mut store = store_with_logs(&["A", "B"]).await;

        store.clear_logs().await;

        assert_eq!(store.logs_json(200).unwrap(), "[]");
        assert_eq!(store.next_log_id(), 1);
    }

    #[tokio::test]
    async fn shutdown_flushes_both_collections() {
        let persistence = MemoryPersistence::new();
        let mut store = TaskLogStore::initialize(persistence.clone(), StoreOptions::default())
            .await
            .unwrap();
        store.save_task(record(json!({"label": "A"}))).await.unwrap();

        store.shutdown().await.unwrap();

        let state = persistence.snapshot().unwrap();
        assert_eq!(state.tasks.records.len(), 1);
        assert_eq!(state.logs, CollectionState::default());
    }
}
