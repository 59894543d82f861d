//! # smsfwd-store
//!
//! Task and log storage for sms-forwarder.
//!
//! The store keeps two ordered collections of caller-owned records
//! (`tasks`, `logs`) plus an id counter for each. It knows nothing about
//! the records beyond their `id` field. Storage is pluggable:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  TaskLogStore (collections + counters)       │
//! ├──────────────────────────────────────────────┤
//! │  Persistence trait                           │
//! │   ├─ PreferencePersistence ─ Preferences     │
//! │   │                          Database (WAL)  │
//! │   └─ MemoryPersistence (process lifetime)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use smsfwd_store::{Database, Preferences, PreferencePersistence, StoreOptions, TaskLogStore};
//!
//! let db = Database::open_and_migrate("data/sms_forwarder.db").await?;
//! let prefs = Preferences::new(db, smsfwd_store::DEFAULT_PREFERENCES_NAME);
//! let mut store =
//!     TaskLogStore::initialize(PreferencePersistence::new(prefs), StoreOptions::default()).await?;
//! store.save_task(serde_json::json!({"label": "forward bank"}).as_object().cloned().unwrap()).await?;
//! ```

pub mod db;
pub mod error;
pub mod migration;
pub mod persistence;
pub mod preferences;
pub mod record;
pub mod task_log;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use persistence::{
    CollectionKind, CollectionState, MemoryPersistence, PersistedState, Persistence,
    PreferencePersistence,
};
pub use preferences::{DEFAULT_PREFERENCES_NAME, PreferenceEditor, Preferences};
pub use record::{Record, coerce_id, record_id};
pub use task_log::{IdPolicy, SaveOutcome, StoreOptions, TaskLogStore};
