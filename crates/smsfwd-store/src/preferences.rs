//! Named, typed key/value preference store.
//!
//! A [`Preferences`] handle is scoped by a store name (the application uses
//! `sms_forwarder_prefs`) and holds string and 64-bit integer entries in the
//! `preferences` table. Writes are staged on a [`PreferenceEditor`] and
//! committed together by [`PreferenceEditor::apply`].

use tracing::{debug, instrument, warn};

use crate::db::Database;
use crate::error::StoreResult;

/// Default store name used by the sms-forwarder application.
pub const DEFAULT_PREFERENCES_NAME: &str = "sms_forwarder_prefs";

/// Value type recorded alongside each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Long,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Long => "long",
        }
    }
}

#[derive(Debug, Clone)]
enum Change {
    Put { key: String, kind: Kind, value: String },
    Remove { key: String },
}

/// Handle to one named preference store.
#[derive(Clone)]
pub struct Preferences {
    db: Database,
    name: String,
}

impl Preferences {
    /// Open the preference store called `name` inside `db`.
    pub fn new(db: Database, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
        }
    }

    /// Name this store is scoped by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a string entry, returning `None` if absent or stored as an integer.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        self.get_typed(key, Kind::String).await
    }

    /// Get an integer entry, returning `None` if absent, stored as a string,
    /// or unparseable.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn get_i64(&self, key: &str) -> StoreResult<Option<i64>> {
        let raw = self.get_typed(key, Kind::Long).await?;
        Ok(raw.and_then(|v| match v.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!(key, value = %v, "preference is not an integer, ignoring");
                None
            }
        }))
    }

    /// Whether an entry exists for `key`.
    pub async fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Remove a single entry, returning `true` if it existed.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn remove(&self, key: &str) -> StoreResult<bool> {
        let store = self.name.clone();
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM preferences WHERE store = ?1 AND key = ?2",
                    rusqlite::params![store, key],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Start a batch of changes.
    pub fn edit(&self) -> PreferenceEditor {
        PreferenceEditor {
            prefs: self.clone(),
            changes: Vec::new(),
        }
    }

    async fn get_typed(&self, key: &str, expected: Kind) -> StoreResult<Option<String>> {
        let Some((kind, value)) = self.get_raw(key).await? else {
            return Ok(None);
        };
        if kind != expected.as_str() {
            warn!(
                key,
                stored = %kind,
                expected = expected.as_str(),
                "preference has another type, ignoring"
            );
            return Ok(None);
        }
        Ok(Some(value))
    }

    async fn get_raw(&self, key: &str) -> StoreResult<Option<(String, String)>> {
        let store = self.name.clone();
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT kind, value FROM preferences WHERE store = ?1 AND key = ?2",
                    rusqlite::params![store, key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                );
                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }
}

/// Staged set of preference writes, committed atomically by [`apply`].
///
/// [`apply`]: PreferenceEditor::apply
#[must_use = "changes are discarded unless `apply` is called"]
pub struct PreferenceEditor {
    prefs: Preferences,
    changes: Vec<Change>,
}

impl PreferenceEditor {
    pub fn put_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.changes.push(Change::Put {
            key: key.into(),
            kind: Kind::String,
            value: value.into(),
        });
        self
    }

    pub fn put_i64(mut self, key: impl Into<String>, value: i64) -> Self {
        self.changes.push(Change::Put {
            key: key.into(),
            kind: Kind::Long,
            value: value.to_string(),
        });
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.changes.push(Change::Remove { key: key.into() });
        self
    }

    /// Commit every staged change in one transaction. Later changes to the
    /// same key win.
    pub async fn apply(self) -> StoreResult<()> {
        let store = self.prefs.name.clone();
        let changes = self.changes;
        let count = changes.len();

        self.prefs
            .db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                for change in &changes {
                    match change {
                        Change::Put { key, kind, value } => {
                            tx.execute(
                                "INSERT INTO preferences (store, key, kind, value) VALUES (?1, ?2, ?3, ?4) \
                                 ON CONFLICT(store, key) DO UPDATE SET kind = excluded.kind, value = excluded.value",
                                rusqlite::params![store, key, kind.as_str(), value],
                            )?;
                        }
                        Change::Remove { key } => {
                            tx.execute(
                                "DELETE FROM preferences WHERE store = ?1 AND key = ?2",
                                rusqlite::params![store, key],
                            )?;
                        }
                    }
                }
                tx.commit()?;
                debug!(store = %store, changes = count, "preferences applied");
                Ok(())
            })
            .await
    }
}
