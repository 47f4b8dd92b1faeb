use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexSet;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions, ThemeName};
use crate::error::{GalleryError, GalleryResult};
use crate::messages::{Message, MessageId};

mod schema;

pub const CUSTOM_MESSAGES_KEY: &str = "customMessages";
pub const FAVORITES_KEY: &str = "favorites";
pub const THEME_KEY: &str = "theme";

/// Raw string storage keyed by name. Values are JSON documents.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }
}

impl KeyValueStore for StorageHandle {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("reading key {key}"))
        })
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("writing key {key}"))?;
            Ok(())
        })
    }
}

/// Process-local store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to the three persisted collections.
///
/// Save failures are logged and remembered for the caller to report; they never
/// roll back the in-memory state that triggered them.
#[derive(Clone)]
pub struct Persistence {
    backend: Arc<dyn KeyValueStore>,
    last_failure: Arc<Mutex<Option<GalleryError>>>,
}

impl Persistence {
    pub fn new<S>(backend: S) -> Self
    where
        S: KeyValueStore + 'static,
    {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            last_failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn load_custom_messages(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = self.load_json(CUSTOM_MESSAGES_KEY).unwrap_or_default();
        for message in &mut messages {
            message.is_custom = true;
        }
        messages
    }

    pub fn save_custom_messages(&self, messages: &[Message]) -> GalleryResult<()> {
        self.save_json(CUSTOM_MESSAGES_KEY, messages)
    }

    pub fn load_favorites(&self) -> IndexSet<MessageId> {
        self.load_json::<Vec<MessageId>>(FAVORITES_KEY)
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn save_favorites(&self, favorites: &IndexSet<MessageId>) -> GalleryResult<()> {
        let ids: Vec<MessageId> = favorites.iter().copied().collect();
        self.save_json(FAVORITES_KEY, &ids)
    }

    pub fn load_theme(&self) -> Option<ThemeName> {
        self.load_json(THEME_KEY)
    }

    pub fn save_theme(&self, theme: ThemeName) -> GalleryResult<()> {
        self.save_json(THEME_KEY, &theme)
    }

    /// Returns and clears the most recent save failure.
    pub fn take_failure(&self) -> Option<GalleryError> {
        self.last_failure.lock().take()
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(?err, key, "failed to read persisted value");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(%err, key, "ignoring malformed persisted value");
                None
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &'static str, value: &T) -> GalleryResult<()> {
        let result = serde_json::to_string(value)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.backend.write(key, &json));
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(?err, key, "failed to persist value");
                let failure = GalleryError::Persistence {
                    key,
                    reason: format!("{err:#}"),
                };
                *self.last_failure.lock() = Some(failure.clone());
                Err(failure)
            }
        }
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        &paths.database_path
    } else {
        &storage.database_path
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    tracing::debug!(path = %db_path.display(), "storage ready");
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, StorageOptions};
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn read(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn write(&self, key: &str, _value: &str) -> Result<()> {
            anyhow::bail!("disk full while writing {key}")
        }
    }

    fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::under(temp.path());
        paths.ensure_directories()?;
        let mut opts = StorageOptions::default();
        opts.database_path = paths.database_path.clone();
        let storage = init(&paths, &opts)?;
        Ok((temp, storage))
    }

    fn custom(id: MessageId, text: &str, category: &str) -> Message {
        Message {
            id,
            text: text.into(),
            categories: vec![category.into()],
            is_custom: true,
        }
    }

    #[test]
    fn sqlite_round_trips_values_and_overwrites() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert_eq!(storage.read("missing")?, None);

        storage.write(THEME_KEY, "\"light\"")?;
        storage.write(THEME_KEY, "\"dark\"")?;
        assert_eq!(storage.read(THEME_KEY)?.as_deref(), Some("\"dark\""));
        let rows: i64 = storage.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
                .map_err(Into::into)
        })?;
        assert_eq!(rows, 1);
        Ok(())
    }

    #[test]
    fn persistence_survives_reopening_the_database() -> anyhow::Result<()> {
        let (temp, storage) = init_storage()?;
        let persistence = Persistence::new(storage);
        persistence.save_custom_messages(&[custom(7, "hola", "amor")])?;
        persistence.save_favorites(&[7, 3].into_iter().collect())?;
        persistence.save_theme(ThemeName::Light)?;

        let paths = ConfigPaths::under(temp.path());
        let mut opts = StorageOptions::default();
        opts.database_path = paths.database_path.clone();
        let reopened = Persistence::new(init(&paths, &opts)?);

        let messages = reopened.load_custom_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hola");
        assert!(messages[0].is_custom);
        let favorites: Vec<_> = reopened.load_favorites().into_iter().collect();
        assert_eq!(favorites, vec![7, 3]);
        assert_eq!(reopened.load_theme(), Some(ThemeName::Light));
        Ok(())
    }

    #[test]
    fn malformed_values_load_as_empty() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.write(CUSTOM_MESSAGES_KEY, "{not json")?;
        store.write(FAVORITES_KEY, "[\"a\"]")?;
        let persistence = Persistence::new(store);

        assert!(persistence.load_custom_messages().is_empty());
        assert!(persistence.load_favorites().is_empty());
        assert_eq!(persistence.load_theme(), None);
        Ok(())
    }

    #[test]
    fn failed_saves_are_recorded_once() {
        let persistence = Persistence::new(FailingStore);
        let result = persistence.save_theme(ThemeName::Dark);
        assert_matches!(result, Err(GalleryError::Persistence { key: THEME_KEY, .. }));
        assert_matches!(
            persistence.take_failure(),
            Some(GalleryError::Persistence { key: THEME_KEY, .. })
        );
        assert!(persistence.take_failure().is_none());
    }
}
