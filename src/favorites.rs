//! The user's favorite movies, kept in memory and mirrored to a storage record.
//!
//! In-memory state is authoritative. Every mutation is applied in memory
//! first and then written to storage; a failed write is logged and reported
//! through [`Persistence`] but never rolled back. Loading never fails: a
//! missing or unreadable record yields an empty set.
use crate::models::Movie;
use crate::storage::{Storage, StorageError};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const FAVORITES_KEY: &str = "movie-favorites";

/// What `load` found in storage.
#[derive(Debug)]
pub enum LoadOutcome {
    Empty,
    Restored { count: usize, discarded: usize },
    Degraded(StorageError),
    AlreadyLoaded,
}

/// Result of writing the favorites record after a mutation.
///
/// Callers may inspect this; ignoring it is fine.
#[derive(Debug)]
pub enum Persistence {
    Saved,
    /// The mutation was a no-op, nothing was written.
    Unchanged,
    Failed(StorageError),
}

impl Persistence {
    pub fn error(&self) -> Option<&StorageError> {
        match self {
            Persistence::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Toggle {
    /// Membership after the toggle.
    pub favorite: bool,
    pub persistence: Persistence,
}

pub struct FavoritesStore {
    storage: Arc<dyn Storage>,
    key: String,
    favorites: Vec<Movie>,
    loaded: bool,
}

impl FavoritesStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_key(storage, FAVORITES_KEY)
    }

    pub fn with_key(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            favorites: Vec::new(),
            loaded: false,
        }
    }

    /// Construct and load in one step.
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let mut store = Self::new(storage);
        store.load();
        store
    }

    pub fn load(&mut self) -> LoadOutcome {
        if self.loaded {
            return LoadOutcome::AlreadyLoaded;
        }
        let outcome = match self.read_record() {
            Ok(None) => {
                debug!("No favorites record '{}' found", self.key);
                LoadOutcome::Empty
            }
            Ok(Some((movies, discarded))) => {
                let count = movies.len();
                self.favorites = movies;
                info!(
                    "Restored {} favorites ({} malformed or duplicate entries discarded)",
                    count, discarded
                );
                LoadOutcome::Restored { count, discarded }
            }
            Err(e) => {
                error!("Error loading favorites from storage: {}", e);
                self.favorites.clear();
                LoadOutcome::Degraded(e)
            }
        };
        self.loaded = true;
        outcome
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn favorites(&self) -> &[Movie] {
        &self.favorites
    }

    pub fn len(&self) -> usize {
        self.favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty()
    }

    pub fn is_favorite(&self, movie_id: i64) -> bool {
        self.favorites.iter().any(|m| m.id == movie_id)
    }

    /// Appends `movie` unless a favorite with the same id already exists.
    pub fn add(&mut self, movie: Movie) -> Persistence {
        self.ensure_loaded();
        if self.is_favorite(movie.id) {
            debug!("Movie {} is already a favorite", movie.id);
            return Persistence::Unchanged;
        }
        info!("Adding '{}' ({}) to favorites", movie.title, movie.id);
        self.favorites.push(movie);
        self.persist()
    }

    pub fn remove(&mut self, movie_id: i64) -> Persistence {
        self.ensure_loaded();
        let before = self.favorites.len();
        self.favorites.retain(|m| m.id != movie_id);
        if self.favorites.len() == before {
            return Persistence::Unchanged;
        }
        info!("Removed movie {} from favorites", movie_id);
        self.persist()
    }

    pub fn toggle(&mut self, movie: Movie) -> Toggle {
        self.ensure_loaded();
        if self.is_favorite(movie.id) {
            Toggle {
                favorite: false,
                persistence: self.remove(movie.id),
            }
        } else {
            Toggle {
                favorite: true,
                persistence: self.add(movie),
            }
        }
    }

    // A mutation on an unread store would overwrite favorites it never saw.
    fn ensure_loaded(&mut self) {
        if !self.loaded {
            self.load();
        }
    }

    fn read_record(&self) -> Result<Option<(Vec<Movie>, usize)>, StorageError> {
        let Some(raw) = self.storage.read(&self.key)? else {
            return Ok(None);
        };
        let parsed: Value = serde_json::from_str(&raw)?;
        let Value::Array(entries) = parsed else {
            return Err(StorageError::Corrupt(format!(
                "expected a JSON array in '{}'",
                self.key
            )));
        };

        let total = entries.len();
        let mut seen = HashSet::new();
        let mut movies = Vec::with_capacity(total);
        for entry in entries {
            match serde_json::from_value::<Movie>(entry) {
                Ok(movie) => {
                    if seen.insert(movie.id) {
                        movies.push(movie);
                    } else {
                        warn!("Dropping duplicate favorite {}", movie.id);
                    }
                }
                Err(e) => warn!("Discarding malformed favorite entry: {}", e),
            }
        }
        let discarded = total - movies.len();
        Ok(Some((movies, discarded)))
    }

    fn persist(&self) -> Persistence {
        let result = serde_json::to_string(&self.favorites)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.write(&self.key, &json));
        match result {
            Ok(()) => Persistence::Saved,
            Err(e) => {
                error!("Error saving favorites to storage: {}", e);
                Persistence::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};
    use serde_json::json;
    use tempfile::tempdir;

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("storage disabled".to_string()))
        }
        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    /// Reads fine, refuses every write.
    struct ReadOnlyStorage(MemoryStorage);

    impl Storage for ReadOnlyStorage {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.read(key)
        }
        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    fn movie(id: i64) -> Movie {
        Movie {
            id,
            title: format!("Movie {id}"),
            poster_path: Some(format!("/poster{id}.jpg")),
            vote_average: 6.5,
            vote_count: 100,
            release_date: Some("2020-01-01".to_string()),
        }
    }

    fn seeded(record: &str) -> (Arc<MemoryStorage>, FavoritesStore) {
        let storage = Arc::new(MemoryStorage::with_record(FAVORITES_KEY, record));
        let store = FavoritesStore::new(storage.clone());
        (storage, store)
    }

    fn ids(store: &FavoritesStore) -> Vec<i64> {
        store.favorites().iter().map(|m| m.id).collect()
    }

    fn stored_ids(storage: &MemoryStorage) -> Vec<i64> {
        let raw = storage.read(FAVORITES_KEY).unwrap().unwrap();
        let movies: Vec<Movie> = serde_json::from_str(&raw).unwrap();
        movies.iter().map(|m| m.id).collect()
    }

    #[test]
    fn is_not_loaded_until_load_runs() {
        let (_storage, mut store) = seeded(&json!([movie(1)]).to_string());
        assert!(!store.is_loaded());
        assert!(!store.is_favorite(1));
        store.load();
        assert!(store.is_loaded());
        assert!(store.is_favorite(1));
        assert!(matches!(store.load(), LoadOutcome::AlreadyLoaded));
    }

    #[test]
    fn missing_record_loads_empty() {
        let mut store = FavoritesStore::new(Arc::new(MemoryStorage::new()));
        assert!(matches!(store.load(), LoadOutcome::Empty));
        assert!(store.is_loaded());
        assert!(store.is_empty());
    }

    #[test]
    fn restores_sequence_in_order() {
        let record = json!([movie(3), movie(1), movie(2)]).to_string();
        let (_storage, mut store) = seeded(&record);
        let outcome = store.load();
        assert!(matches!(
            outcome,
            LoadOutcome::Restored {
                count: 3,
                discarded: 0
            }
        ));
        assert_eq!(ids(&store), vec![3, 1, 2]);
    }

    #[test]
    fn non_sequence_record_degrades_to_empty() {
        for record in [r#"{"id": 1, "title": "x"}"#, r#""favorites""#, "42"] {
            let (_storage, mut store) = seeded(record);
            let outcome = store.load();
            assert!(matches!(
                outcome,
                LoadOutcome::Degraded(StorageError::Corrupt(_))
            ));
            assert!(store.is_loaded());
            assert!(store.is_empty());
        }
    }

    #[test]
    fn unparsable_record_degrades_to_empty() {
        let (_storage, mut store) = seeded("[{not json");
        assert!(matches!(
            store.load(),
            LoadOutcome::Degraded(StorageError::Serialization(_))
        ));
        assert!(store.is_loaded());
        assert!(store.is_empty());
    }

    #[test]
    fn unreadable_storage_degrades_to_empty() {
        let mut store = FavoritesStore::new(Arc::new(BrokenStorage));
        assert!(matches!(
            store.load(),
            LoadOutcome::Degraded(StorageError::Unavailable(_))
        ));
        assert!(store.is_loaded());
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_and_duplicate_entries_are_discarded() {
        let record = json!([
            movie(1),
            {"title": "no id"},
            "just a string",
            {"id": 2, "title": "Minimal"},
            movie(1)
        ])
        .to_string();
        let (_storage, mut store) = seeded(&record);
        let outcome = store.load();
        assert!(matches!(
            outcome,
            LoadOutcome::Restored {
                count: 2,
                discarded: 3
            }
        ));
        assert_eq!(ids(&store), vec![1, 2]);
        assert_eq!(store.favorites()[1].vote_count, 0);
    }

    #[test]
    fn toggle_scenario_removes_then_appends() {
        let record = json!([movie(1), movie(2)]).to_string();
        let (storage, mut store) = seeded(&record);
        store.load();

        let first = store.toggle(movie(1));
        assert!(!first.favorite);
        assert!(matches!(first.persistence, Persistence::Saved));
        assert_eq!(ids(&store), vec![2]);

        let second = store.toggle(movie(3));
        assert!(second.favorite);
        assert_eq!(ids(&store), vec![2, 3]);
        assert_eq!(stored_ids(&storage), vec![2, 3]);
    }

    #[test]
    fn double_toggle_restores_membership() {
        let (_storage, mut store) = seeded(&json!([movie(1)]).to_string());
        store.load();
        for id in [1, 7] {
            let before = store.is_favorite(id);
            store.toggle(movie(id));
            store.toggle(movie(id));
            assert_eq!(store.is_favorite(id), before);
        }
    }

    #[test]
    fn add_enforces_unique_ids() {
        let mut store = FavoritesStore::open(Arc::new(MemoryStorage::new()));
        assert!(matches!(store.add(movie(5)), Persistence::Saved));
        assert!(matches!(store.add(movie(5)), Persistence::Unchanged));
        assert_eq!(ids(&store), vec![5]);
    }

    #[test]
    fn removing_absent_id_is_a_noop() {
        let mut store = FavoritesStore::open(Arc::new(MemoryStorage::new()));
        store.add(movie(1));
        assert!(matches!(store.remove(99), Persistence::Unchanged));
        assert_eq!(ids(&store), vec![1]);
    }

    #[test]
    fn mixed_operations_never_duplicate_ids() {
        let mut store = FavoritesStore::open(Arc::new(MemoryStorage::new()));
        let ops: [(u8, i64); 12] = [
            (0, 1),
            (0, 1),
            (2, 2),
            (0, 2),
            (1, 1),
            (2, 1),
            (2, 1),
            (0, 3),
            (2, 3),
            (0, 3),
            (1, 2),
            (0, 2),
        ];
        for (op, id) in ops {
            match op {
                0 => {
                    store.add(movie(id));
                }
                1 => {
                    store.remove(id);
                }
                _ => {
                    store.toggle(movie(id));
                }
            }
            let mut seen = HashSet::new();
            assert!(store.favorites().iter().all(|m| seen.insert(m.id)));
        }
        assert_eq!(ids(&store), vec![3, 2]);
    }

    #[test]
    fn failed_write_keeps_in_memory_change() {
        let storage = ReadOnlyStorage(MemoryStorage::with_record(
            FAVORITES_KEY,
            &json!([movie(1)]).to_string(),
        ));
        let mut store = FavoritesStore::open(Arc::new(storage));

        let toggled = store.toggle(movie(2));
        assert!(toggled.favorite);
        assert!(matches!(
            toggled.persistence.error(),
            Some(StorageError::Unavailable(_))
        ));
        assert!(store.is_favorite(2));

        let removed = store.remove(1);
        assert!(removed.error().is_some());
        assert!(!store.is_favorite(1));
        assert_eq!(ids(&store), vec![2]);
    }

    #[test]
    fn mutation_before_load_reads_record_first() {
        let (storage, mut store) = seeded(&json!([movie(1)]).to_string());
        store.add(movie(2));
        assert!(store.is_loaded());
        assert_eq!(stored_ids(&storage), vec![1, 2]);
    }

    #[test]
    fn custom_key_is_isolated() {
        let storage = Arc::new(MemoryStorage::with_record(
            FAVORITES_KEY,
            &json!([movie(1)]).to_string(),
        ));
        let mut store = FavoritesStore::with_key(storage.clone(), "other-favorites");
        assert!(matches!(store.load(), LoadOutcome::Empty));
        store.add(movie(9));
        assert_eq!(stored_ids(&storage), vec![1]);
    }

    #[test]
    fn file_backed_favorites_survive_restart() {
        let dir = tempdir().unwrap();
        {
            let mut store = FavoritesStore::open(Arc::new(FileStorage::new(dir.path())));
            assert!(store.is_empty());
            store.toggle(movie(3));
            store.toggle(movie(1));
            store.toggle(movie(2));
            store.toggle(movie(1));
        }
        assert!(dir.path().join("movie-favorites.json").exists());

        let mut reopened = FavoritesStore::new(Arc::new(FileStorage::new(dir.path())));
        assert!(matches!(
            reopened.load(),
            LoadOutcome::Restored {
                count: 2,
                discarded: 0
            }
        ));
        assert_eq!(ids(&reopened), vec![3, 2]);
        assert_eq!(reopened.favorites()[0], movie(3));
    }
}
