//! Favorite Pokémon ids.
//!
//! The set is persisted as a JSON array of integers in a single file. Every
//! update is a read-modify-write performed under one lock, so two toggles
//! racing each other both land.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::FavoritesError;

pub type FavoriteSet = BTreeSet<u32>;

/// Storage for the favorites set. Presentation code depends on this trait
/// rather than on where the set lives.
pub trait FavoritesStore: Send + Sync {
    fn get(&self) -> Result<FavoriteSet, FavoritesError>;

    /// Make `id` a favorite (or not) and return the resulting set.
    fn set(&self, id: u32, favorite: bool) -> Result<FavoriteSet, FavoritesError>;

    /// Flip membership of `id`; returns whether it is now a favorite.
    fn toggle(&self, id: u32) -> Result<bool, FavoritesError>;

    /// Receives the full set after every successful change.
    fn subscribe(&self) -> watch::Receiver<FavoriteSet>;

    fn contains(&self, id: u32) -> Result<bool, FavoritesError> {
        Ok(self.get()?.contains(&id))
    }
}

fn apply(set: &mut FavoriteSet, id: u32, favorite: bool) -> bool {
    if favorite {
        set.insert(id)
    } else {
        set.remove(&id)
    }
}

/// File-backed store: `<data_dir>/favorites.json`.
pub struct FileFavorites {
    path: PathBuf,
    lock: Mutex<()>,
    tx: watch::Sender<FavoriteSet>,
}

impl FileFavorites {
    pub const FILE_NAME: &'static str = "favorites.json";

    /// Open the store. A malformed file is reported here rather than being
    /// silently replaced.
    pub fn open(data_dir: &Path) -> Result<Self, FavoritesError> {
        let path = data_dir.join(Self::FILE_NAME);
        let initial = read_file(&path)?;
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            path,
            lock: Mutex::new(()),
            tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut FavoriteSet) -> bool) -> Result<FavoriteSet, FavoritesError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut set = read_file(&self.path)?;
        if f(&mut set) {
            write_file(&self.path, &set)?;
            debug!(count = set.len(), "favorites saved");
        }
        self.tx.send_replace(set.clone());
        Ok(set)
    }
}

fn read_file(path: &Path) -> Result<FavoriteSet, FavoritesError> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FavoriteSet::new()),
        Err(e) => return Err(e.into()),
    };
    if data.trim().is_empty() {
        return Ok(FavoriteSet::new());
    }
    let ids: Vec<u32> = serde_json::from_str(&data).map_err(|source| FavoritesError::Malformed {
        path: path.display().to_string(),
        source,
    })?;
    Ok(ids.into_iter().collect())
}

fn write_file(path: &Path, set: &FavoriteSet) -> Result<(), FavoritesError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let ids: Vec<u32> = set.iter().copied().collect();
    let json = serde_json::to_string(&ids).map_err(|source| FavoritesError::Malformed {
        path: path.display().to_string(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

impl FavoritesStore for FileFavorites {
    fn get(&self) -> Result<FavoriteSet, FavoritesError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        read_file(&self.path)
    }

    fn set(&self, id: u32, favorite: bool) -> Result<FavoriteSet, FavoritesError> {
        self.update(|set| apply(set, id, favorite))
    }

    fn toggle(&self, id: u32) -> Result<bool, FavoritesError> {
        let mut now = false;
        self.update(|set| {
            now = !set.contains(&id);
            apply(set, id, now)
        })?;
        Ok(now)
    }

    fn subscribe(&self) -> watch::Receiver<FavoriteSet> {
        self.tx.subscribe()
    }
}

/// The on-disk store, or an in-memory one when the file cannot be read.
///
/// The error, if any, is returned alongside so the caller can surface it.
/// The unreadable file is left untouched; changes made in this session are
/// not persisted.
pub fn open_or_memory(data_dir: &Path) -> (Arc<dyn FavoritesStore>, Option<FavoritesError>) {
    match FileFavorites::open(data_dir) {
        Ok(store) => (Arc::new(store), None),
        Err(e) => {
            warn!(error = %e, "favorites unavailable, keeping them in memory for this session");
            (Arc::new(MemoryFavorites::default()), Some(e))
        }
    }
}

/// Non-persistent store.
pub struct MemoryFavorites {
    tx: watch::Sender<FavoriteSet>,
}

impl MemoryFavorites {
    pub fn new(initial: FavoriteSet) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }
}

impl Default for MemoryFavorites {
    fn default() -> Self {
        Self::new(FavoriteSet::new())
    }
}

impl FavoritesStore for MemoryFavorites {
    fn get(&self) -> Result<FavoriteSet, FavoritesError> {
        Ok(self.tx.borrow().clone())
    }

    fn set(&self, id: u32, favorite: bool) -> Result<FavoriteSet, FavoritesError> {
        self.tx.send_modify(|set| {
            apply(set, id, favorite);
        });
        self.get()
    }

    fn toggle(&self, id: u32) -> Result<bool, FavoritesError> {
        let mut now = false;
        self.tx.send_modify(|set| {
            now = !set.contains(&id);
            apply(set, id, now);
        });
        Ok(now)
    }

    fn subscribe(&self) -> watch::Receiver<FavoriteSet> {
        self.tx.subscribe()
    }
}
