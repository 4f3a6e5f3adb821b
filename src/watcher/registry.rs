use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::Entity;
use crate::errors::EntityError;

use super::core::Watcher;

type AnyWatcher = Arc<dyn Any + Send + Sync>;
type WatcherKey = (TypeId, String);

/// Trims and lower-cases a watcher name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Watchers keyed by entity type and normalized name.
///
/// Entries are created at most once per key and never replaced or removed.
#[derive(Default)]
pub struct WatcherRegistry {
    watchers: RwLock<HashMap<WatcherKey, AnyWatcher>>,
}

impl std::fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherRegistry").field("len", &self.len()).finish()
    }
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the watcher for `name`, creating it on first access.
    ///
    /// # Errors
    /// Returns `InvalidWatcherName` if the normalized name is empty.
    pub fn get<T: Entity>(&self, name: &str) -> Result<Arc<Watcher<T>>, EntityError> {
        self.get_or_try_insert_with(name, Watcher::<T>::new)
    }

    /// Returns the watcher for `name`, building it with `factory` on first
    /// access. The factory receives the normalized name and runs at most once
    /// per key; on error nothing is registered.
    ///
    /// The factory runs under the registry write lock and must not call back
    /// into the same registry.
    ///
    /// # Errors
    /// Propagates the factory error.
    pub fn get_or_try_insert_with<T, F>(&self, name: &str, factory: F) -> Result<Arc<Watcher<T>>, EntityError>
    where
        T: Entity,
        F: FnOnce(&str) -> Result<Watcher<T>, EntityError>,
    {
        let key: WatcherKey = (TypeId::of::<T>(), normalize_name(name));
        if let Some(existing) = self.watchers.read().get(&key) {
            return downcast(existing.clone());
        }
        let mut map = self.watchers.write();
        // another thread may have inserted between the read and write locks
        if let Some(existing) = map.get(&key) {
            return downcast(existing.clone());
        }
        let watcher = Arc::new(factory(&key.1).inspect_err(|e| {
            log::warn!("watcher construction failed: collection={}, name={}: {e}", T::collection_name(), key.1);
        })?);
        log::info!("watcher registered: collection={}, name={}", T::collection_name(), key.1);
        map.insert(key, watcher.clone() as AnyWatcher);
        Ok(watcher)
    }

    /// Snapshot of all watchers registered for `T`, in no particular order.
    pub fn list<T: Entity>(&self) -> Vec<Arc<Watcher<T>>> {
        let ty = TypeId::of::<T>();
        self.watchers
            .read()
            .iter()
            .filter(|((t, _), _)| *t == ty)
            .filter_map(|(_, w)| w.clone().downcast::<Watcher<T>>().ok())
            .collect()
    }

    /// Total number of registered watchers across all entity types.
    pub fn len(&self) -> usize {
        self.watchers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.read().is_empty()
    }
}

fn downcast<T: Entity>(w: AnyWatcher) -> Result<Arc<Watcher<T>>, EntityError> {
    w.downcast::<Watcher<T>>().map_err(|_| {
        EntityError::WatcherConstruction(format!("registered watcher is not a {}", T::collection_name()))
    })
}
