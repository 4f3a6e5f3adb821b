//! Change-stream watcher handles and the process-wide registry.

mod core;
mod registry;

use std::sync::{Arc, LazyLock};

use crate::entity::Entity;
use crate::errors::EntityError;

pub use self::core::{EventType, WatchOptions, Watcher, WatcherState};
pub use self::registry::{WatcherRegistry, normalize_name};

static REGISTRY: LazyLock<WatcherRegistry> = LazyLock::new(WatcherRegistry::new);

/// Process-wide registry used by `get`, `list` and `get_or_try_insert_with`.
pub fn registry() -> &'static WatcherRegistry {
    &REGISTRY
}

/// Retrieves the watcher for a unique name, creating it if missing.
/// Names may repeat across entity types.
///
/// # Errors
/// Returns `InvalidWatcherName` if the name is blank.
pub fn get<T: Entity>(name: &str) -> Result<Arc<Watcher<T>>, EntityError> {
    REGISTRY.get::<T>(name)
}

/// All watchers registered for `T`.
pub fn list<T: Entity>() -> Vec<Arc<Watcher<T>>> {
    REGISTRY.list::<T>()
}

/// Get-or-create with a caller supplied constructor.
///
/// # Errors
/// Propagates the constructor error; nothing is registered in that case.
pub fn get_or_try_insert_with<T, F>(name: &str, factory: F) -> Result<Arc<Watcher<T>>, EntityError>
where
    T: Entity,
    F: FnOnce(&str) -> Result<Watcher<T>, EntityError>,
{
    REGISTRY.get_or_try_insert_with(name, factory)
}
