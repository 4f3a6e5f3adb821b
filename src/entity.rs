//! Entity marker trait shared by the path resolver and the watcher registry.

/// A type persisted as documents in one collection.
///
/// Only the type identity matters to this crate: it scopes expressions
/// (`Expr<T>`) and watcher registrations (`watcher::get::<T>`).
pub trait Entity: Send + Sync + 'static {
    /// Collection the entity is stored in. Defaults to the bare type name,
    /// without module path or generic arguments.
    fn collection_name() -> &'static str {
        bare_type_name(std::any::type_name::<Self>())
    }
}

fn bare_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
