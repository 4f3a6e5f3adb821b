//! Typed property paths and change-stream watcher registration for
//! document-database entities.
//!
//! - [`Prop`] turns an [`Expr`] over an entity into the dotted field path the
//!   database query/update language expects, including positional tokens
//!   (`$`, `$[]`, `$[a]`).
//! - [`watcher`] keeps one [`Watcher`] per entity type and normalized name.
//! - [`Update`] assembles update documents and array filters from resolved paths.
pub mod config;
pub mod entity;
pub mod errors;
pub mod logger;
pub mod prop;
pub mod update;
pub mod watcher;

pub use config::EntitiesConfig;
pub use entity::Entity;
pub use errors::EntityError;
pub use prop::{Expr, PathMode, PathNode, Prop};
pub use update::Update;
pub use watcher::{EventType, WatchOptions, Watcher, WatcherRegistry, WatcherState};

