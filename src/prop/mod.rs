// Submodules for separation of concerns
mod expr;
mod parse;
mod render;

// Public API re-exports
pub use expr::{Expr, PathNode, Segment};
pub use render::{MAX_FILTER_IDENTIFIERS, PathMode, Prop, filter_identifier};
