use crate::entity::Entity;
use crate::errors::EntityError;

use super::expr::{Expr, PathNode, Segment};

/// Number of distinct array filter identifiers (`a`..=`z`).
pub const MAX_FILTER_IDENTIFIERS: usize = 26;

/// How indexed accesses are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// Index segments are dropped.
    Full,
    /// `$[a]`, `$[b]`, ... in traversal order.
    Filtered,
    /// `$[]` for every index segment.
    All,
    /// `$` for every index segment.
    First,
}

/// Letter used for the `index`-th array filter identifier.
///
/// # Errors
/// Returns `ArrayFilterOverflow` past `z`.
pub fn filter_identifier(index: usize) -> Result<char, EntityError> {
    if index >= MAX_FILTER_IDENTIFIERS {
        return Err(EntityError::ArrayFilterOverflow { count: index + 1 });
    }
    // index < 26 so the cast is exact
    Ok(char::from(b'a' + index as u8))
}

pub(crate) fn render(node: &PathNode, mode: PathMode) -> Result<String, EntityError> {
    node.validate()?;
    let segments = node.segments();
    let mut parts: Vec<String> = Vec::with_capacity(segments.len());
    let mut letters = 0usize;
    for seg in segments {
        match (seg, mode) {
            (Segment::Field(name), _) => parts.push(name),
            (Segment::Index, PathMode::Full) => {}
            (Segment::Index, PathMode::All) => parts.push("$[]".to_string()),
            (Segment::Index, PathMode::First) => parts.push("$".to_string()),
            (Segment::Index, PathMode::Filtered) => {
                let letter = filter_identifier(letters)?;
                letters += 1;
                parts.push(format!("$[{letter}]"));
            }
        }
    }
    let path = parts.join(".");
    log::debug!("resolved {mode:?} path {path}");
    Ok(path)
}

/// Expression-to-path resolvers.
pub struct Prop;

impl Prop {
    /// Field names joined by `.`, index accesses omitted.
    ///
    /// `x.ReviewArray[0].Books[0].Price` → `ReviewArray.Books.Price`
    ///
    /// # Errors
    /// Returns `UnsupportedExpression` if the expression has no member access.
    pub fn full_path<T: Entity>(expr: &Expr<T>) -> Result<String, EntityError> {
        render(expr.node(), PathMode::Full)
    }

    /// Name of the leaf member only.
    ///
    /// # Errors
    /// Returns `UnsupportedExpression` if the expression has no member access.
    pub fn property<T: Entity>(expr: &Expr<T>) -> Result<String, EntityError> {
        expr.node().validate()?;
        expr.node()
            .segments()
            .into_iter()
            .rev()
            .find_map(|s| match s {
                Segment::Field(name) => Some(name),
                Segment::Index => None,
            })
            .ok_or_else(|| EntityError::UnsupportedExpression("no member access".into()))
    }

    /// Path with each index rendered as `$[a]`, `$[b]`, ...
    ///
    /// # Errors
    /// Returns `ArrayFilterOverflow` for more than 26 indexed accesses.
    pub fn pos_filtered<T: Entity>(expr: &Expr<T>) -> Result<String, EntityError> {
        render(expr.node(), PathMode::Filtered)
    }

    /// Path with each index rendered as `$[]`.
    ///
    /// # Errors
    /// Returns `UnsupportedExpression` if the expression has no member access.
    pub fn pos_all<T: Entity>(expr: &Expr<T>) -> Result<String, EntityError> {
        render(expr.node(), PathMode::All)
    }

    /// Path with each index rendered as `$`.
    ///
    /// # Errors
    /// Returns `UnsupportedExpression` if the expression has no member access.
    pub fn pos_first<T: Entity>(expr: &Expr<T>) -> Result<String, EntityError> {
        render(expr.node(), PathMode::First)
    }

    /// Path of array elements in the root form. Same output as `full_path`.
    ///
    /// # Errors
    /// Returns `UnsupportedExpression` if the expression has no member access.
    pub fn elements<T: Entity>(expr: &Expr<T>) -> Result<String, EntityError> {
        render(expr.node(), PathMode::Full)
    }

    /// Array filter declaration path: `<letter for index>.<full path>`.
    ///
    /// `elements_at(1, x.ReviewList[0].Rating)` → `b.ReviewList.Rating`
    ///
    /// # Errors
    /// Returns `ArrayFilterOverflow` when `index > 25`.
    pub fn elements_at<T: Entity>(index: usize, expr: &Expr<T>) -> Result<String, EntityError> {
        let letter = filter_identifier(index)?;
        let path = render(expr.node(), PathMode::Full)?;
        Ok(format!("{letter}.{path}"))
    }

    /// Dispatches on `mode`.
    ///
    /// # Errors
    /// See the individual resolvers.
    pub fn resolve<T: Entity>(expr: &Expr<T>, mode: PathMode) -> Result<String, EntityError> {
        render(expr.node(), mode)
    }
}
