//! Update documents and array filter declarations built from resolved paths.

use std::marker::PhantomData;

use bson::{Bson, Document};

use crate::entity::Entity;
use crate::errors::EntityError;
use crate::prop::{Expr, PathMode, Prop};

/// Builder for an update document targeting entity `T`.
///
/// ```
/// use bson::doc;
/// use nexus_entities::{Entity, Expr, PathMode, Update};
///
/// struct Book;
/// impl Entity for Book {}
///
/// let rating = Expr::<Book>::parse("b => b.ReviewList[0].Rating").unwrap();
/// let upd = Update::<Book>::new()
///     .modify(&rating, PathMode::Filtered, 5)
///     .unwrap()
///     .array_filter(0, &rating, doc! { "$lt": 3 })
///     .unwrap();
/// assert_eq!(upd.to_document().unwrap(), doc! { "$set": { "ReviewList.$[a].Rating": 5 } });
/// assert_eq!(upd.array_filters(), &[doc! { "a.ReviewList.Rating": { "$lt": 3 } }]);
/// ```
pub struct Update<T: Entity> {
    set: Vec<(String, Bson)>,
    inc: Vec<(String, Bson)>,
    unset: Vec<String>,
    push: Vec<(String, Bson)>,
    array_filters: Vec<Document>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Default for Update<T> {
    fn default() -> Self {
        Self {
            set: Vec::new(),
            inc: Vec::new(),
            unset: Vec::new(),
            push: Vec::new(),
            array_filters: Vec::new(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> std::fmt::Debug for Update<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Update")
            .field("entity", &T::collection_name())
            .field("set", &self.set)
            .field("inc", &self.inc)
            .field("unset", &self.unset)
            .field("push", &self.push)
            .field("array_filters", &self.array_filters)
            .finish()
    }
}

impl<T: Entity> Update<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, path: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.push((path.into(), value.into()));
        self
    }

    #[must_use]
    pub fn inc(mut self, path: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.inc.push((path.into(), value.into()));
        self
    }

    #[must_use]
    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.unset.push(path.into());
        self
    }

    #[must_use]
    pub fn push(mut self, path: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push.push((path.into(), value.into()));
        self
    }

    /// `$set` on the path of `expr` rendered with `mode`.
    ///
    /// # Errors
    /// Propagates path resolution errors.
    pub fn modify(self, expr: &Expr<T>, mode: PathMode, value: impl Into<Bson>) -> Result<Self, EntityError> {
        let path = Prop::resolve(expr, mode)?;
        Ok(self.set(path, value))
    }

    /// Declares array filter `index` (`a`, `b`, ...) over the elements of `expr`.
    ///
    /// # Errors
    /// Returns `ArrayFilterOverflow` when `index > 25`.
    pub fn array_filter(mut self, index: usize, expr: &Expr<T>, condition: impl Into<Bson>) -> Result<Self, EntityError> {
        let path = Prop::elements_at(index, expr)?;
        let mut filter = Document::new();
        filter.insert(path, condition.into());
        self.array_filters.push(filter);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty() && self.unset.is_empty() && self.push.is_empty()
    }

    pub fn array_filters(&self) -> &[Document] {
        &self.array_filters
    }

    /// Renders the update operators, omitting empty ones.
    ///
    /// # Errors
    /// Returns `EmptyUpdate` if no operation was added.
    pub fn to_document(&self) -> Result<Document, EntityError> {
        if self.is_empty() {
            return Err(EntityError::EmptyUpdate);
        }
        let mut out = Document::new();
        if !self.set.is_empty() {
            out.insert("$set", pairs(&self.set));
        }
        if !self.inc.is_empty() {
            out.insert("$inc", pairs(&self.inc));
        }
        if !self.unset.is_empty() {
            let mut d = Document::new();
            for p in &self.unset {
                d.insert(p.clone(), "");
            }
            out.insert("$unset", d);
        }
        if !self.push.is_empty() {
            out.insert("$push", pairs(&self.push));
        }
        log::debug!("update for {}: {out}", T::collection_name());
        Ok(out)
    }
}

fn pairs(entries: &[(String, Bson)]) -> Document {
    let mut d = Document::new();
    for (k, v) in entries {
        d.insert(k.clone(), v.clone());
    }
    d
}
