use std::fmt;
use std::marker::PhantomData;

use crate::entity::Entity;
use crate::errors::EntityError;

/// One node of a property-access chain, linked from leaf to root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathNode {
    /// The entity parameter itself.
    Root,
    /// `parent.name`
    Member { name: String, parent: Box<PathNode> },
    /// `parent[..]`; the index value is irrelevant to path rendering.
    Index { parent: Box<PathNode> },
}

/// One step of a resolved path, ordered root to leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index,
}

impl PathNode {
    /// Unwinds the chain from the leaf back to the root and returns the
    /// segments in root-to-leaf order.
    pub fn segments(&self) -> Vec<Segment> {
        let mut out = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                PathNode::Root => break,
                PathNode::Member { name, parent } => {
                    out.push(Segment::Field(name.clone()));
                    cur = parent;
                }
                PathNode::Index { parent } => {
                    out.push(Segment::Index);
                    cur = parent;
                }
            }
        }
        out.reverse();
        out
    }

    /// Checks that the chain is a plain member / indexed-member chain:
    /// at least one member, and no index applied to the bare root.
    pub(crate) fn validate(&self) -> Result<(), EntityError> {
        let mut members = 0usize;
        let mut cur = self;
        loop {
            match cur {
                PathNode::Root => break,
                PathNode::Member { name, parent } => {
                    if !is_identifier(name) {
                        return Err(EntityError::UnsupportedExpression(format!(
                            "member name {name:?} is not an identifier"
                        )));
                    }
                    members += 1;
                    cur = parent;
                }
                PathNode::Index { parent } => {
                    if matches!(**parent, PathNode::Root) {
                        return Err(EntityError::UnsupportedExpression(
                            "indexer applied to the entity parameter".into(),
                        ));
                    }
                    cur = parent;
                }
            }
        }
        if members == 0 {
            return Err(EntityError::UnsupportedExpression(
                "expression does not access any member".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// A property-access expression over entity type `T`.
///
/// ```
/// use nexus_entities::{Entity, Expr, Prop};
///
/// struct Book;
/// impl Entity for Book {}
///
/// let e = Expr::<Book>::root().field("ReviewList").at(0).field("Rating");
/// assert_eq!(Prop::pos_filtered(&e).unwrap(), "ReviewList.$[a].Rating");
/// ```
pub struct Expr<T: Entity> {
    node: PathNode,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Expr<T> {
    /// The bare entity parameter.
    pub fn root() -> Self {
        Self { node: PathNode::Root, _entity: PhantomData }
    }

    /// Wraps an already built node tree.
    pub fn from_node(node: PathNode) -> Self {
        Self { node, _entity: PhantomData }
    }

    /// Member access on the current expression.
    #[must_use]
    pub fn field(self, name: impl Into<String>) -> Self {
        Self::from_node(PathNode::Member { name: name.into(), parent: Box::new(self.node) })
    }

    /// Indexed element access on the current expression.
    #[must_use]
    pub fn at(self, _index: usize) -> Self {
        self.any()
    }

    /// Element access without a concrete position.
    #[must_use]
    pub fn any(self) -> Self {
        Self::from_node(PathNode::Index { parent: Box::new(self.node) })
    }

    pub fn node(&self) -> &PathNode {
        &self.node
    }

    pub fn into_node(self) -> PathNode {
        self.node
    }

    /// Parses lambda text such as `x => x.ReviewList[0].Rating`.
    ///
    /// # Errors
    /// Returns `UnsupportedExpression` for anything that is not a plain
    /// member / indexed-member chain from the parameter.
    pub fn parse(text: &str) -> Result<Self, EntityError> {
        super::parse::parse_expression(text).map(Self::from_node)
    }
}

impl<T: Entity> Clone for Expr<T> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<T: Entity> fmt::Debug for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("entity", &T::collection_name())
            .field("node", &self.node)
            .finish()
    }
}

impl<T: Entity> PartialEq for Expr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<T: Entity> std::str::FromStr for Expr<T> {
    type Err = EntityError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
