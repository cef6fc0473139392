//! Minimal expression trees for base classes, annotations and values.
//!
//! The builder records source expressions only as far as symbol resolution
//! needs them: names, dotted attribute chains and subscripts. Everything else
//! is kept as opaque literal text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::collection::ModulesCollection;
use crate::model::ObjectId;

/// A source expression attached to an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Expr {
    /// A bare name, e.g. `Base`.
    Name { name: String },
    /// A dotted chain, e.g. `module.sub.Base`.
    Attribute { parts: Vec<String> },
    /// A subscript, e.g. `Generic[T]`.
    Subscript { value: Box<Expr>, slice: Vec<Expr> },
    /// Anything else, kept verbatim.
    Literal { text: String },
}

impl Expr {
    /// Create a bare name expression.
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name { name: name.into() }
    }

    /// Create a name or attribute chain from dotted text.
    pub fn dotted(text: &str) -> Self {
        let parts: Vec<String> = text.split('.').map(str::to_string).collect();
        if parts.len() == 1 {
            Expr::Name {
                name: text.to_string(),
            }
        } else {
            Expr::Attribute { parts }
        }
    }

    /// Create a subscript expression.
    pub fn subscript(value: Expr, slice: Vec<Expr>) -> Self {
        Expr::Subscript {
            value: Box::new(value),
            slice,
        }
    }

    /// Create an opaque literal.
    pub fn literal(text: impl Into<String>) -> Self {
        Expr::Literal { text: text.into() }
    }

    /// Canonical path of the object this expression names, seen from `scope`.
    ///
    /// The leading name goes through the scope resolver. Names the scope
    /// chain does not know (built-ins, unloaded packages) are returned as
    /// written. Subscripts resolve their subscripted value. Literals have no
    /// path.
    pub fn canonical_path(
        &self,
        collection: &ModulesCollection,
        scope: ObjectId,
    ) -> Option<String> {
        match self {
            Expr::Name { name } => Some(
                collection
                    .resolve(scope, name)
                    .unwrap_or_else(|_| name.clone()),
            ),
            Expr::Attribute { parts } => {
                let (first, rest) = parts.split_first()?;
                let head = collection
                    .resolve(scope, first)
                    .unwrap_or_else(|_| first.clone());
                if rest.is_empty() {
                    Some(head)
                } else {
                    Some(format!("{}.{}", head, rest.join(".")))
                }
            }
            Expr::Subscript { value, .. } => value.canonical_path(collection, scope),
            Expr::Literal { .. } => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Name { name } => write!(f, "{}", name),
            Expr::Attribute { parts } => write!(f, "{}", parts.join(".")),
            Expr::Subscript { value, slice } => {
                write!(f, "{}[", value)?;
                for (index, item) in slice.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::Literal { text } => write!(f, "{}", text),
        }
    }
}
