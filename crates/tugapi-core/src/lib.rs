//! Core API graph for tugapi.
//!
//! This crate provides the symbolic model of a package's public API:
//! - Entity model: modules, classes, functions, attributes, type aliases and aliases
//! - Modules collection: object arena plus the registry of top-level modules
//! - Lexical name resolution through parent scopes
//! - Per-alias resolution with cycle detection
//! - C3 linearization and inherited member views
//! - Error types and stable error kinds
//!
//! Collection-wide passes (export and wildcard expansion, the fixed-point
//! resolution driver) live in `tugapi-resolve`.

pub mod alias;
pub mod collection;
pub mod error;
pub mod model;
pub mod mro;
pub mod scope;

pub use collection::{ModulesCollection, NewWins, StubMerger};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use model::{Kind, Object, ObjectId};
pub use mro::{InheritedAlias, MemberRef};
