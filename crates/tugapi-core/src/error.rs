//! Error types for the API graph.
//!
//! Each concern has its own error enum so callers can match on exactly the
//! failures an operation can produce:
//!
//! - [`MemberError`]: member lookup, insertion and removal
//! - [`NameResolutionError`]: a bare name is unknown in a lexical scope
//! - [`AliasError`]: an alias target is missing (retryable) or cyclic
//! - [`MroError`]: a class hierarchy cannot be linearized
//! - [`ParameterError`]: duplicate names in parameter lists
//! - [`LoadError`]: an external package could not be loaded
//!
//! [`ApiError`] bridges all of them into one type. Its [`ErrorKind`] is the
//! stable part of the contract; messages may change between releases.

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Kinds
// ============================================================================

/// Stable classification of every error the API graph can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A name could not be found in the lexical scope chain.
    NameResolution,
    /// An alias target is not present in the registry (yet).
    AliasResolution,
    /// An alias chain loops back on itself.
    CyclicAlias,
    /// A class hierarchy contains a cycle or has no C3 linearization.
    InheritanceCycle,
    /// A member path does not exist.
    NotFound,
    /// The caller passed something malformed (empty names, duplicates, wrong kind).
    InvalidInput,
    /// An external package could not be loaded.
    Load,
    /// Configuration could not be read or parsed.
    Config,
}

// ============================================================================
// Member Errors
// ============================================================================

/// Errors raised while reading or writing the member tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemberError {
    /// Some segment of the path is absent.
    #[error("member not found: {path}")]
    NotFound { path: String },

    /// The name only exists through inheritance and cannot be removed.
    #[error("member '{path}' is inherited and cannot be deleted from this class")]
    InheritedOnly { path: String },

    /// Member paths must contain at least one non-empty name.
    #[error("cannot use an empty member name")]
    EmptyName,

    /// The object is not an alias.
    #[error("object '{path}' is not an alias")]
    NotAnAlias { path: String },
}

// ============================================================================
// Scope Errors
// ============================================================================

/// A bare name could not be resolved from the given scope.
///
/// Not retried: the caller should treat the name as unknown (often a built-in).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{name}' could not be resolved in the scope of '{scope}'")]
pub struct NameResolutionError {
    pub name: String,
    pub scope: String,
}

// ============================================================================
// Alias Errors
// ============================================================================

/// Errors raised while following or resolving aliases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasError {
    /// The target path is not in the registry at this time.
    #[error("could not resolve alias '{alias_path}' pointing at '{target_path}'")]
    Resolution {
        alias_path: String,
        target_path: String,
    },

    /// The alias chain returns to a path already on the resolution stack.
    #[error("cyclic alias chain: {}", chain.join(" -> "))]
    Cyclic { chain: Vec<String> },

    /// Alias operations were requested on a non-alias object.
    #[error("object '{path}' is not an alias")]
    NotAnAlias { path: String },
}

impl AliasError {
    /// Whether a later pass may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AliasError::Resolution { .. })
    }

    /// The target path an unresolved alias was waiting for.
    pub fn missing_target(&self) -> Option<&str> {
        match self {
            AliasError::Resolution { target_path, .. } => Some(target_path),
            _ => None,
        }
    }
}

// ============================================================================
// MRO Errors
// ============================================================================

/// Errors that can occur during MRO computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MroError {
    /// A base class reappears among its own ancestors.
    #[error("cannot compute C3 linearization, inheritance cycle detected: {}", chain.join(" -> "))]
    InheritanceCycle { chain: Vec<String> },

    /// No valid C3 linearization exists for the class.
    #[error("inconsistent hierarchy for class '{class_path}': cannot compute MRO")]
    InconsistentHierarchy { class_path: String },

    /// MRO was requested for something that is not a class.
    #[error("object '{path}' is not a class")]
    NotAClass { path: String },
}

// ============================================================================
// Parameter Errors
// ============================================================================

/// Errors raised by parameter and type parameter lists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// A parameter with this name already exists in the container.
    #[error("duplicate parameter name '{name}'")]
    Duplicate { name: String },
}

// ============================================================================
// Load Errors
// ============================================================================

/// Failures reported by external package loaders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The loader does not know the package.
    #[error("package '{package}' could not be found")]
    NotFound { package: String },

    /// The loader found the package but could not build it.
    #[error("failed to load package '{package}': {message}")]
    Failed { package: String, message: String },

    /// No loader is installed.
    #[error("no external loader available for package '{package}'")]
    Unavailable { package: String },
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for consumers of the API graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Member(#[from] MemberError),

    #[error(transparent)]
    NameResolution(#[from] NameResolutionError),

    #[error(transparent)]
    Alias(#[from] AliasError),

    #[error(transparent)]
    Mro(#[from] MroError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Load(#[from] LoadError),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl ApiError {
    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Member(MemberError::NotFound { .. }) => ErrorKind::NotFound,
            ApiError::Member(_) => ErrorKind::InvalidInput,
            ApiError::NameResolution(_) => ErrorKind::NameResolution,
            ApiError::Alias(AliasError::Resolution { .. }) => ErrorKind::AliasResolution,
            ApiError::Alias(AliasError::Cyclic { .. }) => ErrorKind::CyclicAlias,
            ApiError::Alias(AliasError::NotAnAlias { .. }) => ErrorKind::InvalidInput,
            ApiError::Mro(MroError::NotAClass { .. }) => ErrorKind::InvalidInput,
            ApiError::Mro(_) => ErrorKind::InheritanceCycle,
            ApiError::Parameter(_) => ErrorKind::InvalidInput,
            ApiError::Load(_) => ErrorKind::Load,
            ApiError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Result type for API graph operations.
pub type ApiResult<T> = Result<T, ApiError>;
