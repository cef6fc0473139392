//! Function parameters and generic type parameters.
//!
//! Both containers keep declaration order and support lookup by name and by
//! index. Names are unique within a container.

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;
use crate::model::{Docstring, Expr, ObjectId};

// ============================================================================
// Parameters
// ============================================================================

/// Kind of function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Before the `/` separator.
    PositionalOnly,
    /// Regular parameter.
    #[default]
    PositionalOrKeyword,
    /// `*args`.
    VarPositional,
    /// After `*` or `*args`.
    KeywordOnly,
    /// `**kwargs`.
    VarKeyword,
}

/// A single function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
    pub docstring: Option<Docstring>,
    /// Owning function, set when the function is added to a collection.
    #[serde(skip)]
    pub(crate) function: Option<ObjectId>,
}

impl Parameter {
    /// Create a positional-or-keyword parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            kind: ParameterKind::default(),
            annotation: None,
            default: None,
            docstring: None,
            function: None,
        }
    }

    pub fn with_kind(mut self, kind: ParameterKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_annotation(mut self, annotation: Expr) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_docstring(mut self, docstring: Docstring) -> Self {
        self.docstring = Some(docstring);
        self
    }

    /// The function this parameter belongs to.
    pub fn function(&self) -> Option<ObjectId> {
        self.function
    }

    /// Whether the parameter must be passed by position.
    pub fn is_positional_only(&self) -> bool {
        self.kind == ParameterKind::PositionalOnly
    }

    /// Whether the parameter is `*args` or `**kwargs`.
    pub fn is_variadic(&self) -> bool {
        matches!(
            self.kind,
            ParameterKind::VarPositional | ParameterKind::VarKeyword
        )
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Ordered parameter list of a function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    params: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from parameters, rejecting duplicate names.
    pub fn from_params(
        params: impl IntoIterator<Item = Parameter>,
    ) -> Result<Self, ParameterError> {
        let mut list = Parameters::new();
        for param in params {
            list.add(param)?;
        }
        Ok(list)
    }

    /// Append a parameter.
    pub fn add(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if self.contains(&param.name) {
            return Err(ParameterError::Duplicate { name: param.name });
        }
        self.params.push(param);
        Ok(())
    }

    /// Remove a parameter by name, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let index = self.params.iter().position(|p| p.name == name)?;
        Some(self.params.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn get_index(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    pub(crate) fn attach(&mut self, function: ObjectId) {
        for param in &mut self.params {
            param.function = Some(function);
        }
    }
}

// ============================================================================
// Type Parameters
// ============================================================================

/// Kind of generic type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TypeParameterKind {
    /// `T`
    #[default]
    TypeVar,
    /// `*Ts`
    TypeVarTuple,
    /// `**P`
    ParamSpec,
}

impl TypeParameterKind {
    /// Prefix used when the parameter is rendered in a path.
    pub fn prefix(&self) -> &'static str {
        match self {
            TypeParameterKind::TypeVar => "",
            TypeParameterKind::TypeVarTuple => "*",
            TypeParameterKind::ParamSpec => "**",
        }
    }
}

/// A generic type parameter of a class, function or type alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParameter {
    pub name: String,
    pub kind: TypeParameterKind,
    pub bound: Option<Expr>,
    pub default: Option<Expr>,
}

impl TypeParameter {
    pub fn new(name: impl Into<String>, kind: TypeParameterKind) -> Self {
        TypeParameter {
            name: name.into(),
            kind,
            bound: None,
            default: None,
        }
    }

    pub fn with_bound(mut self, bound: Expr) -> Self {
        self.bound = Some(bound);
        self
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

/// Ordered list of type parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParameters {
    params: Vec<TypeParameter>,
}

impl TypeParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from type parameters, rejecting duplicate names.
    pub fn from_params(
        params: impl IntoIterator<Item = TypeParameter>,
    ) -> Result<Self, ParameterError> {
        let mut list = TypeParameters::new();
        for param in params {
            list.add(param)?;
        }
        Ok(list)
    }

    pub fn add(&mut self, param: TypeParameter) -> Result<(), ParameterError> {
        if self.contains(&param.name) {
            return Err(ParameterError::Duplicate { name: param.name });
        }
        self.params.push(param);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<TypeParameter> {
        let index = self.params.iter().position(|p| p.name == name)?;
        Some(self.params.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&TypeParameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn get_index(&self, index: usize) -> Option<&TypeParameter> {
        self.params.get(index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeParameter> {
        self.params.iter()
    }
}
