//! Entity model: modules, classes, functions, attributes, type aliases and aliases.
//!
//! Every node of the API graph is an [`Object`] stored in the arena of a
//! [`ModulesCollection`](crate::collection::ModulesCollection) and addressed by
//! an [`ObjectId`]. Kind-specific data lives in the closed [`ObjectData`] union.
//!
//! # Ownership
//!
//! The tree is owned by the members maps: a parent's `members` map is the only
//! owning edge. `parent` links and the `aliases` back-reference sets are plain
//! ids and are maintained by the collection, never by callers.
//!
//! # Building objects
//!
//! Objects are described with the constructors and `with_*` builders below and
//! then handed to [`ModulesCollection::add`](crate::collection::ModulesCollection::add),
//! which assigns the id and inserts them under their parent:
//!
//! ```
//! use tugapi_core::collection::ModulesCollection;
//! use tugapi_core::model::{Expr, Object};
//!
//! let mut collection = ModulesCollection::new();
//! let pkg = collection.add(None, Object::module("pkg")).unwrap();
//! let base = collection.add(Some(pkg), Object::class("Base").with_lines(1, 3)).unwrap();
//! let child = collection
//!     .add(Some(pkg), Object::class("Child").with_bases(vec![Expr::name("Base")]))
//!     .unwrap();
//! assert_eq!(collection.mro(child).unwrap(), vec![base]);
//! ```

mod expr;
mod parameters;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use expr::Expr;
pub use parameters::{
    Parameter, ParameterKind, Parameters, TypeParameter, TypeParameterKind, TypeParameters,
};

/// Label carried by attributes assigned on `self` inside methods.
pub const INSTANCE_ATTRIBUTE_LABEL: &str = "instance-attribute";

/// Name of the class initializer.
pub const INITIALIZER_NAME: &str = "__init__";

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for an object within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Create a new object ID.
    pub fn new(id: u32) -> Self {
        ObjectId(id)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj_{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Kind of object.
///
/// `Alias` is also the fallback kind reported for aliases whose target
/// cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Module,
    Class,
    Function,
    Attribute,
    TypeAlias,
    Alias,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Kind::Module => "module",
            Kind::Class => "class",
            Kind::Function => "function",
            Kind::Attribute => "attribute",
            Kind::TypeAlias => "type alias",
            Kind::Alias => "alias",
        };
        f.write_str(text)
    }
}

/// Where a module comes from on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModulePath {
    /// A regular module or package `__init__` file.
    File(PathBuf),
    /// A namespace package spread over several directories.
    Namespace(Vec<PathBuf>),
    /// A module without a file (built-in or synthesized).
    #[default]
    Builtin,
}

/// An entry of a module's export list (`__all__`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportEntry {
    /// A literal exported name.
    Name(String),
    /// A reference to another module's export list, e.g. `sub.__all__`.
    Reference(Expr),
}

impl ExportEntry {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            ExportEntry::Name(name) => Some(name),
            ExportEntry::Reference(_) => None,
        }
    }
}

// ============================================================================
// Docstrings
// ============================================================================

/// A docstring owned by an object or a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Docstring {
    pub value: String,
    pub lineno: Option<u32>,
    pub endlineno: Option<u32>,
}

impl Docstring {
    pub fn new(value: impl Into<String>) -> Self {
        Docstring {
            value: value.into(),
            lineno: None,
            endlineno: None,
        }
    }

    pub fn with_lines(mut self, lineno: u32, endlineno: u32) -> Self {
        self.lineno = Some(lineno);
        self.endlineno = Some(endlineno);
        self
    }
}

// ============================================================================
// Kind-Specific Data
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleData {
    pub filepath: ModulePath,
    /// Declared export list; `None` when the module declares none.
    pub exports: Option<Vec<ExportEntry>>,
}

impl ModuleData {
    /// Literal names of the export list.
    pub fn export_names(&self) -> Option<impl Iterator<Item = &str>> {
        self.exports
            .as_ref()
            .map(|exports| exports.iter().filter_map(ExportEntry::as_name))
    }

    pub fn exports_name(&self, name: &str) -> bool {
        self.export_names()
            .map(|mut names| names.any(|n| n == name))
            .unwrap_or(false)
    }

    pub fn is_namespace_package(&self) -> bool {
        matches!(self.filepath, ModulePath::Namespace(_))
    }

    /// Whether this module is the `__init__` file of a package.
    pub fn is_init_module(&self) -> bool {
        match &self.filepath {
            ModulePath::File(path) => path
                .file_stem()
                .map(|stem| stem == "__init__")
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn is_package(&self) -> bool {
        self.is_init_module() || self.is_namespace_package()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassData {
    pub bases: Vec<Expr>,
    pub decorators: Vec<Expr>,
    pub type_parameters: TypeParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionData {
    pub parameters: Parameters,
    pub returns: Option<Expr>,
    pub decorators: Vec<Expr>,
    pub type_parameters: TypeParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeData {
    pub value: Option<Expr>,
    pub annotation: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAliasData {
    pub value: Expr,
    pub type_parameters: TypeParameters,
}

/// Resolution state of an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasState {
    /// Only the target path is known.
    Unresolved,
    /// The target was found; it may itself be an alias.
    Resolved(ObjectId),
    /// The alias chain loops; the chain is kept for diagnostics.
    Cyclic(Vec<String>),
}

/// An indirection created by an import or re-export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasData {
    pub(crate) target_path: String,
    pub(crate) state: AliasState,
    pub(crate) resolving: bool,
    pub(crate) inherited: bool,
    pub(crate) wildcard: bool,
}

impl AliasData {
    pub(crate) fn new(target_path: String) -> Self {
        AliasData {
            target_path,
            state: AliasState::Unresolved,
            resolving: false,
            inherited: false,
            wildcard: false,
        }
    }

    /// Path the alias points at.
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn state(&self) -> &AliasState {
        &self.state
    }

    /// The direct target, once resolved.
    pub fn target(&self) -> Option<ObjectId> {
        match self.state {
            AliasState::Resolved(target) => Some(target),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, AliasState::Resolved(_))
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self.state, AliasState::Cyclic(_))
    }

    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Whether this alias stands for a `from module import *` statement.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The module a wildcard import pulls names from.
    pub fn wildcard_module(&self) -> Option<&str> {
        self.wildcard.then_some(self.target_path.as_str())
    }
}

/// Kind-specific payload of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectData {
    Module(ModuleData),
    Class(ClassData),
    Function(FunctionData),
    Attribute(AttributeData),
    TypeAlias(TypeAliasData),
    Alias(AliasData),
}

// ============================================================================
// Objects
// ============================================================================

/// A node of the API graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub name: String,
    pub lineno: Option<u32>,
    pub endlineno: Option<u32>,
    pub docstring: Option<Docstring>,
    pub labels: BTreeSet<String>,
    pub data: ObjectData,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) members: IndexMap<String, ObjectId>,
    pub(crate) aliases: BTreeSet<ObjectId>,
}

impl Object {
    fn with_data(name: impl Into<String>, data: ObjectData) -> Self {
        Object {
            name: name.into(),
            lineno: None,
            endlineno: None,
            docstring: None,
            labels: BTreeSet::new(),
            data,
            parent: None,
            members: IndexMap::new(),
            aliases: BTreeSet::new(),
        }
    }

    /// Describe a module without a file.
    pub fn module(name: impl Into<String>) -> Self {
        Self::with_data(name, ObjectData::Module(ModuleData::default()))
    }

    /// Describe a module backed by a file.
    pub fn module_at(name: impl Into<String>, filepath: impl Into<PathBuf>) -> Self {
        Self::with_data(
            name,
            ObjectData::Module(ModuleData {
                filepath: ModulePath::File(filepath.into()),
                exports: None,
            }),
        )
    }

    /// Describe a namespace package spread over several directories.
    pub fn namespace_package(name: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self::with_data(
            name,
            ObjectData::Module(ModuleData {
                filepath: ModulePath::Namespace(paths),
                exports: None,
            }),
        )
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::with_data(name, ObjectData::Class(ClassData::default()))
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::with_data(name, ObjectData::Function(FunctionData::default()))
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Self::with_data(name, ObjectData::Attribute(AttributeData::default()))
    }

    pub fn type_alias(name: impl Into<String>, value: Expr) -> Self {
        Self::with_data(
            name,
            ObjectData::TypeAlias(TypeAliasData {
                value,
                type_parameters: TypeParameters::new(),
            }),
        )
    }

    /// Describe an alias pointing at a dotted path.
    pub fn alias(name: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self::with_data(name, ObjectData::Alias(AliasData::new(target_path.into())))
    }

    /// Describe a `from module import *` statement.
    ///
    /// The member key is `module.*` so several wildcard imports can coexist.
    pub fn wildcard_import(module_path: impl Into<String>) -> Self {
        let module_path = module_path.into();
        let mut data = AliasData::new(module_path.clone());
        data.wildcard = true;
        Self::with_data(format!("{}.*", module_path), ObjectData::Alias(data))
    }

    // ------------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------------

    pub fn with_lines(mut self, lineno: u32, endlineno: u32) -> Self {
        self.lineno = Some(lineno);
        self.endlineno = Some(endlineno);
        self
    }

    pub fn with_lineno(mut self, lineno: u32) -> Self {
        self.lineno = Some(lineno);
        self.endlineno = Some(lineno);
        self
    }

    pub fn with_docstring(mut self, docstring: Docstring) -> Self {
        self.docstring = Some(docstring);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// Set the export list. Only meaningful for modules.
    pub fn with_exports(mut self, exports: Vec<ExportEntry>) -> Self {
        if let ObjectData::Module(module) = &mut self.data {
            module.exports = Some(exports);
        }
        self
    }

    /// Set base classes. Only meaningful for classes.
    pub fn with_bases(mut self, bases: Vec<Expr>) -> Self {
        if let ObjectData::Class(class) = &mut self.data {
            class.bases = bases;
        }
        self
    }

    /// Set decorators. Only meaningful for classes and functions.
    pub fn with_decorators(mut self, decorators: Vec<Expr>) -> Self {
        match &mut self.data {
            ObjectData::Class(class) => class.decorators = decorators,
            ObjectData::Function(function) => function.decorators = decorators,
            _ => {}
        }
        self
    }

    /// Set parameters. Only meaningful for functions.
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        if let ObjectData::Function(function) = &mut self.data {
            function.parameters = parameters;
        }
        self
    }

    /// Set the return annotation. Only meaningful for functions.
    pub fn with_returns(mut self, returns: Expr) -> Self {
        if let ObjectData::Function(function) = &mut self.data {
            function.returns = Some(returns);
        }
        self
    }

    /// Set the assigned value. Only meaningful for attributes.
    pub fn with_value(mut self, value: Expr) -> Self {
        if let ObjectData::Attribute(attribute) = &mut self.data {
            attribute.value = Some(value);
        }
        self
    }

    /// Set the annotation. Only meaningful for attributes.
    pub fn with_annotation(mut self, annotation: Expr) -> Self {
        if let ObjectData::Attribute(attribute) = &mut self.data {
            attribute.annotation = Some(annotation);
        }
        self
    }

    /// Set generic type parameters for classes, functions and type aliases.
    pub fn with_type_parameters(mut self, type_parameters: TypeParameters) -> Self {
        match &mut self.data {
            ObjectData::Class(class) => class.type_parameters = type_parameters,
            ObjectData::Function(function) => function.type_parameters = type_parameters,
            ObjectData::TypeAlias(alias) => alias.type_parameters = type_parameters,
            _ => {}
        }
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn kind(&self) -> Kind {
        match self.data {
            ObjectData::Module(_) => Kind::Module,
            ObjectData::Class(_) => Kind::Class,
            ObjectData::Function(_) => Kind::Function,
            ObjectData::Attribute(_) => Kind::Attribute,
            ObjectData::TypeAlias(_) => Kind::TypeAlias,
            ObjectData::Alias(_) => Kind::Alias,
        }
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Declared members, in insertion order.
    pub fn members(&self) -> &IndexMap<String, ObjectId> {
        &self.members
    }

    /// Aliases currently resolved to this object.
    pub fn aliases(&self) -> &BTreeSet<ObjectId> {
        &self.aliases
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.data, ObjectData::Alias(_))
    }

    pub fn is_module(&self) -> bool {
        matches!(self.data, ObjectData::Module(_))
    }

    pub fn is_class(&self) -> bool {
        matches!(self.data, ObjectData::Class(_))
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn as_module(&self) -> Option<&ModuleData> {
        match &self.data {
            ObjectData::Module(module) => Some(module),
            _ => None,
        }
    }

    pub fn as_module_mut(&mut self) -> Option<&mut ModuleData> {
        match &mut self.data {
            ObjectData::Module(module) => Some(module),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassData> {
        match &self.data {
            ObjectData::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.data {
            ObjectData::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_alias(&self) -> Option<&AliasData> {
        match &self.data {
            ObjectData::Alias(alias) => Some(alias),
            _ => None,
        }
    }

    pub(crate) fn as_alias_mut(&mut self) -> Option<&mut AliasData> {
        match &mut self.data {
            ObjectData::Alias(alias) => Some(alias),
            _ => None,
        }
    }

    /// Generic type parameters, for the kinds that declare them.
    pub fn type_parameters(&self) -> Option<&TypeParameters> {
        match &self.data {
            ObjectData::Class(class) => Some(&class.type_parameters),
            ObjectData::Function(function) => Some(&function.type_parameters),
            ObjectData::TypeAlias(alias) => Some(&alias.type_parameters),
            _ => None,
        }
    }
}

/// Whether a name is private by convention (`_name`, but not `__dunder__`).
pub fn is_private_name(name: &str) -> bool {
    name.starts_with('_') && !is_special_name(name)
}

/// Whether a name is a `__dunder__` name.
pub fn is_special_name(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}
