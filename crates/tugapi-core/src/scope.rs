//! Lexical name resolution.
//!
//! [`ModulesCollection::resolve`] turns a bare name used inside an object
//! into the dotted path of what it refers to, walking outward through the
//! parent chain:
//!
//! 1. declared type parameters resolve to `path[name]` (`path[*Ts]`, `path[**P]`)
//! 2. direct members resolve to their path, or their target path for aliases
//! 3. the enclosing class or function resolves to itself by name
//! 4. otherwise the parent scope is asked
//!
//! Class initializers get special treatment: their parameters resolve to
//! `Class(name)`, and a name that would land on an instance attribute of the
//! class skips the class scope, because such attributes are assigned by the
//! initializer itself.

use crate::collection::ModulesCollection;
use crate::error::NameResolutionError;
use crate::model::{ObjectData, ObjectId, INITIALIZER_NAME, INSTANCE_ATTRIBUTE_LABEL};

impl ModulesCollection {
    /// Resolve `name` as seen from inside `scope`.
    pub fn resolve(&self, scope: ObjectId, name: &str) -> Result<String, NameResolutionError> {
        let object = &self[scope];
        if let (ObjectData::Function(function), Some(class)) = (&object.data, object.parent) {
            if object.name == INITIALIZER_NAME && self[class].is_class() {
                if function.parameters.contains(name) {
                    return Ok(format!("{}({})", self.path(class), name));
                }
                return self.resolve_in_initializer(scope, class, name);
            }
        }
        self.resolve_in_scope(scope, name)
    }

    fn resolve_in_initializer(
        &self,
        scope: ObjectId,
        class: ObjectId,
        name: &str,
    ) -> Result<String, NameResolutionError> {
        let resolved = self.resolve_in_scope(scope, name)?;
        let shadowed = self[class]
            .members()
            .get(name)
            .map(|member| {
                self[*member].has_label(INSTANCE_ATTRIBUTE_LABEL) && self.path(*member) == resolved
            })
            .unwrap_or(false);
        if !shadowed {
            return Ok(resolved);
        }
        match self[class].parent() {
            Some(outer) => self.resolve(outer, name),
            None => Err(self.unresolvable(scope, name)),
        }
    }

    fn resolve_in_scope(&self, scope: ObjectId, name: &str) -> Result<String, NameResolutionError> {
        let object = &self[scope];

        if let Some(param) = object
            .type_parameters()
            .and_then(|params| params.get(name))
        {
            return Ok(format!(
                "{}[{}{}]",
                self.path(scope),
                param.kind.prefix(),
                name
            ));
        }

        if let Some(member) = object.members().get(name) {
            return Ok(match self.target_path(*member) {
                Some(target_path) => target_path.to_string(),
                None => self.path(*member),
            });
        }

        let Some(parent) = object.parent() else {
            return Err(self.unresolvable(scope, name));
        };

        if name == self[parent].name && !self[parent].is_module() {
            return Ok(self.path(parent));
        }

        self.resolve(parent, name)
    }

    fn unresolvable(&self, scope: ObjectId, name: &str) -> NameResolutionError {
        NameResolutionError {
            name: name.to_string(),
            scope: self.path(scope),
        }
    }
}
