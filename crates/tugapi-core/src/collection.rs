//! The modules collection: object arena plus registry of top-level modules.
//!
//! [`ModulesCollection`] owns every object of one analysis run. Top-level
//! modules are registered by name; everything else is reached by descending
//! through `members` maps with dotted paths.
//!
//! # Member replacement
//!
//! [`ModulesCollection::set_member`] is the single write path for the tree.
//! When it replaces an existing non-alias member it:
//!
//! 1. asks the installed [`StubMerger`] to combine two modules with
//!    differing file paths (a regular module and its `.pyi` stub),
//! 2. detaches the old member,
//! 3. retargets every alias recorded in the old member's back-reference set
//!    to the new value once it is in place.
//!
//! # Back-references
//!
//! Each object keeps the ids of the aliases currently resolved to it. The set
//! is bookkeeping for propagation only; it is cleared explicitly on removal
//! and replacement.

use std::ops::{Index, IndexMut};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{AliasError, ApiResult, MemberError};
use crate::model::{
    is_private_name, is_special_name, AliasState, Expr, Kind, ModulePath, Object, ObjectData,
    ObjectId,
};

// ============================================================================
// Stub Merging Hook
// ============================================================================

/// Combines a regular module with its type stub counterpart.
///
/// Called by [`ModulesCollection::set_member`] when a module member is
/// replaced by another module with a different file path. The merger may
/// edit either module and returns the id that should occupy the slot.
pub trait StubMerger {
    fn merge(
        &mut self,
        collection: &mut ModulesCollection,
        old: ObjectId,
        new: ObjectId,
    ) -> ApiResult<ObjectId>;
}

/// Default merge policy: the new module replaces the old one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewWins;

impl StubMerger for NewWins {
    fn merge(
        &mut self,
        _collection: &mut ModulesCollection,
        _old: ObjectId,
        new: ObjectId,
    ) -> ApiResult<ObjectId> {
        Ok(new)
    }
}

// ============================================================================
// ModulesCollection
// ============================================================================

/// Arena of objects plus the registry of top-level modules.
#[derive(Default)]
pub struct ModulesCollection {
    objects: Vec<Object>,
    modules: IndexMap<String, ObjectId>,
    stub_merger: Option<Box<dyn StubMerger>>,
}

impl std::fmt::Debug for ModulesCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModulesCollection")
            .field("objects", &self.objects.len())
            .field("modules", &self.modules)
            .field("stub_merger", &self.stub_merger.is_some())
            .finish()
    }
}

impl Index<ObjectId> for ModulesCollection {
    type Output = Object;

    fn index(&self, id: ObjectId) -> &Object {
        &self.objects[id.index()]
    }
}

impl IndexMut<ObjectId> for ModulesCollection {
    fn index_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.index()]
    }
}

impl ModulesCollection {
    /// Create an empty collection with the "new wins" stub policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a stub merging policy.
    pub fn set_stub_merger(&mut self, merger: Box<dyn StubMerger>) {
        self.stub_merger = Some(merger);
    }

    /// Object by id, if the id belongs to this collection.
    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.index())
    }

    /// Number of objects ever allocated, attached or not.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Registered top-level modules, in registration order.
    pub fn modules(&self) -> &IndexMap<String, ObjectId> {
        &self.modules
    }

    /// Whether a top-level name is registered.
    pub fn contains_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    // ------------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------------

    /// Allocate `object` and insert it under `parent` (or the registry).
    ///
    /// Returns the id occupying the slot afterwards. That is the new object
    /// unless a [`StubMerger`] kept the module already there.
    pub fn add(&mut self, parent: Option<ObjectId>, object: Object) -> ApiResult<ObjectId> {
        if object.name.is_empty() {
            return Err(MemberError::EmptyName.into());
        }
        let name = object.name.clone();
        let id = self.alloc(object);
        Ok(self.replace_member(parent, &name, id))
    }

    /// Allocate an alias already resolved to `target`.
    ///
    /// Self-aliases are rejected with a cyclic error.
    pub fn add_resolved_alias(
        &mut self,
        parent: ObjectId,
        name: &str,
        target: ObjectId,
        lineno: Option<u32>,
        endlineno: Option<u32>,
    ) -> ApiResult<ObjectId> {
        let target_path = self.path(target);
        if target_path == format!("{}.{}", self.path(parent), name) {
            return Err(AliasError::Cyclic {
                chain: vec![target_path],
            }
            .into());
        }
        let mut object = Object::alias(name, target_path);
        object.lineno = lineno;
        object.endlineno = endlineno;
        let id = self.add(Some(parent), object)?;
        self.set_alias_target(id, target)?;
        Ok(id)
    }

    /// Register a module, at the top level when `parent` is `None`.
    pub fn add_module(
        &mut self,
        parent: Option<ObjectId>,
        name: &str,
        filepath: ModulePath,
    ) -> ApiResult<ObjectId> {
        let mut object = Object::module(name);
        if let Some(module) = object.as_module_mut() {
            module.filepath = filepath;
        }
        self.add(parent, object)
    }

    pub fn add_class(
        &mut self,
        parent: ObjectId,
        name: &str,
        lines: Option<(u32, u32)>,
    ) -> ApiResult<ObjectId> {
        self.add_with_lines(parent, Object::class(name), lines)
    }

    pub fn add_function(
        &mut self,
        parent: ObjectId,
        name: &str,
        lines: Option<(u32, u32)>,
    ) -> ApiResult<ObjectId> {
        self.add_with_lines(parent, Object::function(name), lines)
    }

    pub fn add_attribute(
        &mut self,
        parent: ObjectId,
        name: &str,
        lines: Option<(u32, u32)>,
    ) -> ApiResult<ObjectId> {
        self.add_with_lines(parent, Object::attribute(name), lines)
    }

    pub fn add_type_alias(
        &mut self,
        parent: ObjectId,
        name: &str,
        value: Expr,
        lines: Option<(u32, u32)>,
    ) -> ApiResult<ObjectId> {
        self.add_with_lines(parent, Object::type_alias(name, value), lines)
    }

    /// Record an import of `target_path` under `name`.
    pub fn add_alias(
        &mut self,
        parent: ObjectId,
        name: &str,
        target_path: &str,
        lines: Option<(u32, u32)>,
    ) -> ApiResult<ObjectId> {
        self.add_with_lines(parent, Object::alias(name, target_path), lines)
    }

    /// Record `from module_path import *`.
    pub fn add_wildcard_import(
        &mut self,
        parent: ObjectId,
        module_path: &str,
        lines: Option<(u32, u32)>,
    ) -> ApiResult<ObjectId> {
        self.add_with_lines(parent, Object::wildcard_import(module_path), lines)
    }

    fn add_with_lines(
        &mut self,
        parent: ObjectId,
        object: Object,
        lines: Option<(u32, u32)>,
    ) -> ApiResult<ObjectId> {
        let object = match lines {
            Some((lineno, endlineno)) => object.with_lines(lineno, endlineno),
            None => object,
        };
        self.add(Some(parent), object)
    }

    fn alloc(&mut self, mut object: Object) -> ObjectId {
        let id = ObjectId::new(self.objects.len() as u32);
        object.parent = None;
        object.members.clear();
        object.aliases.clear();
        if let ObjectData::Function(function) = &mut object.data {
            function.parameters.attach(id);
        }
        self.objects.push(object);
        id
    }

    fn members_of(&self, owner: Option<ObjectId>) -> &IndexMap<String, ObjectId> {
        match owner {
            Some(id) => &self[id].members,
            None => &self.modules,
        }
    }

    fn members_of_mut(&mut self, owner: Option<ObjectId>) -> &mut IndexMap<String, ObjectId> {
        match owner {
            Some(id) => &mut self[id].members,
            None => &mut self.modules,
        }
    }

    // ------------------------------------------------------------------------
    // Member Access
    // ------------------------------------------------------------------------

    /// Insert or replace a member at a dotted path below `owner`.
    ///
    /// `owner == None` addresses the registry. Intermediate segments must
    /// already exist.
    pub fn set_member(
        &mut self,
        owner: Option<ObjectId>,
        path: &str,
        value: ObjectId,
    ) -> ApiResult<()> {
        let (owner, name) = self.split_owner(owner, path)?;
        self.replace_member(owner, &name, value);
        Ok(())
    }

    /// Declared member at a dotted path below `owner`.
    ///
    /// Intermediate aliases are followed to their final target without
    /// resolving anything. The last segment is returned as stored, so an
    /// alias member comes back as the alias itself.
    pub fn get_member(&self, owner: Option<ObjectId>, path: &str) -> Result<ObjectId, MemberError> {
        if let Some((_, member)) = self.member_by_key(owner, path) {
            return Ok(member);
        }
        let parts = split_path(path)?;
        let mut current = owner;
        let mut found = None;
        for (index, part) in parts.iter().enumerate() {
            let scope = match current {
                Some(id) => Some(self.follow_for_members(id).ok_or_else(|| not_found(path))?),
                None => None,
            };
            let member = *self
                .members_of(scope)
                .get(*part)
                .ok_or_else(|| not_found(&parts[..=index].join(".")))?;
            current = Some(member);
            found = Some(member);
        }
        found.ok_or(MemberError::EmptyName)
    }

    /// Look up a dotted path from the registry.
    pub fn lookup(&self, path: &str) -> Result<ObjectId, MemberError> {
        self.get_member(None, path)
    }

    /// Like [`get_member`](Self::get_member), but the first segment may also
    /// be an inherited member of a class.
    ///
    /// Inherited members are synthesized views, so an inherited hit returns
    /// the ancestor's member id.
    pub fn get_any_member(&self, owner: ObjectId, path: &str) -> Result<ObjectId, MemberError> {
        let parts = split_path(path)?;
        let scope = self.follow_for_members(owner).ok_or_else(|| not_found(path))?;
        let first = match self.all_members(scope).get(parts[0]) {
            Some(member) => member.target(),
            None => return Err(not_found(parts[0])),
        };
        if parts.len() == 1 {
            return Ok(first);
        }
        self.get_member(Some(first), &parts[1..].join("."))
    }

    /// Remove the member at a dotted path below `owner`, returning its id.
    ///
    /// Back-references are revoked in both directions: the removed alias
    /// leaves its target's alias set, and aliases that pointed at the removed
    /// object or anything below it become unresolved again.
    pub fn del_member(&mut self, owner: Option<ObjectId>, path: &str) -> ApiResult<ObjectId> {
        let (owner, name) = self.split_owner(owner, path)?;
        let removed = match self.members_of_mut(owner).shift_remove(&name) {
            Some(removed) => removed,
            None => {
                let inherited = owner
                    .map(|id| self.inherited_members(id).contains_key(&name))
                    .unwrap_or(false);
                let full = self.join_path(owner, &name);
                return Err(if inherited {
                    MemberError::InheritedOnly { path: full }
                } else {
                    MemberError::NotFound { path: full }
                }
                .into());
            }
        };
        self.detach(removed);
        Ok(removed)
    }

    fn split_owner(
        &self,
        owner: Option<ObjectId>,
        path: &str,
    ) -> Result<(Option<ObjectId>, String), MemberError> {
        if let Some((scope, _)) = self.member_by_key(owner, path) {
            return Ok((scope, path.to_string()));
        }
        let parts = split_path(path)?;
        let (name, parents) = parts.split_last().ok_or(MemberError::EmptyName)?;
        let owner = if parents.is_empty() {
            owner
        } else {
            let parent = self.get_member(owner, &parents.join("."))?;
            Some(self.follow_for_members(parent).ok_or_else(|| not_found(path))?)
        };
        Ok((owner, name.to_string()))
    }

    /// Member stored under a dotted key, as wildcard imports (`pkg.b.*`) are.
    fn member_by_key(
        &self,
        owner: Option<ObjectId>,
        key: &str,
    ) -> Option<(Option<ObjectId>, ObjectId)> {
        if !key.contains('.') {
            return None;
        }
        let scope = match owner {
            Some(id) => Some(self.follow_for_members(id)?),
            None => None,
        };
        self.members_of(scope).get(key).map(|member| (scope, *member))
    }

    /// Object whose members an access through `id` reads: aliases are
    /// followed to their final target.
    fn follow_for_members(&self, id: ObjectId) -> Option<ObjectId> {
        if self[id].is_alias() {
            self.final_target(id).ok()
        } else {
            Some(id)
        }
    }

    fn replace_member(
        &mut self,
        owner: Option<ObjectId>,
        name: &str,
        value: ObjectId,
    ) -> ObjectId {
        let incoming = value;
        let mut value = value;
        let mut orphaned: Vec<ObjectId> = Vec::new();
        if let Some(old) = self.members_of(owner).get(name).copied() {
            if old != value {
                if !self[old].is_alias() {
                    if self.is_stub_pair(old, value) {
                        value = self.merge_stubs(old, value);
                    }
                    orphaned = self[old].aliases.iter().copied().collect();
                }
                if old != value {
                    self.detach(old);
                }
            }
        }
        if value != incoming {
            // The merger kept the module in place; the incoming one is dropped.
            self.unregister(incoming);
            self.detach(incoming);
        }
        if (self[value].parent, self[value].name.as_str()) != (owner, name) {
            self.unregister(value);
        }
        self[value].parent = owner;
        self[value].name = name.to_string();
        self.members_of_mut(owner).insert(name.to_string(), value);

        // Retarget once `value` sits at its final path.
        for alias in orphaned {
            if let Err(err) = self.set_alias_target(alias, value) {
                debug!(alias = %self.path(alias), error = %err, "could not retarget alias");
                self.unbind_alias(alias);
            }
        }
        value
    }

    /// Remove `id` from the members map of its current owner, if it is there.
    fn unregister(&mut self, id: ObjectId) {
        let owner = self[id].parent;
        let name = self[id].name.clone();
        if self.members_of(owner).get(&name) == Some(&id) {
            self.members_of_mut(owner).shift_remove(&name);
        }
    }

    fn is_stub_pair(&self, old: ObjectId, new: ObjectId) -> bool {
        match (self[old].as_module(), self[new].as_module()) {
            (Some(old), Some(new)) => {
                !old.is_namespace_package()
                    && old.filepath != new.filepath
                    && old.filepath != ModulePath::Builtin
                    && new.filepath != ModulePath::Builtin
            }
            _ => false,
        }
    }

    fn merge_stubs(&mut self, old: ObjectId, new: ObjectId) -> ObjectId {
        let mut merger = self.stub_merger.take();
        let merged = match merger.as_mut() {
            Some(merger) => match merger.merge(self, old, new) {
                Ok(merged) => merged,
                Err(err) => {
                    debug!(
                        module = %self.path(new),
                        error = %err,
                        "stub merge failed, keeping new module"
                    );
                    new
                }
            },
            None => new,
        };
        self.stub_merger = merger;
        merged
    }

    /// Cut `id` loose from the tree and revoke the back-references of its
    /// whole subtree.
    fn detach(&mut self, id: ObjectId) {
        self[id].parent = None;
        if let Some(target) = self[id].as_alias().and_then(|alias| alias.target()) {
            self[target].aliases.remove(&id);
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let aliases = std::mem::take(&mut self[current].aliases);
            for alias in aliases {
                self.unbind_alias(alias);
            }
            stack.extend(self[current].members.values().copied());
        }
    }

    /// Return an alias to the unresolved state, keeping its target path.
    pub(crate) fn unbind_alias(&mut self, alias: ObjectId) {
        if let Some(target) = self[alias].as_alias().and_then(|data| data.target()) {
            self[target].aliases.remove(&alias);
        }
        if let Some(data) = self[alias].as_alias_mut() {
            data.state = AliasState::Unresolved;
        }
    }

    // ------------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------------

    /// Dotted path through which the object was reached (import site for aliases).
    pub fn path(&self, id: ObjectId) -> String {
        let mut names = vec![self[id].name.as_str()];
        let mut current = self[id].parent;
        while let Some(parent) = current {
            names.push(self[parent].name.as_str());
            current = self[parent].parent;
        }
        names.reverse();
        names.join(".")
    }

    /// Dotted path where the object is defined.
    ///
    /// For aliases this is the canonical path of the final target; when the
    /// chain cannot be followed the target path is returned instead.
    pub fn canonical_path(&self, id: ObjectId) -> String {
        match self[id].as_alias() {
            Some(alias) => match self.final_target(id) {
                Ok(target) => self.path(target),
                Err(_) => alias.target_path().to_string(),
            },
            None => self.path(id),
        }
    }

    /// Target path of an alias, or `None` for other objects.
    pub fn target_path(&self, id: ObjectId) -> Option<&str> {
        self[id].as_alias().map(|alias| alias.target_path())
    }

    fn join_path(&self, owner: Option<ObjectId>, name: &str) -> String {
        match owner {
            Some(owner) => format!("{}.{}", self.path(owner), name),
            None => name.to_string(),
        }
    }

    /// Top-level ancestor of an object.
    pub fn package(&self, id: ObjectId) -> ObjectId {
        let mut current = id;
        while let Some(parent) = self[current].parent {
            current = parent;
        }
        current
    }

    /// Name of the top-level package an object lives in.
    pub fn package_name(&self, id: ObjectId) -> &str {
        &self[self.package(id)].name
    }

    /// Closest enclosing module, the object itself included.
    pub fn module_of(&self, id: ObjectId) -> Option<ObjectId> {
        let mut current = Some(id);
        while let Some(object) = current {
            if self[object].is_module() {
                return Some(object);
            }
            current = self[object].parent;
        }
        None
    }

    // ------------------------------------------------------------------------
    // Kinds and Visibility
    // ------------------------------------------------------------------------

    /// Kind of the object as stored.
    pub fn kind(&self, id: ObjectId) -> Kind {
        self[id].kind()
    }

    /// Kind of the final target, or [`Kind::Alias`] when the chain is broken.
    pub fn resolved_kind(&self, id: ObjectId) -> Kind {
        match self.final_target(id) {
            Ok(target) => self[target].kind(),
            Err(_) => Kind::Alias,
        }
    }

    /// Whether the object's parent module lists it in its export list.
    pub fn is_exported(&self, id: ObjectId) -> bool {
        let object = &self[id];
        object
            .parent
            .and_then(|parent| self[parent].as_module())
            .map(|module| module.exports_name(&object.name))
            .unwrap_or(false)
    }

    /// Whether a wildcard import of the parent module exposes this object.
    ///
    /// With an export list, only exported names are exposed. Without one,
    /// public names are exposed, except submodules that were never imported.
    /// Unexpanded wildcard imports are never exposed.
    pub fn is_wildcard_exposed(&self, id: ObjectId) -> bool {
        let object = &self[id];
        if object.as_alias().is_some_and(|alias| alias.is_wildcard()) {
            return false;
        }
        if let Some(module) = object.parent.and_then(|parent| self[parent].as_module()) {
            if module.exports.is_some() {
                return module.exports_name(&object.name);
            }
        }
        if is_private_name(&object.name) || is_special_name(&object.name) {
            return false;
        }
        object.is_alias() || !object.is_module()
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, MemberError> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(MemberError::EmptyName);
    }
    Ok(path.split('.').collect())
}

fn not_found(path: &str) -> MemberError {
    MemberError::NotFound {
        path: path.to_string(),
    }
}
