//! Method Resolution Order (MRO) computation using C3 linearization.
//!
//! Base class expressions are resolved through the scope of the class's
//! parent, aliases are followed to their final target, and anything that is
//! not a class (or cannot be found) is skipped. The remaining bases are
//! linearized with the classic C3 merge:
//!
//! ```text
//! L[C] = C + merge(L[B1], ..., L[Bn], [B1, ..., Bn])
//! ```
//!
//! # Inherited members
//!
//! [`ModulesCollection::inherited_members`] walks the MRO from the most
//! distant ancestor to the closest one and synthesizes an [`InheritedAlias`]
//! for every ancestor member the class does not declare itself. These views
//! live outside the arena and are rebuilt on every call, since base classes
//! can change between calls.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::collection::ModulesCollection;
use crate::error::{AliasError, MroError};
use crate::model::ObjectId;

// ============================================================================
// Inherited Members
// ============================================================================

/// A member a class inherits from one of its ancestors.
///
/// Its import-site path is under the inheriting class, its canonical path is
/// the ancestor's member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritedAlias {
    pub name: String,
    /// The inheriting class.
    pub class: ObjectId,
    /// The ancestor that declares the member.
    pub ancestor: ObjectId,
    /// The declared member on the ancestor.
    pub target: ObjectId,
}

impl InheritedAlias {
    /// `class.path + "." + name`.
    pub fn path(&self, collection: &ModulesCollection) -> String {
        format!("{}.{}", collection.path(self.class), self.name)
    }

    pub fn target_path(&self, collection: &ModulesCollection) -> String {
        collection.path(self.target)
    }

    pub fn canonical_path(&self, collection: &ModulesCollection) -> String {
        collection.canonical_path(self.target)
    }

    pub fn is_inherited(&self) -> bool {
        true
    }

    /// The non-alias object behind the inherited member.
    pub fn final_target(&self, collection: &ModulesCollection) -> Result<ObjectId, AliasError> {
        if collection[self.target].is_alias() {
            collection.final_target(self.target)
        } else {
            Ok(self.target)
        }
    }
}

/// A member as seen through [`ModulesCollection::all_members`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRef {
    /// Stored in the object's own members map.
    Declared(ObjectId),
    /// Synthesized from an ancestor class.
    Inherited(InheritedAlias),
}

impl MemberRef {
    /// The arena object this member stands for.
    pub fn target(&self) -> ObjectId {
        match self {
            MemberRef::Declared(id) => *id,
            MemberRef::Inherited(inherited) => inherited.target,
        }
    }

    pub fn is_inherited(&self) -> bool {
        matches!(self, MemberRef::Inherited(_))
    }
}

// ============================================================================
// MRO Computation
// ============================================================================

impl ModulesCollection {
    /// Base classes that resolve to classes, in declaration order.
    pub fn resolved_bases(&self, class: ObjectId) -> Vec<ObjectId> {
        let Some(data) = self[class].as_class() else {
            return Vec::new();
        };
        let scope = self[class].parent().unwrap_or(class);
        let mut bases = Vec::new();
        for base in &data.bases {
            let Some(path) = base.canonical_path(self, scope) else {
                continue;
            };
            let Ok(found) = self.lookup(&path) else {
                debug!(class = %self.path(class), base = %path, "skipping unknown base class");
                continue;
            };
            let resolved = if self[found].is_alias() {
                match self.final_target(found) {
                    Ok(target) => target,
                    Err(_) => continue,
                }
            } else {
                found
            };
            if self[resolved].is_class() {
                bases.push(resolved);
            }
        }
        bases
    }

    /// Ancestors of `class` in C3 order, the class itself excluded.
    pub fn mro(&self, class: ObjectId) -> Result<Vec<ObjectId>, MroError> {
        if !self[class].is_class() {
            return Err(MroError::NotAClass {
                path: self.path(class),
            });
        }
        let mut linearization = self.linearize(class, &mut IndexSet::new())?;
        linearization.remove(0);
        Ok(linearization)
    }

    fn linearize(
        &self,
        class: ObjectId,
        seen: &mut IndexSet<String>,
    ) -> Result<Vec<ObjectId>, MroError> {
        seen.insert(self.path(class));

        let bases = self.resolved_bases(class);
        let mut seqs: Vec<Vec<ObjectId>> = Vec::new();
        for base in &bases {
            let base_path = self.path(*base);
            if seen.contains(&base_path) {
                let mut chain: Vec<String> = seen.iter().cloned().collect();
                chain.push(base_path);
                return Err(MroError::InheritanceCycle { chain });
            }
            seqs.push(self.linearize(*base, seen)?);
        }
        seqs.push(bases);

        let mut mro = vec![class];
        match merge(&mut seqs) {
            Some(merged) => mro.extend(merged),
            None => {
                return Err(MroError::InconsistentHierarchy {
                    class_path: self.path(class),
                })
            }
        }

        seen.pop();
        Ok(mro)
    }

    // ------------------------------------------------------------------------
    // Member Views
    // ------------------------------------------------------------------------

    /// Members `class` inherits and does not declare itself.
    ///
    /// Closer ancestors shadow more distant ones. A class whose MRO cannot be
    /// computed inherits nothing.
    pub fn inherited_members(&self, class: ObjectId) -> IndexMap<String, InheritedAlias> {
        let mut inherited = IndexMap::new();
        if !self[class].is_class() {
            return inherited;
        }
        let mro = match self.mro(class) {
            Ok(mro) => mro,
            Err(err) => {
                debug!(class = %self.path(class), error = %err, "no inherited members");
                return inherited;
            }
        };
        let declared = self[class].members();
        for ancestor in mro.iter().rev() {
            for (name, member) in self[*ancestor].members() {
                if declared.contains_key(name) {
                    continue;
                }
                inherited.insert(
                    name.clone(),
                    InheritedAlias {
                        name: name.clone(),
                        class,
                        ancestor: *ancestor,
                        target: *member,
                    },
                );
            }
        }
        inherited
    }

    /// Declared members plus, for classes, inherited ones.
    ///
    /// Aliases expose the members of their final target; an alias that
    /// cannot be followed has no members.
    pub fn all_members(&self, id: ObjectId) -> IndexMap<String, MemberRef> {
        let id = if self[id].is_alias() {
            match self.final_target(id) {
                Ok(target) => target,
                Err(_) => return IndexMap::new(),
            }
        } else {
            id
        };
        let mut members: IndexMap<String, MemberRef> = self[id]
            .members()
            .iter()
            .map(|(name, member)| (name.clone(), MemberRef::Declared(*member)))
            .collect();
        for (name, inherited) in self.inherited_members(id) {
            members.insert(name, MemberRef::Inherited(inherited));
        }
        members
    }
}

/// C3 merge of linearizations.
///
/// Repeatedly takes the first head that does not appear in the tail of any
/// sequence. Returns `None` when no such head exists.
fn merge(seqs: &mut Vec<Vec<ObjectId>>) -> Option<Vec<ObjectId>> {
    let mut result = Vec::new();

    loop {
        seqs.retain(|seq| !seq.is_empty());

        if seqs.is_empty() {
            return Some(result);
        }

        let candidate = seqs.iter().map(|seq| seq[0]).find(|head| {
            !seqs
                .iter()
                .any(|s| s.len() > 1 && s[1..].contains(head))
        })?;

        result.push(candidate);
        for seq in seqs.iter_mut() {
            if seq.first() == Some(&candidate) {
                seq.remove(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Expr, Object};

    fn class_with_bases(
        collection: &mut ModulesCollection,
        module: ObjectId,
        name: &str,
        bases: &[&str],
    ) -> ObjectId {
        let bases = bases.iter().map(|b| Expr::dotted(b)).collect();
        collection
            .add(Some(module), Object::class(name).with_bases(bases))
            .unwrap()
    }

    fn diamond() -> (ModulesCollection, [ObjectId; 4]) {
        let mut collection = ModulesCollection::new();
        let m = collection.add(None, Object::module("m")).unwrap();
        let a = class_with_bases(&mut collection, m, "A", &[]);
        let b = class_with_bases(&mut collection, m, "B", &["A"]);
        let c = class_with_bases(&mut collection, m, "C", &["A"]);
        let d = class_with_bases(&mut collection, m, "D", &["B", "C"]);
        (collection, [a, b, c, d])
    }

    #[test]
    fn test_mro_diamond_inheritance() {
        let (collection, [a, b, c, d]) = diamond();
        assert_eq!(collection.mro(d).unwrap(), vec![b, c, a]);
        assert_eq!(collection.mro(b).unwrap(), vec![a]);
        assert!(collection.mro(a).unwrap().is_empty());
    }

    #[test]
    fn test_inherited_members_diamond() {
        let (mut collection, [a, b, c, d]) = diamond();
        let a_run = collection.add(Some(a), Object::function("run")).unwrap();
        collection.add(Some(a), Object::function("shared")).unwrap();
        let b_shared = collection.add(Some(b), Object::function("shared")).unwrap();
        collection.add(Some(c), Object::function("only_c")).unwrap();
        collection.add(Some(d), Object::function("own")).unwrap();

        let inherited = collection.inherited_members(d);
        let names: Vec<&str> = inherited.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["run", "shared", "only_c"]);
        assert_eq!(inherited["shared"].target, b_shared);
        assert_eq!(inherited["shared"].ancestor, b);
        assert_eq!(inherited["run"].target, a_run);
        assert_eq!(inherited["run"].path(&collection), "m.D.run");
        assert_eq!(inherited["run"].canonical_path(&collection), "m.A.run");
        assert!(inherited["run"].is_inherited());
        assert!(!inherited.contains_key("own"));
    }

    #[test]
    fn test_all_members_marks_inherited() {
        let (mut collection, [a, _b, _c, d]) = diamond();
        collection.add(Some(a), Object::function("run")).unwrap();
        let own = collection.add(Some(d), Object::function("own")).unwrap();

        let members = collection.all_members(d);
        assert_eq!(members["own"], MemberRef::Declared(own));
        assert!(members["run"].is_inherited());
        assert_eq!(collection.get_any_member(d, "run"), Ok(members["run"].target()));
        assert!(collection.get_member(Some(d), "run").is_err());
    }

    #[test]
    fn test_mro_inheritance_cycle() {
        let mut collection = ModulesCollection::new();
        let m = collection.add(None, Object::module("m")).unwrap();
        let x = class_with_bases(&mut collection, m, "X", &["Y"]);
        let y = class_with_bases(&mut collection, m, "Y", &["X"]);
        let ok = class_with_bases(&mut collection, m, "Ok", &[]);

        assert_eq!(
            collection.mro(x),
            Err(MroError::InheritanceCycle {
                chain: vec!["m.X".to_string(), "m.Y".to_string(), "m.X".to_string()]
            })
        );
        assert!(collection.mro(y).is_err());
        assert!(collection.inherited_members(x).is_empty());
        // Siblings are unaffected.
        assert!(collection.mro(ok).unwrap().is_empty());
    }

    #[test]
    fn test_mro_self_base_is_cycle() {
        let mut collection = ModulesCollection::new();
        let m = collection.add(None, Object::module("m")).unwrap();
        let s = class_with_bases(&mut collection, m, "S", &["S"]);
        assert!(matches!(
            collection.mro(s),
            Err(MroError::InheritanceCycle { .. })
        ));
    }

    #[test]
    fn test_mro_inconsistent_hierarchy() {
        let mut collection = ModulesCollection::new();
        let m = collection.add(None, Object::module("m")).unwrap();
        class_with_bases(&mut collection, m, "A", &[]);
        class_with_bases(&mut collection, m, "B", &["A"]);
        let bad = class_with_bases(&mut collection, m, "Bad", &["A", "B"]);
        assert_eq!(
            collection.mro(bad),
            Err(MroError::InconsistentHierarchy {
                class_path: "m.Bad".to_string()
            })
        );
    }

    #[test]
    fn test_unresolvable_and_non_class_bases_are_skipped() {
        let mut collection = ModulesCollection::new();
        let m = collection.add(None, Object::module("m")).unwrap();
        let base = class_with_bases(&mut collection, m, "Base", &[]);
        collection.add(Some(m), Object::function("factory")).unwrap();
        let child = class_with_bases(
            &mut collection,
            m,
            "Child",
            &["object", "factory", "missing.Module", "Base"],
        );

        assert_eq!(collection.resolved_bases(child), vec![base]);
        assert_eq!(collection.mro(child).unwrap(), vec![base]);
    }

    #[test]
    fn test_bases_through_imported_alias() {
        let mut collection = ModulesCollection::new();
        let pkg = collection.add(None, Object::module("pkg")).unwrap();
        let a = collection.add(Some(pkg), Object::module("a")).unwrap();
        let b = collection.add(Some(pkg), Object::module("b")).unwrap();
        let base = class_with_bases(&mut collection, a, "Base", &[]);
        collection
            .add(Some(b), Object::alias("Base", "pkg.a.Base"))
            .unwrap();
        let child = class_with_bases(&mut collection, b, "Child", &["Base"]);

        assert_eq!(collection.mro(child).unwrap(), vec![base]);
    }

    #[test]
    fn test_mro_of_non_class() {
        let mut collection = ModulesCollection::new();
        let m = collection.add(None, Object::module("m")).unwrap();
        assert!(matches!(
            collection.mro(m),
            Err(MroError::NotAClass { .. })
        ));
    }
}
