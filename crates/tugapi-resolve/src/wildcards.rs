//! Wildcard import expansion.
//!
//! Every `from module import *` alias is replaced by one resolved alias per
//! member the target module exposes. Target modules are expanded first, so
//! chained wildcard imports see the final member list.
//!
//! When a name is already present, the member with the later source line
//! wins. A declaration placed after the wildcard import keeps its slot; a
//! wildcard import placed after a declaration replaces it.

use std::collections::HashSet;

use tracing::debug;
use tugapi_core::{Kind, ModulesCollection, ObjectId};

use crate::resolver::{package_of, Resolver};

/// A member pulled in by a wildcard import, with the import's position.
struct Exposed {
    target: ObjectId,
    lineno: Option<u32>,
    endlineno: Option<u32>,
}

impl Resolver {
    /// Replace the wildcard imports of `object` and its submodules.
    pub fn expand_wildcards(
        &mut self,
        collection: &mut ModulesCollection,
        object: ObjectId,
        seen: &mut HashSet<String>,
    ) {
        seen.insert(collection.path(object));
        let own_package = collection.package_name(object).to_string();

        let mut exposed: Vec<Exposed> = Vec::new();
        let mut expanded_imports: Vec<String> = Vec::new();

        let members: Vec<(String, ObjectId)> = collection[object]
            .members()
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        for (name, member) in members {
            let Some(module_path) = collection[member]
                .as_alias()
                .and_then(|alias| alias.wildcard_module())
                .map(str::to_string)
            else {
                if collection[member].is_module() && !seen.contains(&collection.path(member)) {
                    self.expand_wildcards(collection, member, seen);
                }
                continue;
            };

            let package = package_of(&module_path);
            if package != own_package && !collection.contains_module(package) {
                if !self.options.external.allows(package, &own_package) {
                    debug!(import = %name, package, "skipping wildcard import of unloaded package");
                    continue;
                }
                if !self
                    .loads
                    .try_load(self.loader.as_deref_mut(), package, collection)
                {
                    continue;
                }
            }

            let Some(target) = collection
                .lookup(&module_path)
                .ok()
                .and_then(|found| collection.final_target(found).ok())
            else {
                debug!(import = %name, module = %module_path, "could not expand wildcard import");
                continue;
            };
            if !seen.contains(&collection.path(target)) {
                self.expand_wildcards(collection, target, seen);
            }

            let lineno = collection[member].lineno;
            let endlineno = collection[member].endlineno;
            exposed.extend(
                collection[target]
                    .members()
                    .values()
                    .filter(|id| collection.is_wildcard_exposed(**id))
                    .map(|id| Exposed {
                        target: *id,
                        lineno,
                        endlineno,
                    }),
            );
            expanded_imports.push(name);
        }

        for name in expanded_imports {
            if let Err(err) = collection.del_member(Some(object), &name) {
                debug!(import = %name, error = %err, "could not remove wildcard import");
            }
        }

        let object_path = collection.path(object);
        for new in exposed {
            let name = collection[new.target].name.clone();
            let self_alias = collection
                .target_path(new.target)
                .is_some_and(|target| target == format!("{}.{}", object_path, name));
            if self_alias {
                continue;
            }
            if let Some(&old) = collection[object].members().get(&name) {
                let old_lineno = collection[old].lineno.unwrap_or(0);
                if new.lineno.unwrap_or(0) <= old_lineno {
                    continue;
                }
                if collection.resolved_kind(old) == Kind::Module {
                    let previous = collection.final_target(old).ok();
                    let incoming = collection.final_target(new.target).ok();
                    if previous.is_some() && previous == incoming {
                        continue;
                    }
                }
            }
            let added = collection.add_resolved_alias(
                object,
                &name,
                new.target,
                new.lineno,
                new.endlineno,
            );
            if let Err(err) = added {
                debug!(
                    object = %object_path,
                    name = %name,
                    error = %err,
                    "skipping wildcard member"
                );
            }
        }
    }
}
