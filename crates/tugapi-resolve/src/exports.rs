//! Export list expansion.
//!
//! An export list may pull in another module's export list
//! (`__all__ = ["a"] + sub.__all__`). Expansion replaces each such reference
//! with the literal names of the referenced module, recursively. Modules
//! already visited are not expanded again, so reference cycles stop quietly
//! with whatever names were known at that point.

use std::collections::HashSet;

use tracing::debug;
use tugapi_core::model::{ExportEntry, Expr};
use tugapi_core::{ModulesCollection, ObjectId};

const EXPORTS_SUFFIX: &str = ".__all__";

/// Inline export list references of `module` and of its submodules.
pub fn expand_exports(
    collection: &mut ModulesCollection,
    module: ObjectId,
    seen: &mut HashSet<String>,
) {
    seen.insert(collection.path(module));

    let Some(exports) = collection[module]
        .as_module()
        .and_then(|data| data.exports.clone())
    else {
        expand_submodules(collection, module, seen);
        return;
    };

    let mut expanded: Vec<ExportEntry> = Vec::with_capacity(exports.len());
    for export in exports {
        let reference = match export {
            ExportEntry::Reference(reference) => reference,
            name => {
                if !expanded.contains(&name) {
                    expanded.push(name);
                }
                continue;
            }
        };
        let Some(next) = referenced_module(collection, module, &reference) else {
            debug!(
                module = %collection.path(module),
                export = %reference,
                "cannot expand export reference"
            );
            continue;
        };
        if !seen.contains(&collection.path(next)) {
            expand_exports(collection, next, seen);
        }
        let Some(names) = collection[next]
            .as_module()
            .and_then(|data| data.exports.as_ref())
        else {
            debug!(module = %collection.path(next), "referenced module has no export list");
            continue;
        };
        for name in names {
            if matches!(name, ExportEntry::Name(_)) && !expanded.contains(name) {
                expanded.push(name.clone());
            }
        }
    }

    if let Some(data) = collection[module].as_module_mut() {
        data.exports = Some(expanded);
    }
    expand_submodules(collection, module, seen);
}

fn expand_submodules(
    collection: &mut ModulesCollection,
    module: ObjectId,
    seen: &mut HashSet<String>,
) {
    let submodules: Vec<ObjectId> = collection[module]
        .members()
        .values()
        .copied()
        .filter(|id| collection[*id].is_module())
        .collect();
    for submodule in submodules {
        if !seen.contains(&collection.path(submodule)) {
            expand_exports(collection, submodule, seen);
        }
    }
}

/// Module whose export list `reference` names, seen from `module`.
fn referenced_module(
    collection: &ModulesCollection,
    module: ObjectId,
    reference: &Expr,
) -> Option<ObjectId> {
    let path = reference.canonical_path(collection, module)?;
    let module_path = path.strip_suffix(EXPORTS_SUFFIX)?;
    let found = collection.lookup(module_path).ok()?;
    let target = collection.final_target(found).ok()?;
    collection[target].is_module().then_some(target)
}
