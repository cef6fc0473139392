//! The collection-wide resolution driver.
//!
//! [`Resolver::resolve_all`] runs, in order:
//!
//! 1. export list expansion on every top-level module,
//! 2. wildcard import expansion on every top-level module,
//! 3. resolution passes over every module until the set of unresolved
//!    aliases is empty or stops changing, or the iteration cap is hit.
//!
//! A failure on one alias never aborts the pass. Missing targets are retried
//! on the next pass, possibly after the external loader brought their
//! package in. Cyclic aliases keep their verdict and are reported.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info, warn};
use tugapi_core::error::AliasError;
use tugapi_core::model::AliasState;
use tugapi_core::{Kind, ModulesCollection, ObjectId};

use crate::exports::expand_exports;
use crate::loader::{ExternalLoader, LoadCache};
use crate::options::{Config, ResolveOptions};
use crate::report::ResolutionReport;

/// Resolves the aliases of a [`ModulesCollection`].
pub struct Resolver {
    pub(crate) options: ResolveOptions,
    pub(crate) loader: Option<Box<dyn ExternalLoader>>,
    pub(crate) loads: LoadCache,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("options", &self.options)
            .field("loader", &self.loader.is_some())
            .field("loads", &self.loads)
            .finish()
    }
}

/// Aliases touched during one pass.
#[derive(Debug, Default)]
struct Pass {
    resolved: BTreeSet<String>,
    unresolved: BTreeSet<String>,
    cyclic: BTreeMap<String, Vec<String>>,
}

impl Resolver {
    pub fn new(options: ResolveOptions) -> Self {
        Resolver {
            options,
            loader: None,
            loads: LoadCache::default(),
        }
    }

    /// Create a resolver from the `[resolve]` table of a configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.resolve.clone())
    }

    /// Install the hook used to load missing packages.
    pub fn with_loader(mut self, loader: impl ExternalLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Expand exports and wildcards, then resolve aliases to a fixed point.
    pub fn resolve_all(&mut self, collection: &mut ModulesCollection) -> ResolutionReport {
        self.loads.clear();

        let mut seen = HashSet::new();
        for module in top_level_modules(collection) {
            expand_exports(collection, module, &mut seen);
        }
        let mut seen = HashSet::new();
        for module in top_level_modules(collection) {
            self.expand_wildcards(collection, module, &mut seen);
        }

        let mut report = ResolutionReport::default();
        let mut previous: Option<BTreeSet<String>> = None;
        loop {
            if let Some(max) = self.options.max_iterations {
                if report.iterations >= max {
                    if report.iterations == 0 {
                        let mut pass = Pass::default();
                        for module in top_level_modules(collection) {
                            self.pending_in(collection, module, &mut HashSet::new(), &mut pass);
                        }
                        report.unresolved = pass.unresolved;
                        report.cyclic = pass.cyclic;
                    }
                    warn!(
                        iterations = report.iterations,
                        unresolved = report.unresolved.len(),
                        "stopped alias resolution at the iteration cap"
                    );
                    break;
                }
            }
            report.iterations += 1;

            let mut pass = Pass::default();
            for module in top_level_modules(collection) {
                self.resolve_aliases_in(collection, module, &mut HashSet::new(), &mut pass);
            }
            debug!(
                iteration = report.iterations,
                resolved = pass.resolved.len(),
                unresolved = pass.unresolved.len(),
                "alias resolution pass"
            );

            report.resolved.extend(pass.resolved);
            report.cyclic = pass.cyclic;
            report.unresolved = pass.unresolved;

            let stable = previous.as_ref() == Some(&report.unresolved);
            if report.unresolved.is_empty() || stable {
                report.converged = true;
                break;
            }
            previous = Some(report.unresolved.clone());
        }

        report.load_failures = self.loads.failures().clone();
        info!(
            iterations = report.iterations,
            resolved = report.resolved.len(),
            unresolved = report.unresolved.len(),
            cyclic = report.cyclic.len(),
            "alias resolution finished"
        );
        report
    }

    /// Run a single resolution pass over one module and everything below it.
    ///
    /// No expansion is done and the load cache is kept, so this can be
    /// called repeatedly while modules are populated one by one.
    pub fn resolve_module_aliases(
        &mut self,
        collection: &mut ModulesCollection,
        module: ObjectId,
    ) -> ResolutionReport {
        let mut pass = Pass::default();
        self.resolve_aliases_in(collection, module, &mut HashSet::new(), &mut pass);
        ResolutionReport {
            converged: pass.unresolved.is_empty(),
            resolved: pass.resolved,
            unresolved: pass.unresolved,
            cyclic: pass.cyclic,
            load_failures: self.loads.failures().clone(),
            iterations: 1,
        }
    }

    fn resolve_aliases_in(
        &mut self,
        collection: &mut ModulesCollection,
        object: ObjectId,
        seen: &mut HashSet<String>,
        pass: &mut Pass,
    ) {
        seen.insert(collection.path(object));
        let own_package = collection.package_name(object).to_string();

        let members: Vec<ObjectId> = collection[object].members().values().copied().collect();
        for member in members {
            let Some(alias) = collection[member].as_alias() else {
                let kind = collection.kind(member);
                if matches!(kind, Kind::Module | Kind::Class)
                    && !seen.contains(&collection.path(member))
                {
                    self.resolve_aliases_in(collection, member, seen, pass);
                }
                continue;
            };
            if alias.is_wildcard() || alias.is_resolved() {
                continue;
            }
            if !self.options.implicit && !collection.is_exported(member) {
                continue;
            }

            let path = collection.path(member);
            match collection.resolve_target(member) {
                Ok(_) => {
                    let target = collection.canonical_path(member);
                    debug!(alias = %path, target = %target, "resolved alias");
                    pass.resolved.insert(path);
                }
                Err(AliasError::Cyclic { chain }) => {
                    debug!(alias = %path, chain = %chain.join(" -> "), "cyclic alias");
                    pass.unresolved.insert(path.clone());
                    pass.cyclic.insert(path, chain);
                }
                Err(err) => {
                    pass.unresolved.insert(path);
                    if let Some(target) = err.missing_target() {
                        let package = package_of(target).to_string();
                        if package != own_package
                            && self.options.external.allows(&package, &own_package)
                        {
                            self.loads
                                .try_load(self.loader.as_deref_mut(), &package, collection);
                        }
                    }
                }
            }
        }
    }
}

impl Resolver {
    /// Collect the aliases a pass would attempt, without resolving anything.
    fn pending_in(
        &self,
        collection: &ModulesCollection,
        object: ObjectId,
        seen: &mut HashSet<String>,
        pass: &mut Pass,
    ) {
        seen.insert(collection.path(object));
        for &member in collection[object].members().values() {
            let Some(alias) = collection[member].as_alias() else {
                let kind = collection.kind(member);
                if matches!(kind, Kind::Module | Kind::Class)
                    && !seen.contains(&collection.path(member))
                {
                    self.pending_in(collection, member, seen, pass);
                }
                continue;
            };
            if alias.is_wildcard() || alias.is_resolved() {
                continue;
            }
            if !self.options.implicit && !collection.is_exported(member) {
                continue;
            }
            let path = collection.path(member);
            if let AliasState::Cyclic(chain) = alias.state() {
                pass.cyclic.insert(path.clone(), chain.clone());
            }
            pass.unresolved.insert(path);
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ResolveOptions::default())
    }
}

pub(crate) fn top_level_modules(collection: &ModulesCollection) -> Vec<ObjectId> {
    collection.modules().values().copied().collect()
}

/// First segment of a dotted path.
pub(crate) fn package_of(path: &str) -> &str {
    path.split_once('.').map_or(path, |(package, _)| package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ExternalPolicy;
    use tugapi_core::model::ExportEntry;
    use tugapi_core::Object;

    #[test]
    fn test_package_of() {
        assert_eq!(package_of("pkg.sub.name"), "pkg");
        assert_eq!(package_of("pkg"), "pkg");
    }

    #[test]
    fn test_explicit_mode_only_resolves_exported_aliases() {
        let mut collection = ModulesCollection::new();
        let pkg = collection
            .add(
                None,
                Object::module("pkg").with_exports(vec![ExportEntry::Name("public".into())]),
            )
            .unwrap();
        let core = collection.add(Some(pkg), Object::module("core")).unwrap();
        collection.add(Some(core), Object::function("public")).unwrap();
        collection.add(Some(core), Object::function("other")).unwrap();
        let public = collection
            .add(Some(pkg), Object::alias("public", "pkg.core.public"))
            .unwrap();
        let other = collection
            .add(Some(pkg), Object::alias("other", "pkg.core.other"))
            .unwrap();

        let report = Resolver::default().resolve_all(&mut collection);

        assert!(collection[public].as_alias().unwrap().is_resolved());
        assert!(!collection[other].as_alias().unwrap().is_resolved());
        assert_eq!(report.resolved.len(), 1);
        assert!(report.is_complete());

        let report = Resolver::new(ResolveOptions::default().implicit(true))
            .resolve_all(&mut collection);
        assert!(collection[other].as_alias().unwrap().is_resolved());
        assert!(report.resolved.contains("pkg.other"));
    }

    #[test]
    fn test_iteration_cap() {
        let mut collection = ModulesCollection::new();
        let m = collection.add(None, Object::module("m")).unwrap();
        collection
            .add(Some(m), Object::alias("x", "nowhere.x"))
            .unwrap();

        let options = ResolveOptions::default()
            .implicit(true)
            .external(ExternalPolicy::Never)
            .max_iterations(1);
        let report = Resolver::new(options).resolve_all(&mut collection);
        assert_eq!(report.iterations, 1);
        assert!(!report.converged);
        assert!(report.unresolved.contains("m.x"));

        let options = ResolveOptions::default()
            .implicit(true)
            .external(ExternalPolicy::Never);
        let report = Resolver::new(options).resolve_all(&mut collection);
        assert_eq!(report.iterations, 2);
        assert!(report.converged);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_zero_cap_reports_pending_aliases() {
        let mut collection = ModulesCollection::new();
        let m = collection.add(None, Object::module("m")).unwrap();
        let alias = collection
            .add(Some(m), Object::alias("x", "nowhere.x"))
            .unwrap();
        collection.add(Some(m), Object::function("f")).unwrap();
        collection.add(Some(m), Object::alias("g", "m.f")).unwrap();

        let options = ResolveOptions::default()
            .implicit(true)
            .external(ExternalPolicy::Never)
            .max_iterations(0);
        let report = Resolver::new(options).resolve_all(&mut collection);

        assert_eq!(report.iterations, 0);
        assert!(!report.converged);
        assert!(!report.is_complete());
        assert_eq!(
            report.unresolved.iter().collect::<Vec<_>>(),
            vec!["m.g", "m.x"]
        );
        assert!(!collection[alias].as_alias().unwrap().is_resolved());
    }

    #[test]
    fn test_resolve_module_aliases_single_module() {
        let mut collection = ModulesCollection::new();
        let pkg = collection.add(None, Object::module("pkg")).unwrap();
        let a = collection.add(Some(pkg), Object::module("a")).unwrap();
        let b = collection.add(Some(pkg), Object::module("b")).unwrap();
        collection.add(Some(a), Object::class("Thing")).unwrap();
        collection
            .add(Some(b), Object::alias("Thing", "pkg.a.Thing"))
            .unwrap();
        let later = collection
            .add(Some(a), Object::alias("Later", "pkg.c.Later"))
            .unwrap();

        let mut resolver = Resolver::new(ResolveOptions::default().implicit(true));
        let report = resolver.resolve_module_aliases(&mut collection, b);
        assert_eq!(report.resolved.iter().collect::<Vec<_>>(), vec!["pkg.b.Thing"]);
        assert!(report.converged);
        assert!(!collection[later].as_alias().unwrap().is_resolved());
    }
}
