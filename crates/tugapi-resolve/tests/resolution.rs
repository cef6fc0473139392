//! End-to-end resolution scenarios.
//!
//! Each test populates a collection the way a source visitor would, runs the
//! resolver and checks the resulting graph.

mod support;

use std::cell::Cell;
use std::fs;
use std::rc::Rc;

use support::{init_tracing, package};
use tugapi_core::error::LoadError;
use tugapi_core::model::{ExportEntry, Expr, ModulePath};
use tugapi_core::{Kind, ModulesCollection, Object, ObjectId};
use tugapi_resolve::{Config, ExternalPolicy, ResolveOptions, Resolver};

fn implicit() -> Resolver {
    Resolver::new(ResolveOptions::default().implicit(true))
}

// ============================================================================
// Imports
// ============================================================================

#[test]
fn test_relative_import_resolves_in_one_pass() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["a", "b"]);
    let (a, b) = (subs[0], subs[1]);
    let thing = collection.add_function(b, "thing", Some((1, 2))).unwrap();
    let alias = collection
        .add_alias(a, "thing", "pkg.b.thing", Some((1, 1)))
        .unwrap();

    let report = implicit().resolve_all(&mut collection);

    assert_eq!(report.iterations, 1);
    assert!(report.converged);
    assert!(report.is_complete());
    assert!(report.resolved.contains("pkg.a.thing"));
    assert_eq!(collection.final_target(alias), Ok(thing));
    assert_eq!(collection.resolved_kind(alias), Kind::Function);
    assert_eq!(collection.resolved_kind(alias), collection.kind(thing));
    assert_eq!(collection.path(alias), "pkg.a.thing");
    assert_eq!(collection.canonical_path(alias), "pkg.b.thing");
    assert!(collection[thing].aliases().contains(&alias));
}

#[test]
fn test_cyclic_imports_stay_unresolved() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["a", "b"]);
    let ax = collection.add_alias(subs[0], "x", "pkg.b.x", None).unwrap();
    let bx = collection.add_alias(subs[1], "x", "pkg.a.x", None).unwrap();

    let mut resolver = implicit();
    let first = resolver.resolve_all(&mut collection);

    assert!(first.converged);
    assert_eq!(
        first.unresolved.iter().collect::<Vec<_>>(),
        vec!["pkg.a.x", "pkg.b.x"]
    );
    for chain in first.cyclic.values() {
        assert_eq!(chain.first(), chain.last());
        assert!(chain.len() > 1);
    }
    assert_eq!(first.cyclic.len(), 2);
    assert_eq!(collection.resolved_kind(ax), Kind::Alias);
    assert_eq!(collection.resolved_kind(bx), Kind::Alias);
    assert!(collection.final_target(ax).is_err());

    let second = resolver.resolve_all(&mut collection);
    assert_eq!(second.unresolved, first.unresolved);
    assert!(second.resolved.is_empty());
}

#[test]
fn test_import_chain_converges_within_depth() {
    init_tracing();
    let depth = 5;
    let mut collection = ModulesCollection::new();
    let names: Vec<String> = (0..=depth).map(|i| format!("m{}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let (_pkg, subs) = package(&mut collection, "pkg", &name_refs);
    let bottom = collection.add_class(subs[depth], "X", None).unwrap();
    for i in 0..depth {
        collection
            .add_alias(subs[i], "X", &format!("pkg.m{}.X", i + 1), None)
            .unwrap();
    }

    let report = implicit().resolve_all(&mut collection);

    assert!(report.iterations <= depth);
    assert!(report.is_complete());
    for sub in &subs[..depth] {
        let alias = collection[*sub].members()["X"];
        assert!(collection[alias].as_alias().unwrap().is_resolved());
    }
    let top = collection.lookup("pkg.m0.X").unwrap();
    assert_eq!(collection.final_target(top), Ok(bottom));
}

#[test]
fn test_unresolved_set_never_grows() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["a"]);
    collection
        .add_alias(subs[0], "np", "numpy", None)
        .unwrap();
    collection
        .add_alias(subs[0], "Path", "pathlib.Path", None)
        .unwrap();

    let mut previous = None;
    for cap in 1..4 {
        let options = ResolveOptions::default()
            .implicit(true)
            .external(ExternalPolicy::Never)
            .max_iterations(cap);
        let report = Resolver::new(options).resolve_all(&mut collection);
        if let Some(previous) = previous {
            assert!(report.unresolved.len() <= previous);
        }
        previous = Some(report.unresolved.len());
    }
    assert_eq!(previous, Some(2));
}

// ============================================================================
// External Loading
// ============================================================================

#[test]
fn test_private_sibling_package_is_loaded() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["api"]);
    let alias = collection
        .add_alias(subs[0], "Engine", "_pkg.engine.Engine", None)
        .unwrap();

    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let loader = move |name: &str,
                       collection: &mut ModulesCollection|
          -> Result<ObjectId, LoadError> {
        counter.set(counter.get() + 1);
        let fail = |e: tugapi_core::ApiError| LoadError::Failed {
            package: name.to_string(),
            message: e.to_string(),
        };
        let root = collection
            .add_module(None, name, ModulePath::File("_pkg/__init__.py".into()))
            .map_err(fail)?;
        let engine = collection
            .add_module(Some(root), "engine", ModulePath::File("_pkg/engine.py".into()))
            .map_err(fail)?;
        collection.add_class(engine, "Engine", None).map_err(fail)?;
        Ok(root)
    };

    let mut resolver = implicit().with_loader(loader);
    let report = resolver.resolve_all(&mut collection);

    assert_eq!(calls.get(), 1);
    assert_eq!(report.iterations, 2);
    assert!(report.is_complete());
    assert!(report.load_failures.is_empty());
    assert_eq!(collection.resolved_kind(alias), Kind::Class);
    assert_eq!(collection.canonical_path(alias), "_pkg.engine.Engine");
}

#[test]
fn test_failed_load_is_attempted_once_per_run() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["a", "b"]);
    collection.add_alias(subs[0], "x", "_pkg.x", None).unwrap();
    collection.add_alias(subs[1], "y", "_pkg.y", None).unwrap();
    collection.add_alias(subs[1], "z", "other.z", None).unwrap();

    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let loader = move |name: &str,
                       _collection: &mut ModulesCollection|
          -> Result<ObjectId, LoadError> {
        counter.set(counter.get() + 1);
        Err(LoadError::NotFound {
            package: name.to_string(),
        })
    };

    let mut resolver = implicit().with_loader(loader);
    let report = resolver.resolve_all(&mut collection);

    // `other` is not a private sibling, so only `_pkg` is attempted.
    assert_eq!(calls.get(), 1);
    assert_eq!(report.load_failures.keys().collect::<Vec<_>>(), vec!["_pkg"]);
    assert_eq!(report.unresolved.len(), 3);
    assert!(report.converged);

    resolver.resolve_all(&mut collection);
    assert_eq!(calls.get(), 2);
}

// ============================================================================
// Wildcards and Exports
// ============================================================================

#[test]
fn test_declaration_after_wildcard_is_kept() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["a", "b"]);
    let (a, b) = (subs[0], subs[1]);
    collection.add_attribute(b, "x", Some((1, 1))).unwrap();
    collection.add_function(b, "helper", Some((2, 3))).unwrap();
    collection.add_wildcard_import(a, "pkg.b", Some((1, 1))).unwrap();
    let own = collection.add_attribute(a, "x", Some((2, 2))).unwrap();

    let report = implicit().resolve_all(&mut collection);

    assert!(report.is_complete());
    assert_eq!(collection.lookup("pkg.a.x"), Ok(own));
    let helper = collection.lookup("pkg.a.helper").unwrap();
    assert_eq!(collection.canonical_path(helper), "pkg.b.helper");
    assert!(!collection[a].members().contains_key("pkg.b.*"));
}

#[test]
fn test_wildcard_of_reexported_names() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (pkg, subs) = package(&mut collection, "pkg", &["core", "api"]);
    let (core, api) = (subs[0], subs[1]);
    let engine = collection.add_class(core, "Engine", None).unwrap();
    collection.add_class(core, "Internal", None).unwrap();
    if let Some(module) = collection[core].as_module_mut() {
        module.exports = Some(vec![ExportEntry::Name("Engine".into())]);
    }
    if let Some(module) = collection[api].as_module_mut() {
        module.exports = Some(vec![ExportEntry::Reference(Expr::dotted("pkg.core.__all__"))]);
    }
    collection.add_wildcard_import(api, "pkg.core", None).unwrap();
    collection.add_wildcard_import(pkg, "pkg.api", None).unwrap();

    let report = Resolver::default().resolve_all(&mut collection);

    assert!(report.is_complete());
    let exported = collection.lookup("pkg.Engine").unwrap();
    assert_eq!(collection.final_target(exported), Ok(engine));
    assert!(collection.lookup("pkg.Internal").is_err());
    assert!(collection.lookup("pkg.api.Internal").is_err());
    assert!(collection[api].as_module().unwrap().exports_name("Engine"));
}

#[test]
fn test_export_reference_cycle_terminates() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["a", "b"]);
    if let Some(module) = collection[subs[0]].as_module_mut() {
        module.exports = Some(vec![
            ExportEntry::Name("x".into()),
            ExportEntry::Reference(Expr::dotted("pkg.b.__all__")),
        ]);
    }
    if let Some(module) = collection[subs[1]].as_module_mut() {
        module.exports = Some(vec![ExportEntry::Reference(Expr::dotted("pkg.a.__all__"))]);
    }

    let report = Resolver::default().resolve_all(&mut collection);

    assert!(report.converged);
    assert!(collection[subs[1]].as_module().unwrap().exports_name("x"));
}

// ============================================================================
// Graph Maintenance
// ============================================================================

#[test]
fn test_replacing_target_retargets_resolved_aliases() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["a", "b"]);
    let old = collection.add_function(subs[1], "thing", None).unwrap();
    let alias = collection
        .add_alias(subs[0], "thing", "pkg.b.thing", None)
        .unwrap();
    implicit().resolve_all(&mut collection);
    assert_eq!(collection.final_target(alias), Ok(old));

    let new = collection.add_class(subs[1], "thing", None).unwrap();

    assert_eq!(collection.final_target(alias), Ok(new));
    assert_eq!(collection.resolved_kind(alias), Kind::Class);
    assert!(collection[new].aliases().contains(&alias));
    assert!(collection[old].aliases().is_empty());
}

#[test]
fn test_removed_module_leaves_aliases_pending() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (pkg, subs) = package(&mut collection, "pkg", &["a", "b"]);
    let thing = collection.add_function(subs[1], "thing", None).unwrap();
    let alias = collection
        .add_alias(subs[0], "thing", "pkg.b.thing", None)
        .unwrap();
    let mut resolver = implicit();
    assert!(resolver.resolve_all(&mut collection).is_complete());

    collection.del_member(Some(pkg), "b").unwrap();

    assert!(!collection[alias].as_alias().unwrap().is_resolved());
    assert!(collection[thing].aliases().is_empty());
    assert_eq!(collection.resolved_kind(alias), Kind::Alias);
    let report = resolver.resolve_all(&mut collection);
    assert_eq!(
        report.unresolved.iter().collect::<Vec<_>>(),
        vec!["pkg.a.thing"]
    );
}

#[test]
fn test_stub_replacement_rebinds_aliases_to_children() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (pkg, subs) = package(&mut collection, "pkg", &["a", "b"]);
    collection.add_class(subs[1], "Thing", None).unwrap();
    let alias = collection
        .add_alias(subs[0], "Thing", "pkg.b.Thing", None)
        .unwrap();
    let mut resolver = implicit();
    resolver.resolve_all(&mut collection);

    let stub = collection
        .add_module(Some(pkg), "b", ModulePath::File("pkg/b.pyi".into()))
        .unwrap();
    let typed = collection.add_class(stub, "Thing", None).unwrap();
    let report = resolver.resolve_all(&mut collection);

    assert!(report.resolved.contains("pkg.a.Thing"));
    assert_eq!(collection.final_target(alias), Ok(typed));
}

#[test]
fn test_inherited_members_through_imported_base() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["base", "child"]);
    let base = collection.add_class(subs[0], "Base", None).unwrap();
    let run = collection.add_function(base, "run", None).unwrap();
    collection
        .add_alias(subs[1], "Base", "pkg.base.Base", None)
        .unwrap();
    let child = collection
        .add(
            Some(subs[1]),
            Object::class("Child").with_bases(vec![Expr::name("Base")]),
        )
        .unwrap();
    implicit().resolve_all(&mut collection);

    assert_eq!(collection.mro(child).unwrap(), vec![base]);
    let members = collection.all_members(child);
    assert!(members["run"].is_inherited());
    assert_eq!(collection.get_any_member(child, "run"), Ok(run));
    assert!(collection.del_member(Some(child), "run").is_err());
}

// ============================================================================
// Configuration and Reporting
// ============================================================================

#[test]
fn test_resolver_from_project_config() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join(".tugapi")).unwrap();
    fs::write(
        dir.path().join(".tugapi").join("config.toml"),
        "[resolve]\nimplicit = true\nmax_iterations = 1\n",
    )
    .unwrap();
    let config = Config::load_from_project(dir.path()).unwrap();

    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["a"]);
    collection.add_alias(subs[0], "gone", "pkg.missing", None).unwrap();

    let mut resolver = Resolver::from_config(&config);
    assert_eq!(resolver.options().max_iterations, Some(1));
    let report = resolver.resolve_all(&mut collection);
    assert_eq!(report.iterations, 1);
    assert!(!report.converged);
}

#[test]
fn test_report_json_shape() {
    init_tracing();
    let mut collection = ModulesCollection::new();
    let (_pkg, subs) = package(&mut collection, "pkg", &["a", "b"]);
    collection.add_alias(subs[0], "x", "pkg.b.x", None).unwrap();
    collection.add_alias(subs[1], "x", "pkg.a.x", None).unwrap();

    let report = implicit().resolve_all(&mut collection);
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["converged"], true);
    assert_eq!(json["unresolved"].as_array().unwrap().len(), 2);
    let chain = json["cyclic"]["pkg.a.x"].as_array().unwrap();
    assert_eq!(chain.first(), chain.last());
    assert!(json["load_failures"].as_object().unwrap().is_empty());
}
