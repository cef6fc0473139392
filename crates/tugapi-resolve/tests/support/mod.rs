//! Shared test support utilities.
//!
//! Provides log capture for integration tests and small builders for the
//! package layouts the scenarios share.

use std::sync::Once;

use tugapi_core::model::ModulePath;
use tugapi_core::{ModulesCollection, ObjectId};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness.
///
/// `RUST_LOG` selects the level; nothing is printed by default.
pub fn init_tracing() {
    TRACING.call_once(|| {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// A package `name` with file-backed submodules, in the given order.
#[allow(dead_code)]
pub fn package(
    collection: &mut ModulesCollection,
    name: &str,
    submodules: &[&str],
) -> (ObjectId, Vec<ObjectId>) {
    let pkg = collection
        .add_module(None, name, file(&format!("{}/__init__.py", name)))
        .expect("add package");
    let subs = submodules
        .iter()
        .map(|sub| {
            collection
                .add_module(Some(pkg), sub, file(&format!("{}/{}.py", name, sub)))
                .expect("add submodule")
        })
        .collect();
    (pkg, subs)
}

fn file(path: &str) -> ModulePath {
    ModulePath::File(path.into())
}
