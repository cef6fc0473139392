//! External package loading hook.
//!
//! The resolver never parses anything itself. When an alias points into a
//! package that is not in the collection and the [`ExternalPolicy`] allows
//! it, the resolver asks an [`ExternalLoader`] to populate that package.
//! Each package is attempted at most once per run; failures are cached.
//!
//! [`ExternalPolicy`]: crate::ExternalPolicy

use std::collections::{BTreeMap, HashSet};

use tracing::debug;
use tugapi_core::error::LoadError;
use tugapi_core::{ModulesCollection, ObjectId};

/// Loads a package on demand.
///
/// The loader registers the package in the collection itself (usually with
/// [`ModulesCollection::add_module`]) and returns its id.
pub trait ExternalLoader {
    fn load_external(
        &mut self,
        package: &str,
        collection: &mut ModulesCollection,
    ) -> Result<ObjectId, LoadError>;
}

impl<F> ExternalLoader for F
where
    F: FnMut(&str, &mut ModulesCollection) -> Result<ObjectId, LoadError>,
{
    fn load_external(
        &mut self,
        package: &str,
        collection: &mut ModulesCollection,
    ) -> Result<ObjectId, LoadError> {
        self(package, collection)
    }
}

/// Per-run bookkeeping of load attempts.
#[derive(Debug, Default)]
pub(crate) struct LoadCache {
    attempted: HashSet<String>,
    failures: BTreeMap<String, String>,
}

impl LoadCache {
    pub(crate) fn clear(&mut self) {
        self.attempted.clear();
        self.failures.clear();
    }

    pub(crate) fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    /// Load `package` unless it was already attempted in this run.
    ///
    /// Returns whether the package is now registered.
    pub(crate) fn try_load(
        &mut self,
        loader: Option<&mut (dyn ExternalLoader + '_)>,
        package: &str,
        collection: &mut ModulesCollection,
    ) -> bool {
        if collection.contains_module(package) {
            return true;
        }
        if !self.attempted.insert(package.to_string()) {
            return false;
        }
        let result = match loader {
            Some(loader) => loader.load_external(package, collection),
            None => Err(LoadError::Unavailable {
                package: package.to_string(),
            }),
        };
        match result {
            Ok(_) => {
                debug!(package, "loaded external package");
                true
            }
            Err(err) => {
                debug!(package, error = %err, "could not load external package");
                self.failures.insert(package.to_string(), err.to_string());
                false
            }
        }
    }
}
