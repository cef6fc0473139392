//! Outcome of a resolution run.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// What [`Resolver::resolve_all`](crate::Resolver::resolve_all) achieved.
///
/// Paths are import-site alias paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    /// Aliases resolved during the run.
    pub resolved: BTreeSet<String>,
    /// Aliases still unresolved after the last pass, cyclic ones included.
    pub unresolved: BTreeSet<String>,
    /// Cyclic aliases and the chain reported for each.
    pub cyclic: BTreeMap<String, Vec<String>>,
    /// Packages the external loader failed to provide, with the reason.
    pub load_failures: BTreeMap<String, String>,
    /// Number of passes run.
    pub iterations: usize,
    /// Whether a fixed point was reached before the iteration cap.
    pub converged: bool,
}

impl ResolutionReport {
    /// Whether every attempted alias was resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Unresolved aliases that may still resolve once their target appears.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.unresolved
            .iter()
            .filter(|path| !self.cyclic.contains_key(*path))
            .map(String::as_str)
    }
}
