//! Per-alias target resolution.
//!
//! An alias moves through these states:
//!
//! - `Unresolved`: only the target path is known
//! - resolving: a re-entrancy guard is set while the target is looked up
//! - `Resolved`: the alias holds the id of its direct target
//! - `Cyclic`: the chain loops; the full chain is kept for diagnostics
//!
//! A missing target leaves the alias `Unresolved` so a later pass can retry.
//!
//! Two entry points exist:
//!
//! - [`ModulesCollection::resolve_target`] resolves an alias and everything it
//!   needs along the way, recording the result on each alias.
//! - [`ModulesCollection::final_target`] only reads. It follows the chain,
//!   peeking at target paths of unresolved aliases, and never changes state.
//!
//! Both detect cycles with an explicit stack of visited paths instead of
//! relying on recursion depth.

use indexmap::IndexSet;
use tracing::debug;

use crate::collection::ModulesCollection;
use crate::error::AliasError;
use crate::model::{AliasState, ObjectId};

impl ModulesCollection {
    // ------------------------------------------------------------------------
    // Read-only chain following
    // ------------------------------------------------------------------------

    /// The non-alias object at the end of an alias chain.
    ///
    /// Non-alias objects are their own final target. Unresolved aliases are
    /// followed by looking up their target path without resolving them.
    pub fn final_target(&self, id: ObjectId) -> Result<ObjectId, AliasError> {
        let mut seen = IndexSet::new();
        self.final_target_with(id, &mut seen)
    }

    fn final_target_with(
        &self,
        id: ObjectId,
        seen: &mut IndexSet<String>,
    ) -> Result<ObjectId, AliasError> {
        let mut current = id;
        while let Some(alias) = self[current].as_alias() {
            let path = self.path(current);
            if seen.contains(&path) {
                let mut chain: Vec<String> = seen.iter().cloned().collect();
                chain.push(path);
                return Err(AliasError::Cyclic { chain });
            }
            seen.insert(path.clone());
            current = match alias.target() {
                Some(target) => target,
                None => {
                    let target_path = alias.target_path().to_string();
                    self.peek(&target_path, seen)?
                        .ok_or(AliasError::Resolution {
                            alias_path: path,
                            target_path,
                        })?
                }
            };
        }
        Ok(current)
    }

    /// Read-only lookup that follows intermediate aliases.
    ///
    /// Each intermediate alias is followed with a copy of the current stack,
    /// so only genuine loops are reported as cycles.
    fn peek(
        &self,
        path: &str,
        seen: &IndexSet<String>,
    ) -> Result<Option<ObjectId>, AliasError> {
        let parts: Vec<&str> = path.split('.').collect();
        let mut current: Option<ObjectId> = None;
        for part in parts {
            let scope = match current {
                Some(id) if self[id].is_alias() => {
                    Some(self.final_target_with(id, &mut seen.clone())?)
                }
                other => other,
            };
            let members = match scope {
                Some(id) => self[id].members(),
                None => self.modules(),
            };
            match members.get(part) {
                Some(member) => current = Some(*member),
                None => return Ok(None),
            }
        }
        Ok(current)
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Resolve an alias to its direct target.
    ///
    /// Resolving an already resolved alias returns the recorded target.
    /// A cyclic verdict is recorded on the alias and returned again on later
    /// calls until [`reset_alias`](Self::reset_alias) clears it.
    pub fn resolve_target(&mut self, alias: ObjectId) -> Result<ObjectId, AliasError> {
        let state = match self[alias].as_alias() {
            Some(data) => data.state().clone(),
            None => {
                return Err(AliasError::NotAnAlias {
                    path: self.path(alias),
                })
            }
        };
        match state {
            AliasState::Resolved(target) => return Ok(target),
            AliasState::Cyclic(chain) => return Err(AliasError::Cyclic { chain }),
            AliasState::Unresolved => {}
        }

        let result = self.resolve_chain(alias);
        if let Err(AliasError::Cyclic { chain }) = &result {
            debug!(alias = %self.path(alias), chain = %chain.join(" -> "), "cyclic alias");
            if let Some(data) = self[alias].as_alias_mut() {
                data.state = AliasState::Cyclic(chain.clone());
            }
        }
        result
    }

    /// Forget a cyclic verdict so a later resolution attempt starts afresh.
    pub fn reset_alias(&mut self, alias: ObjectId) {
        if let Some(data) = self[alias].as_alias_mut() {
            if data.is_cyclic() {
                data.state = AliasState::Unresolved;
            }
        }
    }

    /// Guarded resolution of one link of the chain.
    ///
    /// Stored cyclic verdicts are ignored here so the chain reported for a
    /// fresh resolution always describes the current loop.
    fn resolve_chain(&mut self, alias: ObjectId) -> Result<ObjectId, AliasError> {
        let (target_path, state, resolving) = match self[alias].as_alias() {
            Some(data) => (
                data.target_path().to_string(),
                data.state().clone(),
                data.resolving,
            ),
            None => return Ok(alias),
        };
        if let AliasState::Resolved(target) = state {
            return Ok(target);
        }
        if resolving {
            return Err(AliasError::Cyclic {
                chain: vec![target_path],
            });
        }

        self.set_resolving(alias, true);
        let result = self.resolve_unguarded(alias, &target_path);
        self.set_resolving(alias, false);
        result
    }

    fn resolve_unguarded(
        &mut self,
        alias: ObjectId,
        target_path: &str,
    ) -> Result<ObjectId, AliasError> {
        let resolved = self
            .lookup_resolving(target_path)
            .map_err(|err| prepend_chain(err, target_path))?
            .ok_or_else(|| AliasError::Resolution {
                alias_path: self.path(alias),
                target_path: target_path.to_string(),
            })?;

        if resolved == alias {
            return Err(AliasError::Cyclic {
                chain: vec![target_path.to_string()],
            });
        }

        let needs_resolution = self[resolved]
            .as_alias()
            .map(|data| !data.is_resolved())
            .unwrap_or(false);
        if needs_resolution {
            self.resolve_chain(resolved)
                .map_err(|err| prepend_chain(err, target_path))?;
        }

        self.bind_alias(alias, resolved);
        Ok(resolved)
    }

    /// Lookup used during resolution: intermediate aliases are resolved on
    /// the way down, under the same re-entrancy guards.
    fn lookup_resolving(&mut self, path: &str) -> Result<Option<ObjectId>, AliasError> {
        let parts: Vec<String> = path.split('.').map(str::to_string).collect();
        let mut current: Option<ObjectId> = None;
        for part in parts {
            let scope = match current {
                Some(id) if self[id].is_alias() => {
                    self.resolve_chain(id)?;
                    Some(self.final_target(id)?)
                }
                other => other,
            };
            let members = match scope {
                Some(id) => self[id].members(),
                None => self.modules(),
            };
            match members.get(&part) {
                Some(member) => current = Some(*member),
                None => return Ok(None),
            }
        }
        Ok(current)
    }

    fn set_resolving(&mut self, alias: ObjectId, value: bool) {
        if let Some(data) = self[alias].as_alias_mut() {
            data.resolving = value;
        }
    }

    fn bind_alias(&mut self, alias: ObjectId, target: ObjectId) {
        if let Some(previous) = self[alias].as_alias().and_then(|data| data.target()) {
            self[previous].aliases.remove(&alias);
        }
        if let Some(data) = self[alias].as_alias_mut() {
            data.state = AliasState::Resolved(target);
        }
        if self[alias].parent().is_some() {
            self[target].aliases.insert(alias);
        }
    }

    /// Point an alias at a specific object.
    ///
    /// Used when a member is replaced and when materializing aliases that
    /// are resolved from the start. An alias can never target itself or an
    /// object living at its own path.
    pub fn set_alias_target(
        &mut self,
        alias: ObjectId,
        target: ObjectId,
    ) -> Result<(), AliasError> {
        let Some(data) = self[alias].as_alias() else {
            return Err(AliasError::NotAnAlias {
                path: self.path(alias),
            });
        };
        if target == alias || self.path(target) == self.path(alias) {
            return Err(AliasError::Cyclic {
                chain: vec![data.target_path().to_string()],
            });
        }
        let target_path = self.path(target);
        self.bind_alias(alias, target);
        if let Some(data) = self[alias].as_alias_mut() {
            data.target_path = target_path;
        }
        Ok(())
    }
}

fn prepend_chain(err: AliasError, path: &str) -> AliasError {
    match err {
        AliasError::Cyclic { chain } => {
            let mut full = Vec::with_capacity(chain.len() + 1);
            full.push(path.to_string());
            full.extend(chain);
            AliasError::Cyclic { chain: full }
        }
        other => other,
    }
}
