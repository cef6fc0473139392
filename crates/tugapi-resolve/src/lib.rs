//! Collection-wide alias resolution for tugapi.
//!
//! This crate drives the passes that turn a freshly populated
//! [`ModulesCollection`](tugapi_core::ModulesCollection) into a resolved API graph:
//! - Export list expansion (`__all__` references to other modules)
//! - Wildcard import expansion
//! - Fixed-point alias resolution with an optional iteration cap
//! - On-demand loading of missing packages through [`ExternalLoader`]
//! - Configuration (`.tugapi/config.toml`) and the [`ResolutionReport`]

pub mod exports;
pub mod loader;
pub mod options;
pub mod report;
pub mod resolver;
pub mod wildcards;

pub use exports::expand_exports;
pub use loader::ExternalLoader;
pub use options::{Config, ExternalPolicy, ResolveOptions};
pub use report::ResolutionReport;
pub use resolver::Resolver;
