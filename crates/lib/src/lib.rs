//! genja-lib: Core types and logic for genja
//!
//! This crate provides the fundamental types for declaring a build graph and
//! rendering it as a build manifest:
//! - `Task`: ordered rule and build-edge declarations, plus `generate`
//! - `Config`/`ConfigRegistry`: the nested configuration tree and its hooks
//! - `ManifestWriter`/`LineWriter`: statement serialization and line wrapping
//! - `escape`/`template`: token escaping and `{cfg.*}` resolution

pub mod config;
pub mod escape;
pub mod syntax;
pub mod task;
pub mod template;
pub mod writer;
