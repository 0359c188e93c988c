//! Target contexts for the tdb TPU instruction debugger.
//!
//! A [`ContextRegistry`] turns a chip name into a [`TargetContext`]:
//! - **Registry:** validates the name, resolves the chip's static
//!   registration and caches one context per chip
//! - **Context:** the chip contract (memory map, layouts, instruction merge)
//!   plus the runner selected by the backend configuration
//! - **Scope:** [`BackendGuard`] and [`ContextRegistry::use_backend`] hold a
//!   context for the duration of a block

pub mod chips;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod merge;
pub mod registry;
pub mod scope;

pub use config::BackendConfig;
pub use context::{MemoryRef, TargetContext};
pub use contract::ChipContract;
pub use error::{ConfigError, ContextError, ErrorKind, Result};
pub use merge::{merge_streams, MergeRule};
pub use registry::{ChipRegistration, ContextRegistry};
pub use scope::BackendGuard;
