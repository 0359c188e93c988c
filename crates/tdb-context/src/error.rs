//! Context-layer errors.

use std::path::PathBuf;

use tdb_runner::RunnerError;
use tdb_target::{Target, TargetError};
use thiserror::Error;

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors in the backend configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Switch value outside the recognized boolean literals.
    #[error("{key}: '{value}' is not a boolean (use true/false/1/0)")]
    InvalidBool { key: String, value: String },

    /// Numeric setting that failed to parse.
    #[error("{key}: '{value}' is not a decimal or 0x-prefixed number")]
    InvalidNumber { key: String, value: String },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },
}

/// Errors surfaced by the registry and target contexts.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Chip name outside the supported set.
    #[error("unsupported target '{name}'")]
    UnsupportedTarget { name: String },

    /// Supported chip with no registered implementation.
    #[error("target {target} is supported but no implementation is registered")]
    ImplementationMissing { target: Target },

    /// Two registrations for the same chip.
    #[error("target {target} is registered more than once")]
    DuplicateRegistration { target: Target },

    /// A registration built a context for a different chip.
    #[error("registration for {expected} constructed a {found} context")]
    RegistrationMismatch { expected: Target, found: Target },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Coarse classification of a [`ContextError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller or environment; fix the configuration.
    Configuration,
    /// A chip implementation broke its contract; a programming error.
    ContractViolation,
    /// A backend resource could not be built or used.
    ResourceConstruction,
}

impl ContextError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContextError::UnsupportedTarget { .. } | ContextError::Config(_) => {
                ErrorKind::Configuration
            }
            ContextError::ImplementationMissing { .. }
            | ContextError::DuplicateRegistration { .. }
            | ContextError::RegistrationMismatch { .. } => ErrorKind::ContractViolation,
            ContextError::Target(e) => match e {
                TargetError::UnsupportedTarget { .. }
                | TargetError::Toml(_)
                | TargetError::TomlSer(_)
                | TargetError::Io(_)
                | TargetError::NotFound { .. } => ErrorKind::Configuration,
                TargetError::AddressUnmapped { .. }
                | TargetError::InvalidShape { .. }
                | TargetError::StrideOverflow { .. }
                | TargetError::UnsupportedLayout { .. }
                | TargetError::NotLocal { .. }
                | TargetError::Decode { .. }
                | TargetError::Validation { .. } => ErrorKind::ContractViolation,
            },
            ContextError::Runner(e) => match e {
                RunnerError::BackendUnavailable { .. } => ErrorKind::Configuration,
                _ => ErrorKind::ResourceConstruction,
            },
        }
    }
}
