//! Backend configuration.
//!
//! The backend switch is read once, when the registry is built. Contexts copy
//! the resulting selection and never consult the environment again.
//!
//! Environment:
//! - `USING_CMODEL`: `true`/`false` (default `true`)
//! - `TDB_DEVICE`: device node of the real chip
//! - `TDB_MEMORY_SIZE`: runner global memory in bytes, decimal or `0x` hex
//!
//! File (`tdb.toml`):
//!
//! ```toml
//! [backend]
//! using-cmodel = false
//! device = "/dev/bm-sophon1"
//! memory-size = 1073741824
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tdb_runner::BackendKind;

use crate::error::ConfigError;

pub const USING_CMODEL: &str = "USING_CMODEL";
pub const TDB_DEVICE: &str = "TDB_DEVICE";
pub const TDB_MEMORY_SIZE: &str = "TDB_MEMORY_SIZE";

/// Device node probed when none is configured.
pub const DEFAULT_DEVICE: &str = "/dev/bm-sophon0";

/// Backend selection and runner parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BackendConfig {
    /// Use the software model instead of a real device.
    #[serde(default = "default_using_cmodel")]
    pub using_cmodel: bool,
    /// Device node of the real chip.
    #[serde(default = "default_device")]
    pub device: PathBuf,
    /// Global memory handed to the runner; the chip default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u64>,
}

fn default_using_cmodel() -> bool {
    true
}

fn default_device() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE)
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            using_cmodel: default_using_cmodel(),
            device: default_device(),
            memory_size: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    backend: BackendConfig,
}

impl BackendConfig {
    /// Configuration for the software model.
    pub fn cmodel() -> Self {
        Self::default()
    }

    /// Configuration for a real device at `device`.
    pub fn chip(device: impl Into<PathBuf>) -> Self {
        Self {
            using_cmodel: false,
            device: device.into(),
            memory_size: None,
        }
    }

    pub fn with_memory_size(mut self, memory_size: u64) -> Self {
        self.memory_size = Some(memory_size);
        self
    }

    /// Backend kind this configuration selects.
    pub fn backend(&self) -> BackendKind {
        if self.using_cmodel {
            BackendKind::Cmodel
        } else {
            BackendKind::Chip
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
        })
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup(USING_CMODEL) {
            config.using_cmodel = parse_bool(USING_CMODEL, &value)?;
        }
        if let Some(value) = lookup(TDB_DEVICE) {
            if !value.trim().is_empty() {
                config.device = PathBuf::from(value.trim());
            }
        }
        if let Some(value) = lookup(TDB_MEMORY_SIZE) {
            config.memory_size = Some(parse_number(TDB_MEMORY_SIZE, &value)?);
        }
        Ok(config)
    }

    /// Load the `[backend]` table of a TOML file.
    pub fn load_toml(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse the `[backend]` table of a TOML document.
    pub fn parse_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(toml_str)?;
        Ok(file.backend)
    }
}

/// Parse a boolean switch. Only `true True TRUE 1` and `false False FALSE 0`
/// are accepted; surrounding whitespace is ignored.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "true" | "True" | "TRUE" | "1" => Ok(true),
        "false" | "False" | "FALSE" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.into(),
            value: value.into(),
        }),
    }
}

/// Parse a decimal or `0x`-prefixed hex number. Underscores between digits
/// and surrounding whitespace are ignored.
pub fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    let digits = value.trim().replace('_', "");
    let parsed = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    };
    parsed.map_err(|_| ConfigError::InvalidNumber {
        key: key.into(),
        value: value.into(),
    })
}
