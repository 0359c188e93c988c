//! CLI command implementations.

pub mod doctor;
pub mod inspect;
pub mod mem;
pub mod target;

use std::path::Path;

use anyhow::{Context, Result};
use tdb_context::config::parse_number;
use tdb_context::{BackendConfig, ContextRegistry};
use tracing::debug;

/// Backend configuration from `path`, or from the environment.
pub fn load_config(path: Option<&Path>) -> Result<BackendConfig> {
    let config = match path {
        Some(path) => BackendConfig::load_toml(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BackendConfig::from_env().context("reading backend configuration")?,
    };
    debug!(
        backend = %config.backend(),
        device = %config.device.display(),
        "backend configuration loaded"
    );
    Ok(config)
}

/// Registry over the built-in chips.
pub fn registry(config: Option<&Path>) -> Result<ContextRegistry> {
    Ok(ContextRegistry::new(load_config(config)?)?)
}

/// Parse a decimal or `0x`-prefixed hex command-line number.
pub fn parse_u64(what: &str, value: &str) -> Result<u64> {
    Ok(parse_number(what, value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numbers() {
        assert_eq!(parse_u64("address", "4096").unwrap(), 4096);
        assert_eq!(parse_u64("address", "0x1_0000_0000").unwrap(), 0x1_0000_0000);
        assert_eq!(parse_u64("address", "0XFF").unwrap(), 255);
        assert!(parse_u64("address", "0x").is_err());
        assert!(parse_u64("address", "-1").is_err());
        let err = parse_u64("address", "ten").unwrap_err();
        assert!(err.to_string().starts_with("address: 'ten'"), "{err}");
    }

    #[test]
    fn config_file_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tdb.toml");
        std::fs::write(&path, "[backend]\nusing-cmodel = false\ndevice = \"/dev/null\"\n")
            .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert!(!config.using_cmodel);

        let missing = dir.path().join("missing.toml");
        assert!(load_config(Some(&missing)).is_err());
    }
}
