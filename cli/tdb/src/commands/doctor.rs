//! `tdb doctor`: configuration and chip table diagnostics.

use std::path::Path;

use anyhow::Result;
use tdb_context::config::{TDB_DEVICE, TDB_MEMORY_SIZE, USING_CMODEL};
use tdb_context::ContextRegistry;
use tdb_runner::BackendKind;
use tdb_target::Target;

/// Print diagnostic information about the backend and every chip.
pub fn run(config: Option<&Path>) -> Result<()> {
    print!("{}", report(config));
    Ok(())
}

fn report(config_path: Option<&Path>) -> String {
    let mut out = String::new();
    out += "=== tdb doctor ===\n\n";
    out += &format!("tdb version: {}\n\n", env!("CARGO_PKG_VERSION"));

    out += "--- Environment ---\n";
    for key in [USING_CMODEL, TDB_DEVICE, TDB_MEMORY_SIZE] {
        match std::env::var(key) {
            Ok(value) => out += &format!("  {key:<16} {value}\n"),
            Err(_) => out += &format!("  {key:<16} (unset)\n"),
        }
    }
    out += "\n";

    out += "--- Backend ---\n";
    if let Some(path) = config_path {
        out += &format!("  Config file: {}\n", path.display());
    }
    let config = match super::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            out += &format!("  error: {e:#}\n");
            return out;
        }
    };
    out += &format!("  Backend:     {}\n", config.backend());
    if config.backend() == BackendKind::Chip {
        let present = if config.device.exists() {
            "present"
        } else {
            "missing"
        };
        out += &format!("  Device:      {} ({present})\n", config.device.display());
    }
    match config.memory_size {
        Some(size) => out += &format!("  Memory size: {size} bytes\n"),
        None => out += "  Memory size: chip default\n",
    }
    out += "\n";

    out += "--- Chips ---\n";
    let registry = match ContextRegistry::new(config) {
        Ok(registry) => registry,
        Err(e) => {
            out += &format!("  error: {e}\n");
            return out;
        }
    };
    for target in Target::ALL {
        out += &format!("  {:<8} {}\n", target.name(), chip_status(&registry, target));
    }
    out
}

fn chip_status(registry: &ContextRegistry, target: Target) -> String {
    let ctx = match registry.create(target.name()) {
        Ok(ctx) => ctx,
        Err(e) => return format!("error: {e}"),
    };
    match super::target::memmap_status(ctx.memmap()) {
        Ok(status) | Err(status) => status,
    }
}
