//! `tdb mem`: memory access through the configured backend.

use std::path::Path;

use anyhow::Result;
use tdb_runner::Memory;

use super::parse_u64;

/// Print the SHA-256 digest of a memory range.
pub fn digest(config: Option<&Path>, chip: &str, address: &str, len: &str) -> Result<()> {
    let address = parse_u64("address", address)?;
    let len = parse_u64("length", len)?;
    println!("{}", digest_range(config, chip, address, len)?);
    Ok(())
}

fn digest_range(config: Option<&Path>, chip: &str, address: u64, len: u64) -> Result<String> {
    let registry = super::registry(config)?;
    let ctx = registry.get(chip)?;
    let memory = ctx.memory()?;
    Ok(memory.digest(address, usize::try_from(len)?)?)
}

/// Print a hex dump of a memory range.
pub fn read(config: Option<&Path>, chip: &str, address: &str, len: &str) -> Result<()> {
    let address = parse_u64("address", address)?;
    let len = parse_u64("length", len)?;
    let registry = super::registry(config)?;
    let ctx = registry.get(chip)?;
    let bytes = ctx.memory()?.read(address, usize::try_from(len)?)?;
    print!("{}", hex_dump(address, &bytes));
    Ok(())
}

fn hex_dump(address: u64, bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, row) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = row.iter().map(|b| format!("{b:02x}")).collect();
        out += &format!("{:010X}  {}\n", address + (i as u64) * 16, hex.join(" "));
    }
    out
}
