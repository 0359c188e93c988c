//! `tdb target`: chip listing, description and memory-map files.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tdb_context::TargetContext;
use tdb_target::memmap::RegionEntry;
use tdb_target::parse::{load_memmap_toml, memmap_to_toml, validate_memmap};
use tdb_target::{AtomicReg, LocalGeometry, MemoryMap, Target};

/// List all supported chips.
pub fn list(config: Option<&Path>) -> Result<()> {
    let registry = super::registry(config)?;
    println!("Supported chips:");
    println!();
    for target in Target::ALL {
        let status = if registry.resolve(target.name()).is_ok() {
            ""
        } else {
            " (no implementation)"
        };
        println!("  {:<10} {}{status}", target.name(), target.description());
    }
    println!();
    println!("Use 'tdb target describe <name>' for details.");
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct TargetSummary<'a> {
    name: &'static str,
    description: &'static str,
    default_memory_size: u64,
    geometry: &'a LocalGeometry,
    #[serde(skip_serializing_if = "Option::is_none")]
    tiu_sys: Option<&'a AtomicReg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dma_sys: Option<&'a AtomicReg>,
    regions: Vec<RegionEntry>,
}

impl<'a> TargetSummary<'a> {
    fn new(ctx: &'a TargetContext) -> Self {
        let target = ctx.target();
        Self {
            name: target.name(),
            description: target.description(),
            default_memory_size: ctx.chip().default_memory_size(),
            geometry: ctx.chip().geometry(),
            tiu_sys: ctx.tiu_sys(),
            dma_sys: ctx.dma_sys(),
            regions: ctx
                .memmap()
                .iter()
                .map(|(kind, region)| RegionEntry {
                    kind,
                    base: region.base,
                    size: region.size,
                })
                .collect(),
        }
    }
}

/// Describe one chip in detail.
pub fn describe(config: Option<&Path>, name: &str, format: Option<&str>) -> Result<()> {
    print!("{}", render(config, name, format)?);
    Ok(())
}

fn render(config: Option<&Path>, name: &str, format: Option<&str>) -> Result<String> {
    let registry = super::registry(config)?;
    let ctx = registry.create(name)?;
    let summary = TargetSummary::new(&ctx);

    match format {
        None | Some("text") => Ok(human(&summary)),
        Some("toml") => Ok(toml::to_string_pretty(&summary)?),
        Some("json") => Ok(serde_json::to_string_pretty(&summary)? + "\n"),
        Some(other) => bail!("unknown format '{other}' (expected text, toml or json)"),
    }
}

fn human(summary: &TargetSummary<'_>) -> String {
    let mut out = String::new();
    out += &format!("=== Chip: {} ===\n", summary.name);
    out += &format!("{}\n\n", summary.description);

    out += "--- Memory map ---\n";
    for entry in &summary.regions {
        out += &format!(
            "  {:<8} 0x{:010X} - 0x{:010X} ({} bytes)\n",
            entry.kind.to_string(),
            entry.base,
            entry.base + entry.size,
            entry.size
        );
    }
    out += "\n";

    let g = summary.geometry;
    out += "--- Local memory ---\n";
    out += &format!("  Lanes:        {}\n", g.npu_num);
    out += &format!("  EU alignment: {} bytes\n", g.align_eu_base);
    out += &format!("  Lane size:    {} bytes\n", g.lane_bytes);
    out += "\n";

    out += "--- System instructions ---\n";
    for (queue, sys) in [("TIU", summary.tiu_sys), ("DMA", summary.dma_sys)] {
        match sys {
            Some(reg) => out += &format!("  {queue}: {} (opcode {})\n", reg.name, reg.opcode),
            None => out += &format!("  {queue}: none\n"),
        }
    }
    out += "\n";
    out += &format!(
        "Default runner memory: {} bytes\n",
        summary.default_memory_size
    );
    out
}

/// Write a chip's memory map as a `.memmap.toml` file, or to stdout.
pub fn export(config: Option<&Path>, name: &str, output: Option<&Path>) -> Result<()> {
    let text = export_memmap(config, name)?;
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn export_memmap(config: Option<&Path>, name: &str) -> Result<String> {
    let registry = super::registry(config)?;
    let ctx = registry.create(name)?;
    Ok(memmap_to_toml(ctx.memmap())?)
}

/// Check a `.memmap.toml` file. Warnings are printed; errors fail.
pub fn validate(path: &Path) -> Result<()> {
    println!("{}", validate_file(path)?);
    Ok(())
}

fn validate_file(path: &Path) -> Result<String> {
    let map = load_memmap_toml(path).with_context(|| format!("loading {}", path.display()))?;
    match memmap_status(&map) {
        Ok(status) => Ok(format!("{}: {status}", path.display())),
        Err(status) => bail!("{}: {status}", path.display()),
    }
}

/// One-line validation summary of `map`; `Err` when any issue is an error.
pub(crate) fn memmap_status(map: &MemoryMap) -> std::result::Result<String, String> {
    let Err(issues) = validate_memmap(map) else {
        return Ok(format!("ok ({} regions)", map.len()));
    };
    let failed = issues.iter().any(|i| i.severity == "error");
    let notes: Vec<String> = issues
        .iter()
        .map(|i| format!("{}: {}", i.severity, i.message))
        .collect();
    if failed {
        Err(notes.join("; "))
    } else {
        Ok(notes.join("; "))
    }
}
