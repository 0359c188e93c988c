//! `tdb classify`, `tdb stride` and `tdb merge`: offline chip queries.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tdb_target::{checked_contiguous_stride, DType, Layout, MType, TpuCmd};

use super::parse_u64;

/// Print the memory region an address falls in.
pub fn classify(config: Option<&Path>, chip: &str, address: &str) -> Result<()> {
    let address = parse_u64("address", address)?;
    let kind = classify_address(config, chip, address)?;
    println!("0x{address:X}: {kind}");
    Ok(())
}

fn classify_address(config: Option<&Path>, chip: &str, address: u64) -> Result<MType> {
    let registry = super::registry(config)?;
    let ctx = registry.create(chip)?;
    Ok(ctx.classify_address(address)?)
}

/// Options of `tdb stride` besides the shape.
#[derive(Debug, Default)]
pub struct StrideArgs<'a> {
    pub chip: Option<&'a str>,
    pub layout: &'a str,
    pub dtype: &'a str,
    /// Explicit stride for the `stride` layout.
    pub strides: Option<&'a [u64]>,
    pub address: Option<&'a str>,
}

/// Print the stride of a shape, either contiguous or under a chip's local
/// layout.
pub fn stride(config: Option<&Path>, dims: &[u64], args: &StrideArgs<'_>) -> Result<()> {
    let stride = compute_stride(config, dims, args)?;
    let joined: Vec<String> = stride.iter().map(u64::to_string).collect();
    println!("({})", joined.join(", "));
    Ok(())
}

fn compute_stride(config: Option<&Path>, dims: &[u64], args: &StrideArgs<'_>) -> Result<Vec<u64>> {
    let layout: Layout = args.layout.parse()?;
    let dtype: DType = args.dtype.parse()?;
    if (layout == Layout::Stride) != args.strides.is_some() {
        bail!("--strides is required with, and only valid for, layout 'stride'");
    }

    let Some(chip) = args.chip else {
        if layout != Layout::Continuous {
            bail!("layout '{layout}' needs --chip");
        }
        return checked_contiguous_stride(dims).context("stride overflows 64 bits");
    };

    let registry = super::registry(config)?;
    let ctx = registry.create(chip)?;
    let address = match args.address {
        Some(a) => parse_u64("address", a)?,
        None if layout.is_local() => ctx.chip().geometry().local_base,
        None => ctx
            .memmap()
            .region(MType::Global)
            .map(|r| r.base)
            .context("chip has no global memory")?,
    };
    let memref = match args.strides {
        Some(strides) => ctx.strided_memref(address, dims.to_vec(), strides.to_vec(), dtype)?,
        None => ctx.memref(address, dims.to_vec(), dtype, layout)?,
    };
    Ok(memref.stride)
}

/// Decode two raw command buffers and print them in execution order.
pub fn merge(
    config: Option<&Path>,
    chip: &str,
    tiu: &Path,
    dma: &Path,
    format: Option<&str>,
) -> Result<()> {
    let registry = super::registry(config)?;
    let ctx = registry.create(chip)?;

    let tiu_raw = fs::read(tiu).with_context(|| format!("reading {}", tiu.display()))?;
    let dma_raw = fs::read(dma).with_context(|| format!("reading {}", dma.display()))?;
    let merged = ctx.decode_and_merge(&tiu_raw, &dma_raw)?;

    match format {
        None | Some("text") => {
            for (i, cmd) in merged.iter().enumerate() {
                let marker = if ctx.is_system_instruction(cmd) { "  [sync]" } else { "" };
                println!("{i:>6}  {cmd}{marker}");
            }
            println!();
            println!("{} commands ({})", merged.len(), summarize(&merged));
        }
        Some("json") => println!("{}", serde_json::to_string_pretty(&merged)?),
        Some(other) => bail!("unknown format '{other}' (expected text or json)"),
    }
    Ok(())
}

fn summarize(cmds: &[TpuCmd]) -> String {
    let tiu = cmds
        .iter()
        .filter(|c| c.queue == tdb_target::CmdQueue::Tiu)
        .count();
    format!("{tiu} TIU, {} DMA", cmds.len() - tiu)
}
