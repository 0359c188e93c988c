//! tdb CLI: inspect chip contexts of the TPU instruction debugger.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tdb", version, about = "TPU instruction debugger tools")]
struct Cli {
    /// Backend configuration file (default: environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Supported chips
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
    /// Memory region of an address
    Classify {
        /// Chip name (e.g., BM1684X)
        chip: String,
        /// Address, decimal or 0x-prefixed hex
        address: String,
    },
    /// Stride of a tensor shape
    Stride {
        /// Dimension sizes
        #[arg(required = true)]
        dims: Vec<u64>,
        /// Apply the local layout rules of this chip
        #[arg(long)]
        chip: Option<String>,
        /// Layout (continuous, stride, align-eu, compact, offset, t3, t4, t5)
        #[arg(long, default_value = "continuous")]
        layout: String,
        /// Element type (int8, f16, f32, ...)
        #[arg(long, default_value = "f32")]
        dtype: String,
        /// Explicit per-dimension stride for --layout stride (comma separated)
        #[arg(long, value_delimiter = ',')]
        strides: Option<Vec<u64>>,
        /// Tensor address (default: start of local memory)
        #[arg(long)]
        address: Option<String>,
    },
    /// Merge raw TIU and DMA command buffers into execution order
    Merge {
        /// Chip name
        chip: String,
        /// Raw TIU command buffer
        #[arg(long)]
        tiu: PathBuf,
        /// Raw DMA command buffer
        #[arg(long)]
        dma: PathBuf,
        /// Output format (text, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Read chip memory through the configured backend
    Mem {
        #[command(subcommand)]
        action: MemAction,
    },
    /// Check configuration, backends and chip tables
    Doctor,
}

#[derive(Subcommand)]
enum TargetAction {
    /// List supported chips
    List,
    /// Show the memory map and layout parameters of a chip
    Describe {
        /// Chip name
        name: String,
        /// Output format (default: human-readable, "toml" or "json")
        #[arg(long)]
        format: Option<String>,
    },
    /// Write a chip's memory map as a .memmap.toml file
    Export {
        /// Chip name
        name: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a .memmap.toml file
    Validate {
        /// Memory map file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum MemAction {
    /// SHA-256 of a memory range
    Digest {
        chip: String,
        address: String,
        len: String,
    },
    /// Hex dump of a memory range
    Read {
        chip: String,
        address: String,
        len: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Target { action } => match action {
            TargetAction::List => commands::target::list(config),
            TargetAction::Describe { name, format } => {
                commands::target::describe(config, &name, format.as_deref())
            }
            TargetAction::Export { name, output } => {
                commands::target::export(config, &name, output.as_deref())
            }
            TargetAction::Validate { file } => commands::target::validate(&file),
        },

        Commands::Classify { chip, address } => {
            commands::inspect::classify(config, &chip, &address)
        }

        Commands::Stride {
            dims,
            chip,
            layout,
            dtype,
            strides,
            address,
        } => commands::inspect::stride(
            config,
            &dims,
            &commands::inspect::StrideArgs {
                chip: chip.as_deref(),
                layout: &layout,
                dtype: &dtype,
                strides: strides.as_deref(),
                address: address.as_deref(),
            },
        ),

        Commands::Merge {
            chip,
            tiu,
            dma,
            format,
        } => commands::inspect::merge(config, &chip, &tiu, &dma, format.as_deref()),

        Commands::Mem { action } => match action {
            MemAction::Digest { chip, address, len } => {
                commands::mem::digest(config, &chip, &address, &len)
            }
            MemAction::Read { chip, address, len } => {
                commands::mem::read(config, &chip, &address, &len)
            }
        },

        Commands::Doctor => commands::doctor::run(config),
    }
}
