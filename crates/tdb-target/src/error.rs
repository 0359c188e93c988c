//! Error types for chip data operations.

use std::path::PathBuf;

use crate::command::CmdQueue;
use crate::memmap::MType;
use crate::memref::Layout;

/// Errors that can occur while working with chip data.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// Chip name outside the supported set.
    #[error("unsupported target '{name}' (expected one of BM1684X, BM1684, BM1688, SG2260)")]
    UnsupportedTarget {
        /// The rejected identifier.
        name: String,
    },

    /// Address not covered by any region of the chip's memory map.
    #[error("address 0x{address:X} is outside every known memory region")]
    AddressUnmapped {
        /// The address that failed classification.
        address: u64,
    },

    /// Shape incompatible with the requested layout.
    #[error("layout {layout:?} needs a {expected}-d shape, got {actual} dims")]
    InvalidShape {
        layout: Layout,
        expected: usize,
        actual: usize,
    },

    /// Stride arithmetic for the shape does not fit in 64 bits.
    #[error("layout {layout:?} stride for shape {shape:?} overflows u64")]
    StrideOverflow { layout: Layout, shape: Vec<u64> },

    /// Layout the chip has no local-memory rule for.
    #[error("layout {layout:?} is not supported on {chip}")]
    UnsupportedLayout {
        layout: Layout,
        chip: &'static str,
    },

    /// Local layout requested for an address outside local memory.
    #[error("layout {layout:?} describes local memory, but the address is in {kind} memory")]
    NotLocal { layout: Layout, kind: MType },

    /// Raw command buffer could not be split into records.
    #[error("{queue} decode error: {detail}")]
    Decode { queue: CmdQueue, detail: String },

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading/writing memory-map files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory-map file not found.
    #[error("memory map file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Validation error in a memory map definition.
    #[error("validation error: {detail}")]
    Validation {
        /// Description of the validation failure.
        detail: String,
    },
}

/// Result type for chip data operations.
pub type Result<T> = std::result::Result<T, TargetError>;
