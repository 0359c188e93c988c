//! Error types for runner operations.

use std::path::PathBuf;

use tdb_target::MType;
use thiserror::Error;

/// Result type alias for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors that can occur while constructing or using a runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Real backend requested but no device node is present.
    #[error("chip backend unavailable: no device at {}", device.display())]
    BackendUnavailable {
        /// Device node that was probed.
        device: PathBuf,
    },

    /// Device node exists but could not be opened.
    #[error("failed to open device {}: {source}", device.display())]
    DeviceOpen {
        device: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Requested memory size is zero or larger than the chip's global memory.
    #[error("invalid memory size {requested} (global memory holds {limit} bytes)")]
    InvalidMemorySize {
        /// Bytes requested.
        requested: u64,
        /// Bytes available.
        limit: u64,
    },

    /// Memory map lacks a region the runner needs.
    #[error("memory map has no '{kind}' region")]
    MissingRegion { kind: MType },

    /// Address outside every mapped region.
    #[error("address 0x{address:X} is not mapped")]
    Unmapped { address: u64 },

    /// Access starts in a region but runs past its end.
    #[error("access of {len} bytes at 0x{address:X} crosses the end of its region")]
    OutOfBounds { address: u64, len: u64 },

    /// I/O error during device communication.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
