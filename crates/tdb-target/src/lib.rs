//! Chip-level data model for the tdb TPU instruction debugger.
//!
//! Everything here is leaf data shared by the runner and context layers:
//! - **Chip identity:** the closed set of supported TPU families
//! - **Memory map:** region kinds and their address ranges
//! - **Commands:** TIU/DMA instruction units and system-register descriptors
//! - **Memory references:** shape, stride and local-memory layout

pub mod chip;
pub mod command;
pub mod decoder;
pub mod error;
pub mod memmap;
pub mod memref;
pub mod parse;

pub use chip::Target;
pub use command::{AtomicReg, CmdQueue, TpuCmd};
pub use decoder::{Decoder, RecordDecoder};
pub use error::{Result, TargetError};
pub use memmap::{MType, MemRegion, MemoryMap};
pub use memref::{checked_contiguous_stride, contiguous_stride, DType, Layout, LocalGeometry, MemRef};
