//! Command stream decoding.
//!
//! The context layer only forwards a decoder; chips pick the record widths.

use std::fmt::Debug;

use crate::command::{CmdQueue, TpuCmd};
use crate::error::{Result, TargetError};

/// Turns a raw command buffer into commands.
pub trait Decoder: Debug + Send + Sync {
    /// Decode every command in `raw` for the given queue.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::Decode`] if the buffer is malformed.
    fn decode(&self, queue: CmdQueue, raw: &[u8]) -> Result<Vec<TpuCmd>>;
}

/// Header size shared by all record layouts: id, dep id, opcode.
const HEADER_BYTES: usize = 10;

/// Fixed-width record decoder.
///
/// Record layout (little endian):
///
/// ```text
/// 0..4   cmd_id
/// 4..8   cmd_id_dep
/// 8..10  opcode
/// 10..   payload
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordDecoder {
    tiu_width: usize,
    dma_width: usize,
}

impl RecordDecoder {
    /// Widths below the header size are clamped up to it.
    pub const fn new(tiu_width: usize, dma_width: usize) -> Self {
        let tiu_width = if tiu_width < HEADER_BYTES { HEADER_BYTES } else { tiu_width };
        let dma_width = if dma_width < HEADER_BYTES { HEADER_BYTES } else { dma_width };
        Self {
            tiu_width,
            dma_width,
        }
    }

    pub const fn width(&self, queue: CmdQueue) -> usize {
        match queue {
            CmdQueue::Tiu => self.tiu_width,
            CmdQueue::Dma => self.dma_width,
        }
    }

    /// Encode a command into one record of this decoder's width.
    ///
    /// Payload bytes beyond the record are dropped; short payloads are
    /// zero-padded.
    pub fn encode(&self, cmd: &TpuCmd) -> Vec<u8> {
        let width = self.width(cmd.queue);
        let mut record = vec![0u8; width];
        record[0..4].copy_from_slice(&cmd.cmd_id.to_le_bytes());
        record[4..8].copy_from_slice(&cmd.cmd_id_dep.to_le_bytes());
        record[8..10].copy_from_slice(&cmd.opcode.to_le_bytes());
        let n = cmd.payload.len().min(width - HEADER_BYTES);
        record[HEADER_BYTES..HEADER_BYTES + n].copy_from_slice(&cmd.payload[..n]);
        record
    }
}

impl Decoder for RecordDecoder {
    fn decode(&self, queue: CmdQueue, raw: &[u8]) -> Result<Vec<TpuCmd>> {
        let width = self.width(queue);
        if raw.len() % width != 0 {
            return Err(TargetError::Decode {
                queue,
                detail: format!(
                    "buffer of {} bytes is not a multiple of the {width}-byte record",
                    raw.len()
                ),
            });
        }

        raw.chunks_exact(width)
            .map(|record| {
                let (id, rest) = record.split_at(4);
                let (dep, rest) = rest.split_at(4);
                let (op, payload) = rest.split_at(2);
                Ok(TpuCmd {
                    queue,
                    cmd_id: u32::from_le_bytes(word(id)),
                    cmd_id_dep: u32::from_le_bytes(word(dep)),
                    opcode: u16::from_le_bytes([op[0], op[1]]),
                    payload: payload.to_vec(),
                })
            })
            .collect()
    }
}

fn word(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}
