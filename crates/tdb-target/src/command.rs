//! Instruction units and system-register descriptors.
//!
//! A TPU executes two independently ordered queues: TIU (compute) and DMA
//! (data movement). Commands carry their own id within the queue and the id
//! of the other queue's command they wait on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Instruction queue a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CmdQueue {
    /// Tensor compute queue.
    Tiu,
    /// Data movement queue.
    Dma,
}

impl fmt::Display for CmdQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmdQueue::Tiu => f.write_str("TIU"),
            CmdQueue::Dma => f.write_str("DMA"),
        }
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TpuCmd {
    pub queue: CmdQueue,
    /// Position of the command within its own queue.
    pub cmd_id: u32,
    /// Id of the peer-queue command this one waits for.
    pub cmd_id_dep: u32,
    /// Task/command type field.
    pub opcode: u16,
    /// Remaining raw bytes of the record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,
}

impl TpuCmd {
    pub fn new(queue: CmdQueue, cmd_id: u32, cmd_id_dep: u32, opcode: u16) -> Self {
        Self {
            queue,
            cmd_id,
            cmd_id_dep,
            opcode,
            payload: Vec::new(),
        }
    }

    pub fn tiu(cmd_id: u32, cmd_id_dep: u32, opcode: u16) -> Self {
        Self::new(CmdQueue::Tiu, cmd_id, cmd_id_dep, opcode)
    }

    pub fn dma(cmd_id: u32, cmd_id_dep: u32, opcode: u16) -> Self {
        Self::new(CmdQueue::Dma, cmd_id, cmd_id_dep, opcode)
    }
}

impl fmt::Display for TpuCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} (dep {}, op {})",
            self.queue, self.cmd_id, self.cmd_id_dep, self.opcode
        )
    }
}

/// Descriptor of a synchronization/system instruction for one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicReg {
    /// Register name as the chip documentation spells it.
    pub name: String,
    pub queue: CmdQueue,
    /// Opcode identifying the system instruction in its queue.
    pub opcode: u16,
}

impl AtomicReg {
    pub fn new(name: impl Into<String>, queue: CmdQueue, opcode: u16) -> Self {
        Self {
            name: name.into(),
            queue,
            opcode,
        }
    }

    /// Whether `cmd` is an instance of this system instruction.
    pub fn matches(&self, cmd: &TpuCmd) -> bool {
        cmd.queue == self.queue && cmd.opcode == self.opcode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_reg_matches_queue_and_opcode() {
        let sys = AtomicReg::new("SYS", CmdQueue::Tiu, 15);
        assert!(sys.matches(&TpuCmd::tiu(3, 0, 15)));
        assert!(!sys.matches(&TpuCmd::tiu(3, 0, 14)));
        // same opcode on the other queue is a different instruction
        assert!(!sys.matches(&TpuCmd::dma(3, 0, 15)));
    }

    #[test]
    fn display() {
        assert_eq!(TpuCmd::dma(4, 2, 1).to_string(), "DMA#4 (dep 2, op 1)");
    }
}
