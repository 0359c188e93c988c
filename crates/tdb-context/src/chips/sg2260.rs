//! SG2260.
//!
//! Command streams keep their closing system instructions when merged.

use tdb_target::{CmdQueue, MType, MemRegion, RecordDecoder, Target};

use super::{ChipTables, Lanes, GIB, KIB, MIB};
use crate::contract::ChipContract;
use crate::merge::MergeRule;
use crate::registry::ChipRegistration;

pub const REGISTRATION: ChipRegistration = ChipRegistration {
    target: Target::Sg2260,
    construct,
};

fn construct() -> tdb_target::Result<Box<dyn ChipContract>> {
    Ok(Box::new(Sg2260::new()?))
}

const MERGE: MergeRule = MergeRule {
    primary: CmdQueue::Tiu,
    strip_trailing_sys: false,
};

#[derive(Debug)]
pub struct Sg2260 {
    tables: ChipTables,
}

impl Sg2260 {
    pub fn new() -> tdb_target::Result<Self> {
        let tables = ChipTables::new(
            &[
                (MType::Local, MemRegion::new(0x6900_0000, 16 * MIB)),
                (MType::Static, MemRegion::new(0x6800_0000, 64 * KIB)),
                (MType::L2Sram, MemRegion::new(0x6A00_0000, 128 * MIB)),
                (MType::Global, MemRegion::new(0x80_0000_0000, 16 * GIB)),
            ],
            Lanes {
                npu_num: 64,
                align_eu_base: 64,
                lane_bytes: 256 * KIB,
            },
            Some(15),
            Some(6),
            RecordDecoder::new(128, 96),
        )?;
        Ok(Self { tables })
    }
}

table_chip!(Sg2260, target: Target::Sg2260, merge: MERGE);
