//! BM1684X.

use tdb_target::{CmdQueue, MType, MemRegion, RecordDecoder, Target};

use super::{ChipTables, Lanes, GIB, KIB, MIB};
use crate::contract::ChipContract;
use crate::merge::MergeRule;
use crate::registry::ChipRegistration;

pub const REGISTRATION: ChipRegistration = ChipRegistration {
    target: Target::Bm1684x,
    construct,
};

fn construct() -> tdb_target::Result<Box<dyn ChipContract>> {
    Ok(Box::new(Bm1684x::new()?))
}

const MERGE: MergeRule = MergeRule {
    primary: CmdQueue::Dma,
    strip_trailing_sys: true,
};

#[derive(Debug)]
pub struct Bm1684x {
    tables: ChipTables,
}

impl Bm1684x {
    pub fn new() -> tdb_target::Result<Self> {
        let tables = ChipTables::new(
            &[
                (MType::Local, MemRegion::new(0x0800_0000, 16 * MIB)),
                (MType::Static, MemRegion::new(0x0900_0000, 64 * KIB)),
                (MType::L2Sram, MemRegion::new(0x1000_0000, 2 * MIB)),
                (MType::Global, MemRegion::new(0x1_0000_0000, 8 * GIB)),
            ],
            Lanes {
                npu_num: 64,
                align_eu_base: 64,
                lane_bytes: 256 * KIB,
            },
            Some(15),
            Some(6),
            RecordDecoder::new(128, 128),
        )?;
        Ok(Self { tables })
    }
}

table_chip!(Bm1684x, target: Target::Bm1684x, merge: MERGE);
