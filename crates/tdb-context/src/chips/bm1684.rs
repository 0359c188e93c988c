//! BM1684.
//!
//! The oldest family: no TIU system instruction, and no local layouts
//! beyond the compact and EU-aligned ones.

use tdb_target::{CmdQueue, Layout, MType, MemRegion, RecordDecoder, Target};

use super::{ChipTables, Lanes, GIB, KIB, MIB};
use crate::contract::ChipContract;
use crate::merge::MergeRule;
use crate::registry::ChipRegistration;

pub const REGISTRATION: ChipRegistration = ChipRegistration {
    target: Target::Bm1684,
    construct,
};

fn construct() -> tdb_target::Result<Box<dyn ChipContract>> {
    Ok(Box::new(Bm1684::new()?))
}

const MERGE: MergeRule = MergeRule {
    primary: CmdQueue::Tiu,
    strip_trailing_sys: true,
};

#[derive(Debug)]
pub struct Bm1684 {
    tables: ChipTables,
}

impl Bm1684 {
    pub fn new() -> tdb_target::Result<Self> {
        let tables = ChipTables::new(
            &[
                (MType::Local, MemRegion::new(0x0800_0000, 32 * MIB)),
                (MType::Static, MemRegion::new(0x0A00_0000, 64 * KIB)),
                (MType::Global, MemRegion::new(0x1_0000_0000, 4 * GIB)),
            ],
            Lanes {
                npu_num: 64,
                align_eu_base: 128,
                lane_bytes: 512 * KIB,
            },
            None,
            Some(7),
            RecordDecoder::new(128, 112),
        )?;
        Ok(Self { tables })
    }
}

table_chip!(
    Bm1684,
    target: Target::Bm1684,
    merge: MERGE,
    reject: [Layout::T3, Layout::T4, Layout::T5],
);
