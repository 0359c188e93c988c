//! BM1688.

use tdb_target::{CmdQueue, MType, MemRegion, RecordDecoder, Target};

use super::{ChipTables, Lanes, GIB, KIB, MIB};
use crate::contract::ChipContract;
use crate::merge::MergeRule;
use crate::registry::ChipRegistration;

pub const REGISTRATION: ChipRegistration = ChipRegistration {
    target: Target::Bm1688,
    construct,
};

fn construct() -> tdb_target::Result<Box<dyn ChipContract>> {
    Ok(Box::new(Bm1688::new()?))
}

const MERGE: MergeRule = MergeRule {
    primary: CmdQueue::Dma,
    strip_trailing_sys: true,
};

#[derive(Debug)]
pub struct Bm1688 {
    tables: ChipTables,
}

impl Bm1688 {
    pub fn new() -> tdb_target::Result<Self> {
        let tables = ChipTables::new(
            &[
                (MType::Local, MemRegion::new(0x2500_0000, 4 * MIB)),
                (MType::Static, MemRegion::new(0x2540_0000, 64 * KIB)),
                (MType::L2Sram, MemRegion::new(0x2600_0000, 8 * MIB)),
                (MType::Global, MemRegion::new(0x1_0000_0000, 4 * GIB)),
            ],
            Lanes {
                npu_num: 32,
                align_eu_base: 32,
                lane_bytes: 128 * KIB,
            },
            Some(15),
            Some(6),
            RecordDecoder::new(128, 128),
        )?;
        Ok(Self { tables })
    }
}

table_chip!(Bm1688, target: Target::Bm1688, merge: MERGE);

#[cfg(test)]
mod tests {
    use super::*;
    use tdb_target::{DType, Layout, MemRef, TargetError, TpuCmd};

    fn chip() -> Bm1688 {
        Bm1688::new().unwrap()
    }

    #[test]
    fn classify_regions() {
        let c = chip();
        assert_eq!(c.classify_address(0x2500_0000).unwrap(), MType::Local);
        assert_eq!(c.classify_address(0x2540_0000).unwrap(), MType::Static);
        assert_eq!(c.classify_address(0x2600_0040).unwrap(), MType::L2Sram);
        assert_eq!(c.classify_address(0x1_8000_0000).unwrap(), MType::Global);
        assert!(matches!(
            c.classify_address(0x2541_0000),
            Err(TargetError::AddressUnmapped { .. })
        ));
    }

    #[test]
    fn lane_offset_widens_stride() {
        let c = chip();
        // starts on lane 31, so 2 channels span two lane rounds
        let m = MemRef::new(
            0x2500_0000 + 31 * 128 * KIB,
            vec![1, 2, 2, 2],
            DType::Int8,
            Layout::Compact,
        );
        assert_eq!(c.local_layout_to_stride(&m).unwrap(), vec![8, 4, 2, 1]);
    }

    #[test]
    fn inner_sys_is_a_barrier() {
        let c = chip();
        let tiu = vec![TpuCmd::tiu(1, 0, 0), TpuCmd::tiu(2, 0, 15), TpuCmd::tiu(3, 1, 0)];
        let dma = vec![TpuCmd::dma(1, 1, 6), TpuCmd::dma(2, 0, 0)];
        let merged = c.merge_instruction(tiu, dma);
        let ids: Vec<_> = merged.iter().map(|cmd| (cmd.queue, cmd.cmd_id)).collect();
        // DMA leads, so its sync closes the first round ahead of TIU's
        assert_eq!(
            ids,
            [
                (CmdQueue::Tiu, 1),
                (CmdQueue::Dma, 1),
                (CmdQueue::Tiu, 2),
                (CmdQueue::Tiu, 3),
                (CmdQueue::Dma, 2),
            ]
        );
    }
}
