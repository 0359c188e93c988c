//! Built-in chip implementations.
//!
//! Each chip module exports a `REGISTRATION` constant. The table below is
//! an exhaustive match, so adding a [`Target`] without a chip module fails
//! to compile.

/// Implement [`ChipContract`](crate::contract::ChipContract) for a chip
/// struct holding its data in a `tables: ChipTables` field.
///
/// `merge` is the chip's [`MergeRule`](crate::merge::MergeRule). Layouts
/// listed under `reject` fail with `TargetError::UnsupportedLayout`.
macro_rules! table_chip {
    (
        $chip:ident,
        target: $target:expr,
        merge: $merge:expr
        $(, reject: [$($layout:expr),+ $(,)?])?
        $(,)?
    ) => {
        impl $crate::contract::ChipContract for $chip {
            fn target(&self) -> tdb_target::Target {
                $target
            }

            fn memmap(&self) -> &tdb_target::MemoryMap {
                &self.tables.memmap
            }

            fn tiu_sys(&self) -> Option<&tdb_target::AtomicReg> {
                self.tables.tiu_sys.as_ref()
            }

            fn dma_sys(&self) -> Option<&tdb_target::AtomicReg> {
                self.tables.dma_sys.as_ref()
            }

            fn decoder(&self) -> &dyn tdb_target::Decoder {
                &self.tables.decoder
            }

            fn geometry(&self) -> &tdb_target::LocalGeometry {
                &self.tables.geometry
            }

            fn default_memory_size(&self) -> u64 {
                self.tables.global_size()
            }

            fn classify_address(&self, address: u64) -> tdb_target::Result<tdb_target::MType> {
                $crate::contract::classify_in(&self.tables.memmap, address)
            }

            fn local_layout_to_stride(
                &self,
                memref: &tdb_target::MemRef,
            ) -> tdb_target::Result<Vec<u64>> {
                $(
                    if [$($layout),+].contains(&memref.layout) {
                        return Err(tdb_target::TargetError::UnsupportedLayout {
                            layout: memref.layout,
                            chip: $target.name(),
                        });
                    }
                )?
                self.tables.geometry.stride(memref)
            }

            fn merge_instruction(
                &self,
                tiu: Vec<tdb_target::TpuCmd>,
                dma: Vec<tdb_target::TpuCmd>,
            ) -> Vec<tdb_target::TpuCmd> {
                $crate::merge::merge_streams($merge, tiu, dma, |cmd| self.tables.is_sys(cmd))
            }

            fn is_system_instruction(&self, cmd: &tdb_target::TpuCmd) -> bool {
                self.tables.is_sys(cmd)
            }

            fn construct_runner(
                &self,
                backend: tdb_runner::BackendKind,
                device: &std::path::Path,
                memory_size: u64,
            ) -> tdb_runner::Result<std::sync::Arc<dyn tdb_runner::Runner>> {
                $crate::contract::build_runner(&self.tables.memmap, backend, device, memory_size)
            }
        }
    };
}

pub mod bm1684;
pub mod bm1684x;
pub mod bm1688;
pub mod sg2260;

use tdb_target::{
    AtomicReg, CmdQueue, LocalGeometry, MType, MemRegion, MemoryMap, RecordDecoder, Target, TpuCmd,
};

use crate::contract::matches_sys;
use crate::registry::ChipRegistration;

/// Registration for `target`.
pub const fn registration(target: Target) -> ChipRegistration {
    match target {
        Target::Bm1684x => bm1684x::REGISTRATION,
        Target::Bm1684 => bm1684::REGISTRATION,
        Target::Bm1688 => bm1688::REGISTRATION,
        Target::Sg2260 => sg2260::REGISTRATION,
    }
}

/// One registration per supported chip.
pub fn builtin_registrations() -> [ChipRegistration; 4] {
    Target::ALL.map(registration)
}

/// Fixed data every chip module carries.
#[derive(Debug, Clone)]
pub(crate) struct ChipTables {
    pub memmap: MemoryMap,
    pub tiu_sys: Option<AtomicReg>,
    pub dma_sys: Option<AtomicReg>,
    pub decoder: RecordDecoder,
    pub geometry: LocalGeometry,
}

/// Lane layout of local memory.
pub(crate) struct Lanes {
    pub npu_num: u64,
    pub align_eu_base: u64,
    pub lane_bytes: u64,
}

impl ChipTables {
    pub fn new(
        regions: &[(MType, MemRegion)],
        lanes: Lanes,
        tiu_sys: Option<u16>,
        dma_sys: Option<u16>,
        decoder: RecordDecoder,
    ) -> tdb_target::Result<Self> {
        let memmap = MemoryMap::from_regions(regions.iter().copied())?;
        let local_base = memmap.region(MType::Local).map_or(0, |r| r.base);
        Ok(Self {
            memmap,
            tiu_sys: tiu_sys.map(|op| AtomicReg::new("SYS", CmdQueue::Tiu, op)),
            dma_sys: dma_sys.map(|op| AtomicReg::new("DMA_sys", CmdQueue::Dma, op)),
            decoder,
            geometry: LocalGeometry {
                npu_num: lanes.npu_num,
                align_eu_base: lanes.align_eu_base,
                lane_bytes: lanes.lane_bytes,
                local_base,
            },
        })
    }

    /// Default runner memory: the whole mapped global region.
    pub fn global_size(&self) -> u64 {
        self.memmap.region(MType::Global).map_or(0, |r| r.size)
    }

    /// Whether `cmd` is either queue's system instruction.
    pub fn is_sys(&self, cmd: &TpuCmd) -> bool {
        matches_sys(self.tiu_sys.as_ref(), self.dma_sys.as_ref(), cmd)
    }
}

pub(crate) const KIB: u64 = 1024;
pub(crate) const MIB: u64 = 1024 * KIB;
pub(crate) const GIB: u64 = 1024 * MIB;

#[cfg(test)]
mod tests {
    use super::*;
    use tdb_target::parse::validate_memmap;

    #[test]
    fn table_covers_every_target() {
        let regs = builtin_registrations();
        for (reg, target) in regs.iter().zip(Target::ALL) {
            assert_eq!(reg.target, target);
            let chip = reg.build().unwrap();
            assert_eq!(chip.target(), target);
        }
    }

    #[test]
    fn memmaps_validate() {
        for reg in builtin_registrations() {
            let chip = reg.build().unwrap();
            if let Err(issues) = validate_memmap(chip.memmap()) {
                panic!("{}: {issues:?}", reg.target);
            }
        }
    }
}
