//! Address bounds shared by both runners.

use tdb_target::{MType, MemRegion, MemoryMap};

use crate::error::{Result, RunnerError};

/// The addressable part of a chip's memory map for one runner.
///
/// Global memory is truncated to the runner's memory size; every other
/// region is used as mapped.
#[derive(Debug, Clone)]
pub struct AddressWindow {
    memmap: MemoryMap,
    global: MemRegion,
}

impl AddressWindow {
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidMemorySize`] if `memory_size` is zero or
    /// exceeds the mapped global region.
    pub fn new(memmap: &MemoryMap, memory_size: u64) -> Result<Self> {
        let mapped = *memmap
            .region(MType::Global)
            .ok_or(RunnerError::MissingRegion { kind: MType::Global })?;
        if memory_size == 0 || memory_size > mapped.size {
            return Err(RunnerError::InvalidMemorySize {
                requested: memory_size,
                limit: mapped.size,
            });
        }
        Ok(Self {
            memmap: memmap.clone(),
            global: MemRegion::new(mapped.base, memory_size),
        })
    }

    /// Size of the usable global memory.
    pub fn memory_size(&self) -> u64 {
        self.global.size
    }

    /// Check that `[address, address + len)` is inside a single region.
    pub fn check(&self, address: u64, len: u64) -> Result<MType> {
        let kind = self
            .memmap
            .classify(address)
            .ok_or(RunnerError::Unmapped { address })?;
        let region = match kind {
            MType::Global => self.global,
            _ => *self
                .memmap
                .region(kind)
                .ok_or(RunnerError::Unmapped { address })?,
        };
        if !region.contains_range(address, len) {
            return Err(RunnerError::OutOfBounds { address, len });
        }
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memmap() -> MemoryMap {
        MemoryMap::from_regions([
            (MType::Local, MemRegion::new(0x1000, 0x1000)),
            (MType::Global, MemRegion::new(0x10_0000, 0x10_0000)),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(matches!(
            AddressWindow::new(&memmap(), 0),
            Err(RunnerError::InvalidMemorySize { .. })
        ));
        assert!(matches!(
            AddressWindow::new(&memmap(), 0x10_0001),
            Err(RunnerError::InvalidMemorySize { limit: 0x10_0000, .. })
        ));
    }

    #[test]
    fn requires_global_region() {
        let map = MemoryMap::from_regions([(MType::Local, MemRegion::new(0, 0x100))]).unwrap();
        assert!(matches!(
            AddressWindow::new(&map, 1),
            Err(RunnerError::MissingRegion { kind: MType::Global })
        ));
    }

    #[test]
    fn global_truncated_to_memory_size() {
        let w = AddressWindow::new(&memmap(), 0x1000).unwrap();
        assert_eq!(w.check(0x10_0000, 0x1000).unwrap(), MType::Global);
        assert!(matches!(
            w.check(0x10_0800, 0x1000),
            Err(RunnerError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn unmapped_and_crossing() {
        let w = AddressWindow::new(&memmap(), 0x1000).unwrap();
        assert!(matches!(w.check(0x0, 4), Err(RunnerError::Unmapped { .. })));
        assert!(matches!(
            w.check(0x1FFE, 4),
            Err(RunnerError::OutOfBounds { .. })
        ));
        assert_eq!(w.check(0x1FFC, 4).unwrap(), MType::Local);
    }
}
