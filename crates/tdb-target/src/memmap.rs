//! Memory map model.
//!
//! Each chip partitions its address space into a handful of region kinds.
//! The map keeps regions disjoint, so every address belongs to at most one
//! kind.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};

/// Kind of memory an address range belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MType {
    /// Device global memory (DDR).
    Global,
    /// Static memory holding sync state and small constants.
    Static,
    /// Shared L2 SRAM.
    L2Sram,
    /// Per-lane local memory of the NPU array.
    Local,
}

impl fmt::Display for MType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MType::Global => "global",
            MType::Static => "static",
            MType::L2Sram => "l2-sram",
            MType::Local => "local",
        };
        f.write_str(s)
    }
}

/// A contiguous address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemRegion {
    /// First address of the region.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
}

impl MemRegion {
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// One past the last address.
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }

    /// Whether `[address, address + len)` lies entirely inside the region.
    pub fn contains_range(&self, address: u64, len: u64) -> bool {
        match address.checked_add(len) {
            Some(end) => address >= self.base && end <= self.end(),
            None => false,
        }
    }

    fn overlaps(&self, other: &MemRegion) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

/// On-disk form of a memory map: a flat list of regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegionEntry {
    pub kind: MType,
    pub base: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemoryMapFile {
    regions: Vec<RegionEntry>,
}

/// Mapping from region kind to address range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MemoryMapFile", into = "MemoryMapFile")]
pub struct MemoryMap {
    regions: BTreeMap<MType, MemRegion>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(kind, region)` pairs, rejecting overlaps.
    pub fn from_regions(regions: impl IntoIterator<Item = (MType, MemRegion)>) -> Result<Self> {
        let mut map = Self::new();
        for (kind, region) in regions {
            map.insert(kind, region)?;
        }
        Ok(map)
    }

    /// Add a region. Fails on zero size, a duplicate kind, or overlap with
    /// an existing region.
    pub fn insert(&mut self, kind: MType, region: MemRegion) -> Result<()> {
        if region.size == 0 {
            return Err(TargetError::Validation {
                detail: format!("region '{kind}' has size 0"),
            });
        }
        if self.regions.contains_key(&kind) {
            return Err(TargetError::Validation {
                detail: format!("region '{kind}' defined twice"),
            });
        }
        if let Some((other, r)) = self.regions.iter().find(|(_, r)| r.overlaps(&region)) {
            return Err(TargetError::Validation {
                detail: format!(
                    "regions '{}' (0x{:X}..0x{:X}) and '{}' (0x{:X}..0x{:X}) overlap",
                    kind,
                    region.base,
                    region.end(),
                    other,
                    r.base,
                    r.end()
                ),
            });
        }
        self.regions.insert(kind, region);
        Ok(())
    }

    /// Region of the given kind, if the chip has one.
    pub fn region(&self, kind: MType) -> Option<&MemRegion> {
        self.regions.get(&kind)
    }

    /// Kind of the region containing `address`.
    pub fn classify(&self, address: u64) -> Option<MType> {
        self.regions
            .iter()
            .find(|(_, r)| r.contains(address))
            .map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MType, &MemRegion)> {
        self.regions.iter().map(|(k, r)| (*k, r))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl TryFrom<MemoryMapFile> for MemoryMap {
    type Error = TargetError;

    fn try_from(file: MemoryMapFile) -> Result<Self> {
        MemoryMap::from_regions(
            file.regions
                .into_iter()
                .map(|e| (e.kind, MemRegion::new(e.base, e.size))),
        )
    }
}

impl From<MemoryMap> for MemoryMapFile {
    fn from(map: MemoryMap) -> Self {
        let mut regions: Vec<RegionEntry> = map
            .regions
            .into_iter()
            .map(|(kind, r)| RegionEntry {
                kind,
                base: r.base,
                size: r.size,
            })
            .collect();
        regions.sort_by_key(|e| e.base);
        Self { regions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryMap {
        MemoryMap::from_regions([
            (MType::Local, MemRegion::new(0x1000, 0x1000)),
            (MType::Static, MemRegion::new(0x2000, 0x100)),
            (MType::Global, MemRegion::new(0x10_0000, 0x10_0000)),
        ])
        .unwrap()
    }

    #[test]
    fn classify_boundaries() {
        let map = sample();
        assert_eq!(map.classify(0x1000), Some(MType::Local));
        assert_eq!(map.classify(0x1FFF), Some(MType::Local));
        assert_eq!(map.classify(0x2000), Some(MType::Static));
        assert_eq!(map.classify(0x20FF), Some(MType::Static));
        assert_eq!(map.classify(0x2100), None);
        assert_eq!(map.classify(0xFFF), None);
        assert_eq!(map.classify(0x1F_FFFF), Some(MType::Global));
        assert_eq!(map.classify(0x20_0000), None);
    }

    #[test]
    fn overlapping_region_rejected() {
        let mut map = sample();
        let err = map
            .insert(MType::L2Sram, MemRegion::new(0x1800, 0x1000))
            .unwrap_err();
        assert!(err.to_string().contains("overlap"));
        assert!(map.region(MType::L2Sram).is_none());
    }

    #[test]
    fn duplicate_and_empty_rejected() {
        let mut map = sample();
        assert!(map.insert(MType::Local, MemRegion::new(0x9000, 0x10)).is_err());
        assert!(map.insert(MType::L2Sram, MemRegion::new(0x9000, 0)).is_err());
    }

    #[test]
    fn adjacent_regions_allowed() {
        let map = MemoryMap::from_regions([
            (MType::Local, MemRegion::new(0, 0x100)),
            (MType::Static, MemRegion::new(0x100, 0x100)),
        ])
        .unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn range_containment() {
        let r = MemRegion::new(0x100, 0x100);
        assert!(r.contains_range(0x100, 0x100));
        assert!(r.contains_range(0x1F0, 0x10));
        assert!(!r.contains_range(0x1F0, 0x11));
        assert!(!r.contains_range(0xFF, 1));
        assert!(!r.contains_range(u64::MAX, 2));
    }
}
