//! TOML parsing, serialization and validation for memory maps.
//!
//! Memory maps are stored as `.memmap.toml` files:
//!
//! ```toml
//! [[regions]]
//! kind = "local"
//! base = 134217728
//! size = 16777216
//! ```

use std::path::Path;

use crate::error::{Result, TargetError};
use crate::memmap::{MType, MemoryMap};

/// Alignment every region base is expected to honour.
const REGION_ALIGN: u64 = 4096;

/// A validation issue found in a memory map.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Load a memory map from a `.memmap.toml` file.
pub fn load_memmap_toml(path: &Path) -> Result<MemoryMap> {
    if !path.exists() {
        return Err(TargetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_memmap_toml(&content)
}

/// Parse a memory map from a TOML string. Overlapping regions are rejected.
pub fn parse_memmap_toml(toml_str: &str) -> Result<MemoryMap> {
    let map: MemoryMap = toml::from_str(toml_str)?;
    Ok(map)
}

/// Serialize a memory map to pretty TOML.
pub fn memmap_to_toml(map: &MemoryMap) -> Result<String> {
    let toml_str = toml::to_string_pretty(map)?;
    Ok(toml_str)
}

/// Check a memory map for the regions a debugger context needs.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with every problem found,
/// warnings included.
pub fn validate_memmap(map: &MemoryMap) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    // 1. Local and global memory are mandatory
    for kind in [MType::Local, MType::Global] {
        if map.region(kind).is_none() {
            issues.push(ValidationIssue {
                severity: "error",
                message: format!("memory map has no '{kind}' region"),
            });
        }
    }

    // 2. Region bases are page aligned
    for (kind, region) in map.iter() {
        if region.base % REGION_ALIGN != 0 {
            issues.push(ValidationIssue {
                severity: "warning",
                message: format!(
                    "region '{kind}' base 0x{:X} is not {REGION_ALIGN}-byte aligned",
                    region.base
                ),
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memmap::MemRegion;

    fn sample() -> MemoryMap {
        MemoryMap::from_regions([
            (MType::Local, MemRegion::new(0x0800_0000, 0x0100_0000)),
            (MType::Global, MemRegion::new(0x1_0000_0000, 0x1_0000_0000)),
        ])
        .unwrap()
    }

    #[test]
    fn round_trip() {
        let original = sample();
        let toml_str = memmap_to_toml(&original).unwrap();
        let parsed = parse_memmap_toml(&toml_str).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
[[regions]]
kind = "local"
base = 4096
size = 4096

[[regions]]
kind = "l2-sram"
base = 8192
size = 1024
"#;
        let map = parse_memmap_toml(toml_str).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.classify(8192), Some(MType::L2Sram));
    }

    #[test]
    fn parse_overlap_rejected() {
        let toml_str = r#"
[[regions]]
kind = "local"
base = 0
size = 4096

[[regions]]
kind = "static"
base = 2048
size = 4096
"#;
        let err = parse_memmap_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn parse_invalid_returns_error() {
        assert!(parse_memmap_toml("this is not valid toml [[[").is_err());
        assert!(parse_memmap_toml("[[regions]]\nkind = \"dram\"\nbase = 0\nsize = 1\n").is_err());
    }

    #[test]
    fn validate_missing_global() {
        let map = MemoryMap::from_regions([(MType::Local, MemRegion::new(0, 0x1000))]).unwrap();
        let issues = validate_memmap(&map).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("'global'")));
    }

    #[test]
    fn validate_reports_unaligned_base_as_warning() {
        let map = MemoryMap::from_regions([
            (MType::Local, MemRegion::new(0x10, 0x1000)),
            (MType::Global, MemRegion::new(0x10_0000, 0x1000)),
        ])
        .unwrap();
        let issues = validate_memmap(&map).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, "warning");
        assert!(issues[0].message.contains("'local'"));
    }

    #[test]
    fn validate_clean_map() {
        assert!(validate_memmap(&sample()).is_ok());
    }

    #[test]
    fn load_not_found() {
        let result = load_memmap_toml(Path::new("/nonexistent/chip.memmap.toml"));
        assert!(matches!(result.unwrap_err(), TargetError::NotFound { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chip.memmap.toml");
        std::fs::write(&path, memmap_to_toml(&sample()).unwrap()).unwrap();

        let map = load_memmap_toml(&path).unwrap();
        assert_eq!(map, sample());
    }
}
