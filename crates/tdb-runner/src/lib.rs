//! Memory runners for the tdb TPU debugger.
//!
//! A runner owns the live memory of one backend kind:
//! - [`CmodelRunner`]: software model, sparse in-process memory
//! - [`ChipRunner`]: a real device reached through its device node
//!
//! Both expose the same [`Memory`] surface so callers never branch on the
//! backend.

pub mod chip;
pub mod cmodel;
pub mod error;
pub mod window;

use std::fmt::{self, Debug};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use chip::ChipRunner;
pub use cmodel::CmodelRunner;
pub use error::{Result, RunnerError};
pub use window::AddressWindow;

/// Which execution backend a runner drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Software-simulated model.
    Cmodel,
    /// Real silicon.
    Chip,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cmodel => write!(f, "cmodel"),
            Self::Chip => write!(f, "chip"),
        }
    }
}

/// Byte-addressed memory surface shared by every backend.
///
/// Methods take `&self`; implementations serialize access internally.
pub trait Memory: Send + Sync {
    /// Usable global memory in bytes.
    fn size(&self) -> u64;

    /// Read `len` bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns error if the range is unmapped, crosses a region end, or the
    /// backend fails.
    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>>;

    /// Write `data` starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns error if the range is unmapped, crosses a region end, or the
    /// backend fails.
    fn write(&self, address: u64, data: &[u8]) -> Result<()>;

    /// SHA-256 of a memory range, formatted as `sha256:<hex>`.
    ///
    /// Used to compare simulated and device state after a replay.
    fn digest(&self, address: u64, len: usize) -> Result<String> {
        let bytes = self.read(address, len)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hash: [u8; 32] = hasher.finalize().into();
        Ok(format!("sha256:{}", hash_hex(&hash)))
    }
}

/// Owner of the live memory of one backend.
pub trait Runner: Debug + Send + Sync {
    fn kind(&self) -> BackendKind;

    fn memory(&self) -> &dyn Memory;
}

fn hash_hex(hash: &[u8]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdb_target::{MType, MemRegion, MemoryMap};

    #[test]
    fn digest_tracks_content() {
        let map = MemoryMap::from_regions([(MType::Global, MemRegion::new(0, 0x1000))]).unwrap();
        let runner = CmodelRunner::new(&map, 0x1000).unwrap();
        let mem = runner.memory();

        let empty = mem.digest(0, 64).unwrap();
        assert!(empty.starts_with("sha256:"));
        assert_eq!(empty.len(), "sha256:".len() + 64);

        mem.write(8, &[1, 2, 3]).unwrap();
        let changed = mem.digest(0, 64).unwrap();
        assert_ne!(empty, changed);
        assert_eq!(changed, mem.digest(0, 64).unwrap());
    }

    #[test]
    fn backend_kind_display() {
        assert_eq!(BackendKind::Cmodel.to_string(), "cmodel");
        assert_eq!(BackendKind::Chip.to_string(), "chip");
    }
}
