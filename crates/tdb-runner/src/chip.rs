//! Device-backed runner.
//!
//! Talks to real silicon through its device node. The node exposes the
//! chip's physical address space: file offset equals device address.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tdb_target::MemoryMap;
use tracing::info;

use crate::error::{Result, RunnerError};
use crate::window::AddressWindow;
use crate::{BackendKind, Memory, Runner};

/// Memory of a real device.
#[derive(Debug)]
pub struct ChipRunner {
    device: PathBuf,
    window: AddressWindow,
    file: Mutex<File>,
}

impl ChipRunner {
    /// Connect to the device at `device`.
    ///
    /// # Errors
    ///
    /// - [`RunnerError::BackendUnavailable`] if the device node does not exist
    /// - [`RunnerError::InvalidMemorySize`] if `memory_size` does not fit
    /// - [`RunnerError::DeviceOpen`] if the node exists but cannot be opened
    pub fn connect(device: &Path, memmap: &MemoryMap, memory_size: u64) -> Result<Self> {
        if !device.exists() {
            return Err(RunnerError::BackendUnavailable {
                device: device.to_path_buf(),
            });
        }
        let window = AddressWindow::new(memmap, memory_size)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|source| RunnerError::DeviceOpen {
                device: device.to_path_buf(),
                source,
            })?;

        info!(
            "chip runner connected to {} ({memory_size} bytes of global memory)",
            device.display()
        );
        Ok(Self {
            device: device.to_path_buf(),
            window,
            file: Mutex::new(file),
        })
    }

    /// Device node this runner is attached to.
    pub fn device(&self) -> &Path {
        &self.device
    }
}

impl Memory for ChipRunner {
    fn size(&self) -> u64 {
        self.window.memory_size()
    }

    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        self.window.check(address, len as u64)?;
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(address))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write(&self, address: u64, data: &[u8]) -> Result<()> {
        self.window.check(address, data.len() as u64)?;
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(address))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }
}

impl Runner for ChipRunner {
    fn kind(&self) -> BackendKind {
        BackendKind::Chip
    }

    fn memory(&self) -> &dyn Memory {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdb_target::{MType, MemRegion};

    fn memmap() -> MemoryMap {
        MemoryMap::from_regions([
            (MType::Local, MemRegion::new(0x1000, 0x1000)),
            (MType::Global, MemRegion::new(0x4000, 0x4000)),
        ])
        .unwrap()
    }

    #[test]
    fn missing_device_is_unavailable() {
        let err = ChipRunner::connect(Path::new("/nonexistent/tpu0"), &memmap(), 0x1000)
            .unwrap_err();
        assert!(matches!(err, RunnerError::BackendUnavailable { .. }));
    }

    #[test]
    fn read_write_through_device_node() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("tpu0");
        std::fs::write(&node, vec![0u8; 0x8000]).unwrap();

        let runner = ChipRunner::connect(&node, &memmap(), 0x4000).unwrap();
        assert_eq!(runner.kind(), BackendKind::Chip);
        assert_eq!(runner.device(), node.as_path());

        runner.write(0x4010, &[0xDE, 0xAD]).unwrap();
        assert_eq!(runner.read(0x400F, 4).unwrap(), vec![0, 0xDE, 0xAD, 0]);

        // the node really holds the bytes at the device address
        let raw = std::fs::read(&node).unwrap();
        assert_eq!(&raw[0x4010..0x4012], &[0xDE, 0xAD]);
    }

    #[test]
    fn bounds_checked_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("tpu0");
        std::fs::write(&node, vec![0u8; 0x8000]).unwrap();

        let runner = ChipRunner::connect(&node, &memmap(), 0x1000).unwrap();
        assert!(matches!(
            runner.read(0x4F00, 0x200),
            Err(RunnerError::OutOfBounds { .. })
        ));
        assert!(matches!(
            runner.write(0x0, &[1]),
            Err(RunnerError::Unmapped { .. })
        ));
    }

    #[test]
    fn invalid_size_on_existing_device() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("tpu0");
        std::fs::write(&node, b"").unwrap();
        assert!(matches!(
            ChipRunner::connect(&node, &memmap(), 0),
            Err(RunnerError::InvalidMemorySize { .. })
        ));
    }
}
