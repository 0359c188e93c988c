//! Software-model runner.
//!
//! Chip address spaces span gigabytes, so memory is kept as a sparse set of
//! pages. Untouched pages read as zero.

use std::collections::HashMap;
use std::sync::Mutex;

use tdb_target::MemoryMap;
use tracing::debug;

use crate::error::Result;
use crate::window::AddressWindow;
use crate::{BackendKind, Memory, Runner};

const PAGE_SIZE: u64 = 4096;

/// In-process simulated memory.
#[derive(Debug)]
pub struct CmodelRunner {
    window: AddressWindow,
    pages: Mutex<HashMap<u64, Box<[u8]>>>,
}

impl CmodelRunner {
    /// Create a simulated memory of `memory_size` global bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the memory size does not fit the chip's global region.
    pub fn new(memmap: &MemoryMap, memory_size: u64) -> Result<Self> {
        let window = AddressWindow::new(memmap, memory_size)?;
        debug!("cmodel runner created with {memory_size} bytes of global memory");
        Ok(Self {
            window,
            pages: Mutex::new(HashMap::new()),
        })
    }

    /// Number of pages that have been written.
    pub fn resident_pages(&self) -> usize {
        self.pages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Split `[address, address + len)` into per-page pieces:
/// `(page_number, offset_in_page, offset_in_buffer, piece_len)`.
fn page_spans(address: u64, len: usize) -> impl Iterator<Item = (u64, usize, usize, usize)> {
    let mut done = 0usize;
    std::iter::from_fn(move || {
        if done >= len {
            return None;
        }
        let addr = address + done as u64;
        let page = addr / PAGE_SIZE;
        let offset = (addr % PAGE_SIZE) as usize;
        let piece = (PAGE_SIZE as usize - offset).min(len - done);
        let span = (page, offset, done, piece);
        done += piece;
        Some(span)
    })
}

impl Memory for CmodelRunner {
    fn size(&self) -> u64 {
        self.window.memory_size()
    }

    fn read(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        self.window.check(address, len as u64)?;
        let pages = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = vec![0u8; len];
        for (page, offset, at, piece) in page_spans(address, len) {
            if let Some(data) = pages.get(&page) {
                out[at..at + piece].copy_from_slice(&data[offset..offset + piece]);
            }
        }
        Ok(out)
    }

    fn write(&self, address: u64, data: &[u8]) -> Result<()> {
        self.window.check(address, data.len() as u64)?;
        let mut pages = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        for (page, offset, at, piece) in page_spans(address, data.len()) {
            let buf = pages
                .entry(page)
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize].into_boxed_slice());
            buf[offset..offset + piece].copy_from_slice(&data[at..at + piece]);
        }
        Ok(())
    }
}

impl Runner for CmodelRunner {
    fn kind(&self) -> BackendKind {
        BackendKind::Cmodel
    }

    fn memory(&self) -> &dyn Memory {
        self
    }
}
