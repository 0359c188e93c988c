//! Target context: one chip contract plus its lazily created runner.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tdb_runner::{BackendKind, Memory, Runner};
use tdb_target::{
    AtomicReg, CmdQueue, DType, Decoder, Layout, MType, MemRef, MemoryMap, Target, TargetError, TpuCmd,
};
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::contract::ChipContract;
use crate::error::Result;

/// A chip contract bound to a backend selection.
///
/// The backend is fixed when the context is built. The runner for it is
/// constructed on first memory access and shared afterwards.
#[derive(Debug)]
pub struct TargetContext {
    chip: Box<dyn ChipContract>,
    backend: BackendKind,
    device: PathBuf,
    memory_size: u64,
    cmodel_runner: Mutex<Option<Arc<dyn Runner>>>,
    chip_runner: Mutex<Option<Arc<dyn Runner>>>,
}

impl TargetContext {
    pub fn new(chip: Box<dyn ChipContract>, config: &BackendConfig) -> Self {
        let backend = config.backend();
        let memory_size = config
            .memory_size
            .unwrap_or_else(|| chip.default_memory_size());
        info!(target_chip = %chip.target(), %backend, "target context created");
        Self {
            chip,
            backend,
            device: config.device.clone(),
            memory_size,
            cmodel_runner: Mutex::new(None),
            chip_runner: Mutex::new(None),
        }
    }

    pub fn target(&self) -> Target {
        self.chip.target()
    }

    /// Backend chosen at construction.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Global memory size the runner is (or will be) built with.
    pub fn memory_size(&self) -> u64 {
        self.memory_size
    }

    pub fn chip(&self) -> &dyn ChipContract {
        self.chip.as_ref()
    }

    pub fn memmap(&self) -> &MemoryMap {
        self.chip.memmap()
    }

    pub fn decoder(&self) -> &dyn Decoder {
        self.chip.decoder()
    }

    pub fn tiu_sys(&self) -> Option<&AtomicReg> {
        self.chip.tiu_sys()
    }

    pub fn dma_sys(&self) -> Option<&AtomicReg> {
        self.chip.dma_sys()
    }

    fn slot(&self, backend: BackendKind) -> &Mutex<Option<Arc<dyn Runner>>> {
        match backend {
            BackendKind::Cmodel => &self.cmodel_runner,
            BackendKind::Chip => &self.chip_runner,
        }
    }

    /// Whether the active runner has been built yet.
    pub fn has_runner(&self) -> bool {
        self.slot(self.backend)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// The runner of the active backend, built on first call.
    ///
    /// # Errors
    ///
    /// Fails if the runner cannot be built; a chip backend without a device
    /// is reported as unavailable and never replaced by the cmodel.
    pub fn runner(&self) -> Result<Arc<dyn Runner>> {
        let mut slot = self
            .slot(self.backend)
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(runner) = slot.as_ref() {
            return Ok(Arc::clone(runner));
        }

        let runner = self
            .chip
            .construct_runner(self.backend, &self.device, self.memory_size)?;
        debug!(
            target_chip = %self.target(),
            backend = %self.backend,
            memory_size = self.memory_size,
            "runner constructed"
        );
        *slot = Some(Arc::clone(&runner));
        Ok(runner)
    }

    /// Memory surface of the active runner.
    pub fn memory(&self) -> Result<MemoryRef> {
        Ok(MemoryRef(self.runner()?))
    }

    pub fn classify_address(&self, address: u64) -> Result<MType> {
        Ok(self.chip.classify_address(address)?)
    }

    pub fn local_layout_to_stride(&self, memref: &MemRef) -> Result<Vec<u64>> {
        Ok(self.chip.local_layout_to_stride(memref)?)
    }

    pub fn merge_instruction(&self, tiu: Vec<TpuCmd>, dma: Vec<TpuCmd>) -> Vec<TpuCmd> {
        self.chip.merge_instruction(tiu, dma)
    }

    pub fn is_system_instruction(&self, cmd: &TpuCmd) -> bool {
        self.chip.is_system_instruction(cmd)
    }

    /// Build a memory reference whose stride follows the chip layout.
    ///
    /// Local layouts are only valid for addresses in local memory. A
    /// [`Layout::Stride`] reference built here gets the contiguous stride;
    /// use [`TargetContext::strided_memref`] to carry an explicit one.
    pub fn memref(
        &self,
        address: u64,
        shape: Vec<u64>,
        dtype: DType,
        layout: Layout,
    ) -> Result<MemRef> {
        let kind = self.classify_address(address)?;
        let mut memref = MemRef::new(address, shape, dtype, layout);
        if layout.is_local() && kind != MType::Local {
            return Err(TargetError::NotLocal { layout, kind }.into());
        }
        memref.stride = self.local_layout_to_stride(&memref)?;
        Ok(memref)
    }

    /// Build a [`Layout::Stride`] reference with an explicit stride.
    ///
    /// # Errors
    ///
    /// Unmapped addresses, and a stride whose rank differs from the shape.
    pub fn strided_memref(
        &self,
        address: u64,
        shape: Vec<u64>,
        stride: Vec<u64>,
        dtype: DType,
    ) -> Result<MemRef> {
        self.classify_address(address)?;
        let memref = MemRef::new(address, shape, dtype, Layout::Stride).with_stride(stride);
        self.local_layout_to_stride(&memref)?;
        Ok(memref)
    }

    pub fn decode(&self, queue: CmdQueue, raw: &[u8]) -> Result<Vec<TpuCmd>> {
        Ok(self.chip.decoder().decode(queue, raw)?)
    }

    /// Decode both raw streams and merge them into execution order.
    pub fn decode_and_merge(&self, tiu_raw: &[u8], dma_raw: &[u8]) -> Result<Vec<TpuCmd>> {
        let tiu = self.decode(CmdQueue::Tiu, tiu_raw)?;
        let dma = self.decode(CmdQueue::Dma, dma_raw)?;
        Ok(self.merge_instruction(tiu, dma))
    }
}

/// Handle to the active runner's memory.
#[derive(Debug, Clone)]
pub struct MemoryRef(Arc<dyn Runner>);

impl MemoryRef {
    /// Backend the memory belongs to.
    pub fn backend(&self) -> BackendKind {
        self.0.kind()
    }

    pub fn runner(&self) -> &Arc<dyn Runner> {
        &self.0
    }
}

impl Memory for MemoryRef {
    fn size(&self) -> u64 {
        self.0.memory().size()
    }

    fn read(&self, address: u64, len: usize) -> tdb_runner::Result<Vec<u8>> {
        self.0.memory().read(address, len)
    }

    fn write(&self, address: u64, data: &[u8]) -> tdb_runner::Result<()> {
        self.0.memory().write(address, data)
    }
}
