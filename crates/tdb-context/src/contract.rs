//! Per-chip contract.
//!
//! Every supported chip provides one [`ChipContract`] implementation. All
//! operations are required methods, so a chip that leaves one out fails to
//! compile instead of failing on first call.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use tdb_runner::{BackendKind, ChipRunner, CmodelRunner, Runner};
use tdb_target::{
    AtomicReg, Decoder, LocalGeometry, MType, MemRef, MemoryMap, Target, TargetError, TpuCmd,
};

/// What a chip implementation must provide to the debugger.
pub trait ChipContract: Debug + Send + Sync {
    fn target(&self) -> Target;

    fn memmap(&self) -> &MemoryMap;

    /// System instruction of the TIU queue, if the chip has one.
    fn tiu_sys(&self) -> Option<&AtomicReg>;

    /// System instruction of the DMA queue, if the chip has one.
    fn dma_sys(&self) -> Option<&AtomicReg>;

    fn decoder(&self) -> &dyn Decoder;

    fn geometry(&self) -> &LocalGeometry;

    /// Global memory given to a runner when the configuration names none.
    fn default_memory_size(&self) -> u64;

    /// Region kind of `address`.
    ///
    /// # Errors
    ///
    /// Unmapped addresses are an error, never a reserved kind.
    fn classify_address(&self, address: u64) -> tdb_target::Result<MType>;

    /// Per-dimension stride of `memref` under the chip's local layout rules.
    ///
    /// The result has exactly one entry per dimension of `memref.shape`.
    fn local_layout_to_stride(&self, memref: &MemRef) -> tdb_target::Result<Vec<u64>>;

    /// Interleave the TIU and DMA streams into hardware execution order.
    ///
    /// Relative order inside each stream is preserved.
    fn merge_instruction(&self, tiu: Vec<TpuCmd>, dma: Vec<TpuCmd>) -> Vec<TpuCmd>;

    /// Whether `cmd` is a synchronization/system instruction.
    ///
    /// Must agree with where [`ChipContract::merge_instruction`] places sync
    /// points.
    fn is_system_instruction(&self, cmd: &TpuCmd) -> bool;

    /// Build the runner for `backend` with `memory_size` bytes of global
    /// memory.
    fn construct_runner(
        &self,
        backend: BackendKind,
        device: &Path,
        memory_size: u64,
    ) -> tdb_runner::Result<Arc<dyn Runner>>;
}

/// Classify `address` against `memmap`, failing for unmapped addresses.
pub fn classify_in(memmap: &MemoryMap, address: u64) -> tdb_target::Result<MType> {
    memmap
        .classify(address)
        .ok_or(TargetError::AddressUnmapped { address })
}

/// Whether `cmd` matches either queue's system-register descriptor.
pub fn matches_sys(tiu_sys: Option<&AtomicReg>, dma_sys: Option<&AtomicReg>, cmd: &TpuCmd) -> bool {
    tiu_sys.is_some_and(|r| r.matches(cmd)) || dma_sys.is_some_and(|r| r.matches(cmd))
}

/// Build a runner of the requested kind over `memmap`.
pub fn build_runner(
    memmap: &MemoryMap,
    backend: BackendKind,
    device: &Path,
    memory_size: u64,
) -> tdb_runner::Result<Arc<dyn Runner>> {
    Ok(match backend {
        BackendKind::Cmodel => Arc::new(CmodelRunner::new(memmap, memory_size)?),
        BackendKind::Chip => Arc::new(ChipRunner::connect(device, memmap, memory_size)?),
    })
}
