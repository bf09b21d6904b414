//! Architecture-neutral slice of per-CPU state.
//!
//! Maps to the non-architectural fields of QEMU's `CPUState`/`CPUArchState`
//! (`exception_index`, `interrupt_request`, the TLB, the jump cache).
//! A concrete guest CPU struct embeds this the way `RiscvCpu` embeds
//! its register file — `CoreCpuState` carries only what the execution
//! core itself reads or writes.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::interrupt::InterruptRequest;
use crate::tb::JumpCache;
use crate::tlb::TlbTables;

/// Core per-CPU state threaded through the execution loop. Generic
/// over the number of MMU modes, which is an architecture choice
/// (e.g. 2 for simple user/kernel, more for x86's many privilege x
/// SMM x AC-split combinations).
pub struct CoreCpuState<const NB_MMU_MODES: usize> {
    /// `-1` when no exception is pending.
    pub exception_index: i32,
    pub interrupt_request: InterruptRequest,
    /// Cooperative cancellation flag. No ordering requirement beyond
    /// "eventually visible" — see `SPEC_FULL.md` §5.
    pub exit_request: AtomicBool,
    pub halted: bool,
    /// Index of the TB currently host-executing, if any (§3 invariant 4).
    pub current_tb: Option<usize>,
    pub jump_cache: JumpCache,
    pub tlb: TlbTables<NB_MMU_MODES>,
}

impl<const NB_MMU_MODES: usize> CoreCpuState<NB_MMU_MODES> {
    pub fn new() -> Self {
        Self {
            exception_index: -1,
            interrupt_request: InterruptRequest::empty(),
            exit_request: AtomicBool::new(false),
            halted: false,
            current_tb: None,
            jump_cache: JumpCache::new(),
            tlb: TlbTables::new(),
        }
    }

    pub fn request_exit(&self) {
        self.exit_request.store(true, Ordering::Relaxed);
    }

    pub fn take_exit_request(&self) -> bool {
        self.exit_request.swap(false, Ordering::Relaxed)
    }

    pub fn has_work(&self) -> bool {
        !self.interrupt_request.is_empty()
    }
}

impl<const NB_MMU_MODES: usize> Default for CoreCpuState<NB_MMU_MODES> {
    fn default() -> Self {
        Self::new()
    }
}
