//! Non-local exit carrier.
//!
//! Replaces QEMU's `cpu_loop_exit`/`setjmp`/`longjmp` pair. Any helper
//! reachable from the execution loop — the interrupt dispatcher, the
//! TLB slow path, a simulated signal delivery — returns `Err(LoopExit)`
//! instead of jumping out through a saved stack context. The loop
//! itself is the only place that catches it (see `tcg_exec::exec_loop`).

use std::sync::Mutex;

use thiserror::Error;

use crate::cpu_state::CoreCpuState;
use crate::interrupt::{ArchHooks, EXCP_INTERRUPT};

/// A fault raised by the soft-MMU slow path (see `crate::tlb`).
///
/// Carries just enough to let the execution loop rewind guest state
/// and re-dispatch as a guest exception; the faulting address and
/// access kind are architecture-neutral, everything else is the
/// architecture hook's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TlbFault {
    #[error("page fault on read at {addr:#x}")]
    ReadFault { addr: u64 },
    #[error("page fault on write at {addr:#x}")]
    WriteFault { addr: u64 },
    #[error("page fault on instruction fetch at {addr:#x}")]
    FetchFault { addr: u64 },
    #[error("misaligned access at {addr:#x} (width {width})")]
    Unaligned { addr: u64, width: u8 },
}

/// Reason the execution loop must abandon whatever it was doing and
/// return to its landing pad.
///
/// This is the Rust-native replacement for the `setjmp`/`longjmp`
/// pair described in the original design: a `Result` that unwinds
/// through `?` instead of through a saved register context. Every
/// local the loop was holding is considered stale once this value
/// surfaces — the loop re-derives everything from CPU state on the
/// next pass, exactly as the longjmp path does in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoopExit {
    /// A synchronous guest exception or interrupt was serviced;
    /// the loop should clear its chaining state and continue.
    #[error("interrupt or exception serviced")]
    Interrupt,

    /// A host-level resumption after a simulated asynchronous
    /// signal during TB execution (`cpu_resume_from_signal`).
    #[error("resumed from signal")]
    SignalResume,

    /// The soft-MMU slow path raised a fault; guest PC must be
    /// rewound to the faulting instruction before re-dispatch.
    #[error("mmu fault: {0}")]
    MmuFault(#[from] TlbFault),

    /// A loop-exit exception (`exception_index >= EXCP_INTERRUPT`)
    /// that the caller of `cpu_exec` must observe directly.
    #[error("loop-exit exception {0}")]
    Exception(i32),
}

/// Abandon the current execution attempt and return to the landing
/// pad in `cpu_exec`. Mirrors QEMU's `cpu_loop_exit`: a real JIT
/// engine would `siglongjmp` here; in this engine the caller instead
/// propagates the returned value with `?`/`Err` until it reaches the
/// catch loop in `tcg_exec::exec_loop`.
///
/// Reads whatever `exception_index` the caller already set on `cpu`
/// (mirroring the source, where the exception is recorded on `env`
/// before `cpu_loop_exit` is invoked) and classifies it: a value
/// `>= EXCP_INTERRUPT` must bubble all the way out of `cpu_exec`,
/// anything else is an ordinary interrupt/exception the loop should
/// service and retry.
pub fn cpu_loop_exit<const N: usize>(cpu: &mut CoreCpuState<N>) -> LoopExit {
    cpu.current_tb = None;
    if cpu.exception_index >= EXCP_INTERRUPT {
        LoopExit::Exception(cpu.exception_index)
    } else {
        LoopExit::Interrupt
    }
}

/// Same as [`cpu_loop_exit`], but first rewinds the faulting
/// architectural state via `ArchHooks::restore_state` using the host
/// return address `host_ra` captured at the slow-path call site —
/// the Rust-native counterpart of `cpu_restore_state(env, ra)`.
pub fn cpu_loop_exit_restore<const N: usize, A: ArchHooks>(
    cpu: &mut CoreCpuState<N>,
    hooks: &mut A,
    host_ra: usize,
) -> LoopExit {
    hooks.restore_state(host_ra);
    cpu_loop_exit(cpu)
}

/// Used by a (simulated) signal handler once it has finished reacting
/// to an asynchronous host signal delivered mid-TB. Clears any
/// pending exception and hands control back to the landing pad.
pub fn cpu_resume_from_signal<const N: usize>(cpu: &mut CoreCpuState<N>, _puc: usize) -> LoopExit {
    cpu.exception_index = -1;
    cpu.current_tb = None;
    LoopExit::SignalResume
}

/// Sink invoked when an `EXCP_DEBUG` loop-exit exception bubbles out
/// of `cpu_exec`, before it is returned to the caller.
pub type DebugExcpHandler = fn();

static DEBUG_EXCP_HANDLER: Mutex<Option<DebugExcpHandler>> = Mutex::new(None);

/// Install a new debug-exception sink, returning whatever was
/// previously installed (`None` the first time). Process-wide, like
/// the source's single global `debug_excp_handler` — this engine
/// drives one CPU per thread (§5), so no further synchronization is
/// needed beyond the mutex already here for interior mutability.
pub fn cpu_set_debug_excp_handler(handler: Option<DebugExcpHandler>) -> Option<DebugExcpHandler> {
    let mut slot = DEBUG_EXCP_HANDLER.lock().unwrap();
    std::mem::replace(&mut *slot, handler)
}

/// Read the currently installed debug-exception sink, if any.
pub fn debug_excp_handler() -> Option<DebugExcpHandler> {
    *DEBUG_EXCP_HANDLER.lock().unwrap()
}
