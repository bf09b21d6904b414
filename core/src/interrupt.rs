//! Interrupt and exception dispatch.
//!
//! Maps to QEMU's `process_interrupt_request`/`process_exceptions` in
//! `cpu-exec.c`. Guest architecture specifics (x86 SMM nesting, ARM
//! CPSR masking, NVIC priority) are out of scope here and live behind
//! the `ArchHooks` trait; this module owns only the priority ladder
//! and the bookkeeping around it.

use bitflags::bitflags;

bitflags! {
    /// Pending-interrupt bits. A union across architectures: an
    /// implementation that doesn't use a given bit simply never
    /// sets it, exactly as the source's single `interrupt_request`
    /// word is shared across all targets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterruptRequest: u32 {
        const DEBUG = 1 << 0;
        const HALT  = 1 << 1;
        const INIT  = 1 << 2;
        const SIPI  = 1 << 3;
        const SMI   = 1 << 4;
        const NMI   = 1 << 5;
        const MCE   = 1 << 6;
        const HARD  = 1 << 7;
        const VIRQ  = 1 << 8;
        const FIQ   = 1 << 9;
        /// Set by a helper that wants the current TB abandoned
        /// without otherwise altering control flow.
        const EXITTB = 1 << 10;
    }
}

/// Guest exception numbers `>= EXCP_INTERRUPT` are "loop-exit"
/// exceptions: the dispatcher hands them straight back to the
/// `cpu_exec` caller instead of delivering them architecturally.
/// Numbers below this are ordinary synchronous exceptions serviced
/// in-place by `ArchHooks::do_interrupt`.
pub const EXCP_INTERRUPT: i32 = 0x1_0000;
pub const EXCP_HLT: i32 = EXCP_INTERRUPT + 1;
pub const EXCP_DEBUG: i32 = EXCP_INTERRUPT + 2;
pub const EXCP_HALTED: i32 = EXCP_INTERRUPT + 3;

/// Exception vector the source silently skips in
/// `process_exceptions` (x86 vector 5, `#BR`/BOUND) with no comment
/// explaining why. Preserved verbatim rather than "fixed" — see
/// `SPEC_FULL.md` §9 Open Questions.
pub const EXCP_SKIP_DELIVERY: i32 = 5;

/// Narrow seam to the guest-architecture collaborator. None of these
/// methods are implemented here; a concrete CPU (x86, ARM, ...)
/// supplies them. Default methods model "this architecture doesn't
/// have this concept" so a minimal implementor (e.g. a user-mode-only
/// RISC-V CPU with no interrupts) can ignore the whole ladder.
pub trait ArchHooks {
    /// External (HARD/VIRQ) interrupts are currently unmaskable.
    fn hard_irq_enabled(&self) -> bool {
        false
    }
    /// ARMv7-M NVIC: is there a higher-priority pending exception
    /// than the one currently active?
    fn can_take_pending_exception(&self) -> bool {
        true
    }
    /// x86 GIF (global interrupt flag) gating SMI/NMI.
    fn gif_active(&self) -> bool {
        true
    }
    fn in_smm(&self) -> bool {
        false
    }
    fn nmi_masked(&self) -> bool {
        false
    }
    /// Single-step mode masks external interrupt bits before the
    /// ladder is evaluated (source: `CPU_INTERRUPT_SSTEP_MASK`).
    fn single_step_masks_irq(&self) -> bool {
        false
    }

    /// Deliver a synchronous exception or a just-recognized interrupt
    /// by mutating architectural state to the handler entry point.
    fn do_interrupt(&mut self, req: InterruptRequest);
    fn do_cpu_init(&mut self);
    fn do_smm_enter(&mut self) {}
    fn do_interrupt_hardirq(&mut self) {
        self.do_interrupt(InterruptRequest::HARD);
    }

    /// Rewind architectural state (notably the guest PC) to the
    /// instruction whose execution triggered a fault at host return
    /// address `host_ra`, using per-TB debug info recorded at
    /// translation time. Called by `crate::error::cpu_loop_exit_restore`
    /// before the fault propagates out of `cpu_exec`. Default no-op:
    /// an architecture with no such debug info (or a test harness)
    /// simply resumes at whatever PC it already has.
    fn restore_state(&mut self, _host_ra: usize) {}
}

/// Outcome of one priority-ladder pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// No request fired; fall through to exception processing.
    None,
    /// A request was serviced architecturally; the loop must treat
    /// the previous TB as non-chainable (source: `ltb = NULL`).
    Serviced,
    /// The CPU halted and has no pending wakeup source.
    Halted,
}

/// Drain pending interrupts in strict priority order, gated by the
/// architecture hooks. Mirrors `process_interrupt_request` in the
/// source: each tier's gate is checked only if higher tiers didn't
/// already fire.
pub fn process_interrupt_request<A: ArchHooks>(
    hooks: &mut A,
    req: &mut InterruptRequest,
    halted: &mut bool,
) -> InterruptOutcome {
    let mut effective = *req;
    if hooks.single_step_masks_irq() {
        effective.remove(InterruptRequest::HARD | InterruptRequest::VIRQ | InterruptRequest::FIQ);
    }

    if effective.contains(InterruptRequest::DEBUG) {
        req.remove(InterruptRequest::DEBUG);
        hooks.do_interrupt(InterruptRequest::DEBUG);
        return InterruptOutcome::Serviced;
    }
    if effective.contains(InterruptRequest::HALT) {
        req.remove(InterruptRequest::HALT);
        *halted = true;
        hooks.do_interrupt(InterruptRequest::HALT);
        return InterruptOutcome::Halted;
    }
    if effective.contains(InterruptRequest::INIT) {
        req.remove(InterruptRequest::INIT);
        hooks.do_cpu_init();
        return InterruptOutcome::Serviced;
    }
    if effective.contains(InterruptRequest::SIPI) {
        // Not implemented upstream either (source: `perror("Not
        // implemented")` and fall through) — recognized and cleared
        // so it doesn't spin the ladder forever, but otherwise inert.
        req.remove(InterruptRequest::SIPI);
        tracing::warn!("SIPI requested but not implemented");
        return InterruptOutcome::None;
    }
    if effective.contains(InterruptRequest::SMI) && hooks.gif_active() && !hooks.in_smm() {
        req.remove(InterruptRequest::SMI);
        hooks.do_smm_enter();
        return InterruptOutcome::Serviced;
    }
    if effective.contains(InterruptRequest::NMI) && hooks.gif_active() && !hooks.nmi_masked() {
        req.remove(InterruptRequest::NMI);
        hooks.do_interrupt(InterruptRequest::NMI);
        return InterruptOutcome::Serviced;
    }
    if effective.contains(InterruptRequest::MCE) {
        req.remove(InterruptRequest::MCE);
        hooks.do_interrupt(InterruptRequest::MCE);
        return InterruptOutcome::Serviced;
    }
    if effective.contains(InterruptRequest::HARD) && hooks.hard_irq_enabled() {
        req.remove(InterruptRequest::HARD);
        hooks.do_interrupt_hardirq();
        return InterruptOutcome::Serviced;
    }
    if effective.contains(InterruptRequest::VIRQ) && hooks.hard_irq_enabled() {
        req.remove(InterruptRequest::VIRQ);
        hooks.do_interrupt(InterruptRequest::VIRQ);
        return InterruptOutcome::Serviced;
    }
    if effective.contains(InterruptRequest::FIQ) && hooks.can_take_pending_exception() {
        req.remove(InterruptRequest::FIQ);
        hooks.do_interrupt(InterruptRequest::FIQ);
        return InterruptOutcome::Serviced;
    }

    if req.contains(InterruptRequest::EXITTB) {
        req.remove(InterruptRequest::EXITTB);
        return InterruptOutcome::Serviced;
    }

    InterruptOutcome::None
}

/// What to do with the current `exception_index` after the interrupt
/// ladder has run. Mirrors `process_exceptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionOutcome {
    /// No exception pending.
    None,
    /// Delivered architecturally; `exception_index` is now cleared.
    Delivered,
    /// `exception_index >= EXCP_INTERRUPT`: bubble straight out.
    LoopExit(i32),
}

pub fn process_exceptions<A: ArchHooks>(
    hooks: &mut A,
    exception_index: &mut i32,
) -> ExceptionOutcome {
    if *exception_index < 0 {
        return ExceptionOutcome::None;
    }
    if *exception_index == EXCP_SKIP_DELIVERY {
        *exception_index = -1;
        return ExceptionOutcome::None;
    }
    if *exception_index >= EXCP_INTERRUPT {
        let idx = *exception_index;
        if idx == EXCP_DEBUG {
            // Debug exceptions still get a best-effort handler call
            // before bubbling out, matching the source's ordering.
            hooks.do_interrupt(InterruptRequest::DEBUG);
        }
        return ExceptionOutcome::LoopExit(idx);
    }
    hooks.do_interrupt(InterruptRequest::empty());
    *exception_index = -1;
    ExceptionOutcome::Delivered
}
