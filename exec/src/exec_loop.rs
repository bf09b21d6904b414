use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::{ExecEnv, GuestCpu, PerCpuState, SharedState, MIN_CODE_BUF_REMAINING};
use tcg_backend::translate::translate;
use tcg_backend::HostCodeGen;
use tcg_core::interrupt::{EXCP_DEBUG, EXCP_HALTED, EXCP_INTERRUPT};
use tcg_core::tb::{TranslationBlock, TB_EXIT_IDXMAX, TB_EXIT_NOCHAIN};
use tcg_core::tlb::{PAGE_MASK, PAGE_SIZE};
use tcg_core::LoopExit;

/// Reason the execution loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// TB returned a non-zero exit value.
    Exit(usize),
    /// Code buffer is full; caller should flush and retry.
    BufferFull,
}

/// Decoded host-execute return. QEMU packs `(last_tb_ptr | exit_code)`
/// into a single tagged word for calling-convention efficiency; this
/// struct is the safer equivalent (§9 Design Notes) — we already know
/// which TB index we called, so there's no pointer to untag.
#[derive(Debug, Clone, Copy)]
pub struct TbExitResult {
    pub tb: Option<usize>,
    pub exit_code: u32,
}

/// Single-threaded convenience alias named to match the execution
/// core's external interface (`cpu_exec(env) -> int`): drive one
/// guest execution session until an exit condition, returning the
/// exit cause.
///
/// # Safety
/// The caller must ensure `cpu.env_ptr()` points to a valid
/// CPU state struct matching the globals in the shared `Context`.
#[instrument(skip(env, cpu))]
pub unsafe fn cpu_exec<B, C>(env: &mut ExecEnv<B>, cpu: &mut C) -> ExitReason
where
    B: HostCodeGen,
    C: GuestCpu,
{
    cpu_exec_loop(env, cpu)
}

/// Main CPU execution loop, single-threaded convenience entry point.
///
/// # Safety
/// The caller must ensure `cpu.env_ptr()` points to a valid
/// CPU state struct matching the globals in the shared `Context`.
#[instrument(skip(env, cpu))]
pub unsafe fn cpu_exec_loop<B, C>(env: &mut ExecEnv<B>, cpu: &mut C) -> ExitReason
where
    B: HostCodeGen,
    C: GuestCpu,
{
    cpu_exec_loop_mt(&env.shared, &mut env.per_cpu, cpu)
}

/// Main CPU execution loop (MTTCG entry point): drives one vCPU
/// thread against a `SharedState` owned jointly with other vCPU
/// threads.
///
/// This is the outer frame of §4.5: it establishes the non-local-exit
/// landing pad and repeatedly calls `run_one_pass`, which drains
/// pending interrupts, looks up or translates TBs, and host-executes
/// them. A `LoopExit` raised by anything reachable from `run_one_pass`
/// — interrupt dispatch, a TLB slow path (`TlbFault` converts via
/// `From`), a simulated signal resume — surfaces here via `?` instead
/// of a `longjmp`; the handler below reacts to it and the loop
/// re-enters `run_one_pass`, exactly as the source re-enters its
/// landing pad: every local of the abandoned pass is discarded and
/// re-derived from CPU state on the next call.
///
/// # Safety
/// The caller must ensure `cpu.env_ptr()` points to a valid
/// CPU state struct matching the globals in the shared `Context`.
#[instrument(skip(shared, per_cpu, cpu))]
pub unsafe fn cpu_exec_loop_mt<B, C>(
    shared: &Arc<SharedState<B>>,
    per_cpu: &mut PerCpuState,
    cpu: &mut C,
) -> ExitReason
where
    B: HostCodeGen,
    C: GuestCpu,
{
    if cpu.is_halted() {
        if !cpu.has_work() {
            debug!("cpu halted with no pending work");
            return ExitReason::Exit(EXCP_HALTED as usize);
        }
        cpu.set_halted(false);
    }

    loop {
        match run_one_pass(shared, per_cpu, cpu) {
            Ok(exit) => return exit,
            Err(LoopExit::Exception(code)) => {
                // exception_index >= EXCP_INTERRUPT: bubbles straight
                // out to the caller of cpu_exec (§7), not retried.
                if code == EXCP_DEBUG {
                    if let Some(handler) = tcg_core::debug_excp_handler() {
                        handler();
                    }
                }
                debug!(code, "loop exit via landing pad: exception bubbled out");
                return ExitReason::Exit(code as usize);
            }
            Err(LoopExit::Interrupt) => {
                trace!("loop exit via landing pad: interrupt serviced, re-entering");
            }
            Err(LoopExit::SignalResume) => {
                trace!("loop exit via landing pad: resumed from signal, re-entering");
            }
            Err(LoopExit::MmuFault(fault)) => {
                debug!(?fault, "loop exit via landing pad: mmu fault, re-entering");
            }
        }
    }
}

/// §4.5 steps 5a–5c: clear chaining state, service exceptions, then
/// fetch and host-execute TBs until either a genuine exit condition
/// is reached (`Ok`) or some helper reachable from here raises a
/// [`LoopExit`] (`Err`, caught by the landing pad in
/// `cpu_exec_loop_mt`).
///
/// "Previous TB" chaining state is local to one pass: a `LoopExit`
/// discards it, matching the longjmp path's "all locals clobbered,
/// re-derived from env" contract (§4.5).
fn run_one_pass<B, C>(
    shared: &Arc<SharedState<B>>,
    per_cpu: &mut PerCpuState,
    cpu: &mut C,
) -> Result<ExitReason, LoopExit>
where
    B: HostCodeGen,
    C: GuestCpu,
{
    let mut prev_tb: Option<usize> = None;

    loop {
        if cpu.process_interrupts()? {
            trace!("interrupt serviced, forgetting chain link");
            prev_tb = None;
        }

        if cpu.take_exit_request() {
            trace!("exit_request observed at top of outer loop");
            return Ok(ExitReason::Exit(EXCP_INTERRUPT as usize));
        }

        let pc = cpu.get_pc();
        let cs_base = cpu.get_cs_base();
        let flags = cpu.get_flags();

        let tb_idx = match tb_find(shared, per_cpu, cpu, pc, cs_base, flags) {
            Some(idx) => idx,
            None => return Ok(ExitReason::BufferFull),
        };

        // S5: abandon a fetched TB if exit_request fires before we
        // host-execute it, without advancing the guest PC.
        if cpu.take_exit_request() {
            trace!("exit_request observed after tb fetch, abandoning tb");
            return Ok(ExitReason::Exit(EXCP_INTERRUPT as usize));
        }

        // SAFETY: called from the unsafe cpu_exec_loop_mt landing pad.
        let result = unsafe { cpu_tb_exec(shared, cpu, tb_idx) };
        per_cpu.stats.loop_iters += 1;

        match result.exit_code as usize {
            slot @ 0..=TB_EXIT_IDXMAX => {
                per_cpu.stats.chain_exit[slot] += 1;
                if let Some(prev) = prev_tb {
                    let spans_two_pages = shared.tb_store.get(tb_idx).page_addr[1] != -1;
                    if !spans_two_pages {
                        maybe_chain(shared, per_cpu, prev, slot, tb_idx);
                    }
                }
                prev_tb = Some(tb_idx);
            }
            v if v == TB_EXIT_NOCHAIN => {
                per_cpu.stats.nochain_exit += 1;
                prev_tb = None;
            }
            exit_code => {
                per_cpu.stats.real_exit += 1;
                debug!(exit_code, "loop exit via tb exit code");
                return Ok(ExitReason::Exit(exit_code));
            }
        }
    }
}

/// Patch `prev`'s exit `slot` to jump directly into `dst`'s host
/// code, unless it's already chained there.
fn maybe_chain<B: HostCodeGen>(
    shared: &SharedState<B>,
    per_cpu: &mut PerCpuState,
    prev: usize,
    slot: usize,
    dst: usize,
) {
    let already = shared.tb_store.get(prev).jmp.lock().unwrap().jmp_dest[slot] == Some(dst);
    if already {
        per_cpu.stats.chain_already += 1;
        return;
    }
    let jmp_off = match shared.tb_store.get(prev).jmp_insn_offset[slot] {
        Some(off) => off,
        None => return,
    };
    shared.tb_store.add_jump(prev, slot, dst);
    let target = shared.tb_store.get(dst).host_offset;
    shared
        .backend
        .patch_jump(shared.code_buf(), jmp_off as usize, target);
    per_cpu.stats.chain_patched += 1;
}

/// Find a TB for `(pc, cs_base, flags)`, translating if needed.
///
/// Returns `None` if the code buffer is too full to translate.
fn tb_find<B, C>(
    shared: &SharedState<B>,
    per_cpu: &mut PerCpuState,
    cpu: &mut C,
    pc: u64,
    cs_base: u64,
    flags: u32,
) -> Option<usize>
where
    B: HostCodeGen,
    C: GuestCpu,
{
    // Fast tier: per-CPU direct-mapped jump cache.
    if let Some(idx) = per_cpu.jump_cache.lookup(pc) {
        let tb = shared.tb_store.get(idx);
        if !tb.invalid.load(Ordering::Acquire) && tb.pc == pc && tb.cs_base == cs_base && tb.flags == flags {
            per_cpu.stats.jc_hit += 1;
            trace!(pc, "tb jump-cache hit");
            return Some(idx);
        }
    }

    // Slow tier: physical hash table, with page-coherence re-check.
    let phys_page1 = cpu.get_phys_page(pc);
    let next_page_pc = (pc & PAGE_MASK) + PAGE_SIZE;
    let phys_page2 = cpu.get_phys_page(next_page_pc);

    if let Some(idx) =
        shared
            .tb_store
            .lookup_coherent(pc, cs_base, flags, phys_page1, Some(phys_page2))
    {
        per_cpu.stats.ht_hit += 1;
        per_cpu.jump_cache.insert(pc, idx);
        debug!(pc, "tb hash-table hit");
        return Some(idx);
    }

    tb_gen_code(shared, per_cpu, cpu, pc, cs_base, flags, phys_page1)
}

/// Translate guest code at `pc` into a new TB.
///
/// Returns `None` if the code buffer has insufficient space.
fn tb_gen_code<B, C>(
    shared: &SharedState<B>,
    per_cpu: &mut PerCpuState,
    cpu: &mut C,
    pc: u64,
    cs_base: u64,
    flags: u32,
    phys_page1: u64,
) -> Option<usize>
where
    B: HostCodeGen,
    C: GuestCpu,
{
    if shared.code_buf().remaining() < MIN_CODE_BUF_REMAINING {
        return None;
    }

    let mut guard = shared.translate_lock.lock().unwrap();

    // SAFETY: translate_lock is held for the remainder of this function.
    let tb_idx = unsafe { shared.tb_store.alloc(pc, cs_base, flags, 0) };

    guard.ir_ctx.reset();
    let guest_size = cpu.gen_code(&mut guard.ir_ctx, pc, TranslationBlock::max_insns(0));

    shared.backend.clear_goto_tb_offsets();

    // SAFETY: translate_lock is held.
    let code_buf = unsafe { shared.code_buf_mut() };
    code_buf.set_writable().expect("set_writable failed");
    let host_offset = translate(&mut guard.ir_ctx, &shared.backend, code_buf);
    let host_size = code_buf.offset() - host_offset;
    code_buf.set_executable().expect("set_executable failed");

    let end_pc = pc + guest_size.max(1) as u64 - 1;
    let crosses_page = (pc & PAGE_MASK) != (end_pc & PAGE_MASK);
    let page_addr1 = if crosses_page {
        cpu.get_phys_page((pc & PAGE_MASK) + PAGE_SIZE) as i64
    } else {
        -1
    };

    {
        // SAFETY: translate_lock is held; tb_idx was just allocated
        // and is not yet reachable from the hash table or jump cache.
        let tb = unsafe { shared.tb_store.get_mut(tb_idx) };
        tb.size = guest_size;
        tb.phys_pc = phys_page1;
        tb.page_addr = [phys_page1 as i64, page_addr1];
        tb.host_offset = host_offset;
        tb.host_size = host_size;

        let offsets = shared.backend.goto_tb_offsets();
        for (i, &(jmp, reset)) in offsets.iter().enumerate().take(2) {
            tb.set_jmp_insn_offset(i, jmp as u32);
            tb.set_jmp_reset_offset(i, reset as u32);
        }
    }

    shared.tb_store.insert(tb_idx);
    per_cpu.jump_cache.insert(pc, tb_idx);
    per_cpu.stats.translate += 1;
    debug!(pc, tb_idx, "tb translated");

    drop(guard);
    Some(tb_idx)
}

/// Execute a single TB and return its decoded exit result.
///
/// # Safety
/// Called from the unsafe `cpu_exec_loop`/`cpu_exec_loop_mt`.
unsafe fn cpu_tb_exec<B, C>(shared: &SharedState<B>, cpu: &mut C, tb_idx: usize) -> TbExitResult
where
    B: HostCodeGen,
    C: GuestCpu,
{
    let tb = shared.tb_store.get(tb_idx);
    let tb_ptr = shared.code_buf().ptr_at(tb.host_offset);
    let env_ptr = cpu.env_ptr();

    // Prologue signature:
    //   fn(env: *mut u8, tb_ptr: *const u8) -> usize
    let prologue_fn: unsafe extern "C" fn(*mut u8, *const u8) -> usize =
        core::mem::transmute(shared.code_buf().base_ptr());
    let exit_code = prologue_fn(env_ptr, tb_ptr);

    TbExitResult {
        tb: Some(tb_idx),
        exit_code: exit_code as u32,
    }
}
