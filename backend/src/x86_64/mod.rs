//! x86-64 host code generator.
//!
//! Reference: `~/qemu/tcg/i386/tcg-target.c.inc`.

pub mod codegen;
pub mod constraints;
pub mod emitter;
pub mod regs;

use std::sync::Mutex;

use crate::code_buffer::CodeBuffer;
use crate::x86_64::emitter::{emit_jmp, emit_jmp_reg, emit_mov_ri};
use crate::x86_64::regs::Reg;

/// x86-64 [`crate::HostCodeGen`] implementation.
///
/// Holds the offsets recorded once while emitting the shared
/// prologue/epilogue (identical machine code serves every TB in the
/// buffer) plus the direct-jump chaining stubs recorded while
/// translating whichever TB was generated most recently.
pub struct X86_64CodeGen {
    pub(crate) prologue_offset: usize,
    pub(crate) code_gen_start: usize,
    pub(crate) epilogue_return_zero_offset: usize,
    pub(crate) tb_ret_offset: usize,
    /// `(jump_offset, reset_offset)` per `goto_tb` emitted in the
    /// current TB. `Mutex`-wrapped so direct-jump patching
    /// (`HostCodeGen::patch_jump`) can run concurrently from other
    /// vCPU threads while this thread keeps translating.
    pub(crate) goto_tb_info: Mutex<Vec<(usize, usize)>>,
}

impl X86_64CodeGen {
    pub fn new() -> Self {
        Self {
            prologue_offset: 0,
            code_gen_start: 0,
            epilogue_return_zero_offset: 0,
            tb_ret_offset: 0,
            goto_tb_info: Mutex::new(Vec::new()),
        }
    }

    /// Exit the current TB with `val` as the loop-exit code (e.g. a
    /// tagged next-TB pointer, or 0 to fall back to the normal block
    /// lookup). Reuses the epilogue's own `mov rax, 0` when `val` is
    /// zero instead of re-emitting it at every exit point.
    pub(crate) fn emit_exit_tb(&self, buf: &mut CodeBuffer, val: u64) {
        if val == 0 {
            emit_jmp(buf, self.epilogue_return_zero_offset);
        } else {
            emit_mov_ri(buf, false, Reg::Rax, val);
            emit_jmp(buf, self.tb_ret_offset);
        }
    }

    /// Emit a patchable direct-jump stub for TB-to-TB chaining.
    ///
    /// Returns `(jump_offset, reset_offset)`. `jump_offset` identifies
    /// the jump for `HostCodeGen::patch_jump` once the destination
    /// TB's start is known. `reset_offset` is the offset right after
    /// the jump — where the sibling `exit_tb` op's fallback code lands
    /// — so un-chaining is just patching the jump back to fall
    /// straight through to it.
    pub(crate) fn emit_goto_tb(&self, buf: &mut CodeBuffer) -> (usize, usize) {
        let jmp_offset = buf.offset();
        buf.emit_u8(0xE9);
        buf.emit_u32(0);
        let reset_offset = buf.offset();
        (jmp_offset, reset_offset)
    }

    /// Indirect jump through a register holding a TB entry point
    /// (guest `goto_ptr`/computed-goto support).
    pub(crate) fn emit_goto_ptr(buf: &mut CodeBuffer, reg: Reg) {
        emit_jmp_reg(buf, reg);
    }
}

impl Default for X86_64CodeGen {
    fn default() -> Self {
        Self::new()
    }
}
